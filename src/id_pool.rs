/*
 * Identifier Pool
 *
 * Allocates and releases the small positive integers used as thread ids.
 * Always hands out the smallest free id, which keeps id assignment
 * deterministic and matches the intuitive "lowest free slot" behavior
 * callers expect from a bounded namespace.
 */

use std::collections::BTreeSet;

use crate::error::Error;
use crate::thread::Tid;

/// A pool of free thread ids drawn from `[1, max_threads)`. Tid `0` is
/// reserved for the main thread and never enters the pool.
pub struct IdPool {
    free: BTreeSet<Tid>,
}

impl IdPool {
    /// Seed the pool with `{1, 2, ..., max_threads - 1}`.
    pub fn new(max_threads: usize) -> Self {
        Self {
            free: (1..max_threads).map(Tid).collect(),
        }
    }

    /// Remove and return the smallest free id.
    pub fn acquire(&mut self) -> Result<Tid, Error> {
        let tid = *self.free.iter().next().ok_or(Error::OutOfIds(self.capacity()))?;
        self.free.remove(&tid);
        Ok(tid)
    }

    /// Return `tid` to the pool. No-op if `tid` is `0` (main is never
    /// pool-managed) or already free.
    pub fn release(&mut self, tid: Tid) {
        if !tid.is_main() {
            self.free.insert(tid);
        }
    }

    fn capacity(&self) -> usize {
        self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hands_out_smallest_free_id_first() {
        let mut pool = IdPool::new(4);
        assert_eq!(pool.acquire().unwrap(), Tid(1));
        assert_eq!(pool.acquire().unwrap(), Tid(2));
        assert_eq!(pool.acquire().unwrap(), Tid(3));
        assert!(pool.acquire().is_err());
    }

    #[test]
    fn released_ids_are_reused_smallest_first() {
        let mut pool = IdPool::new(4);
        let a = pool.acquire().unwrap();
        let _b = pool.acquire().unwrap();
        let c = pool.acquire().unwrap();
        pool.release(a);
        pool.release(c);
        assert_eq!(pool.acquire().unwrap(), a);
        assert_eq!(pool.acquire().unwrap(), c);
    }

    #[test]
    fn releasing_main_is_a_no_op() {
        let mut pool = IdPool::new(4);
        pool.release(Tid::MAIN);
        assert_eq!(pool.acquire().unwrap(), Tid(1));
    }
}
