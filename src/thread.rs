/*
 * Thread Record
 *
 * This module defines the Thread record and related types used throughout
 * the scheduler. A record tracks a thread's identity, scheduling state,
 * quantum accounting, sleep countdown, and its owned context/stack.
 */

use core::fmt;

use crate::context::Context;

/// Per-thread stack size, in bytes.
pub const STACK_SIZE: usize = 4096;

/// Thread identifier, an integer in `[0, MAX_THREADS)`. `0` is reserved for
/// the main thread, created implicitly at `init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tid(pub usize);

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Tid {
    /// The implicit main thread, always present once the scheduler is
    /// initialized.
    pub const MAIN: Tid = Tid(0);

    pub fn is_main(self) -> bool {
        self == Tid::MAIN
    }
}

/// Scheduling state of a thread record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Ready,
    Running,
    Blocked,
}

/// A live thread: identity, scheduling state, accounting, and owned
/// context/stack.
///
/// `entry_point` is `None` for the main thread, which runs on the host
/// process's original stack rather than a bootstrapped one.
pub struct ThreadRecord {
    pub tid: Tid,
    pub state: ThreadState,
    pub entry_point: Option<fn()>,
    pub context: Context,

    /// Count of quanta this thread has been selected as RUNNING, inclusive
    /// of its current quantum if it is presently running.
    pub quantums_run: u64,

    /// Non-negative count of quanta remaining before a sleep expires; `0`
    /// means not sleeping.
    pub sleep_remaining: u32,

    /// `true` iff a `block` operation targeted this thread. Distinct from
    /// being asleep: a thread can be explicitly blocked, asleep, or both.
    pub explicitly_blocked: bool,
}

impl ThreadRecord {
    /// Build the implicit main thread record, `RUNNING` with one quantum
    /// already granted.
    pub fn main() -> Self {
        Self {
            tid: Tid::MAIN,
            state: ThreadState::Running,
            entry_point: None,
            context: Context::for_caller(),
            quantums_run: 1,
            sleep_remaining: 0,
            explicitly_blocked: false,
        }
    }

    /// Build a spawned thread record: `READY`, with a fresh stack and a
    /// context bootstrapped to start at `entry` on first dispatch.
    pub fn spawned(tid: Tid, entry: fn()) -> Self {
        Self {
            tid,
            state: ThreadState::Ready,
            entry_point: Some(entry),
            context: Context::bootstrapped(tid),
            quantums_run: 0,
            sleep_remaining: 0,
            explicitly_blocked: false,
        }
    }

    /// A record is unready — belongs in the blocked bookkeeping set — iff
    /// it is explicitly blocked or sleeping. See invariant 3 in the data
    /// model.
    pub fn is_unready(&self) -> bool {
        self.explicitly_blocked || self.is_sleeping()
    }

    pub fn is_sleeping(&self) -> bool {
        self.sleep_remaining > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_thread_starts_running_with_one_quantum() {
        let main = ThreadRecord::main();
        assert_eq!(main.tid, Tid::MAIN);
        assert_eq!(main.state, ThreadState::Running);
        assert_eq!(main.quantums_run, 1);
        assert!(!main.is_unready());
    }

    #[test]
    fn spawned_thread_starts_ready_with_no_quanta() {
        let t = ThreadRecord::spawned(Tid(1), || {});
        assert_eq!(t.state, ThreadState::Ready);
        assert_eq!(t.quantums_run, 0);
        assert!(!t.is_unready());
    }

    #[test]
    fn unready_iff_explicitly_blocked_or_sleeping() {
        let mut t = ThreadRecord::spawned(Tid(1), || {});
        assert!(!t.is_unready());
        t.explicitly_blocked = true;
        assert!(t.is_unready());
        t.explicitly_blocked = false;
        t.sleep_remaining = 3;
        assert!(t.is_unready());
        assert!(t.is_sleeping());
    }
}

impl fmt::Debug for ThreadRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadRecord")
            .field("tid", &self.tid)
            .field("state", &self.state)
            .field("quantums_run", &self.quantums_run)
            .field("sleep_remaining", &self.sleep_remaining)
            .field("explicitly_blocked", &self.explicitly_blocked)
            .finish()
    }
}
