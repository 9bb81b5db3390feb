/*
 * Registry
 *
 * The canonical mapping from tid to thread record, plus the auxiliary
 * structures that track which threads are ready, blocked, or sleeping.
 * `by_id` is the unique owner of every record; `ready`/`blocked`/`sleeping`
 * hold only tids, never an independent copy of the record.
 */

use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::thread::{Tid, ThreadRecord, ThreadState};

#[derive(Default)]
pub struct Registry {
    by_id: HashMap<Tid, ThreadRecord>,
    ready: VecDeque<Tid>,
    blocked: BTreeSet<Tid>,
    sleeping: BTreeSet<Tid>,
    current: Option<Tid>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, tid: Tid) -> bool {
        self.by_id.contains_key(&tid)
    }

    pub fn get(&self, tid: Tid) -> Option<&ThreadRecord> {
        self.by_id.get(&tid)
    }

    pub fn get_mut(&mut self, tid: Tid) -> Option<&mut ThreadRecord> {
        self.by_id.get_mut(&tid)
    }

    pub fn current(&self) -> Option<Tid> {
        self.current
    }

    pub fn set_current(&mut self, tid: Option<Tid>) {
        self.current = tid;
    }

    /// Insert the main thread record as the current, running thread. Does
    /// not touch the ready queue — main starts `RUNNING`, not `READY`.
    pub fn insert_running(&mut self, record: ThreadRecord) {
        let tid = record.tid;
        self.by_id.insert(tid, record);
        self.current = Some(tid);
    }

    /// Insert a freshly spawned record and admit it to the tail of the
    /// ready queue.
    pub fn insert_ready(&mut self, record: ThreadRecord) {
        let tid = record.tid;
        self.by_id.insert(tid, record);
        self.ready.push_back(tid);
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    pub fn push_ready(&mut self, tid: Tid) {
        self.ready.push_back(tid);
    }

    pub fn pop_ready(&mut self) -> Option<Tid> {
        self.ready.pop_front()
    }

    pub fn remove_from_ready(&mut self, tid: Tid) -> bool {
        if let Some(pos) = self.ready.iter().position(|&t| t == tid) {
            self.ready.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn is_ready(&self, tid: Tid) -> bool {
        self.ready.contains(&tid)
    }

    pub fn mark_blocked(&mut self, tid: Tid) {
        self.blocked.insert(tid);
    }

    pub fn unmark_blocked(&mut self, tid: Tid) {
        self.blocked.remove(&tid);
    }

    pub fn mark_sleeping(&mut self, tid: Tid) {
        self.sleeping.insert(tid);
    }

    pub fn unmark_sleeping(&mut self, tid: Tid) {
        self.sleeping.remove(&tid);
    }

    /// Sleeping tids, in ascending order — the iteration order sleep
    /// wake-ups are defined to follow.
    pub fn sleeping_tids(&self) -> Vec<Tid> {
        self.sleeping.iter().copied().collect()
    }

    /// Destroy a record entirely, removing it from every structure. Does
    /// not release its id — that is the id pool's concern, invoked by the
    /// scheduler alongside this call.
    pub fn destroy(&mut self, tid: Tid) -> Option<ThreadRecord> {
        self.remove_from_ready(tid);
        self.blocked.remove(&tid);
        self.sleeping.remove(&tid);
        if self.current == Some(tid) {
            self.current = None;
        }
        self.by_id.remove(&tid)
    }

    /// Assert invariant 2 from the data model: ready-queue membership
    /// equals `state == READY`. Used by debug assertions in the scheduler;
    /// not itself `cfg`-gated since `debug_assert!` still type-checks its
    /// argument in release builds, it just never evaluates it.
    pub fn ready_queue_matches_state(&self) -> bool {
        for tid in &self.ready {
            if self.by_id.get(tid).map(|t| t.state) != Some(ThreadState::Ready) {
                return false;
            }
        }
        self.by_id
            .values()
            .filter(|t| t.state == ThreadState::Ready)
            .all(|t| self.is_ready(t.tid))
    }

    /// Assert invariant 3 from the data model: a `BLOCKED` record appears
    /// in the blocked bookkeeping set iff it is explicitly blocked or
    /// sleeping, and in the sleeping set iff it is sleeping. Used by debug
    /// assertions in the scheduler.
    pub fn blocked_bookkeeping_matches_state(&self) -> bool {
        self.by_id.values().all(|record| {
            let in_blocked_set = self.blocked.contains(&record.tid);
            let in_sleeping_set = self.sleeping.contains(&record.tid);
            in_blocked_set == record.is_unready() && in_sleeping_set == record.is_sleeping()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_queue_is_fifo() {
        let mut reg = Registry::new();
        reg.insert_ready(ThreadRecord::spawned(Tid(1), || {}));
        reg.insert_ready(ThreadRecord::spawned(Tid(2), || {}));
        reg.insert_ready(ThreadRecord::spawned(Tid(3), || {}));
        assert_eq!(reg.pop_ready(), Some(Tid(1)));
        assert_eq!(reg.pop_ready(), Some(Tid(2)));
        assert_eq!(reg.pop_ready(), Some(Tid(3)));
        assert_eq!(reg.pop_ready(), None);
    }

    #[test]
    fn remove_from_ready_is_targeted() {
        let mut reg = Registry::new();
        reg.insert_ready(ThreadRecord::spawned(Tid(1), || {}));
        reg.insert_ready(ThreadRecord::spawned(Tid(2), || {}));
        assert!(reg.remove_from_ready(Tid(1)));
        assert!(!reg.remove_from_ready(Tid(1)));
        assert_eq!(reg.pop_ready(), Some(Tid(2)));
    }

    #[test]
    fn destroy_scrubs_every_structure() {
        let mut reg = Registry::new();
        reg.insert_ready(ThreadRecord::spawned(Tid(1), || {}));
        reg.mark_blocked(Tid(1));
        reg.mark_sleeping(Tid(1));
        reg.set_current(Some(Tid(1)));

        assert!(reg.destroy(Tid(1)).is_some());

        assert!(!reg.contains(Tid(1)));
        assert!(!reg.is_ready(Tid(1)));
        assert!(reg.sleeping_tids().is_empty());
        assert_eq!(reg.current(), None);
    }

    #[test]
    fn invariant_holds_after_ordinary_mutations() {
        let mut reg = Registry::new();
        reg.insert_running(ThreadRecord::main());
        reg.insert_ready(ThreadRecord::spawned(Tid(1), || {}));
        reg.insert_ready(ThreadRecord::spawned(Tid(2), || {}));
        assert!(reg.ready_queue_matches_state());

        let tid = reg.pop_ready().unwrap();
        reg.get_mut(tid).unwrap().state = ThreadState::Running;
        assert!(reg.ready_queue_matches_state());
    }

    #[test]
    fn blocked_bookkeeping_tracks_explicit_block_and_sleep_independently() {
        let mut reg = Registry::new();
        reg.insert_ready(ThreadRecord::spawned(Tid(1), || {}));
        assert!(reg.blocked_bookkeeping_matches_state());

        reg.get_mut(Tid(1)).unwrap().explicitly_blocked = true;
        reg.mark_blocked(Tid(1));
        assert!(reg.blocked_bookkeeping_matches_state());

        reg.get_mut(Tid(1)).unwrap().sleep_remaining = 3;
        reg.mark_sleeping(Tid(1));
        assert!(reg.blocked_bookkeeping_matches_state());

        reg.get_mut(Tid(1)).unwrap().explicitly_blocked = false;
        // Bookkeeping mirrors are maintained by the scheduler, not derived
        // automatically — simulate what a correct caller would do: the
        // blocked set still holds tid 1 because it is still sleeping.
        assert!(reg.blocked_bookkeeping_matches_state());
    }
}
