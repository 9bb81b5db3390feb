/*
 * Scheduler Engine
 *
 * The timer-driven preemption loop, the ready/blocked/sleeping state
 * machine's mutators, and the voluntary block/resume/sleep/terminate
 * operations. This module is the only place that touches the global
 * scheduler singleton; every other module operates on values it is handed.
 *
 * All scheduler state lives behind SCHEDULER, a spin::Mutex rather than a
 * std::sync::Mutex: std's Mutex may call into libc (futex syscalls) on
 * contention, which is not reliably safe to do from inside a signal
 * handler. spin::Mutex only ever busy-waits on an atomic, which is. There
 * is never real contention here anyway — exactly one control flow executes
 * at a time — but the handler and ordinary calls must still use a lock
 * that is sound to take from a signal context.
 */

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::platform;
use crate::registry::Registry;
use crate::id_pool::IdPool;
use crate::thread::{Tid, ThreadRecord, ThreadState};

/// Configuration passed to [`init`]. The only tunable the library exposes,
/// matching the single input the scheduler's external interface names.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub quantum_usecs: u64,
    max_threads: usize,
}

impl Config {
    /// Build a configuration with the default thread capacity, validating
    /// the quantum length eagerly.
    pub fn new(quantum_usecs: u64) -> Result<Self> {
        if quantum_usecs == 0 {
            return Err(Error::BadQuantum);
        }
        Ok(Self {
            quantum_usecs,
            max_threads: crate::MAX_THREADS,
        })
    }

    /// Override the compile-time thread capacity. Mostly useful for tests
    /// that want to exercise `OutOfIds` without spawning 63 threads.
    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }
}

static SCHEDULER: spin::Mutex<Option<Scheduler>> = spin::Mutex::new(None);
static CURRENT_TID: AtomicUsize = AtomicUsize::new(0);
static TOTAL_QUANTUMS: AtomicU64 = AtomicU64::new(0);

struct Scheduler {
    registry: Registry,
    ids: IdPool,
    quantum_usecs: u64,
    /// Contexts (and their stacks) of self-terminated threads, kept alive
    /// until it is safe to drop them — i.e. until we are certainly
    /// executing on some other thread's stack.
    zombies: Vec<Context>,
}

impl Scheduler {
    fn reap_zombies(&mut self) {
        self.zombies.clear();
    }

    /// Check invariants 2 and 3 from the data model (ready-queue membership
    /// equals `state == READY`; blocked/sleeping bookkeeping matches
    /// explicit-block/sleep status). A no-op in release builds.
    fn debug_check_invariants(&self) {
        debug_assert!(
            self.registry.ready_queue_matches_state(),
            "thread library error: ready queue out of sync with thread states"
        );
        debug_assert!(
            self.registry.blocked_bookkeeping_matches_state(),
            "thread library error: blocked/sleeping bookkeeping out of sync with thread states"
        );
    }

    /// Decrement every sleeping thread's countdown by one quantum,
    /// promoting any that reach zero back to `READY` unless an explicit
    /// block still holds them. Runs once per quantum, before any switch.
    fn advance_sleepers(&mut self) {
        for tid in self.registry.sleeping_tids() {
            let reached_zero = {
                let record = self
                    .registry
                    .get_mut(tid)
                    .expect("thread library error: sleeping tid vanished from registry");
                debug_assert!(record.sleep_remaining > 0);
                record.sleep_remaining -= 1;
                record.sleep_remaining == 0
            };
            if reached_zero {
                self.registry.unmark_sleeping(tid);
                let explicitly_blocked = self.registry.get(tid).unwrap().explicitly_blocked;
                if !explicitly_blocked {
                    self.registry.unmark_blocked(tid);
                    let record = self.registry.get_mut(tid).unwrap();
                    record.state = ThreadState::Ready;
                    self.registry.push_ready(tid);
                }
            }
        }
    }

    /// Pop the ready queue's head, making it RUNNING and charging it a
    /// quantum. Updates the global accounting atomics to match.
    fn dispatch_next(&mut self) -> Tid {
        let next = self
            .registry
            .pop_ready()
            .expect("thread library error: scheduler invoked with an empty ready queue");
        {
            let record = self.registry.get_mut(next).unwrap();
            record.state = ThreadState::Running;
            record.quantums_run += 1;
        }
        self.registry.set_current(Some(next));
        TOTAL_QUANTUMS.fetch_add(1, Ordering::SeqCst);
        CURRENT_TID.store(next.0, Ordering::SeqCst);
        self.arm_pending_entry(next);
        next
    }

    /// Stage `tid`'s entry point for the trampoline if this is its first
    /// ever dispatch. Must run every time a thread is switched into, not
    /// just at spawn time: staging at spawn would have a second spawn's
    /// entry clobber the first spawned thread's before it ever got to run.
    fn arm_pending_entry(&self, tid: Tid) {
        let record = self.registry.get(tid).unwrap();
        if record.quantums_run == 1 {
            if let Some(entry) = record.entry_point {
                Context::arm_entry(tid, entry);
            }
        }
    }
}

/// Initialize the scheduler: create the main thread (tid 0, `RUNNING`,
/// already credited with one quantum), install the `SIGVTALRM` handler,
/// and arm the periodic interval timer.
pub fn init(config: Config) -> Result<()> {
    let mut registry = Registry::new();
    registry.insert_running(ThreadRecord::main());
    TOTAL_QUANTUMS.store(1, Ordering::SeqCst);
    CURRENT_TID.store(0, Ordering::SeqCst);

    let scheduler = Scheduler {
        registry,
        ids: IdPool::new(config.max_threads),
        quantum_usecs: config.quantum_usecs,
        zombies: Vec::new(),
    };
    *SCHEDULER.lock() = Some(scheduler);

    platform::install_handler(on_quantum_signal).map_err(report_system)?;
    platform::arm_timer(config.quantum_usecs).map_err(report_system)?;

    log::info!("vthreads: scheduler initialized with a {}us quantum", config.quantum_usecs);
    Ok(())
}

/// Create a new thread running `entry`, `READY` and at the tail of the
/// ready queue.
pub fn spawn(entry: fn()) -> Result<Tid> {
    platform::block_signal();
    let result = (|| {
        let mut guard = SCHEDULER.lock();
        let sched = guard.as_mut().expect("vthreads: not initialized");
        let tid = sched.ids.acquire().map_err(report_lib)?;
        sched.registry.insert_ready(ThreadRecord::spawned(tid, entry));
        log::debug!("vthreads: spawned tid {}", tid);
        sched.debug_check_invariants();
        Ok(tid)
    })();
    platform::unblock_signal();
    result
}

/// Terminate `tid`. Terminating tid 0 exits the hosting process.
/// Terminating the current thread transfers control to the next ready
/// thread and never returns to the caller.
pub fn terminate(tid: Tid) -> Result<()> {
    platform::block_signal();

    if tid.is_main() {
        log::info!("vthreads: main thread terminated, exiting process");
        std::process::exit(0);
    }

    let is_current = {
        let mut guard = SCHEDULER.lock();
        let sched = guard.as_mut().expect("vthreads: not initialized");
        if !sched.registry.contains(tid) {
            drop(guard);
            platform::unblock_signal();
            return Err(report_lib(Error::NoSuchThread(tid)));
        }
        sched.registry.current() == Some(tid)
    };

    if is_current {
        terminate_self(tid);
        unreachable!("thread library error: terminate_self returned");
    }

    {
        let mut guard = SCHEDULER.lock();
        let sched = guard.as_mut().expect("vthreads: not initialized");
        sched.registry.destroy(tid);
        sched.ids.release(tid);
        log::debug!("vthreads: terminated tid {}", tid);
        sched.debug_check_invariants();
    }
    platform::unblock_signal();
    Ok(())
}

/// Terminate the running thread: destroy its record immediately (freeing
/// its id for reuse right away, matching the spec's "released during the
/// switch"), stash its context+stack in the zombie list so the memory we
/// are currently executing on stays valid until reaped, then jump to the
/// next ready thread without ever returning here.
fn terminate_self(tid: Tid) -> ! {
    let incoming_ctx: *const Context;
    {
        let mut guard = SCHEDULER.lock();
        let sched = guard.as_mut().expect("vthreads: not initialized");
        sched.reap_zombies();
        let next = sched.dispatch_next();
        sched.advance_sleepers();
        let record = sched
            .registry
            .destroy(tid)
            .expect("thread library error: current thread missing from registry");
        sched.ids.release(tid);
        sched.zombies.push(record.context);
        incoming_ctx = &sched.registry.get(next).unwrap().context as *const Context;
        sched.debug_check_invariants();
    }
    platform::unblock_signal();
    unsafe {
        Context::jump_into(&*incoming_ctx);
    }
    unreachable!("thread library error: jumped past thread termination");
}

/// Block `tid`. Blocking the current thread suspends it until a matching
/// [`resume`]; blocking `READY`/`BLOCKED` threads is a synchronous
/// registry update.
pub fn block(tid: Tid) -> Result<()> {
    platform::block_signal();

    if tid.is_main() {
        platform::unblock_signal();
        return Err(report_lib(Error::BlockMain));
    }

    let is_current = {
        let mut guard = SCHEDULER.lock();
        let sched = guard.as_mut().expect("vthreads: not initialized");
        if !sched.registry.contains(tid) {
            drop(guard);
            platform::unblock_signal();
            return Err(report_lib(Error::NoSuchThread(tid)));
        }
        sched.registry.current() == Some(tid)
    };

    if is_current {
        block_self(tid);
        platform::unblock_signal();
        return Ok(());
    }

    {
        let mut guard = SCHEDULER.lock();
        let sched = guard.as_mut().expect("vthreads: not initialized");
        let record = sched.registry.get_mut(tid).unwrap();
        if record.state == ThreadState::Ready {
            record.state = ThreadState::Blocked;
            sched.registry.remove_from_ready(tid);
        }
        // Idempotent either way: READY or already-BLOCKED both end up
        // explicitly blocked.
        let record = sched.registry.get_mut(tid).unwrap();
        record.explicitly_blocked = true;
        sched.registry.mark_blocked(tid);
        log::debug!("vthreads: blocked tid {}", tid);
        sched.debug_check_invariants();
    }
    platform::unblock_signal();
    Ok(())
}

/// Mark the running thread explicitly blocked and switch away. Unlike
/// [`terminate_self`], the thread's record and context survive for a
/// future [`resume`].
fn block_self(tid: Tid) {
    let outgoing_ctx: *mut Context;
    let incoming_ctx: *const Context;
    {
        let mut guard = SCHEDULER.lock();
        let sched = guard.as_mut().expect("vthreads: not initialized");
        sched.reap_zombies();
        {
            let record = sched.registry.get_mut(tid).unwrap();
            record.state = ThreadState::Blocked;
            record.explicitly_blocked = true;
        }
        sched.registry.mark_blocked(tid);
        let next = sched.dispatch_next();
        sched.advance_sleepers();
        outgoing_ctx = &mut sched.registry.get_mut(tid).unwrap().context as *mut Context;
        incoming_ctx = &sched.registry.get(next).unwrap().context as *const Context;
        sched.debug_check_invariants();
    }
    unsafe {
        Context::switch(&mut *outgoing_ctx, &*incoming_ctx);
    }
    // Resumed later, exactly as if this call had just returned.
}

/// Resume `tid`. A sleeping thread only has its explicit-block flag
/// cleared — it still must finish sleeping before it runs again.
pub fn resume(tid: Tid) -> Result<()> {
    platform::block_signal();
    let result = (|| {
        let mut guard = SCHEDULER.lock();
        let sched = guard.as_mut().expect("vthreads: not initialized");
        if !sched.registry.contains(tid) {
            return Err(Error::NoSuchThread(tid));
        }
        let (state, sleeping) = {
            let record = sched.registry.get(tid).unwrap();
            (record.state, record.is_sleeping())
        };
        if sleeping {
            sched.registry.get_mut(tid).unwrap().explicitly_blocked = false;
        } else if state == ThreadState::Blocked {
            let record = sched.registry.get_mut(tid).unwrap();
            record.explicitly_blocked = false;
            record.state = ThreadState::Ready;
            sched.registry.unmark_blocked(tid);
            sched.registry.push_ready(tid);
        }
        log::debug!("vthreads: resumed tid {}", tid);
        sched.debug_check_invariants();
        Ok(())
    })();
    platform::unblock_signal();
    result
}

/// Put the running thread to sleep for `quanta` scheduling quanta. Only
/// callable by a non-main thread about itself.
pub fn sleep(quanta: u32) -> Result<()> {
    if quanta == 0 || CURRENT_TID.load(Ordering::SeqCst) == 0 {
        return Err(report_lib(Error::BadSleepCount));
    }

    platform::block_signal();
    let tid = Tid(CURRENT_TID.load(Ordering::SeqCst));
    let outgoing_ctx: *mut Context;
    let incoming_ctx: *const Context;
    {
        let mut guard = SCHEDULER.lock();
        let sched = guard.as_mut().expect("vthreads: not initialized");
        sched.reap_zombies();
        {
            let record = sched.registry.get_mut(tid).unwrap();
            record.state = ThreadState::Blocked;
            record.sleep_remaining = quanta;
        }
        sched.registry.mark_blocked(tid);
        let next = sched.dispatch_next();
        // advance_sleepers() must run before this thread joins the
        // sleeping set: no quantum has elapsed for it yet at the moment it
        // goes to sleep, so its own countdown must not be decremented as
        // part of this very call.
        sched.advance_sleepers();
        sched.registry.mark_sleeping(tid);
        outgoing_ctx = &mut sched.registry.get_mut(tid).unwrap().context as *mut Context;
        incoming_ctx = &sched.registry.get(next).unwrap().context as *const Context;
        sched.debug_check_invariants();
    }
    unsafe {
        Context::switch(&mut *outgoing_ctx, &*incoming_ctx);
    }
    platform::unblock_signal();
    Ok(())
}

/// The currently running thread's id.
pub fn current_tid() -> Tid {
    Tid(CURRENT_TID.load(Ordering::SeqCst))
}

/// Total quanta elapsed since `init`.
pub fn total_quantums() -> u64 {
    TOTAL_QUANTUMS.load(Ordering::SeqCst)
}

/// Quanta `tid` has been selected as RUNNING, inclusive of its current
/// quantum if it is presently running.
///
/// The spec treats this as a trivial accessor needing no signal masking,
/// but `SCHEDULER` is a `spin::Mutex`: it only ever busy-waits, so if
/// `SIGVTALRM` fired while this thread held it, the handler's own attempt
/// to lock the same mutex would spin forever on the very thread that is
/// holding it. The lookup itself is O(1) and never blocks, so masking
/// around it costs nothing in practice while closing that hazard.
pub fn quantums_of(tid: Tid) -> Result<u64> {
    platform::block_signal();
    let guard = SCHEDULER.lock();
    let sched = guard.as_ref().expect("vthreads: not initialized");
    let result = sched
        .registry
        .get(tid)
        .map(|r| r.quantums_run)
        .ok_or(Error::NoSuchThread(tid));
    drop(guard);
    platform::unblock_signal();
    result
}

/// The `SIGVTALRM` handler: the timer-driven preemption path described in
/// the scheduler engine's design. Runs with `SIGVTALRM` auto-masked by
/// `sa_mask`; blocks and unblocks it explicitly too, belt-and-braces
/// against a future handler installed without that mask.
extern "C" fn on_quantum_signal(_sig: libc::c_int) {
    platform::block_signal();

    let mut switched = false;
    let outgoing_ctx: *mut Context;
    let incoming_ctx: *const Context;
    let quantum_usecs;
    {
        let mut guard = SCHEDULER.lock();
        let sched = guard.as_mut().expect("vthreads: not initialized");
        sched.reap_zombies();
        quantum_usecs = sched.quantum_usecs;
        let current = sched
            .registry
            .current()
            .expect("thread library error: timer fired with no running thread");

        if sched.registry.ready_len() > 0 {
            {
                let record = sched.registry.get_mut(current).unwrap();
                record.state = ThreadState::Ready;
            }
            sched.registry.push_ready(current);
            let next = sched.dispatch_next();
            sched.advance_sleepers();
            outgoing_ctx = &mut sched.registry.get_mut(current).unwrap().context as *mut Context;
            incoming_ctx = &sched.registry.get(next).unwrap().context as *const Context;
            switched = true;
        } else {
            // Nobody else to run: the current thread is granted another
            // quantum without an actual context switch.
            sched.advance_sleepers();
            {
                let record = sched.registry.get_mut(current).unwrap();
                record.quantums_run += 1;
            }
            TOTAL_QUANTUMS.fetch_add(1, Ordering::SeqCst);
            outgoing_ctx = std::ptr::null_mut();
            incoming_ctx = std::ptr::null();
        }
        sched.debug_check_invariants();
    }

    if switched {
        unsafe {
            Context::switch(&mut *outgoing_ctx, &*incoming_ctx);
        }
    }

    // Either we never switched away, or we have just been resumed — both
    // cases rearm the timer and return from the handler.
    let _ = platform::arm_timer(quantum_usecs);
    platform::unblock_signal();
}

fn report_lib(err: Error) -> Error {
    log::error!("thread library error: {err}");
    err
}

fn report_system(err: Error) -> Error {
    log::error!("{err}");
    err
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_rejects_non_positive_quantum() {
        assert!(matches!(Config::new(0), Err(Error::BadQuantum)));
        assert!(Config::new(1).is_ok());
    }
}
