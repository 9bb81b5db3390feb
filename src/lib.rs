/*
 * vthreads
 *
 * A cooperative-by-quantum user-space thread library. Threads run until
 * either they voluntarily yield control (by blocking, sleeping, or
 * terminating) or a fixed-length quantum elapses, at which point a
 * `SIGVTALRM`-driven scheduler preempts the running thread and dispatches
 * the next one in FIFO order. There is no parallelism: exactly one thread
 * executes at any instant, and switching between them is entirely this
 * library's doing, never the OS's.
 *
 * Why this is important:
 * - Gives callers predictable, round-robin concurrency without OS thread
 *   overhead or true parallelism to reason about
 * - The whole public surface is six mutating operations (init, spawn,
 *   terminate, block, resume, sleep) plus three read-only accessors;
 *   everything else here is the machinery behind them
 *
 * Module layout:
 * - `context`   the one place that touches libc's ucontext_t directly
 * - `thread`    the per-thread record and its scheduling state
 * - `id_pool`   thread id allocation
 * - `registry`  the canonical tid -> record map plus ready/blocked/sleeping
 * - `platform`  signal handling and the interval timer
 * - `scheduler` the engine tying the above together and the public API
 * - `error`     the public error type
 */

//! A cooperative-by-quantum user-space thread library with signal-driven
//! preemption. See the crate's module documentation for the scheduler
//! engine's design; this root module re-exports the public API.

mod context;
mod error;
mod id_pool;
mod platform;
mod registry;
mod scheduler;
mod thread;

pub use error::{Error, Result};
pub use scheduler::Config;
pub use thread::{Tid, STACK_SIZE};

/// Compile-time bound on the number of threads (including the main thread)
/// that may exist concurrently. Mirrors the teacher's fixed-capacity kernel
/// thread table rather than growing the registry unboundedly.
pub const MAX_THREADS: usize = 64;

/// Initialize the thread library: install the `SIGVTALRM` handler, arm the
/// preemption timer, and register the calling control flow as the main
/// thread (tid 0). Must be called exactly once, before any other function
/// in this crate.
pub fn init(config: Config) -> Result<()> {
    scheduler::init(config)
}

/// Spawn a new thread running `entry`. The new thread starts `READY`, at
/// the tail of the ready queue; it does not run until the scheduler
/// dispatches it.
pub fn spawn(entry: fn()) -> Result<Tid> {
    scheduler::spawn(entry)
}

/// Terminate `tid`. Terminating the main thread (tid 0) exits the hosting
/// process. Terminating the calling thread itself never returns.
pub fn terminate(tid: Tid) -> Result<()> {
    scheduler::terminate(tid)
}

/// Block `tid` until a matching [`resume`]. Blocking the calling thread
/// itself suspends it and switches to another ready thread; blocking some
/// other thread is a synchronous state update. The main thread cannot be
/// blocked.
pub fn block(tid: Tid) -> Result<()> {
    scheduler::block(tid)
}

/// Clear an explicit block on `tid`. If `tid` is also asleep, it remains
/// unschedulable until the sleep expires.
pub fn resume(tid: Tid) -> Result<()> {
    scheduler::resume(tid)
}

/// Put the calling thread to sleep for `quanta` scheduling quanta. Only
/// callable by a non-main thread about itself.
pub fn sleep(quanta: u32) -> Result<()> {
    scheduler::sleep(quanta)
}

/// The id of the currently running thread.
pub fn get_tid() -> Tid {
    scheduler::current_tid()
}

/// Total quanta elapsed since [`init`].
pub fn get_total_quantums() -> u64 {
    scheduler::total_quantums()
}

/// Quanta `tid` has been selected as `RUNNING`, inclusive of its current
/// quantum if it is presently running.
pub fn get_quantums_of(tid: Tid) -> Result<u64> {
    scheduler::quantums_of(tid)
}
