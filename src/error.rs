//! Error types for the thread library's public API.

use thiserror::Error;

use crate::thread::Tid;

/// Result type for all fallible `vthreads` operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors reported by the thread library's public entry points.
///
/// Every variant here corresponds to a documented failure mode of the
/// scheduler engine. Internal consistency violations (a thread found with a
/// negative sleep count, a corrupted registry) are not represented here —
/// they are fatal and panic the process, per the library's error handling
/// design.
#[derive(Error, Debug)]
pub enum Error {
    /// `init` was called with a non-positive quantum length.
    #[error("quantum length must be positive")]
    BadQuantum,

    /// `spawn` was attempted once the identifier pool was exhausted.
    #[error("out of thread ids: at most {0} threads may exist concurrently")]
    OutOfIds(usize),

    /// An operation referenced a tid that is not currently live.
    #[error("no such thread: {0}")]
    NoSuchThread(Tid),

    /// `block` was called on the main thread (tid 0).
    #[error("the main thread cannot be blocked")]
    BlockMain,

    /// `sleep` was called with a non-positive quantum count, or from the
    /// main thread.
    #[error("sleep count must be positive and the caller must not be the main thread")]
    BadSleepCount,

    /// A required system call (signal disposition, timer arm, or the
    /// underlying context primitive) failed.
    #[error("system error: {0}")]
    System(String),
}
