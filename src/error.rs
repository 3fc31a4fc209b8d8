use thiserror::Error;

/// Errors the pool and its collaborators can surface to a caller.
///
/// Contract violations (negative pin count, flushing `INVALID_PAGE_ID`, a
/// hash bucket overflowing past its split bound) are not represented here:
/// per the error handling design, those are caller bugs and are reported via
/// `assert!`/`panic!` at the point of violation rather than as a `Result`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The disk scheduler's background worker thread is gone. This can only
    /// happen if the worker panicked; it is a bug, not a condition a caller
    /// can meaningfully recover from, but we still hand back an `Error`
    /// rather than panicking the calling thread too.
    #[error("disk scheduler worker thread is no longer running")]
    SchedulerShutdown,
}

pub type Result<T> = std::result::Result<T, Error>;
