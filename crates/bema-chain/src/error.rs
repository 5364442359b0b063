//! Engine error types.
//!
//! Almost every failure in a chain run is data, not an error: faults from
//! `enter` and `leave` stages land in the context's error slot and the
//! run still returns a context. [`ChainError`] covers the two cases that
//! escape the run instead.

use bema_core::Fault;
use thiserror::Error;

/// Result type alias for chain runs.
pub type ChainResult = Result<bema_core::Context, ChainError>;

/// A failure that escapes a chain run instead of landing in the error
/// slot.
///
/// A run that merely left a fault unrecovered is NOT a `ChainError`: it
/// returns `Ok(context)` with the fault inspectable via
/// [`Context::error`].
///
/// [`Context::error`]: bema_core::Context::error
#[derive(Error, Debug)]
pub enum ChainError {
    /// A fault raised from inside an `error` capability.
    ///
    /// Faults from `enter` and `leave` are captured into the error slot;
    /// faults from `error` itself are not: they abort the run and the
    /// context is lost with it.
    #[error("error stage '{stage}' faulted")]
    ErrorStageFailed {
        /// The interceptor whose `error` capability faulted.
        stage: &'static str,
        /// The fault it raised.
        #[source]
        fault: Fault,
    },

    /// The designated executor failed to complete a resumed run.
    #[error("suspended run could not be resumed")]
    Resume(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_stage_failed_display() {
        let err = ChainError::ErrorStageFailed {
            stage: "recover",
            fault: Fault::new("double fault"),
        };
        assert!(err.to_string().contains("recover"));

        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("double fault"));
    }
}
