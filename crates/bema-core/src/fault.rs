//! The captured-failure payload stored in the context's error slot.
//!
//! A [`Fault`] is how a failed stage is represented as data. Whether a
//! stage failed by returning `Err` or by writing the slot itself, the
//! engines see exactly the same thing: a non-empty error slot. The slot is
//! the single source of truth for "an error is in flight"; it is checked,
//! never inferred.

use thiserror::Error;

/// A failure captured from a stage function.
///
/// Stage functions fail by returning `Err(Fault)`; the engine converts
/// that into the context's error slot at the enter/leave boundary, exactly
/// as if the stage had written the slot itself. An `error` capability
/// clears the slot (via [`Context::take_error`]) once it has handled the
/// fault.
///
/// [`Context::take_error`]: crate::context::Context::take_error
///
/// # Example
///
/// ```
/// use bema_core::Fault;
///
/// let fault = Fault::new("upstream unavailable");
/// assert_eq!(fault.message(), "upstream unavailable");
/// assert!(fault.stage().is_none());
/// ```
#[derive(Debug, Error)]
#[error("{message}")]
pub struct Fault {
    /// Human-readable failure message.
    message: String,

    /// The underlying error, when the fault wraps one.
    #[source]
    source: Option<anyhow::Error>,

    /// The name of the stage the engine captured this fault from.
    stage: Option<&'static str>,
}

impl Fault {
    /// Creates a fault with a message and no underlying error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
            stage: None,
        }
    }

    /// Creates a fault wrapping an underlying error.
    #[must_use]
    pub fn from_error(source: impl Into<anyhow::Error>) -> Self {
        let source = source.into();
        Self {
            message: source.to_string(),
            source: Some(source),
            stage: None,
        }
    }

    /// Records the name of the stage this fault was captured from.
    ///
    /// Set by the engine when it converts a stage's `Err` into the error
    /// slot; a fault written into the slot directly carries no stage name.
    #[must_use]
    pub fn with_stage(mut self, stage: &'static str) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Returns the failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the name of the faulting stage, when the engine recorded it.
    #[must_use]
    pub fn stage(&self) -> Option<&'static str> {
        self.stage
    }
}

impl From<anyhow::Error> for Fault {
    fn from(source: anyhow::Error) -> Self {
        Self::from_error(source)
    }
}
