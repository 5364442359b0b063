//! Early-exit predicates over the context.
//!
//! Terminators are evaluated in order after each successful enter; the
//! first one that matches ends the Enter phase and starts unwinding the
//! entered stack. They are the engine's "the response is ready, stop
//! descending" mechanism.

use crate::context::Context;
use std::fmt;
use std::sync::Arc;

/// A predicate over the context that can force early unwinding.
///
/// Terminators are checked immediately after each successful
/// (non-faulting) enter and before the next queue entry is taken. The
/// first match (in set order) clears the queue slot and transitions the
/// run to the Leave phase; later predicates are not consulted.
///
/// # Example
///
/// ```
/// use bema_core::{Context, Terminator};
///
/// let mut ctx = Context::new();
/// let done = Terminator::payload_has("response");
///
/// assert!(!done.matches(&ctx));
/// ctx.insert("response", "ok".to_string());
/// assert!(done.matches(&ctx));
/// ```
#[derive(Clone)]
pub struct Terminator {
    /// Name used in logging when the terminator matches.
    name: &'static str,
    predicate: Arc<dyn Fn(&Context) -> bool + Send + Sync>,
}

impl Terminator {
    /// Creates an unnamed terminator from a predicate.
    #[must_use]
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        Self::named("terminator", predicate)
    }

    /// Creates a named terminator from a predicate.
    #[must_use]
    pub fn named<F>(name: &'static str, predicate: F) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        Self {
            name,
            predicate: Arc::new(predicate),
        }
    }

    /// A terminator matching once the payload contains `key`.
    #[must_use]
    pub fn payload_has(key: &'static str) -> Self {
        Self::named(key, move |ctx| ctx.contains(key))
    }

    /// Returns the terminator's name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Evaluates the predicate against the context.
    #[must_use]
    pub fn matches(&self, context: &Context) -> bool {
        (self.predicate)(context)
    }
}

impl fmt::Debug for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Terminator").field("name", &self.name).finish()
    }
}
