//! The interceptor stage bundle.
//!
//! An [`Interceptor`] is an immutable value with up to four independently
//! optional capabilities: `enter`, `leave`, `error`, and an asynchronous
//! variant of `enter`. Side effects on the [`Context`] are a stage's only
//! communication channel, and a missing capability is the identity on the
//! context (a documented no-op, not an error). An interceptor with no
//! capabilities at all is a legal no-op stage.
//!
//! Interceptors are stateless and shared as `Arc`; one instance may be
//! reused across unrelated chain runs, including concurrently.
//!
//! # Example
//!
//! ```
//! use bema_core::{Context, Interceptor};
//!
//! let auth = Interceptor::builder("auth")
//!     .enter(|ctx| {
//!         ctx.insert("caller", "anonymous".to_string());
//!         Ok(())
//!     })
//!     .leave(|ctx| {
//!         let _ = ctx.remove::<String>("caller");
//!         Ok(())
//!     })
//!     .build();
//!
//! assert_eq!(auth.name(), "auth");
//! assert!(!auth.has_async_enter());
//! ```

use crate::context::Context;
use crate::fault::Fault;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed future, as returned by asynchronous enter stages.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A synchronous stage function.
///
/// Stages mutate the context in place; a returned `Err` is captured by the
/// engine into the context's error slot (for `enter` and `leave`) or
/// propagated out of the run (for `error`; see the engine docs).
pub type StageFn = Arc<dyn Fn(&mut Context) -> Result<(), Fault> + Send + Sync>;

/// An asynchronous enter stage function.
///
/// Returning a pending future is how a stage signals "I am going
/// asynchronous"; the engine suspends the chain run until it settles.
pub type AsyncStageFn =
    Arc<dyn for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result<(), Fault>> + Send + Sync>;

/// The enter capability, tagged by whether it suspends.
///
/// The tag is decided at construction; the engines never inspect a stage
/// at runtime to discover whether it is asynchronous.
pub enum Enter {
    /// A blocking enter stage; runs to completion inline.
    Sync(StageFn),
    /// A suspending enter stage; only dispatched by the asynchronous
    /// engine.
    Async(AsyncStageFn),
}

/// An immutable bundle of optional stage functions.
///
/// Construction (via [`Interceptor::builder`]) is total: no capability is
/// required, and nothing validates that at least one is present.
pub struct Interceptor {
    /// Stage name, used for logging and fault attribution.
    name: &'static str,
    enter: Option<Enter>,
    leave: Option<StageFn>,
    error: Option<StageFn>,
}

impl Interceptor {
    /// Creates a builder for an interceptor with the given name.
    ///
    /// The name is used for logging, diagnostics, and fault attribution.
    #[must_use]
    pub fn builder(name: &'static str) -> InterceptorBuilder {
        InterceptorBuilder {
            name,
            enter: None,
            leave: None,
            error: None,
        }
    }

    /// Returns the interceptor's name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` if this interceptor's enter capability suspends.
    #[must_use]
    pub fn has_async_enter(&self) -> bool {
        matches!(self.enter, Some(Enter::Async(_)))
    }

    /// Returns the asynchronous enter stage, when present.
    #[must_use]
    pub fn async_enter(&self) -> Option<&AsyncStageFn> {
        match &self.enter {
            Some(Enter::Async(f)) => Some(f),
            _ => None,
        }
    }

    /// Invokes the synchronous enter capability.
    ///
    /// A missing capability is the identity on the context. An
    /// asynchronous enter capability is also the identity here: it only
    /// dispatches under the asynchronous engine.
    pub fn enter(&self, context: &mut Context) -> Result<(), Fault> {
        match &self.enter {
            Some(Enter::Sync(f)) => f(context),
            _ => Ok(()),
        }
    }

    /// Invokes the leave capability; identity when absent.
    pub fn leave(&self, context: &mut Context) -> Result<(), Fault> {
        match &self.leave {
            Some(f) => f(context),
            None => Ok(()),
        }
    }

    /// Invokes the error capability; identity when absent.
    pub fn error(&self, context: &mut Context) -> Result<(), Fault> {
        match &self.error {
            Some(f) => f(context),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("name", &self.name)
            .field("enter", &self.enter.as_ref().map(|e| match e {
                Enter::Sync(_) => "sync",
                Enter::Async(_) => "async",
            }))
            .field("leave", &self.leave.is_some())
            .field("error", &self.error.is_some())
            .finish()
    }
}

/// Builder for [`Interceptor`].
///
/// Every capability is optional; `build` never fails.
#[must_use]
pub struct InterceptorBuilder {
    name: &'static str,
    enter: Option<Enter>,
    leave: Option<StageFn>,
    error: Option<StageFn>,
}

impl InterceptorBuilder {
    /// Sets a synchronous enter stage, replacing any enter capability
    /// set before.
    pub fn enter<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Context) -> Result<(), Fault> + Send + Sync + 'static,
    {
        self.enter = Some(Enter::Sync(Arc::new(f)));
        self
    }

    /// Sets an asynchronous enter stage, replacing any enter capability
    /// set before.
    ///
    /// # Example
    ///
    /// ```
    /// use bema_core::Interceptor;
    ///
    /// let lookup = Interceptor::builder("lookup")
    ///     .enter_async(|ctx| {
    ///         Box::pin(async move {
    ///             ctx.insert("record", 42_u64);
    ///             Ok(())
    ///         })
    ///     })
    ///     .build();
    ///
    /// assert!(lookup.has_async_enter());
    /// ```
    pub fn enter_async<F>(mut self, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result<(), Fault>>
            + Send
            + Sync
            + 'static,
    {
        self.enter = Some(Enter::Async(Arc::new(f)));
        self
    }

    /// Sets the leave stage.
    pub fn leave<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Context) -> Result<(), Fault> + Send + Sync + 'static,
    {
        self.leave = Some(Arc::new(f));
        self
    }

    /// Sets the error stage.
    ///
    /// An error stage is expected to clear the context's error slot (with
    /// [`Context::take_error`]) once it has handled the fault; the rest of
    /// the stack then unwinds as a Leave phase.
    ///
    /// [`Context::take_error`]: crate::context::Context::take_error
    pub fn error<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Context) -> Result<(), Fault> + Send + Sync + 'static,
    {
        self.error = Some(Arc::new(f));
        self
    }

    /// Builds the interceptor.
    #[must_use]
    pub fn build(self) -> Interceptor {
        Interceptor {
            name: self.name,
            enter: self.enter,
            leave: self.leave,
            error: self.error,
        }
    }
}
