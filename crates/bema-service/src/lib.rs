//! # Bema Service
//!
//! The thin service-lifecycle collaborator for the Bema framework.
//!
//! A transport wrapper (an HTTP listener, a queue consumer, ...) is a
//! *service*: something that can be started with a context and stopped
//! with a context. This crate does not bind any transport; it only
//! defines the [`Service`] trait and the service-map convention. The
//! start/stop hooks live in the context payload under reserved keys, and
//! the free [`start`]/[`stop`] functions invoke whichever hook is present
//! and are the identity otherwise.
//!
//! How a running service uses the chain engines is up to it: typically it
//! builds one context per inbound unit of work, installs queue and
//! terminators, calls `bema_chain::execute`, and interprets the terminal
//! context's payload as its response.
//!
//! # Example
//!
//! ```
//! use bema_core::Context;
//! use bema_service::{install, start, stop, Service};
//! use std::sync::Arc;
//!
//! struct Echo;
//!
//! impl Service for Echo {
//!     fn start_with(&self, mut ctx: Context) -> Context {
//!         ctx.insert("listening", true);
//!         ctx
//!     }
//!
//!     fn stop_with(&self, mut ctx: Context) -> Context {
//!         ctx.insert("listening", false);
//!         ctx
//!     }
//! }
//!
//! let ctx = install(Arc::new(Echo), Context::new());
//! let ctx = start(ctx);
//! assert_eq!(ctx.get::<bool>("listening"), Some(&true));
//! let ctx = stop(ctx);
//! assert_eq!(ctx.get::<bool>("listening"), Some(&false));
//! ```

#![doc(html_root_url = "https://docs.rs/bema-service/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use bema_core::Context;
use std::sync::Arc;

/// Payload key holding the installed service itself.
pub const SERVICE_KEY: &str = "bema.service";

/// Payload key holding the start hook.
pub const START_FN_KEY: &str = "bema.service.start";

/// Payload key holding the stop hook.
pub const STOP_FN_KEY: &str = "bema.service.stop";

/// A lifecycle hook stored in the context payload.
pub type ServiceFn = Arc<dyn Fn(Context) -> Context + Send + Sync>;

/// Something that can be started and stopped with a context.
///
/// Implementations own their transport; the context is their
/// configuration in and their state out.
pub trait Service: Send + Sync + 'static {
    /// Starts the service, returning the (possibly enriched) context.
    fn start_with(&self, context: Context) -> Context;

    /// Stops the service, returning the (possibly enriched) context.
    fn stop_with(&self, context: Context) -> Context;
}

/// Installs a service into the context: the service itself plus its
/// start/stop hooks, under the reserved payload keys.
#[must_use]
pub fn install(service: Arc<dyn Service>, mut context: Context) -> Context {
    let starter = Arc::clone(&service);
    let stopper = Arc::clone(&service);
    let start_fn: ServiceFn = Arc::new(move |ctx| starter.start_with(ctx));
    let stop_fn: ServiceFn = Arc::new(move |ctx| stopper.stop_with(ctx));

    context.insert(SERVICE_KEY, service);
    context.insert(START_FN_KEY, start_fn);
    context.insert(STOP_FN_KEY, stop_fn);
    context
}

/// Invokes the installed start hook; identity when none is installed.
#[must_use]
pub fn start(context: Context) -> Context {
    run_hook(context, START_FN_KEY)
}

/// Invokes the installed stop hook; identity when none is installed.
#[must_use]
pub fn stop(context: Context) -> Context {
    run_hook(context, STOP_FN_KEY)
}

fn run_hook(context: Context, key: &'static str) -> Context {
    let hook = context.get::<ServiceFn>(key).cloned();
    match hook {
        Some(hook) => {
            tracing::debug!(hook = key, "running service hook");
            hook(context)
        }
        None => context,
    }
}
