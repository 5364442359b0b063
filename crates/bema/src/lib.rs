//! # Bema
//!
//! **Interceptor-chain execution engine for the Themis Platform**
//!
//! Bema is the staged-processing primitive HTTP servers, RPC handlers,
//! and other pipeline systems build on top of:
//!
//! - **Interceptors** – immutable bundles of optional `enter`, `leave`,
//!   `error`, and async-`enter` stages
//! - **One context per run** – a typed key/value state threaded in place
//!   through every stage
//! - **Enter/Leave/Error traversal** – enters in queue order, unwinding
//!   in reverse-of-entry order, with a dedicated error-recovery pass
//! - **Terminators** – context predicates that end the descent early
//! - **Suspension** – an `enter` stage may go asynchronous; the run
//!   suspends and resumes in place, optionally on a designated executor
//!
//! ## Quick Start
//!
//! ```rust
//! use bema::prelude::*;
//! use std::sync::Arc;
//!
//! let handler = Arc::new(
//!     Interceptor::builder("handler")
//!         .enter(|ctx| {
//!             ctx.insert("response", "hello world".to_string());
//!             Ok(())
//!         })
//!         .build(),
//! );
//!
//! let ctx = Context::new()
//!     .with_interceptors([handler])
//!     .with_terminator(Terminator::payload_has("response"));
//!
//! let ctx = bema::chain::execute(ctx).expect("error stages never fault here");
//! assert_eq!(
//!     ctx.get::<String>("response").map(String::as_str),
//!     Some("hello world"),
//! );
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Enter:  queue ──▶ i1 ──▶ i2 ──▶ i3 ──▶ ... (sentinel/terminator/fault?)
//!                                                        │
//! Leave/Error:  ... ◀── i3 ◀── i2 ◀── i1 ◀── stack ◀─────┘
//! ```

#![doc(html_root_url = "https://docs.rs/bema/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use bema_core as core;

// Re-export the engines
pub use bema_chain::{aio, chain};

// Re-export the service lifecycle wrapper
pub use bema_service as service;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use bema::prelude::*;
/// ```
pub mod prelude {
    pub use bema_core::{Context, Fault, Interceptor, Queue, Terminator};

    pub use bema_chain::{ChainError, ChainResult, Phase};

    pub use bema_service::Service;
}
