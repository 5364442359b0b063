//! # Bema Core
//!
//! Core types for the Bema interceptor-chain engine.
//!
//! This crate defines the vocabulary the engines in `bema-chain` execute:
//!
//! - [`Interceptor`]: an immutable bundle of up to four optional stage
//!   functions (`enter`, `leave`, `error`, async `enter`).
//! - [`Context`]: the mutable state threaded through one chain run, the
//!   reserved queue/stack/terminators/error slots plus an open payload map
//!   owned by interceptors.
//! - [`Terminator`]: a predicate over the context that can force early
//!   unwinding after any successful enter.
//! - [`Fault`]: the captured failure payload stored in the context's
//!   error slot.
//!
//! ## Reserved slots
//!
//! The engine only recognizes four slots on the context; everything else
//! is interceptor payload:
//!
//! | Slot | Holds | Set by | Cleared by |
//! |-------------|------------------------------|--------|------------|
//! | queue       | interceptors not yet entered | caller | engine     |
//! | stack       | interceptors already entered | engine | engine     |
//! | terminators | early-exit predicates        | caller | never      |
//! | error       | the in-flight [`Fault`]      | stages | an `error` stage |

#![doc(html_root_url = "https://docs.rs/bema-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod fault;
pub mod interceptor;
pub mod terminator;

// Re-export main types at crate root
pub use context::{Context, Queue, QueueEntry, Stack, SuspendHook};
pub use fault::Fault;
pub use interceptor::{
    AsyncStageFn, BoxFuture, Enter, Interceptor, InterceptorBuilder, StageFn,
};
pub use terminator::Terminator;
