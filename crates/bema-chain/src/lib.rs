//! # Bema Chain
//!
//! Synchronous and asynchronous chain engines for the Bema framework.
//!
//! A chain run takes a [`Context`] whose queue slot holds interceptors
//! and drives it through three passes:
//!
//! ```text
//! Enter:  queue front → back, invoking `enter`
//! Leave:  stack front → back (reverse of entry), invoking `leave`
//! Error:  stack front → back, invoking `error` while a fault is in flight
//! ```
//!
//! The Enter pass runs until the queue is exhausted, a sentinel or
//! matching terminator forces the unwind, or a fault switches the run to
//! the Error pass. Queue exhaustion alone does **not** unwind: only a
//! sentinel or terminator does.
//!
//! Two engines share these semantics:
//!
//! - [`chain`]: fully synchronous; every stage runs to completion
//!   inline.
//! - [`aio`]: adds the suspension protocol for asynchronous `enter`
//!   stages. The run suspends while a stage's computation is pending and
//!   resumes from the same queue/stack/context when it settles,
//!   optionally hopping onto a designated executor.
//!
//! Within one run, enters happen strictly in queue order and
//! leaves/errors strictly in reverse-of-entry order. Runs share nothing:
//! each owns its queue/stack/context triple, and the engines keep no
//! state between runs.
//!
//! [`Context`]: bema_core::Context

#![doc(html_root_url = "https://docs.rs/bema-chain/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod aio;
pub mod chain;
pub mod error;
pub mod phase;

// Re-export main types at crate root
pub use error::{ChainError, ChainResult};
pub use phase::Phase;
