//! The asynchronous chain engine.
//!
//! Phase semantics are identical to [`chain`]: the Leave and Error passes
//! are the same synchronous code, because only an asynchronous `enter`
//! stage can suspend. What this module adds is the suspension protocol:
//!
//! 1. the optional about-to-suspend hook on the context is invoked (side
//!    effects only);
//! 2. the stage's pending computation is started and the run suspends;
//!    the future handed to the caller is observably pending;
//! 3. when the computation settles, the run resumes from the same
//!    queue/stack/context: the Enter phase on success, the Error phase on
//!    failure;
//! 4. if the context designates an executor, the resumed phases run on
//!    that runtime instead of whichever thread completed the computation.
//!    This hop is the only inter-thread handoff in the engine.
//!
//! A run can suspend any number of times; each asynchronous interceptor
//! is one suspension point. The context moves through every resumption:
//! nothing is copied, and queue/stack positions carry over exactly.
//!
//! [`chain`]: crate::chain
//!
//! # Example
//!
//! ```
//! use bema_chain::aio;
//! use bema_core::{Context, Interceptor};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let fetch = Arc::new(
//!     Interceptor::builder("fetch")
//!         .enter_async(|ctx| {
//!             Box::pin(async move {
//!                 ctx.insert("record", 42_u64);
//!                 Ok(())
//!             })
//!         })
//!         .build(),
//! );
//!
//! let ctx = aio::execute_with(Context::new(), [fetch]).await.unwrap();
//! assert_eq!(ctx.get::<u64>("record"), Some(&42));
//! # }
//! ```

use crate::chain;
use crate::error::{ChainError, ChainResult};
use crate::phase::Phase;
use bema_core::{BoxFuture, Context, Interceptor, Queue};
use std::sync::Arc;

/// Executes the chain held in the context's queue slot, suspending
/// whenever a stage goes asynchronous.
///
/// The returned future settles to the terminal context once the queue is
/// exhausted or the run unwinds; as with the synchronous engine, an
/// unrecovered fault is data in the context, and only faults from `error`
/// capabilities (or a failed executor handoff) surface as `Err`.
pub async fn execute(context: Context) -> ChainResult {
    if context.queue().is_none() {
        return Ok(context);
    }
    run_enter(context).await
}

/// Installs `interceptors` as a dynamic queue, then executes the chain.
pub async fn execute_with(
    mut context: Context,
    interceptors: impl IntoIterator<Item = Arc<Interceptor>>,
) -> ChainResult {
    context.set_queue(Queue::dynamic(interceptors.into_iter().map(Some)));
    execute(context).await
}

/// Drives a single phase explicitly.
///
/// Resumption continuations use this to re-enter the engine; it is also
/// available to advanced callers. Leave and Error never suspend, so those
/// arms complete without yielding.
pub async fn execute_stage(context: Context, phase: Phase) -> ChainResult {
    match phase {
        Phase::Enter => execute(context).await,
        Phase::Leave => chain::run_leave(context),
        Phase::Error => {
            if context.error().is_some() {
                chain::run_error(context)
            } else {
                chain::run_leave(context)
            }
        }
    }
}

/// The Enter phase, with suspension at asynchronous stages.
async fn run_enter(mut context: Context) -> ChainResult {
    loop {
        let entry = match context.queue_mut().and_then(Queue::next) {
            Some(entry) => entry,
            None => break,
        };

        let Some(interceptor) = entry else {
            tracing::debug!("sentinel reached, unwinding");
            context.take_queue();
            return chain::run_leave(context);
        };

        context.stack_mut().push_front(Arc::clone(&interceptor));

        if let Some(async_enter) = interceptor.async_enter() {
            // Side effects only; the hook's return value is discarded.
            if let Some(hook) = context.suspend_hook().cloned() {
                hook(&context);
            }
            tracing::debug!(
                interceptor = interceptor.name(),
                "suspending on async enter"
            );

            let outcome = async_enter(&mut context).await;
            if let Err(fault) = outcome {
                tracing::warn!(
                    interceptor = interceptor.name(),
                    fault = %fault,
                    "async enter faulted"
                );
                context.set_error(fault.with_stage(interceptor.name()));
            }

            // Settled: pick the phase the run resumes with. Terminators
            // are consulted here exactly as after a synchronous enter.
            let next = if context.error().is_some() {
                Phase::Error
            } else if let Some(name) = chain::matched_terminator(&context) {
                tracing::debug!(terminator = name, "terminator matched, unwinding");
                context.take_queue();
                Phase::Leave
            } else {
                Phase::Enter
            };

            if let Some(executor) = context.executor().cloned() {
                tracing::debug!(phase = next.name(), "resuming on designated executor");
                return executor
                    .spawn(resume(context, next))
                    .await
                    .map_err(ChainError::Resume)?;
            }
            match next {
                Phase::Enter => continue,
                Phase::Leave => return chain::run_leave(context),
                Phase::Error => return chain::run_error(context),
            }
        }

        tracing::trace!(
            interceptor = interceptor.name(),
            phase = Phase::Enter.name(),
            "invoking stage"
        );
        if let Err(fault) = interceptor.enter(&mut context) {
            tracing::warn!(
                interceptor = interceptor.name(),
                fault = %fault,
                "enter stage faulted"
            );
            context.set_error(fault.with_stage(interceptor.name()));
            return chain::run_error(context);
        }
        if context.error().is_some() {
            return chain::run_error(context);
        }

        if let Some(name) = chain::matched_terminator(&context) {
            tracing::debug!(terminator = name, "terminator matched, unwinding");
            context.take_queue();
            return chain::run_leave(context);
        }
    }
    Ok(context)
}

/// The continuation handed to a designated executor: one boxed phase
/// re-entry, owning the run's context.
fn resume(context: Context, phase: Phase) -> BoxFuture<'static, ChainResult> {
    Box::pin(execute_stage(context, phase))
}
