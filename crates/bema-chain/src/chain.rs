//! The synchronous chain engine.
//!
//! Given a context whose queue slot holds interceptors, the engine walks
//! the queue front-to-back invoking `enter` stages, then unwinds the
//! entered stack in reverse order invoking `leave` (or `error`, once a
//! fault is in flight). Three things start the unwind:
//!
//! - a sentinel (`None`) entry in the queue,
//! - a terminator matching after a successful enter,
//! - a fault (a stage returning `Err`, or writing the error slot).
//!
//! Plain queue exhaustion is none of these: a run whose queue simply
//! empties finishes with the entered stack intact and `leave` never
//! invoked. Termination and exhaustion are different outcomes.
//!
//! All queue and stack movement happens in place on the one context the
//! run owns; stages see the engine's own structures, and clearing the
//! queue from inside a stage is the supported way to skip the remaining
//! entries.
//!
//! # Example
//!
//! ```
//! use bema_chain::chain;
//! use bema_core::{Context, Interceptor, Terminator};
//! use std::sync::Arc;
//!
//! let hello = Arc::new(
//!     Interceptor::builder("hello")
//!         .enter(|ctx| {
//!             ctx.insert("response", "hello world".to_string());
//!             Ok(())
//!         })
//!         .build(),
//! );
//!
//! let ctx = Context::new()
//!     .with_interceptors([hello])
//!     .with_terminator(Terminator::payload_has("response"));
//!
//! let ctx = chain::execute(ctx).unwrap();
//! assert!(ctx.error().is_none());
//! assert_eq!(
//!     ctx.get::<String>("response").map(String::as_str),
//!     Some("hello world"),
//! );
//! ```

use crate::error::{ChainError, ChainResult};
use crate::phase::Phase;
use bema_core::{Context, Interceptor, Queue};
use std::sync::Arc;

/// Executes the chain held in the context's queue slot to completion.
///
/// Returns the terminal context. Whether the run succeeded is determined
/// by inspecting the context's error slot: an unrecovered fault is
/// returned as data, never re-raised. The `Err` arm is reserved for
/// faults raised inside `error` capabilities, which are not captured.
///
/// A context with no queue slot is returned unchanged.
pub fn execute(context: Context) -> ChainResult {
    if context.queue().is_none() {
        return Ok(context);
    }
    run_enter(context)
}

/// Installs `interceptors` as a dynamic queue, then executes the chain.
pub fn execute_with(
    mut context: Context,
    interceptors: impl IntoIterator<Item = Arc<Interceptor>>,
) -> ChainResult {
    context.set_queue(Queue::dynamic(interceptors.into_iter().map(Some)));
    execute(context)
}

/// Drives a single phase explicitly.
///
/// `Phase::Error` falls through to a Leave pass when no fault is in
/// flight, so a continuation can always hand the stack here after an
/// attempted recovery.
pub fn execute_stage(context: Context, phase: Phase) -> ChainResult {
    match phase {
        Phase::Enter => execute(context),
        Phase::Leave => run_leave(context),
        Phase::Error => {
            if context.error().is_some() {
                run_error(context)
            } else {
                run_leave(context)
            }
        }
    }
}

/// Abandons the remainder of a chain run: clears the queue's contents and
/// the stack, unconditionally.
///
/// Unlike a terminator match, nothing unwinds afterwards: no `leave` or
/// `error` stage will run for interceptors already entered. A no-op when
/// both structures are already empty.
pub fn kill(context: &mut Context) {
    if let Some(queue) = context.queue_mut() {
        queue.clear();
    }
    context.stack_mut().clear();
    tracing::debug!("chain run killed");
}

/// The Enter phase: walk the queue until it is exhausted or something
/// forces an early exit.
pub(crate) fn run_enter(mut context: Context) -> ChainResult {
    loop {
        let entry = match context.queue_mut().and_then(Queue::next) {
            Some(entry) => entry,
            None => break,
        };

        // The sentinel: stop entering, begin leaving now.
        let Some(interceptor) = entry else {
            tracing::debug!("sentinel reached, unwinding");
            context.take_queue();
            return run_leave(context);
        };

        // On the stack before enter runs, so Leave/Error will visit it
        // no matter what enter does.
        context.stack_mut().push_front(Arc::clone(&interceptor));

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
            return run_error(context);
        }
        if context.error().is_some() {
            return run_error(context);
        }

        if let Some(name) = matched_terminator(&context) {
            tracing::debug!(terminator = name, "terminator matched, unwinding");
            context.take_queue();
            return run_leave(context);
        }
    }
    // Exhausted queue: done, without unwinding the entered stack.
    Ok(context)
}

/// The Leave phase: unwind the stack in reverse-of-entry order.
pub(crate) fn run_leave(mut context: Context) -> ChainResult {
    while let Some(interceptor) = context.stack_mut().pop_front() {
        tracing::trace!(
            interceptor = interceptor.name(),
            phase = Phase::Leave.name(),
            "invoking stage"
        );
        if let Err(fault) = interceptor.leave(&mut context) {
            tracing::warn!(
                interceptor = interceptor.name(),
                fault = %fault,
                "leave stage faulted"
            );
            context.set_error(fault.with_stage(interceptor.name()));
            return run_error(context);
        }
        if context.error().is_some() {
            return run_error(context);
        }
    }
    Ok(context)
}

/// The Error phase: unwind the stack invoking `error` stages while the
/// fault is in flight.
///
/// The first stage to clear the error slot hands the remaining stack back
/// to the Leave phase. If the stack drains with the slot still set, the
/// run completes anyway; the fault stays in the context, surfaced to the
/// caller as data.
pub(crate) fn run_error(mut context: Context) -> ChainResult {
    while !context.stack().is_empty() {
        if context.error().is_none() {
            return run_leave(context);
        }
        let Some(interceptor) = context.stack_mut().pop_front() else {
            break;
        };
        tracing::trace!(
            interceptor = interceptor.name(),
            phase = Phase::Error.name(),
            "invoking stage"
        );
        // Faults raised here are not captured into the slot; they abort
        // the run.
        interceptor
            .error(&mut context)
            .map_err(|fault| ChainError::ErrorStageFailed {
                stage: interceptor.name(),
                fault,
            })?;
    }
    Ok(context)
}

/// Returns the name of the first matching terminator, in set order.
pub(crate) fn matched_terminator(context: &Context) -> Option<&'static str> {
    context
        .terminators()
        .iter()
        .find(|t| t.matches(context))
        .map(|t| t.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bema_core::{Fault, Terminator};
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn log() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn recorded(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    /// An interceptor with all three capabilities, each appending
    /// "<name>:<stage>" to the log. Its `error` stage does not clear the
    /// fault.
    fn tracer(name: &'static str, log: &Log) -> Arc<Interceptor> {
        let (enter_log, leave_log, error_log) =
            (Arc::clone(log), Arc::clone(log), Arc::clone(log));
        Arc::new(
            Interceptor::builder(name)
                .enter(move |_| {
                    enter_log.lock().unwrap().push(format!("{name}:enter"));
                    Ok(())
                })
                .leave(move |_| {
                    leave_log.lock().unwrap().push(format!("{name}:leave"));
                    Ok(())
                })
                .error(move |_| {
                    error_log.lock().unwrap().push(format!("{name}:error"));
                    Ok(())
                })
                .build(),
        )
    }

    fn setter(name: &'static str, key: &'static str, value: i64) -> Arc<Interceptor> {
        Arc::new(
            Interceptor::builder(name)
                .enter(move |ctx| {
                    ctx.insert(key, value);
                    Ok(())
                })
                .build(),
        )
    }

    #[test]
    fn test_enters_fold_in_queue_order() {
        let log = log();
        let ctx = Context::new().with_interceptors([
            tracer("a", &log),
            tracer("b", &log),
            tracer("c", &log),
        ]);

        let ctx = execute(ctx).unwrap();

        // Exhaustion is not termination: the stack keeps all three and
        // leave never ran.
        assert_eq!(recorded(&log), ["a:enter", "b:enter", "c:enter"]);
        assert_eq!(ctx.stack().len(), 3);
        assert!(ctx.queue().unwrap().is_empty());
    }

    #[test]
    fn test_result_equals_folding_enter_over_input() {
        let ctx = Context::new().with_interceptors([
            setter("a", "a", 1),
            setter("b", "b", 2),
            setter("c", "c", 3),
        ]);

        let ctx = execute(ctx).unwrap();
        assert_eq!(ctx.get::<i64>("a"), Some(&1));
        assert_eq!(ctx.get::<i64>("b"), Some(&2));
        assert_eq!(ctx.get::<i64>("c"), Some(&3));
        assert!(ctx.error().is_none());
    }

    #[test]
    fn test_execute_without_queue_is_identity() {
        let ctx = Context::new().with_value("untouched", true);
        let ctx = execute(ctx).unwrap();
        assert_eq!(ctx.get::<bool>("untouched"), Some(&true));
    }

    #[test]
    fn test_execute_with_installs_queue() {
        let log = log();
        let ctx = execute_with(Context::new(), [tracer("a", &log)]).unwrap();
        assert_eq!(recorded(&log), ["a:enter"]);
        assert!(ctx.queue().unwrap().is_empty());
    }

    #[test]
    fn test_terminator_unwinds_entered_prefix() {
        let log = log();
        // "stopper" trips the terminator by writing the key its predicate
        // looks for.
        let stop = Arc::new(
            Interceptor::builder("stopper")
                .enter(|ctx| {
                    ctx.insert("stop", ());
                    Ok(())
                })
                .build(),
        );
        let ctx = Context::new()
            .with_queue(Queue::dynamic([
                Some(tracer("a", &log)),
                Some(stop),
                Some(tracer("late", &log)),
            ]))
            .with_terminator(Terminator::payload_has("stop"));

        let ctx = execute(ctx).unwrap();

        assert_eq!(recorded(&log), ["a:enter", "a:leave"]);
        assert!(ctx.queue().is_none(), "queue slot is cleared on match");
        assert!(ctx.stack().is_empty());
    }

    #[test]
    fn test_terminators_checked_in_order_first_wins() {
        let log = log();
        let first_log = Arc::clone(&log);
        let second_log = Arc::clone(&log);
        let ctx = Context::new()
            .with_interceptors([setter("a", "a", 1)])
            .with_terminators([
                Terminator::named("first", move |_| {
                    first_log.lock().unwrap().push("first".into());
                    true
                }),
                Terminator::named("second", move |_| {
                    second_log.lock().unwrap().push("second".into());
                    true
                }),
            ]);

        execute(ctx).unwrap();
        assert_eq!(recorded(&log), ["first"]);
    }

    #[test]
    fn test_sentinel_behaves_like_matched_terminator() {
        let log = log();
        let ctx = Context::new().with_queue(Queue::dynamic([
            Some(tracer("a", &log)),
            Some(tracer("b", &log)),
            None,
            Some(tracer("c", &log)),
        ]));

        let ctx = execute(ctx).unwrap();

        assert_eq!(
            recorded(&log),
            ["a:enter", "b:enter", "b:leave", "a:leave"]
        );
        assert!(ctx.queue().is_none(), "queue slot is cleared on sentinel");
    }

    #[test]
    fn test_enter_fault_unwinds_error_stages_in_reverse() {
        let log = log();
        let faulty = Arc::new(
            Interceptor::builder("faulty")
                .enter(|_| Err(Fault::new("boom")))
                .build(),
        );
        let ctx = Context::new().with_queue(Queue::dynamic([
            Some(tracer("a", &log)),
            Some(tracer("b", &log)),
            Some(faulty),
            Some(tracer("never", &log)),
        ]));

        let ctx = execute(ctx).unwrap();

        // b and a see the error pass; "never" was not entered at all.
        assert_eq!(recorded(&log), ["a:enter", "b:enter", "b:error", "a:error"]);
        let fault = ctx.error().unwrap();
        assert_eq!(fault.message(), "boom");
        assert_eq!(fault.stage(), Some("faulty"));
    }

    #[test]
    fn test_error_slot_write_is_equivalent_to_raising() {
        let log = log();
        let slot_writer = Arc::new(
            Interceptor::builder("slot-writer")
                .enter(|ctx| {
                    ctx.set_error(Fault::new("written, not raised"));
                    Ok(())
                })
                .build(),
        );
        let ctx = Context::new().with_queue(Queue::dynamic([
            Some(tracer("a", &log)),
            Some(slot_writer),
            Some(tracer("never", &log)),
        ]));

        let ctx = execute(ctx).unwrap();
        assert_eq!(recorded(&log), ["a:enter", "a:error"]);
        assert_eq!(ctx.error().unwrap().message(), "written, not raised");
    }

    #[test]
    fn test_recovery_resumes_leave_over_remaining_stack() {
        let log = log();
        let recover_log = Arc::clone(&log);
        let recoverer = Arc::new(
            Interceptor::builder("recoverer")
                .error(move |ctx| {
                    recover_log.lock().unwrap().push("recoverer:error".into());
                    ctx.take_error();
                    Ok(())
                })
                .build(),
        );
        let faulty = Arc::new(
            Interceptor::builder("faulty")
                .enter(|_| Err(Fault::new("boom")))
                .build(),
        );
        let ctx = Context::new().with_queue(Queue::dynamic([
            Some(tracer("outer", &log)),
            Some(recoverer),
            Some(faulty),
        ]));

        let ctx = execute(ctx).unwrap();

        // recoverer clears the fault; the stages beneath it leave
        // normally.
        assert_eq!(
            recorded(&log),
            ["outer:enter", "recoverer:error", "outer:leave"]
        );
        assert!(ctx.error().is_none());
    }

    #[test]
    fn test_unrecovered_fault_is_returned_as_data() {
        let log = log();
        let ctx = Context::new().with_queue(Queue::dynamic([
            Some(tracer("a", &log)),
            Some(Arc::new(
                Interceptor::builder("faulty")
                    .enter(|_| Err(Fault::new("unhandled")))
                    .build(),
            )),
        ]));

        let ctx = execute(ctx).unwrap();
        assert!(ctx.stack().is_empty(), "stack fully drained");
        assert_eq!(ctx.error().unwrap().message(), "unhandled");
    }

    #[test]
    fn test_leave_fault_switches_to_error_phase() {
        let log = log();
        let bad_leave = Arc::new(
            Interceptor::builder("bad-leave")
                .leave(|_| Err(Fault::new("leave blew up")))
                .build(),
        );
        let ctx = Context::new().with_queue(Queue::dynamic([
            Some(tracer("a", &log)),
            Some(bad_leave),
            None,
        ]));

        let ctx = execute(ctx).unwrap();

        // a entered, bad-leave entered, sentinel unwinds: bad-leave's
        // leave faults, so a sees error, not leave.
        assert_eq!(recorded(&log), ["a:enter", "a:error"]);
        assert_eq!(ctx.error().unwrap().stage(), Some("bad-leave"));
    }

    #[test]
    fn test_error_stage_fault_propagates_uncaught() {
        let exploding = Arc::new(
            Interceptor::builder("exploding-handler")
                .error(|_| Err(Fault::new("handler blew up")))
                .build(),
        );
        let faulty = Arc::new(
            Interceptor::builder("faulty")
                .enter(|_| Err(Fault::new("boom")))
                .build(),
        );
        let ctx =
            Context::new().with_queue(Queue::dynamic([Some(exploding), Some(faulty)]));

        let err = execute(ctx).unwrap_err();
        match err {
            ChainError::ErrorStageFailed { stage, fault } => {
                assert_eq!(stage, "exploding-handler");
                assert_eq!(fault.message(), "handler blew up");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_stage_clearing_queue_short_circuits_without_leave() {
        let log = log();
        let clearer = Arc::new(
            Interceptor::builder("clearer")
                .enter(|ctx| {
                    if let Some(queue) = ctx.queue_mut() {
                        queue.clear();
                    }
                    Ok(())
                })
                .build(),
        );
        let ctx = Context::new().with_queue(Queue::dynamic([
            Some(tracer("a", &log)),
            Some(clearer),
            Some(tracer("skipped", &log)),
        ]));

        let ctx = execute(ctx).unwrap();

        // Clearing the queue is exhaustion, not termination: no leave.
        assert_eq!(recorded(&log), ["a:enter"]);
        assert_eq!(ctx.stack().len(), 2);
        assert!(ctx.queue().unwrap().is_empty());
    }

    #[test]
    fn test_kill_clears_queue_and_stack() {
        let log = log();
        let killer = Arc::new(
            Interceptor::builder("killer")
                .enter(|ctx| {
                    kill(ctx);
                    Ok(())
                })
                .build(),
        );
        let ctx = Context::new().with_queue(Queue::dynamic([
            Some(tracer("a", &log)),
            Some(killer),
            Some(tracer("skipped", &log)),
        ]));

        let ctx = execute(ctx).unwrap();

        assert_eq!(recorded(&log), ["a:enter"]);
        assert!(ctx.stack().is_empty());
        assert!(ctx.queue().unwrap().is_empty());
    }

    #[test]
    fn test_kill_on_empty_context_is_noop() {
        let mut ctx = Context::new().with_value("payload", 9_i32);
        kill(&mut ctx);
        kill(&mut ctx);
        assert!(ctx.queue().is_none());
        assert!(ctx.stack().is_empty());
        assert_eq!(ctx.get::<i32>("payload"), Some(&9));
    }

    #[test]
    fn test_array_queue_same_semantics() {
        let log = log();
        let ctx = Context::new().with_queue(Queue::array([
            Some(tracer("a", &log)),
            Some(tracer("b", &log)),
            None,
            Some(tracer("c", &log)),
        ]));

        let ctx = execute(ctx).unwrap();
        assert_eq!(
            recorded(&log),
            ["a:enter", "b:enter", "b:leave", "a:leave"]
        );
        assert!(ctx.queue().is_none());
    }

    #[test]
    fn test_array_queue_terminator() {
        let log = log();
        let ctx = Context::new()
            .with_queue(Queue::array([
                Some(setter("a", "a", 1)),
                Some(setter("b", "b", 2)),
                Some(tracer("c", &log)),
            ]))
            .with_terminator(Terminator::payload_has("b"));

        let ctx = execute(ctx).unwrap();
        assert!(ctx.contains("a"));
        assert!(ctx.contains("b"));
        assert!(recorded(&log).is_empty(), "c never ran");
    }

    #[test]
    fn test_execute_stage_leave_only() {
        let log = log();
        let mut ctx = Context::new();
        ctx.stack_mut().push_front(tracer("a", &log));
        ctx.stack_mut().push_front(tracer("b", &log));

        let ctx = execute_stage(ctx, Phase::Leave).unwrap();
        // b entered last (front of stack), so it leaves first.
        assert_eq!(recorded(&log), ["b:leave", "a:leave"]);
        assert!(ctx.stack().is_empty());
    }

    #[test]
    fn test_execute_stage_error_without_fault_falls_back_to_leave() {
        let log = log();
        let mut ctx = Context::new();
        ctx.stack_mut().push_front(tracer("a", &log));

        execute_stage(ctx, Phase::Error).unwrap();
        assert_eq!(recorded(&log), ["a:leave"]);
    }

    #[test]
    fn test_execute_stage_error_with_fault_runs_error_pass() {
        let log = log();
        let mut ctx = Context::new();
        ctx.stack_mut().push_front(tracer("a", &log));
        ctx.set_error(Fault::new("pending"));

        let ctx = execute_stage(ctx, Phase::Error).unwrap();
        assert_eq!(recorded(&log), ["a:error"]);
        assert!(ctx.error().is_some());
    }
}
