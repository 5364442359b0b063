//! The chain-run context and its reserved queue/stack slots.
//!
//! A [`Context`] is created fresh per logical request, threaded by move
//! through every stage of one chain run, and discarded once the engine
//! returns it. The four engine-reserved slots (queue, stack, terminators,
//! error) are struct fields, structurally distinct from the open payload
//! map interceptors write to.
//!
//! The queue and the stack are mutated in place for the life of a run;
//! they are never rebuilt from a returned value. Interceptors may reach
//! them through [`Context::queue_mut`] and [`Context::stack_mut`]; in
//! particular, clearing the queue from inside a stage is a documented way
//! to short-circuit the remaining entries.
//!
//! # Example
//!
//! ```
//! use bema_core::{Context, Interceptor, Terminator};
//! use std::sync::Arc;
//!
//! let greet = Arc::new(
//!     Interceptor::builder("greet")
//!         .enter(|ctx| {
//!             ctx.insert("greeting", "hello".to_string());
//!             Ok(())
//!         })
//!         .build(),
//! );
//!
//! let ctx = Context::new()
//!     .with_interceptors([greet])
//!     .with_terminator(Terminator::payload_has("response"));
//!
//! assert!(ctx.queue().is_some());
//! assert_eq!(ctx.terminators().len(), 1);
//! ```

use crate::fault::Fault;
use crate::interceptor::Interceptor;
use crate::terminator::Terminator;
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;

/// A queue entry: an interceptor, or the `None` sentinel meaning "stop
/// entering, begin leaving now".
pub type QueueEntry = Option<Arc<Interceptor>>;

/// The stack of entered interceptors.
///
/// Built by pushing to the front as interceptors are entered, so that
/// front-to-back iteration visits them in reverse-of-entry order without a
/// separate reversal step.
pub type Stack = VecDeque<Arc<Interceptor>>;

/// Hook invoked immediately before a chain run suspends on an
/// asynchronous enter stage. For setup and telemetry side effects only;
/// it returns nothing.
pub type SuspendHook = Arc<dyn Fn(&Context) + Send + Sync>;

/// The interceptors not yet entered for the current run.
///
/// Both variants have identical execution semantics; they differ only in
/// how the next entry is obtained.
pub enum Queue {
    /// A FIFO of pending entries, popped from the front as they are
    /// entered. Stages may mutate it in place mid-run.
    Dynamic(VecDeque<QueueEntry>),

    /// A fixed array of entries, iterated by cursor rather than popped.
    /// The cursor keeps the position exact across async suspensions.
    Array {
        /// The full entry sequence, left intact while iterating.
        entries: Vec<QueueEntry>,
        /// Index of the next entry to hand out.
        cursor: usize,
    },
}

impl Queue {
    /// Creates a dynamic (FIFO) queue from entries.
    #[must_use]
    pub fn dynamic(entries: impl IntoIterator<Item = QueueEntry>) -> Self {
        Self::Dynamic(entries.into_iter().collect())
    }

    /// Creates an array queue from entries.
    #[must_use]
    pub fn array(entries: impl IntoIterator<Item = QueueEntry>) -> Self {
        Self::Array {
            entries: entries.into_iter().collect(),
            cursor: 0,
        }
    }

    /// Hands out the next entry: pops the front of a dynamic queue,
    /// advances the cursor of an array queue. `None` when exhausted.
    pub fn next(&mut self) -> Option<QueueEntry> {
        match self {
            Self::Dynamic(entries) => entries.pop_front(),
            Self::Array { entries, cursor } => {
                let entry = entries.get(*cursor).cloned()?;
                *cursor += 1;
                Some(entry)
            }
        }
    }

    /// Returns the number of entries not yet handed out.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Dynamic(entries) => entries.len(),
            Self::Array { entries, cursor } => entries.len().saturating_sub(*cursor),
        }
    }

    /// Returns `true` if no entries remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every remaining entry.
    ///
    /// Called from inside a stage, this short-circuits the rest of the
    /// Enter phase: the run ends via normal queue exhaustion, without
    /// unwinding.
    pub fn clear(&mut self) {
        match self {
            Self::Dynamic(entries) => entries.clear(),
            Self::Array { entries, cursor } => {
                entries.clear();
                *cursor = 0;
            }
        }
    }

    /// Appends a pending entry after the existing ones.
    pub fn push_back(&mut self, entry: QueueEntry) {
        match self {
            Self::Dynamic(entries) => entries.push_back(entry),
            Self::Array { entries, .. } => entries.push(entry),
        }
    }
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dynamic(entries) => f
                .debug_struct("Queue::Dynamic")
                .field("pending", &entries.len())
                .finish(),
            Self::Array { entries, cursor } => f
                .debug_struct("Queue::Array")
                .field("entries", &entries.len())
                .field("cursor", cursor)
                .finish(),
        }
    }
}

/// The mutable state threaded through one chain run.
///
/// One context belongs to exactly one in-flight run; the engine mutates
/// its queue, stack, and error slots in place and returns it as the run's
/// terminal result. Whether the run succeeded is determined entirely by
/// inspecting [`Context::error`]; the engine never re-raises a handled
/// fault.
pub struct Context {
    /// Interceptors not yet entered. `None` once the engine clears the
    /// slot on a sentinel or terminator match.
    queue: Option<Queue>,

    /// Interceptors entered but not yet left/errored, reverse-of-entry
    /// order at the front.
    stack: Stack,

    /// Early-exit predicates, evaluated in order after each successful
    /// enter. Never cleared.
    terminators: Vec<Terminator>,

    /// The in-flight fault, if any.
    error: Option<Fault>,

    /// Interceptor-owned payload: arbitrary string keys, opaque values.
    payload: HashMap<String, Box<dyn Any + Send + Sync>>,

    /// Designated runtime for async resumptions, when the caller wants
    /// the continuation hopped off the completing thread.
    executor: Option<Handle>,

    /// About-to-suspend side-effect hook.
    suspend_hook: Option<SuspendHook>,
}

impl Context {
    /// Creates an empty context: no queue, empty stack, no terminators.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: None,
            stack: Stack::new(),
            terminators: Vec::new(),
            error: None,
            payload: HashMap::new(),
            executor: None,
            suspend_hook: None,
        }
    }

    /// Installs a dynamic queue of the given interceptors.
    #[must_use]
    pub fn with_interceptors(
        mut self,
        interceptors: impl IntoIterator<Item = Arc<Interceptor>>,
    ) -> Self {
        self.queue = Some(Queue::dynamic(interceptors.into_iter().map(Some)));
        self
    }

    /// Installs an array queue of the given interceptors.
    #[must_use]
    pub fn with_static_interceptors(
        mut self,
        interceptors: impl IntoIterator<Item = Arc<Interceptor>>,
    ) -> Self {
        self.queue = Some(Queue::array(interceptors.into_iter().map(Some)));
        self
    }

    /// Installs a queue built elsewhere (e.g. one containing sentinels).
    #[must_use]
    pub fn with_queue(mut self, queue: Queue) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Replaces the terminator set.
    #[must_use]
    pub fn with_terminators(mut self, terminators: impl IntoIterator<Item = Terminator>) -> Self {
        self.terminators = terminators.into_iter().collect();
        self
    }

    /// Appends one terminator.
    #[must_use]
    pub fn with_terminator(mut self, terminator: Terminator) -> Self {
        self.terminators.push(terminator);
        self
    }

    /// Stores a payload value under a key.
    #[must_use]
    pub fn with_value<T: Send + Sync + 'static>(mut self, key: impl Into<String>, value: T) -> Self {
        self.insert(key, value);
        self
    }

    /// Designates a runtime to resume suspended runs on.
    #[must_use]
    pub fn with_executor(mut self, executor: Handle) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Installs the about-to-suspend hook.
    #[must_use]
    pub fn with_suspend_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Context) + Send + Sync + 'static,
    {
        self.suspend_hook = Some(Arc::new(hook));
        self
    }

    /// Returns the queue slot.
    #[must_use]
    pub fn queue(&self) -> Option<&Queue> {
        self.queue.as_ref()
    }

    /// Returns the queue slot mutably.
    ///
    /// Stages use this to mutate the queue in place; clearing it ends
    /// the Enter phase through normal exhaustion.
    pub fn queue_mut(&mut self) -> Option<&mut Queue> {
        self.queue.as_mut()
    }

    /// Replaces the queue slot.
    pub fn set_queue(&mut self, queue: Queue) {
        self.queue = Some(queue);
    }

    /// Clears the queue slot entirely, returning what it held.
    ///
    /// The engine calls this on a sentinel or terminator match before
    /// unwinding.
    pub fn take_queue(&mut self) -> Option<Queue> {
        self.queue.take()
    }

    /// Returns the stack of entered interceptors.
    #[must_use]
    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    /// Returns the stack mutably.
    pub fn stack_mut(&mut self) -> &mut Stack {
        &mut self.stack
    }

    /// Returns the terminator set.
    #[must_use]
    pub fn terminators(&self) -> &[Terminator] {
        &self.terminators
    }

    /// Returns the in-flight fault, if any.
    #[must_use]
    pub fn error(&self) -> Option<&Fault> {
        self.error.as_ref()
    }

    /// Writes the error slot.
    ///
    /// Stages may fail this way instead of returning `Err`; the engine
    /// treats both identically.
    pub fn set_error(&mut self, fault: Fault) {
        self.error = Some(fault);
    }

    /// Clears the error slot, returning the fault.
    ///
    /// An `error` capability calls this once it has handled the fault;
    /// the remaining stack then unwinds as a Leave phase.
    pub fn take_error(&mut self) -> Option<Fault> {
        self.error.take()
    }

    /// Returns the designated executor, if any.
    #[must_use]
    pub fn executor(&self) -> Option<&Handle> {
        self.executor.as_ref()
    }

    /// Returns the about-to-suspend hook, if any.
    #[must_use]
    pub fn suspend_hook(&self) -> Option<&SuspendHook> {
        self.suspend_hook.as_ref()
    }

    /// Stores a payload value under a key, replacing any previous value.
    pub fn insert<T: Send + Sync + 'static>(&mut self, key: impl Into<String>, value: T) {
        self.payload.insert(key.into(), Box::new(value));
    }

    /// Retrieves a payload value by key and type.
    ///
    /// Returns `None` if the key is absent or holds a different type.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self, key: &str) -> Option<&T> {
        self.payload.get(key).and_then(|v| v.downcast_ref())
    }

    /// Retrieves a payload value mutably.
    pub fn get_mut<T: Send + Sync + 'static>(&mut self, key: &str) -> Option<&mut T> {
        self.payload.get_mut(key).and_then(|v| v.downcast_mut())
    }

    /// Removes and returns a payload value.
    pub fn remove<T: Send + Sync + 'static>(&mut self, key: &str) -> Option<T> {
        self.payload
            .remove(key)
            .and_then(|v| v.downcast::<T>().ok())
            .map(|b| *b)
    }

    /// Returns `true` if the payload contains the key, regardless of the
    /// stored type.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.payload.contains_key(key)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("queue", &self.queue)
            .field("stack", &self.stack.len())
            .field("terminators", &self.terminators.len())
            .field("error", &self.error)
            .field("payload_keys", &self.payload.len())
            .finish()
    }
}
