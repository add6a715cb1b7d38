//! Single-value Actor implementation for reactive state management
//!
//! Actor provides controlled state management with sequential message processing.
//! It owns a Mutable<T> and processes events from Relays to update state safely.

use crate::dataflow::TaskHandle;
use futures_signals::signal::{Mutable, Signal};
use std::future::Future;
use std::sync::Arc;

/// Single-value reactive state container for Actor+Relay architecture.
///
/// Actor controls all mutations to a piece of state through sequential
/// message processing. It prevents race conditions and provides traceability
/// for all state changes.
///
/// # Core Principles
///
/// - **Single Point of Mutation**: Only the processor can modify its state
/// - **Sequential Processing**: Events are processed one at a time in order
/// - **Atomic Updates**: Fields changed under one `lock_mut()` become visible together
/// - **No Direct Access**: No .get() methods - use signals for all access
///
/// # Examples
///
/// ```rust
/// use futures::StreamExt;
/// use rowflow::dataflow::{Actor, relay};
///
/// # async fn demo() {
/// let (increment_relay, mut increment_stream) = relay::<u32>();
///
/// let counter = Actor::new(0, move |state| async move {
///     while let Some(amount) = increment_stream.next().await {
///         *state.lock_mut() += amount;
///     }
/// });
///
/// increment_relay.send(5);
/// let _count = counter.signal();
/// # }
/// ```
pub struct Actor<T> {
    state: Mutable<T>,
    task_handle: Arc<TaskHandle>,
}

impl<T> Actor<T>
where
    T: Send + Sync + 'static,
{
    /// Create a new Actor with initial state and event processing loop.
    ///
    /// The processor receives the Actor's `Mutable` and is spawned on the
    /// current tokio runtime. It is aborted once the last clone of the Actor
    /// is dropped or [`Actor::stop`] is called.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    #[track_caller]
    pub fn new<F, Fut>(initial_state: T, processor: F) -> Self
    where
        F: FnOnce(Mutable<T>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let state = Mutable::new(initial_state);
        let task_handle = Arc::new(TaskHandle::spawn(processor(state.clone())));
        Self { state, task_handle }
    }

    /// Get a reactive signal for this Actor's state.
    pub fn signal(&self) -> impl Signal<Item = T> + use<T>
    where
        T: Clone,
    {
        self.state.signal_cloned()
    }

    /// Get a reactive signal with a reference to avoid cloning.
    ///
    /// Use this when the state is large and only a projection of it is needed.
    pub fn signal_ref<U, F>(&self, f: F) -> impl Signal<Item = U> + use<T, U, F>
    where
        F: FnMut(&T) -> U,
    {
        self.state.signal_ref(f)
    }

    /// Abort the processor. Signals keep reporting the last state.
    pub fn stop(&self) {
        self.task_handle.abort();
    }

    #[cfg(test)]
    fn is_stopped(&self) -> bool {
        self.task_handle.is_finished()
    }
}

impl<T> Clone for Actor<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            task_handle: self.task_handle.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Actor<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Actor")
            .field("current_state", &*self.state.lock_ref())
            .finish()
    }
}
