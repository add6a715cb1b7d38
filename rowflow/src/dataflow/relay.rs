//! Fan-out event streaming Relay
//!
//! Relay delivers every event to every subscriber through unbounded channels.
//! Events sent while nobody is subscribed are dropped.

use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Type-safe event relay for Actor+Relay architecture.
///
/// Relays carry events from public API calls into Actor processors and from
/// Actors out to other Actors. Unlike signals, relays never coalesce events:
/// each subscriber receives every event sent after it subscribed, in order.
///
/// # Event-Source Naming Convention
///
/// Relays follow the `{source}_{event}_relay` pattern and the events they carry
/// describe what happened, not what to do:
///
/// - `command_relay` - a public API method was called
/// - `data_changed_relay` - a data source produced a new distinct value
/// - `execute_relay` - a trigger fired
///
/// # Examples
///
/// ```rust
/// use futures::StreamExt;
/// use rowflow::dataflow::relay;
///
/// # async fn demo() {
/// let (page_changed_relay, mut page_changed_stream) = relay::<usize>();
///
/// page_changed_relay.send(2);
/// assert_eq!(page_changed_stream.next().await, Some(2));
/// # }
/// ```
pub struct Relay<T> {
    subscribers: Arc<Mutex<Vec<UnboundedSender<T>>>>,
}

impl<T> Relay<T>
where
    T: Clone + Send + 'static,
{
    /// Creates a Relay without subscribers.
    ///
    /// Use the `relay()` function for creating a Relay+Stream pair.
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Creates a new subscription stream.
    ///
    /// The stream receives every event sent after this call and ends when the
    /// relay is closed or every clone of the relay is dropped.
    pub fn subscribe(&self) -> UnboundedReceiver<T> {
        let (sender, receiver) = unbounded();
        self.lock_subscribers().push(sender);
        receiver
    }

    /// Sends an event to all active subscribers.
    ///
    /// Subscribers whose streams were dropped are pruned. With no subscribers
    /// the event is discarded (fire-and-forget semantics).
    pub fn send(&self, value: T) {
        self.lock_subscribers()
            .retain(|sender| sender.unbounded_send(value.clone()).is_ok());
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        let mut subscribers = self.lock_subscribers();
        subscribers.retain(|sender| !sender.is_closed());
        subscribers.len()
    }

    /// Ends every subscription stream. Later subscriptions work normally.
    pub fn close(&self) {
        self.lock_subscribers().clear();
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, Vec<UnboundedSender<T>>> {
        // A panic while holding the lock cannot leave the sender list inconsistent
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Clone for Relay<T> {
    fn clone(&self) -> Self {
        Self {
            subscribers: self.subscribers.clone(),
        }
    }
}

impl<T> Default for Relay<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

// Debug implementation that doesn't expose internal channel details
impl<T> std::fmt::Debug for Relay<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let subscribers = self
            .subscribers
            .lock()
            .map(|subscribers| subscribers.len())
            .unwrap_or_default();
        f.debug_struct("Relay").field("subscribers", &subscribers).finish()
    }
}

/// Creates a new Relay together with its first subscription stream.
///
/// This is the idiomatic way to create the command relay of an Actor: the
/// Actor's processor owns the stream, the public handle owns the Relay.
pub fn relay<T>() -> (Relay<T>, UnboundedReceiver<T>)
where
    T: Clone + Send + 'static,
{
    let relay = Relay::new();
    let stream = relay.subscribe();
    (relay, stream)
}
