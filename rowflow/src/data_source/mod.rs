//! Managed Data Source - re-invokes an asynchronous source on every pulse
//!
//! A [`DataSource`] owns a source factory producing a fresh value stream per
//! invocation. It runs the factory on start, on every [`Trigger`] pulse and on
//! every source replacement, and folds the produced values and failures into
//! an observable [`SourceState`].
//!
//! # Invocation lifecycle
//!
//! ```text
//! Idle -> Loading -> Success(data) | Failed(error) | Interrupted -> Idle
//! ```
//!
//! A newer pulse interrupts the running invocation by dropping its stream, so
//! late values or errors of a superseded invocation never reach the state.

mod state;

pub use state::SourceState;

use crate::dataflow::{Actor, Relay, TaskHandle, relay};
use crate::trigger::Trigger;
use futures::channel::mpsc::UnboundedReceiver;
use futures::future;
use futures::stream::{BoxStream, Stream, StreamExt};
use futures_signals::signal::{Mutable, Signal, SignalExt};
use log::{debug, warn};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Value stream produced by one source invocation.
pub type SourceStream<T, E> = BoxStream<'static, Result<T, E>>;

/// Factory invoked once per execution.
pub type SourceFactory<T, E> = Arc<dyn Fn() -> SourceStream<T, E> + Send + Sync>;

/// Construction-time settings of a [`DataSource`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DataSourceConfig {
    /// `None` (the default) means refresh only on demand.
    pub refresh_interval: Option<Duration>,
}

/// Raw change feed of `data`, including clears that found nothing to clear.
///
/// The table layer uses `Cleared` as a fence: batches of a fetch started
/// before a clear always arrive before the matching `Cleared`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DataChange<T> {
    Produced(T),
    Cleared { had_data: bool },
}

enum SourceCommand<T, E> {
    SourceReplaced(SourceFactory<T, E>),
    DataCleared,
    ResetRequested,
}

impl<T, E> Clone for SourceCommand<T, E> {
    fn clone(&self) -> Self {
        match self {
            Self::SourceReplaced(factory) => Self::SourceReplaced(factory.clone()),
            Self::DataCleared => Self::DataCleared,
            Self::ResetRequested => Self::ResetRequested,
        }
    }
}

/// Reactive wrapper around a single-value-producing asynchronous source.
///
/// All mutation happens inside the processor task; the methods below only
/// enqueue commands, which are applied in call order. Read state through the
/// `*_signal()` methods or the non-lossy [`DataSource::data_stream`].
///
/// Failures of the source never escape: they land in `error` and the next
/// pulse retries unconditionally.
///
/// ```rust
/// use futures::stream;
/// use rowflow::{DataSource, DataSourceConfig};
///
/// # async fn demo() {
/// let source = DataSource::with_source(DataSourceConfig::default(), || {
///     stream::iter([Ok::<_, String>(vec!["row"])])
/// });
///
/// let _rows = source.data_signal();
/// source.refresh();
/// # }
/// ```
pub struct DataSource<T, E> {
    state: Actor<SourceState<T, E>>,
    trigger: Trigger,
    command_relay: Relay<SourceCommand<T, E>>,
    data_changed_relay: Relay<DataChange<T>>,
    connections: Arc<Mutex<Vec<TaskHandle>>>,
}

impl<T, E> DataSource<T, E>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    E: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a data source without a source; pulses are no-ops until
    /// [`DataSource::set_source`] or [`DataSource::connect_source`] provides one.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn new(config: DataSourceConfig) -> Self {
        Self::build(config, None)
    }

    /// Create a data source and run `factory` immediately.
    pub fn with_source<F, S>(config: DataSourceConfig, factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Stream<Item = Result<T, E>> + Send + 'static,
    {
        Self::build(config, Some(box_factory(factory)))
    }

    fn build(config: DataSourceConfig, source: Option<SourceFactory<T, E>>) -> Self {
        let trigger = Trigger::new(config.refresh_interval);
        let (command_relay, mut command_stream) = relay();
        let data_changed_relay = Relay::new();
        let mut pulse_stream = trigger.pulse_stream();

        let state = Actor::new(SourceState::default(), {
            let data_changed_relay = data_changed_relay.clone();
            move |state| async move {
                let mut runner = SourceRunner {
                    state,
                    data_changed_relay,
                    source,
                    run: None,
                    generation: 0,
                };
                // Stands in for the trigger's subscription-time pulse
                runner.start_run("start");

                loop {
                    let event = tokio::select! {
                        biased;
                        command = command_stream.next() => match command {
                            Some(command) => SourceEvent::Command(command),
                            None => break,
                        },
                        Some(_) = pulse_stream.next() => SourceEvent::Pulse,
                        item = runner.next_item() => SourceEvent::Item(item),
                    };
                    runner.handle(event);
                }
            }
        });

        Self {
            state,
            trigger,
            command_relay,
            data_changed_relay,
            connections: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Replace the source factory. Interrupts the running invocation and
    /// starts a new one with the new factory.
    pub fn set_source<F, S>(&self, factory: F)
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Stream<Item = Result<T, E>> + Send + 'static,
    {
        self.replace_source(box_factory(factory));
    }

    pub(crate) fn replace_source(&self, factory: SourceFactory<T, E>) {
        self.command_relay.send(SourceCommand::SourceReplaced(factory));
    }

    /// Bind the source to an external stream of factories. Every factory the
    /// stream yields is applied like [`DataSource::set_source`].
    pub fn connect_source<St, F, S>(&self, factories: St)
    where
        St: Stream<Item = F> + Send + 'static,
        F: Fn() -> S + Send + Sync + 'static,
        S: Stream<Item = Result<T, E>> + Send + 'static,
    {
        let command_relay = self.command_relay.clone();
        let connection = TaskHandle::spawn(async move {
            let mut factories = Box::pin(factories);
            while let Some(factory) = factories.next().await {
                command_relay.send(SourceCommand::SourceReplaced(box_factory(factory)));
            }
        });
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(connection);
    }

    /// Run the current source now and restart the refresh timer.
    pub fn refresh(&self) {
        self.trigger.refresh();
    }

    pub fn set_refresh_interval(&self, refresh_interval: Option<Duration>) {
        self.trigger.set_interval(refresh_interval);
    }

    /// Drop the current data. Loading, error and initial state are untouched.
    pub fn clear_data(&self) {
        self.command_relay.send(SourceCommand::DataCleared);
    }

    /// Drop the current data and error and return to the initial state.
    pub fn reset(&self) {
        self.command_relay.send(SourceCommand::ResetRequested);
    }

    pub fn reset_and_refresh(&self) {
        self.reset();
        self.refresh();
    }

    /// Stop the timer, the running invocation and every connected factory
    /// stream, and end all signal and data streams' updates.
    pub fn close(&self) {
        self.state.stop();
        self.trigger.close();
        self.command_relay.close();
        self.data_changed_relay.close();
        for connection in self
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
        {
            connection.abort();
        }
    }

    pub fn data_signal(&self) -> impl Signal<Item = Option<T>> + use<T, E> {
        self.state.signal_ref(|state| state.data.clone()).dedupe_cloned()
    }

    pub fn error_signal(&self) -> impl Signal<Item = Option<E>> + use<T, E> {
        self.state.signal_ref(|state| state.error.clone()).dedupe_cloned()
    }

    pub fn has_error_signal(&self) -> impl Signal<Item = bool> + use<T, E> {
        self.state.signal_ref(SourceState::has_error).dedupe()
    }

    pub fn loading_signal(&self) -> impl Signal<Item = bool> + use<T, E> {
        self.state.signal_ref(|state| state.loading).dedupe()
    }

    /// Loading while no value has been produced yet.
    pub fn first_loading_signal(&self) -> impl Signal<Item = bool> + use<T, E> {
        self.state.signal_ref(SourceState::is_first_loading).dedupe()
    }

    /// Loading after a value has already been produced.
    pub fn after_first_loading_signal(&self) -> impl Signal<Item = bool> + use<T, E> {
        self.state.signal_ref(SourceState::is_after_first_loading).dedupe()
    }

    pub fn initial_state_signal(&self) -> impl Signal<Item = bool> + use<T, E> {
        self.state.signal_ref(|state| state.initial_state).dedupe()
    }

    /// Every field at once, for consumers that need a consistent snapshot.
    pub fn state_signal(&self) -> impl Signal<Item = SourceState<T, E>> + use<T, E> {
        self.state.signal().dedupe_cloned()
    }

    pub fn refresh_interval_signal(&self) -> impl Signal<Item = Option<Duration>> + use<T, E> {
        self.trigger.refresh_interval_signal()
    }

    /// Every distinct change of `data`, including `None` on clear or reset.
    ///
    /// Unlike [`DataSource::data_signal`], no change is ever coalesced.
    pub fn data_stream(&self) -> impl Stream<Item = Option<T>> + Send + Unpin + use<T, E> {
        self.data_changed_relay.subscribe().filter_map(|change| {
            future::ready(match change {
                DataChange::Produced(value) => Some(Some(value)),
                DataChange::Cleared { had_data: true } => Some(None),
                DataChange::Cleared { had_data: false } => None,
            })
        })
    }

    pub(crate) fn data_changes(&self) -> UnboundedReceiver<DataChange<T>> {
        self.data_changed_relay.subscribe()
    }
}

impl<T, E> Clone for DataSource<T, E> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            trigger: self.trigger.clone(),
            command_relay: self.command_relay.clone(),
            data_changed_relay: self.data_changed_relay.clone(),
            connections: self.connections.clone(),
        }
    }
}

impl<T, E> std::fmt::Debug for DataSource<T, E>
where
    T: std::fmt::Debug,
    E: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSource")
            .field("state", &self.state)
            .field("trigger", &self.trigger)
            .finish()
    }
}

fn box_factory<T, E, F, S>(factory: F) -> SourceFactory<T, E>
where
    F: Fn() -> S + Send + Sync + 'static,
    S: Stream<Item = Result<T, E>> + Send + 'static,
{
    Arc::new(move || factory().boxed())
}

enum SourceEvent<T, E> {
    Command(SourceCommand<T, E>),
    Pulse,
    Item(Option<Result<T, E>>),
}

struct FetchRun<T, E> {
    generation: u64,
    values: SourceStream<T, E>,
}

/// Processor-side state of a [`DataSource`].
struct SourceRunner<T, E> {
    state: Mutable<SourceState<T, E>>,
    data_changed_relay: Relay<DataChange<T>>,
    source: Option<SourceFactory<T, E>>,
    run: Option<FetchRun<T, E>>,
    generation: u64,
}

impl<T, E> SourceRunner<T, E>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    E: Clone + PartialEq + Send + Sync + 'static,
{
    /// Next item of the running invocation; pending forever while idle.
    async fn next_item(&mut self) -> Option<Result<T, E>> {
        match &mut self.run {
            Some(run) => run.values.next().await,
            None => std::future::pending().await,
        }
    }

    fn handle(&mut self, event: SourceEvent<T, E>) {
        match event {
            SourceEvent::Command(SourceCommand::SourceReplaced(factory)) => {
                self.source = Some(factory);
                self.start_run("source replaced");
            }
            SourceEvent::Command(SourceCommand::DataCleared) => {
                let had_data = self.state.lock_mut().clear_data();
                self.data_changed_relay.send(DataChange::Cleared { had_data });
            }
            SourceEvent::Command(SourceCommand::ResetRequested) => {
                let had_data = self.state.lock_mut().reset();
                self.data_changed_relay.send(DataChange::Cleared { had_data });
            }
            SourceEvent::Pulse => self.start_run("execute pulse"),
            SourceEvent::Item(Some(Ok(value))) => {
                let changed = self.state.lock_mut().apply_value(value.clone());
                if changed {
                    self.data_changed_relay.send(DataChange::Produced(value));
                }
            }
            SourceEvent::Item(Some(Err(error))) => {
                if let Some(run) = self.run.take() {
                    warn!("[DATA_SOURCE] invocation {} failed", run.generation);
                }
                self.state.lock_mut().apply_failure(error);
            }
            SourceEvent::Item(None) => {
                if let Some(run) = self.run.take() {
                    debug!("[DATA_SOURCE] invocation {} completed", run.generation);
                }
                self.state.lock_mut().finish_run();
            }
        }
    }

    fn start_run(&mut self, reason: &str) {
        let Some(source) = &self.source else {
            debug!("[DATA_SOURCE] {reason}: no source configured yet");
            return;
        };

        self.generation += 1;
        if let Some(previous) = self.run.take() {
            debug!(
                "[DATA_SOURCE] invocation {} interrupted by invocation {}",
                previous.generation, self.generation
            );
        }
        debug!("[DATA_SOURCE] {reason}: starting invocation {}", self.generation);

        self.run = Some(FetchRun {
            generation: self.generation,
            values: source(),
        });
        self.state.lock_mut().begin_run();
    }
}
