//! Periodic Trigger - restartable timer merged with on-demand pulses
//!
//! A [`Trigger`] answers one question for the layers above it: "should the
//! source run now?". It combines a periodic timer with manual `refresh()`
//! calls into a single stream of value-less [`ExecutePulse`] events.

use crate::dataflow::{Actor, Relay, relay};
use futures::stream::{self, Stream, StreamExt};
use futures_signals::signal::{Signal, SignalExt};
use log::debug;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};

/// Intervals at or below this threshold disable the periodic timer.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(100);

/// "An execution should happen now." Carries no data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExecutePulse;

#[derive(Debug, Clone, Copy)]
enum TriggerCommand {
    IntervalChanged(Option<Duration>),
    RefreshRequested,
}

/// Returns the period the timer actually runs at, `None` for manual-only mode.
pub fn effective_interval(interval: Option<Duration>) -> Option<Duration> {
    interval.filter(|interval| *interval > MIN_REFRESH_INTERVAL)
}

/// Restartable periodic timer plus manual trigger.
///
/// - Every timer tick and every [`Trigger::refresh`] call emits one pulse.
/// - [`Trigger::refresh`] and [`Trigger::set_interval`] cancel the running
///   timer and start a new one from zero, so at most one timer is active.
/// - `None` or an interval at or below [`MIN_REFRESH_INTERVAL`] disables the
///   timer; only manual refreshes produce pulses then.
///
/// ```rust
/// use futures::StreamExt;
/// use rowflow::Trigger;
/// use std::time::Duration;
///
/// # async fn demo() {
/// let trigger = Trigger::new(Some(Duration::from_secs(30)));
/// let mut pulses = trigger.execute_stream();
///
/// pulses.next().await; // subscription-time pulse
/// trigger.refresh();
/// pulses.next().await; // manual pulse, next tick in 30s
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Trigger {
    interval: Actor<Option<Duration>>,
    command_relay: Relay<TriggerCommand>,
    execute_relay: Relay<ExecutePulse>,
}

impl Trigger {
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn new(refresh_interval: Option<Duration>) -> Self {
        let (command_relay, mut command_stream) = relay();
        let execute_relay = Relay::new();

        let interval = Actor::new(effective_interval(refresh_interval), {
            let execute_relay = execute_relay.clone();
            move |state| async move {
                let mut deadline = first_deadline(state.get());

                loop {
                    let command = tokio::select! {
                        biased;
                        command = command_stream.next() => match command {
                            Some(command) => Some(command),
                            None => break,
                        },
                        () = wait_for_deadline(deadline) => None,
                    };

                    match command {
                        Some(TriggerCommand::IntervalChanged(interval)) => {
                            let interval = effective_interval(interval);
                            debug!("[TRIGGER] interval changed to {interval:?}, restarting timer");
                            state.set_neq(interval);
                            deadline = first_deadline(interval);
                        }
                        Some(TriggerCommand::RefreshRequested) => {
                            execute_relay.send(ExecutePulse);
                            deadline = first_deadline(state.get());
                        }
                        None => {
                            execute_relay.send(ExecutePulse);
                            deadline = following_deadline(deadline, state.get());
                        }
                    }
                }
            }
        });

        Self {
            interval,
            command_relay,
            execute_relay,
        }
    }

    /// Change the refresh interval. Restarts the timer phase without emitting.
    pub fn set_interval(&self, refresh_interval: Option<Duration>) {
        self.command_relay
            .send(TriggerCommand::IntervalChanged(refresh_interval));
    }

    /// Emit a pulse now and restart the timer phase.
    pub fn refresh(&self) {
        self.command_relay.send(TriggerCommand::RefreshRequested);
    }

    /// Pulses emitted after this call: timer ticks and manual refreshes.
    pub fn pulse_stream(&self) -> impl Stream<Item = ExecutePulse> + Send + Unpin + use<> {
        self.execute_relay.subscribe()
    }

    /// [`Trigger::pulse_stream`] preceded by one synthetic pulse at subscription
    /// time, so a subscriber always runs once immediately.
    pub fn execute_stream(&self) -> impl Stream<Item = ExecutePulse> + Send + Unpin + use<> {
        stream::iter([ExecutePulse]).chain(self.pulse_stream())
    }

    /// The effective interval, `None` while in manual-only mode.
    pub fn refresh_interval_signal(&self) -> impl Signal<Item = Option<Duration>> + use<> {
        self.interval.signal().dedupe()
    }

    /// Cancel the timer and end every pulse stream.
    pub fn close(&self) {
        self.interval.stop();
        self.command_relay.close();
        self.execute_relay.close();
    }
}

fn first_deadline(interval: Option<Duration>) -> Option<Instant> {
    interval.map(|interval| Instant::now() + interval)
}

fn following_deadline(deadline: Option<Instant>, interval: Option<Duration>) -> Option<Instant> {
    let (deadline, interval) = deadline.zip(interval)?;
    let next = deadline + interval;
    // Skip missed ticks instead of bursting after a stall
    Some(next.max(Instant::now()))
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
