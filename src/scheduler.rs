use futures::future::join_all;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::{sleep, Instant},
};
use tracing::{debug, info, warn};

use crate::{
    engine::TelemetryEngine,
    transport::NotifySink,
    types::{CharacteristicId, EmulatorConfig},
};

/// How long a notification task waits between sends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Follow the engine's status rate, re-read after every send
    StatusRate,
    /// Fixed interval
    Fixed {
        /// Wait between sends
        interval: Duration,
        /// Wait one interval before the first send
        delay_first: bool,
    },
}

impl Cadence {
    /// Cadence of a characteristic under the given configuration
    ///
    /// Returns `None` for characteristics without generated frames.
    #[must_use]
    pub const fn for_characteristic(id: CharacteristicId, config: &EmulatorConfig) -> Option<Self> {
        if id.follows_status_rate() {
            return Some(Self::StatusRate);
        }
        match config.fixed_interval(id) {
            Some(interval) => Some(Self::Fixed {
                interval,
                delay_first: matches!(
                    id,
                    CharacteristicId::WorkoutSummary | CharacteristicId::AdditionalWorkoutSummary
                ),
            }),
            None => None,
        }
    }

    fn wait(self, engine: &TelemetryEngine) -> Duration {
        match self {
            Self::StatusRate => engine.status_delay(),
            Self::Fixed { interval, .. } => interval,
        }
    }
}

struct Subscription {
    cancel: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl Subscription {
    fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// Runs one notification task per subscribed characteristic
///
/// Each characteristic is either Idle (no entry, or a finished task) or
/// Active (a running task). A task generates a frame, hands it to the
/// subscriber's sink, then sleeps for the characteristic's cadence. Sleeps
/// are measured from the end of the previous send, so the stream drifts
/// slowly against the wall clock; values are synthetic and the drift is
/// accepted.
///
/// A task ends when its subscription is cancelled or when the sink reports
/// a failure. Failures are never retried and never affect other
/// characteristics.
///
/// Subscribing must happen inside a tokio runtime.
pub struct NotificationScheduler {
    engine: Arc<TelemetryEngine>,
    config: EmulatorConfig,
    subscriptions: Mutex<HashMap<CharacteristicId, Subscription>>,
}

impl NotificationScheduler {
    /// Create a scheduler over a shared engine
    #[must_use]
    pub fn new(engine: Arc<TelemetryEngine>, config: EmulatorConfig) -> Self {
        Self {
            engine,
            config,
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    /// Engine the scheduler draws frames from
    #[must_use]
    pub const fn engine(&self) -> &Arc<TelemetryEngine> {
        &self.engine
    }

    /// Start notifying `sink` with frames for `id`
    ///
    /// A running task for the same characteristic is cancelled and replaced.
    /// Returns `false` if `id` has no periodic frame.
    pub fn subscribe(&self, id: CharacteristicId, sink: Arc<dyn NotifySink>) -> bool {
        let Some(cadence) = Cadence::for_characteristic(id, &self.config) else {
            warn!("{} has no periodic frame, ignoring subscription", id);
            return false;
        };

        let (cancel, cancelled) = oneshot::channel();
        let handle = tokio::spawn(notify_loop(
            id,
            Arc::clone(&self.engine),
            sink,
            cadence,
            cancelled,
        ));

        let previous = self
            .lock_subscriptions()
            .insert(id, Subscription { cancel, handle });
        if let Some(previous) = previous {
            debug!("Replacing previous subscription for {}", id);
            let _ = previous.cancel.send(());
        }

        info!("{} notify request, starting notifications", id);
        true
    }

    /// Stop notifications for `id`
    ///
    /// Returns `true` if a running task was cancelled.
    pub fn unsubscribe(&self, id: CharacteristicId) -> bool {
        let Some(subscription) = self.lock_subscriptions().remove(&id) else {
            return false;
        };
        let was_running = subscription.is_running();
        let _ = subscription.cancel.send(());
        info!("{} unsubscribed", id);
        was_running
    }

    /// Whether `id` currently has a running notification task
    #[must_use]
    pub fn is_active(&self, id: CharacteristicId) -> bool {
        self.lock_subscriptions()
            .get(&id)
            .is_some_and(Subscription::is_running)
    }

    /// Number of characteristics with a running notification task
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.lock_subscriptions()
            .values()
            .filter(|s| s.is_running())
            .count()
    }

    /// Cancel every task and wait for them to finish
    pub async fn shutdown(&self) {
        let subscriptions: Vec<Subscription> = self
            .lock_subscriptions()
            .drain()
            .map(|(_, subscription)| subscription)
            .collect();

        let handles: Vec<JoinHandle<()>> = subscriptions
            .into_iter()
            .map(|subscription| {
                let _ = subscription.cancel.send(());
                subscription.handle
            })
            .collect();

        info!("Stopping {} notification task(s)", handles.len());
        join_all(handles).await;
    }

    fn lock_subscriptions(&self) -> std::sync::MutexGuard<'_, HashMap<CharacteristicId, Subscription>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for NotificationScheduler {
    fn drop(&mut self) {
        for (_, subscription) in self.lock_subscriptions().drain() {
            let _ = subscription.cancel.send(());
        }
    }
}

async fn notify_loop(
    id: CharacteristicId,
    engine: Arc<TelemetryEngine>,
    sink: Arc<dyn NotifySink>,
    cadence: Cadence,
    mut cancelled: oneshot::Receiver<()>,
) {
    if let Cadence::Fixed {
        interval,
        delay_first: true,
    } = cadence
    {
        tokio::select! {
            _ = &mut cancelled => return,
            () = sleep(interval) => {}
        }
    }

    let mut sent: u64 = 0;
    loop {
        let Some(frame) = engine.frame(id) else {
            return;
        };

        let started = Instant::now();
        let result = tokio::select! {
            _ = &mut cancelled => {
                debug!("{} notification task cancelled during send", id);
                return;
            }
            result = sink.notify(frame) => result,
        };
        if let Err(e) = result {
            warn!("{} notification failed after {} send(s), stopping: {}", id, sent, e);
            return;
        }
        sent += 1;
        debug!("{} notification #{} sent in {:?}", id, sent, started.elapsed());

        tokio::select! {
            _ = &mut cancelled => {
                debug!("{} notification task cancelled", id);
                return;
            }
            () = sleep(cadence.wait(&engine)) => {}
        }
    }
}
