//! The PM5 rowing service (0x0030) wired onto a GATT registry.
//!
//! Periodic characteristics are handed to the [`NotificationScheduler`],
//! the multiplexed-info characteristic replays the configured log, and the
//! status-rate characteristic reads and writes the engine's status byte.

use bytes::Bytes;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info, warn};

use crate::{
    engine::TelemetryEngine,
    replay::{ReplayHandle, ReplayPlayer},
    scheduler::{Cadence, NotificationScheduler},
    transport::{GattRegistry, NotifySink},
    types::{CharacteristicId, EmulatorConfig, WriteStatus},
};

/// Emulated PM5 rowing service
pub struct RowingService {
    config: EmulatorConfig,
    engine: Arc<TelemetryEngine>,
    scheduler: Arc<NotificationScheduler>,
    replay: Arc<Mutex<Option<ReplayHandle>>>,
}

impl RowingService {
    /// Create the service with a fresh session
    #[must_use]
    pub fn new(config: EmulatorConfig) -> Self {
        let engine = Arc::new(TelemetryEngine::from_config(&config));
        Self::with_engine(engine, config)
    }

    /// Create the service over an existing engine
    #[must_use]
    pub fn with_engine(engine: Arc<TelemetryEngine>, config: EmulatorConfig) -> Self {
        let scheduler = Arc::new(NotificationScheduler::new(
            Arc::clone(&engine),
            config.clone(),
        ));
        Self {
            config,
            engine,
            scheduler,
            replay: Arc::new(Mutex::new(None)),
        }
    }

    /// Engine producing this service's frames
    #[must_use]
    pub const fn engine(&self) -> &Arc<TelemetryEngine> {
        &self.engine
    }

    /// Scheduler running this service's periodic notifications
    #[must_use]
    pub const fn scheduler(&self) -> &Arc<NotificationScheduler> {
        &self.scheduler
    }

    /// Register every characteristic of the service with `registry`
    ///
    /// The replay log is checked once here. When it cannot be opened the
    /// error is logged and multiplexed-info subscribers get no
    /// notifications; all other characteristics work normally. Returns
    /// whether replay is enabled.
    pub async fn register<G: GattRegistry>(&self, registry: &mut G) -> bool {
        for id in CharacteristicId::CHARACTERISTICS {
            if Cadence::for_characteristic(id, &self.config).is_some() {
                self.register_periodic(registry, id);
            }
        }

        self.register_status_rate(registry);

        let replay_enabled = match ReplayPlayer::open(&self.config.replay_log_path).await {
            Ok(_) => true,
            Err(e) => {
                error!("Replay disabled: {}", e);
                false
            }
        };
        self.register_replay(registry, replay_enabled);

        info!(
            "Registered {} ({})",
            CharacteristicId::RowingService,
            CharacteristicId::RowingService.uuid()
        );
        replay_enabled
    }

    /// Whether a replay is currently running
    #[must_use]
    pub fn replay_active(&self) -> bool {
        self.replay
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the replay and every notification task
    pub async fn shutdown(&self) {
        let replay = self
            .replay
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut replay) = replay {
            replay.cancel();
            if let Err(e) = replay.join().await {
                warn!("Replay ended with error: {}", e);
            }
        }
        self.scheduler.shutdown().await;
    }

    fn register_periodic<G: GattRegistry>(&self, registry: &mut G, id: CharacteristicId) {
        let on_subscribe = Arc::clone(&self.scheduler);
        let on_unsubscribe = Arc::clone(&self.scheduler);
        registry.register_characteristic(
            id,
            Box::new(move |sink| {
                on_subscribe.subscribe(id, sink);
            }),
            Box::new(move || {
                on_unsubscribe.unsubscribe(id);
            }),
        );
    }

    fn register_status_rate<G: GattRegistry>(&self, registry: &mut G) {
        let engine = Arc::clone(&self.engine);
        registry.register_read_handler(
            CharacteristicId::StatusRate,
            Box::new(move || Bytes::copy_from_slice(&[engine.status_rate()])),
        );

        let engine = Arc::clone(&self.engine);
        registry.register_write_handler(
            CharacteristicId::StatusRate,
            Box::new(move |data| {
                if data.len() > 1 {
                    error!(
                        "Status rate write carries {} bytes, expected 1",
                        data.len()
                    );
                }
                match data.first() {
                    Some(&rate) => engine.set_status_rate(rate),
                    None => warn!("Ignoring empty status rate write"),
                }
                WriteStatus::Success
            }),
        );
    }

    fn register_replay<G: GattRegistry>(&self, registry: &mut G, enabled: bool) {
        let replay = Arc::clone(&self.replay);
        let path = self.config.replay_log_path.clone();
        let min_delay = self.config.min_replay_delay();
        let on_subscribe = move |sink: Arc<dyn NotifySink>| {
            if !enabled {
                warn!("No replay log, {} stays silent", CharacteristicId::MultiplexedInfo);
                return;
            }
            let handle = ReplayPlayer::spawn_file(path.clone(), min_delay, sink);
            let previous = replay
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .replace(handle);
            if previous.is_some() {
                info!("Restarting replay for new subscriber");
            }
        };

        let replay = Arc::clone(&self.replay);
        let on_unsubscribe = move || {
            let handle = replay.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some(mut handle) = handle {
                handle.cancel();
                info!("Replay stopped");
            }
        };

        registry.register_characteristic(
            CharacteristicId::MultiplexedInfo,
            Box::new(on_subscribe),
            Box::new(on_unsubscribe),
        );
    }
}
