use bytes::Bytes;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{
    sync::{
        atomic::{AtomicU8, Ordering},
        Mutex, PoisonError,
    },
    time::Duration,
};
use tokio::time::Instant;
use tracing::debug;

use crate::{
    codec::encode,
    protocol::{self, Sample},
    types::{CharacteristicId, EmulatorConfig, StatusRate},
};

/// Simulated split pace range, 2:00 to 2:09 per 500 m in centiseconds
const SPLIT_PACE_RANGE_CS: std::ops::Range<u64> = 12_000..12_900;

/// Milliseconds per centisecond
const MILLISECONDS_PER_CENTISECOND: u128 = 10;

/// Decimeters per meter
const DECIMETERS_PER_METER: f64 = 10.0;

/// Boat speed of a 2:00/500 m split, in meters per second
pub const TWO_MINUTE_SPLIT_SPEED: f64 = 4.16;

/// Rowing session state shared by every characteristic
///
/// The start instant never changes; the status rate is the only mutable
/// field and is last-write-wins.
#[derive(Debug)]
pub struct Session {
    start_time: Instant,
    status_rate: AtomicU8,
}

impl Session {
    /// Start a session now with the given status-rate byte
    #[must_use]
    pub fn new(status_rate: u8) -> Self {
        Self::starting_at(Instant::now(), status_rate)
    }

    /// Start a session at a specific instant
    #[must_use]
    pub const fn starting_at(start_time: Instant, status_rate: u8) -> Self {
        Self {
            start_time,
            status_rate: AtomicU8::new(status_rate),
        }
    }

    /// Instant the session started
    #[must_use]
    pub const fn start_time(&self) -> Instant {
        self.start_time
    }

    /// Time elapsed since the session started
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Produces PM5 telemetry frames from a synthetic rowing session
///
/// Elapsed time and distance are pure functions of the session clock: the
/// simulated rower holds a steady 2:00 split from the moment the engine is
/// created. Split pace and stroke rate are re-rolled on every call from a
/// PRNG owned by the engine, so two engines never share a random stream and
/// a seeded engine is fully reproducible.
///
/// # Examples
///
/// ```
/// use pm5_emulator::{CharacteristicId, TelemetryEngine};
///
/// let engine = TelemetryEngine::with_seed(1, 7);
/// let frame = engine.frame(CharacteristicId::GeneralStatus).unwrap();
/// assert_eq!(frame.len(), 19);
/// assert_eq!(engine.status_delay_millis(), 500);
/// ```
#[derive(Debug)]
pub struct TelemetryEngine {
    session: Session,
    rng: Mutex<StdRng>,
    force_curve_sequence: AtomicU8,
}

impl TelemetryEngine {
    /// Create an engine with an entropy-seeded PRNG
    #[must_use]
    pub fn new(status_rate: u8) -> Self {
        Self::from_parts(Session::new(status_rate), StdRng::from_entropy())
    }

    /// Create an engine with a reproducible PRNG
    #[must_use]
    pub fn with_seed(status_rate: u8, seed: u64) -> Self {
        Self::from_parts(Session::new(status_rate), StdRng::seed_from_u64(seed))
    }

    /// Create an engine from emulator configuration
    #[must_use]
    pub fn from_config(config: &EmulatorConfig) -> Self {
        match config.rng_seed {
            Some(seed) => Self::with_seed(config.status_rate, seed),
            None => Self::new(config.status_rate),
        }
    }

    /// Create an engine over an existing session
    #[must_use]
    pub fn from_parts(session: Session, rng: StdRng) -> Self {
        Self {
            session,
            rng: Mutex::new(rng),
            force_curve_sequence: AtomicU8::new(0),
        }
    }

    /// The session this engine reports on
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Current status-rate byte
    #[must_use]
    pub fn status_rate(&self) -> u8 {
        self.session.status_rate.load(Ordering::Relaxed)
    }

    /// Replace the status-rate byte; running status tasks pick it up on their next tick
    pub fn set_status_rate(&self, rate: u8) {
        self.session.status_rate.store(rate, Ordering::Relaxed);
        debug!("Status rate set to {}", StatusRate::from(rate));
    }

    /// Delay between general/additional status notifications in milliseconds
    ///
    /// 0 → 1000, 1 → 500, 2 → 250, 3 → 100; any other stored value → 500.
    #[must_use]
    pub fn status_delay_millis(&self) -> u64 {
        StatusRate::from(self.status_rate()).delay_millis()
    }

    /// [`status_delay_millis`](Self::status_delay_millis) as a [`Duration`]
    #[must_use]
    pub fn status_delay(&self) -> Duration {
        Duration::from_millis(self.status_delay_millis())
    }

    /// Elapsed session time in centiseconds
    #[must_use]
    pub fn elapsed_centiseconds(&self) -> u64 {
        centiseconds(self.session.elapsed())
    }

    /// Simulated distance in decimeters at a constant 2:00 split
    #[must_use]
    pub fn distance_decimeters(&self) -> u64 {
        decimeters_rowed(self.session.elapsed())
    }

    /// Random split pace in centiseconds, uniform over 2:00.00 up to (not including) 2:09.00
    #[must_use]
    pub fn split_pace_centiseconds(&self) -> u64 {
        self.with_rng(|rng| rng.gen_range(SPLIT_PACE_RANGE_CS))
    }

    /// Random stroke rate in strokes per minute, 25 through 29
    #[must_use]
    pub fn stroke_rate_spm(&self) -> u64 {
        25 + self.with_rng(|rng| rng.gen_range(0..5u64))
    }

    /// Elapsed time field: `[lo, mid, hi]`, 0.01 s per unit
    #[must_use]
    pub fn elapsed_time(&self) -> Vec<u8> {
        encode(self.elapsed_centiseconds(), 3)
    }

    /// Distance field: `[lo, mid, hi]`, 0.1 m per unit
    #[must_use]
    pub fn distance(&self) -> Vec<u8> {
        encode(self.distance_decimeters(), 3)
    }

    /// Split pace field: `[lo, hi]`, 0.01 s per unit
    #[must_use]
    pub fn split_pace(&self) -> Vec<u8> {
        encode(self.split_pace_centiseconds(), 2)
    }

    /// Stroke rate field: one byte, strokes per minute
    #[must_use]
    pub fn stroke_rate(&self) -> Vec<u8> {
        encode(self.stroke_rate_spm(), 1)
    }

    /// Snapshot every live value at once
    ///
    /// Elapsed time and distance are derived from a single clock reading.
    #[must_use]
    pub fn sample(&self) -> Sample {
        let elapsed = self.session.elapsed();
        Sample {
            elapsed_cs: centiseconds(elapsed),
            distance_dm: decimeters_rowed(elapsed),
            stroke_rate: self.stroke_rate_spm(),
            split_pace_cs: self.split_pace_centiseconds(),
        }
    }

    /// Build the current frame for a characteristic
    ///
    /// Returns `None` for the service declaration, the status-rate control
    /// characteristic and the replay-fed multiplexed characteristic.
    #[must_use]
    pub fn frame(&self, id: CharacteristicId) -> Option<Bytes> {
        let frame = match id {
            CharacteristicId::GeneralStatus => {
                protocol::general_status(self.elapsed_centiseconds(), self.distance_decimeters())
            }
            CharacteristicId::AdditionalStatus1 => {
                protocol::additional_status_1(self.elapsed_centiseconds(), self.stroke_rate_spm())
            }
            CharacteristicId::AdditionalStatus2 => protocol::additional_status_2(
                self.elapsed_centiseconds(),
                self.split_pace_centiseconds(),
            ),
            CharacteristicId::StrokeData => {
                protocol::stroke_data(self.elapsed_centiseconds(), self.distance_decimeters())
            }
            CharacteristicId::AdditionalStrokeData => {
                protocol::additional_stroke_data(self.elapsed_centiseconds())
            }
            CharacteristicId::SplitIntervalData => protocol::split_interval_data(
                self.elapsed_centiseconds(),
                self.distance_decimeters(),
            ),
            CharacteristicId::AdditionalSplitIntervalData => {
                protocol::additional_split_interval_data(
                    self.elapsed_centiseconds(),
                    self.stroke_rate_spm(),
                    self.split_pace_centiseconds(),
                )
            }
            CharacteristicId::WorkoutSummary => protocol::workout_summary(&self.sample()),
            CharacteristicId::AdditionalWorkoutSummary => protocol::additional_workout_summary(),
            CharacteristicId::HeartRateBeltInfo => protocol::heart_rate_belt_info(),
            CharacteristicId::ForceCurveData => {
                let sequence = self.force_curve_sequence.fetch_add(1, Ordering::Relaxed);
                protocol::force_curve_data(sequence)
            }
            CharacteristicId::RowingService
            | CharacteristicId::StatusRate
            | CharacteristicId::MultiplexedInfo => return None,
        };
        Some(frame)
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut rng)
    }
}

fn centiseconds(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis() / MILLISECONDS_PER_CENTISECOND).unwrap_or(u64::MAX)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn decimeters_rowed(elapsed: Duration) -> u64 {
    (elapsed.as_secs_f64() * TWO_MINUTE_SPLIT_SPEED * DECIMETERS_PER_METER) as u64
}
