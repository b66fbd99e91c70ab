use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, time::Duration};
use uuid::Uuid;

use crate::{
    error::{EmulatorError, Result},
    C2_BASE_UUID,
};

/// Characteristics of the Concept2 rowing service, keyed by their 16-bit code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum CharacteristicId {
    /// Rowing primary service
    RowingService = 0x0030,
    /// General status
    GeneralStatus = 0x0031,
    /// Additional status 1
    AdditionalStatus1 = 0x0032,
    /// Additional status 2
    AdditionalStatus2 = 0x0033,
    /// General/additional status sample rate (read/write)
    StatusRate = 0x0034,
    /// Stroke data
    StrokeData = 0x0035,
    /// Additional stroke data
    AdditionalStrokeData = 0x0036,
    /// Split/interval data
    SplitIntervalData = 0x0037,
    /// Additional split/interval data
    AdditionalSplitIntervalData = 0x0038,
    /// End of workout summary data
    WorkoutSummary = 0x0039,
    /// Additional end of workout summary data
    AdditionalWorkoutSummary = 0x003A,
    /// Heart rate belt information
    HeartRateBeltInfo = 0x003B,
    /// Force curve data
    ForceCurveData = 0x003D,
    /// Multiplexed information, fed from the replay log
    MultiplexedInfo = 0x0080,
}

impl CharacteristicId {
    /// Every characteristic registered under the rowing service, in code order
    pub const CHARACTERISTICS: [Self; 13] = [
        Self::GeneralStatus,
        Self::AdditionalStatus1,
        Self::AdditionalStatus2,
        Self::StatusRate,
        Self::StrokeData,
        Self::AdditionalStrokeData,
        Self::SplitIntervalData,
        Self::AdditionalSplitIntervalData,
        Self::WorkoutSummary,
        Self::AdditionalWorkoutSummary,
        Self::HeartRateBeltInfo,
        Self::ForceCurveData,
        Self::MultiplexedInfo,
    ];

    /// 16-bit code of this characteristic
    #[must_use]
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Convert from a 16-bit code
    #[must_use]
    pub const fn from_code(code: u16) -> Option<Self> {
        match code {
            0x0030 => Some(Self::RowingService),
            0x0031 => Some(Self::GeneralStatus),
            0x0032 => Some(Self::AdditionalStatus1),
            0x0033 => Some(Self::AdditionalStatus2),
            0x0034 => Some(Self::StatusRate),
            0x0035 => Some(Self::StrokeData),
            0x0036 => Some(Self::AdditionalStrokeData),
            0x0037 => Some(Self::SplitIntervalData),
            0x0038 => Some(Self::AdditionalSplitIntervalData),
            0x0039 => Some(Self::WorkoutSummary),
            0x003A => Some(Self::AdditionalWorkoutSummary),
            0x003B => Some(Self::HeartRateBeltInfo),
            0x003D => Some(Self::ForceCurveData),
            0x0080 => Some(Self::MultiplexedInfo),
            _ => None,
        }
    }

    /// Full 128-bit UUID under the Concept2 base UUID
    #[must_use]
    pub const fn uuid(self) -> Uuid {
        Uuid::from_u128(C2_BASE_UUID | ((self.code() as u128) << 96))
    }

    /// Fixed frame length produced for this characteristic, if it carries generated frames
    #[must_use]
    pub const fn frame_len(self) -> Option<usize> {
        match self {
            Self::GeneralStatus => Some(19),
            Self::AdditionalStatus1 => Some(17),
            Self::AdditionalStatus2
            | Self::StrokeData
            | Self::WorkoutSummary
            | Self::ForceCurveData => Some(20),
            Self::AdditionalStrokeData => Some(15),
            Self::SplitIntervalData => Some(18),
            Self::AdditionalSplitIntervalData | Self::AdditionalWorkoutSummary => Some(19),
            Self::HeartRateBeltInfo => Some(6),
            Self::RowingService | Self::StatusRate | Self::MultiplexedInfo => None,
        }
    }

    /// Whether the notification cadence follows the status-rate setting
    #[must_use]
    pub const fn follows_status_rate(self) -> bool {
        matches!(
            self,
            Self::GeneralStatus | Self::AdditionalStatus1 | Self::AdditionalStatus2
        )
    }
}

impl TryFrom<u16> for CharacteristicId {
    type Error = EmulatorError;

    fn try_from(code: u16) -> Result<Self> {
        Self::from_code(code).ok_or(EmulatorError::UnknownCharacteristic { code })
    }
}

impl fmt::Display for CharacteristicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RowingService => "Rowing Service",
            Self::GeneralStatus => "General Status",
            Self::AdditionalStatus1 => "Additional Status 1",
            Self::AdditionalStatus2 => "Additional Status 2",
            Self::StatusRate => "Status Sample Rate",
            Self::StrokeData => "Stroke Data",
            Self::AdditionalStrokeData => "Additional Stroke Data",
            Self::SplitIntervalData => "Split/Interval Data",
            Self::AdditionalSplitIntervalData => "Additional Split/Interval Data",
            Self::WorkoutSummary => "End of Workout Summary",
            Self::AdditionalWorkoutSummary => "Additional End of Workout Summary",
            Self::HeartRateBeltInfo => "Heart Rate Belt Info",
            Self::ForceCurveData => "Force Curve Data",
            Self::MultiplexedInfo => "Multiplexed Info",
        };
        write!(f, "{name} (0x{:04X})", self.code())
    }
}

/// General/additional status notification rate, as stored in characteristic 0x0034
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusRate {
    /// One notification per second
    Second,
    /// Every 500 ms, the device default
    #[default]
    Half,
    /// Every 250 ms
    Quarter,
    /// Every 100 ms
    Tenth,
    /// Any other value written by a client
    Other(u8),
}

impl StatusRate {
    /// Delay between status notifications in milliseconds
    ///
    /// Unknown values fall back to the 500 ms default.
    #[must_use]
    pub const fn delay_millis(self) -> u64 {
        match self {
            Self::Second => 1000,
            Self::Half | Self::Other(_) => 500,
            Self::Quarter => 250,
            Self::Tenth => 100,
        }
    }

    /// Raw byte as exposed on the status-rate characteristic
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Second => 0,
            Self::Half => 1,
            Self::Quarter => 2,
            Self::Tenth => 3,
            Self::Other(value) => value,
        }
    }
}

impl From<u8> for StatusRate {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Second,
            1 => Self::Half,
            2 => Self::Quarter,
            3 => Self::Tenth,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for StatusRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(value) => write!(f, "unknown rate {value} (500 ms)"),
            rate => write!(f, "{} ms", rate.delay_millis()),
        }
    }
}

/// Response code returned to the transport for a characteristic write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// The write was accepted
    Success,
}

/// Emulator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    /// Replay log notified on the multiplexed-info characteristic
    pub replay_log_path: PathBuf,
    /// Initial status-rate byte
    pub status_rate: u8,
    /// PRNG seed for reproducible pace and stroke-rate values, `None` for entropy
    pub rng_seed: Option<u64>,
    /// Minimum wait before each replayed notification in milliseconds
    pub min_replay_delay_ms: u64,
    /// Interval for stroke data and force curve notifications in milliseconds
    pub stroke_interval_ms: u64,
    /// Interval for split/interval notifications in milliseconds
    pub split_interval_ms: u64,
    /// Interval for heart rate belt info notifications in milliseconds
    pub belt_info_interval_ms: u64,
    /// Interval for end of workout summary notifications in milliseconds
    pub summary_interval_ms: u64,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            replay_log_path: PathBuf::from("replaylog.erg"),
            status_rate: 1,
            rng_seed: None,
            min_replay_delay_ms: 50,
            stroke_interval_ms: 1_000,
            split_interval_ms: 50_000,
            belt_info_interval_ms: 100_000,
            summary_interval_ms: 200_000,
        }
    }
}

impl EmulatorConfig {
    /// Minimum wait before each replayed notification
    #[must_use]
    pub const fn min_replay_delay(&self) -> Duration {
        Duration::from_millis(self.min_replay_delay_ms)
    }

    /// Fixed notification interval for characteristics that ignore the status rate
    ///
    /// Returns `None` for characteristics without a periodic frame.
    #[must_use]
    pub const fn fixed_interval(&self, id: CharacteristicId) -> Option<Duration> {
        let millis = match id {
            CharacteristicId::StrokeData
            | CharacteristicId::AdditionalStrokeData
            | CharacteristicId::ForceCurveData => self.stroke_interval_ms,
            CharacteristicId::SplitIntervalData
            | CharacteristicId::AdditionalSplitIntervalData => self.split_interval_ms,
            CharacteristicId::HeartRateBeltInfo => self.belt_info_interval_ms,
            CharacteristicId::WorkoutSummary | CharacteristicId::AdditionalWorkoutSummary => {
                self.summary_interval_ms
            }
            _ => return None,
        };
        Some(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_characteristic_codes_round_trip() {
        for id in CharacteristicId::CHARACTERISTICS {
            assert_eq!(CharacteristicId::from_code(id.code()), Some(id));
        }
        assert_eq!(CharacteristicId::from_code(0x003C), None);
        assert!(CharacteristicId::try_from(0x0081).is_err());
    }

    #[test]
    fn test_characteristic_uuid() {
        assert_eq!(
            CharacteristicId::RowingService.uuid(),
            Uuid::parse_str("CE060030-43E5-11E4-916C-0800200C9A66").unwrap()
        );
        assert_eq!(
            CharacteristicId::MultiplexedInfo.uuid(),
            Uuid::parse_str("CE060080-43E5-11E4-916C-0800200C9A66").unwrap()
        );
    }

    #[test]
    fn test_frame_lengths() {
        let expected = [
            (CharacteristicId::GeneralStatus, 19),
            (CharacteristicId::AdditionalStatus1, 17),
            (CharacteristicId::AdditionalStatus2, 20),
            (CharacteristicId::StrokeData, 20),
            (CharacteristicId::AdditionalStrokeData, 15),
            (CharacteristicId::SplitIntervalData, 18),
            (CharacteristicId::AdditionalSplitIntervalData, 19),
            (CharacteristicId::WorkoutSummary, 20),
            (CharacteristicId::AdditionalWorkoutSummary, 19),
            (CharacteristicId::ForceCurveData, 20),
            (CharacteristicId::HeartRateBeltInfo, 6),
        ];
        for (id, len) in expected {
            assert_eq!(id.frame_len(), Some(len), "{id}");
        }
        assert_eq!(CharacteristicId::StatusRate.frame_len(), None);
        assert_eq!(CharacteristicId::MultiplexedInfo.frame_len(), None);
    }

    #[test]
    fn test_status_rate_delays() {
        assert_eq!(StatusRate::from(0).delay_millis(), 1000);
        assert_eq!(StatusRate::from(1).delay_millis(), 500);
        assert_eq!(StatusRate::from(2).delay_millis(), 250);
        assert_eq!(StatusRate::from(3).delay_millis(), 100);
        assert_eq!(StatusRate::from(4).delay_millis(), 500);
        assert_eq!(StatusRate::from(255).delay_millis(), 500);
        assert_eq!(StatusRate::from(9).as_byte(), 9);
        assert_eq!(StatusRate::default(), StatusRate::Half);
    }

    #[test]
    fn test_config_defaults() {
        let config = EmulatorConfig::default();

        assert_eq!(config.replay_log_path, PathBuf::from("replaylog.erg"));
        assert_eq!(config.status_rate, 1);
        assert_eq!(config.rng_seed, None);
        assert_eq!(config.min_replay_delay_ms, 50);
        assert_eq!(
            config.fixed_interval(CharacteristicId::StrokeData),
            Some(Duration::from_millis(1_000))
        );
        assert_eq!(
            config.fixed_interval(CharacteristicId::SplitIntervalData),
            Some(Duration::from_millis(50_000))
        );
        assert_eq!(
            config.fixed_interval(CharacteristicId::HeartRateBeltInfo),
            Some(Duration::from_millis(100_000))
        );
        assert_eq!(
            config.fixed_interval(CharacteristicId::AdditionalWorkoutSummary),
            Some(Duration::from_millis(200_000))
        );
        assert_eq!(config.fixed_interval(CharacteristicId::GeneralStatus), None);
    }
}
