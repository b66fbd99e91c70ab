use bytes::{Bytes, BytesMut};

use crate::{codec::put, types::CharacteristicId};

/// Largest payload a PM5 characteristic notification carries
pub const MAX_NOTIFY_SIZE: usize = 20;

/// Force curve frames carry a single characteristic per curve
pub const FORCE_CURVE_CHARACTERISTIC_COUNT: u8 = 1;

/// 16-bit data words after the two header bytes of a force curve frame
pub const FORCE_CURVE_WORD_COUNT: u8 = 9;

/// Live telemetry values a frame can carry, already scaled to PM5 units
///
/// - `elapsed_cs`: elapsed time, 0.01 s per unit
/// - `distance_dm`: distance rowed, 0.1 m per unit
/// - `stroke_rate`: strokes per minute
/// - `split_pace_cs`: split/interval average pace, 0.01 s per 500 m
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sample {
    /// Elapsed time in centiseconds
    pub elapsed_cs: u64,
    /// Distance in decimeters
    pub distance_dm: u64,
    /// Stroke rate in strokes per minute
    pub stroke_rate: u64,
    /// Split pace in centiseconds per 500 m
    pub split_pace_cs: u64,
}

fn zeroed(id: CharacteristicId) -> BytesMut {
    // Every id passed here has a fixed layout
    BytesMut::zeroed(id.frame_len().unwrap_or(MAX_NOTIFY_SIZE))
}

/// Build a 'General Status' frame (0x0031, 19 bytes)
///
/// - Bytes 0-2: Elapsed time (0.01 s lsb) *
/// - Bytes 3-5: Distance (0.1 m lsb) *
/// - Byte 6: Workout type
/// - Byte 7: Interval type
/// - Byte 8: Workout state
/// - Byte 9: Rowing state
/// - Byte 10: Stroke state
/// - Bytes 11-13: Total work distance
/// - Bytes 14-16: Workout duration
/// - Byte 17: Workout duration type
/// - Byte 18: Drag factor
///
/// Only the fields marked `*` are populated.
#[must_use]
pub fn general_status(elapsed_cs: u64, distance_dm: u64) -> Bytes {
    let mut buf = zeroed(CharacteristicId::GeneralStatus);
    put(&mut buf, 0, elapsed_cs, 3);
    put(&mut buf, 3, distance_dm, 3);
    buf.freeze()
}

/// Build an 'Additional Status 1' frame (0x0032, 17 bytes)
///
/// - Bytes 0-2: Elapsed time (0.01 s lsb) *
/// - Bytes 3-4: Speed (0.001 m/s lsb)
/// - Byte 5: Stroke rate (strokes/min) *
/// - Byte 6: Heart rate (bpm, 255 = invalid)
/// - Bytes 7-8: Current pace
/// - Bytes 9-10: Average pace
/// - Bytes 11-12: Rest distance
/// - Bytes 13-15: Rest time
/// - Byte 16: Erg machine type
#[must_use]
pub fn additional_status_1(elapsed_cs: u64, stroke_rate: u64) -> Bytes {
    let mut buf = zeroed(CharacteristicId::AdditionalStatus1);
    put(&mut buf, 0, elapsed_cs, 3);
    put(&mut buf, 5, stroke_rate, 1);
    buf.freeze()
}

/// Build an 'Additional Status 2' frame (0x0033, 20 bytes)
///
/// - Bytes 0-2: Elapsed time (0.01 s lsb) *
/// - Byte 3: Interval count
/// - Bytes 4-5: Average power
/// - Bytes 6-7: Total calories
/// - Bytes 8-9: Split/interval average pace (0.01 s lsb) *
/// - Bytes 10-11: Split/interval average power
/// - Bytes 12-13: Split/interval average calories
/// - Bytes 14-16: Last split time
/// - Bytes 17-19: Last split distance
#[must_use]
pub fn additional_status_2(elapsed_cs: u64, split_pace_cs: u64) -> Bytes {
    let mut buf = zeroed(CharacteristicId::AdditionalStatus2);
    put(&mut buf, 0, elapsed_cs, 3);
    put(&mut buf, 8, split_pace_cs, 2);
    buf.freeze()
}

/// Build a 'Stroke Data' frame (0x0035, 20 bytes)
///
/// - Bytes 0-2: Elapsed time (0.01 s lsb) *
/// - Bytes 3-5: Distance (0.1 m lsb) *
/// - Byte 6: Drive length
/// - Byte 7: Drive time
/// - Bytes 8-9: Stroke recovery time
/// - Bytes 10-11: Stroke distance
/// - Bytes 12-13: Peak drive force
/// - Bytes 14-15: Average drive force
/// - Bytes 16-17: Work per stroke
/// - Bytes 18-19: Stroke count
#[must_use]
pub fn stroke_data(elapsed_cs: u64, distance_dm: u64) -> Bytes {
    let mut buf = zeroed(CharacteristicId::StrokeData);
    put(&mut buf, 0, elapsed_cs, 3);
    put(&mut buf, 3, distance_dm, 3);
    buf.freeze()
}

/// Build an 'Additional Stroke Data' frame (0x0036, 15 bytes)
///
/// Bytes 0-2 carry the elapsed time; stroke power, calories, stroke count
/// and the projected work time/distance stay zero.
#[must_use]
pub fn additional_stroke_data(elapsed_cs: u64) -> Bytes {
    let mut buf = zeroed(CharacteristicId::AdditionalStrokeData);
    put(&mut buf, 0, elapsed_cs, 3);
    buf.freeze()
}

/// Build a 'Split/Interval Data' frame (0x0037, 18 bytes)
///
/// - Bytes 0-2: Elapsed time (0.01 s lsb) *
/// - Bytes 3-5: Distance (0.1 m lsb) *
/// - Bytes 6-8: Split/interval time
/// - Bytes 9-11: Split/interval distance
/// - Bytes 12-13: Interval rest time
/// - Bytes 14-15: Interval rest distance
/// - Byte 16: Split/interval type
/// - Byte 17: Split/interval number
#[must_use]
pub fn split_interval_data(elapsed_cs: u64, distance_dm: u64) -> Bytes {
    let mut buf = zeroed(CharacteristicId::SplitIntervalData);
    put(&mut buf, 0, elapsed_cs, 3);
    put(&mut buf, 3, distance_dm, 3);
    buf.freeze()
}

/// Build an 'Additional Split/Interval Data' frame (0x0038, 19 bytes)
///
/// - Bytes 0-2: Elapsed time (0.01 s lsb) *
/// - Byte 3: Split/interval average stroke rate *
/// - Byte 4: Split/interval work heart rate
/// - Byte 5: Split/interval rest heart rate
/// - Bytes 6-7: Split/interval average pace (0.01 s lsb) *
/// - Bytes 8-9: Split/interval total calories
/// - Bytes 10-11: Split/interval average calories
/// - Bytes 12-13: Split/interval speed
/// - Bytes 14-15: Split/interval power
/// - Byte 16: Split average drag factor
/// - Byte 17: Split/interval number
/// - Byte 18: Erg machine type
#[must_use]
pub fn additional_split_interval_data(elapsed_cs: u64, stroke_rate: u64, split_pace_cs: u64) -> Bytes {
    let mut buf = zeroed(CharacteristicId::AdditionalSplitIntervalData);
    put(&mut buf, 0, elapsed_cs, 3);
    put(&mut buf, 3, stroke_rate, 1);
    put(&mut buf, 6, split_pace_cs, 2);
    buf.freeze()
}

/// Build an 'End of Workout Summary' frame (0x0039, 20 bytes)
///
/// - Bytes 0-1: Log entry date
/// - Bytes 2-3: Log entry time
/// - Bytes 4-6: Elapsed time (0.01 s lsb) *
/// - Bytes 7-9: Distance (0.1 m lsb) *
/// - Byte 10: Average stroke rate *
/// - Byte 11: Ending heart rate
/// - Byte 12: Average heart rate
/// - Byte 13: Minimum heart rate
/// - Byte 14: Maximum heart rate
/// - Byte 15: Drag factor average
/// - Byte 16: Recovery heart rate
/// - Byte 17: Workout type
/// - Bytes 18-19: Average pace (0.01 s lsb) *
#[must_use]
pub fn workout_summary(sample: &Sample) -> Bytes {
    let mut buf = zeroed(CharacteristicId::WorkoutSummary);
    put(&mut buf, 4, sample.elapsed_cs, 3);
    put(&mut buf, 7, sample.distance_dm, 3);
    put(&mut buf, 10, sample.stroke_rate, 1);
    put(&mut buf, 18, sample.split_pace_cs, 2);
    buf.freeze()
}

/// Build an 'Additional End of Workout Summary' frame (0x003A, 19 bytes)
///
/// None of its fields (log date/time, split sizes, calories, watts, rest
/// totals) are emulated, so the frame is all zero.
#[must_use]
pub fn additional_workout_summary() -> Bytes {
    zeroed(CharacteristicId::AdditionalWorkoutSummary).freeze()
}

/// Build a 'Heart Rate Belt Info' frame (0x003B, 6 bytes)
///
/// Manufacturer id, device type and belt id are zero: no belt is paired.
#[must_use]
pub fn heart_rate_belt_info() -> Bytes {
    zeroed(CharacteristicId::HeartRateBeltInfo).freeze()
}

/// Build a 'Force Curve Data' frame (0x003D, 20 bytes)
///
/// - Byte 0: MS nibble = characteristic count, LS nibble = word count
/// - Byte 1: Sequence number
/// - Bytes 2-19: Force curve words (left zero)
#[must_use]
pub fn force_curve_data(sequence: u8) -> Bytes {
    let mut buf = zeroed(CharacteristicId::ForceCurveData);
    buf[0] = (FORCE_CURVE_CHARACTERISTIC_COUNT << 4) | FORCE_CURVE_WORD_COUNT;
    buf[1] = sequence;
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ELAPSED: u64 = 0x0A_0B0C;
    const DISTANCE: u64 = 0x01_0203;

    #[test]
    fn test_general_status_layout() {
        let frame = general_status(ELAPSED, DISTANCE);
        let mut expected = [0u8; 19];
        expected[..6].copy_from_slice(&[0x0C, 0x0B, 0x0A, 0x03, 0x02, 0x01]);
        assert_eq!(&frame[..], &expected);
    }

    #[test]
    fn test_additional_status_1_layout() {
        let frame = additional_status_1(ELAPSED, 27);
        let mut expected = [0u8; 17];
        expected[..3].copy_from_slice(&[0x0C, 0x0B, 0x0A]);
        expected[5] = 27;
        assert_eq!(&frame[..], &expected);
    }

    #[test]
    fn test_additional_status_2_layout() {
        let frame = additional_status_2(ELAPSED, 12000);
        let mut expected = [0u8; 20];
        expected[..3].copy_from_slice(&[0x0C, 0x0B, 0x0A]);
        expected[8] = 0xE0;
        expected[9] = 0x2E;
        assert_eq!(&frame[..], &expected);
    }

    #[test]
    fn test_stroke_data_layouts() {
        let frame = stroke_data(ELAPSED, DISTANCE);
        let mut expected = [0u8; 20];
        expected[..6].copy_from_slice(&[0x0C, 0x0B, 0x0A, 0x03, 0x02, 0x01]);
        assert_eq!(&frame[..], &expected);

        let frame = additional_stroke_data(ELAPSED);
        let mut expected = [0u8; 15];
        expected[..3].copy_from_slice(&[0x0C, 0x0B, 0x0A]);
        assert_eq!(&frame[..], &expected);
    }

    #[test]
    fn test_split_interval_layouts() {
        let frame = split_interval_data(ELAPSED, DISTANCE);
        let mut expected = [0u8; 18];
        expected[..6].copy_from_slice(&[0x0C, 0x0B, 0x0A, 0x03, 0x02, 0x01]);
        assert_eq!(&frame[..], &expected);

        let frame = additional_split_interval_data(ELAPSED, 26, 12500);
        let mut expected = [0u8; 19];
        expected[..3].copy_from_slice(&[0x0C, 0x0B, 0x0A]);
        expected[3] = 26;
        // 12500 = 0x30D4
        expected[6] = 0xD4;
        expected[7] = 0x30;
        assert_eq!(&frame[..], &expected);
    }

    #[test]
    fn test_workout_summary_layouts() {
        let sample = Sample {
            elapsed_cs: ELAPSED,
            distance_dm: DISTANCE,
            stroke_rate: 28,
            split_pace_cs: 12900,
        };
        let frame = workout_summary(&sample);
        let mut expected = [0u8; 20];
        expected[4..10].copy_from_slice(&[0x0C, 0x0B, 0x0A, 0x03, 0x02, 0x01]);
        expected[10] = 28;
        // 12900 = 0x3264
        expected[18] = 0x64;
        expected[19] = 0x32;
        assert_eq!(&frame[..], &expected);

        assert_eq!(&additional_workout_summary()[..], &[0u8; 19]);
    }

    #[test]
    fn test_heart_rate_belt_info_is_empty() {
        assert_eq!(&heart_rate_belt_info()[..], &[0u8; 6]);
    }

    #[test]
    fn test_force_curve_header() {
        let frame = force_curve_data(7);
        assert_eq!(frame.len(), 20);
        assert_eq!(frame[0], 0x19);
        assert_eq!(frame[1], 7);
        assert!(frame[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_fields_wrap_at_width() {
        // 2^24 centiseconds rolls over to zero
        let frame = general_status(0x0100_0005, 0);
        assert_eq!(&frame[..3], &[0x05, 0x00, 0x00]);
    }
}
