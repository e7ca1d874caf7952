use crate::protocol::error::{DecodeError, Result};
use std::fmt;
use tracing::debug;

/// Upper bound on the size of one framed message, terminator included
pub const MAX_MESSAGE_SIZE: usize = 128;

/// Line terminator closing every message on the wire
pub const TERMINATOR: &[u8; 2] = b"\r\n";

const MICROS_PER_SECOND: i64 = 1_000_000;

/// A point in time as `(seconds, microseconds)` since the Unix epoch.
///
/// `microseconds` is expected to be in `0..1_000_000`, but decoded values are
/// carried through as received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimestampMessage {
    pub seconds: i64,
    pub microseconds: i64,
}

impl TimestampMessage {
    pub fn new(seconds: i64, microseconds: i64) -> Self {
        Self {
            seconds,
            microseconds,
        }
    }

    /// Builds a normalized timestamp from a signed count of microseconds.
    pub fn from_micros(total: i128) -> Self {
        let per_second = i128::from(MICROS_PER_SECOND);
        let seconds = total.div_euclid(per_second);
        let microseconds = total.rem_euclid(per_second);
        Self {
            seconds: seconds.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64,
            microseconds: microseconds as i64,
        }
    }

    /// Total microseconds represented, without normalizing first.
    pub fn as_micros(&self) -> i128 {
        i128::from(self.seconds) * i128::from(MICROS_PER_SECOND) + i128::from(self.microseconds)
    }

    /// Returns this timestamp shifted by `delta_micros`, normalized.
    pub fn shifted_by_micros(&self, delta_micros: i128) -> Self {
        Self::from_micros(self.as_micros().saturating_add(delta_micros))
    }

    /// Encodes as `"<seconds>,<microseconds>\r\n"`.
    ///
    /// The longest possible encoding (two `i64::MIN` fields) is 43 bytes,
    /// well inside [`MAX_MESSAGE_SIZE`].
    pub fn encode(&self) -> Vec<u8> {
        let encoded = format!("{},{}\r\n", self.seconds, self.microseconds).into_bytes();
        debug_assert!(encoded.len() <= MAX_MESSAGE_SIZE);
        encoded
    }

    /// Decodes a line with the trailing terminator already removed.
    pub fn decode(line: &[u8]) -> Result<Self> {
        let comma = line
            .iter()
            .position(|&b| b == b',')
            .ok_or(DecodeError::MissingComma)?;
        let (seconds_field, rest) = line.split_at(comma);
        let micros_field = &rest[1..];

        let seconds =
            parse_field(seconds_field).ok_or_else(|| DecodeError::InvalidSeconds(lossy(seconds_field)))?;
        let microseconds = parse_field(micros_field)
            .ok_or_else(|| DecodeError::InvalidMicroseconds(lossy(micros_field)))?;

        debug!(seconds, microseconds, "Timestamp decoded successfully");
        Ok(Self::new(seconds, microseconds))
    }

    /// Decodes a complete frame as returned by the framer, terminator included.
    pub fn decode_frame(frame: &[u8]) -> Result<Self> {
        let line = frame.strip_suffix(TERMINATOR.as_slice()).unwrap_or(frame);
        Self::decode(line)
    }
}

impl fmt::Display for TimestampMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.seconds, self.microseconds)
    }
}

fn parse_field(field: &[u8]) -> Option<i64> {
    std::str::from_utf8(field).ok()?.parse().ok()
}

fn lossy(field: &[u8]) -> String {
    String::from_utf8_lossy(field).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_matches_wire_format() {
        let message = TimestampMessage::new(1_700_000_000, 250_000);
        assert_eq!(message.encode(), b"1700000000,250000\r\n".to_vec());
    }

    #[test]
    fn test_decode_frame_strips_terminator() {
        let decoded = TimestampMessage::decode_frame(b"1700000000,250000\r\n").unwrap();
        assert_eq!(decoded, TimestampMessage::new(1_700_000_000, 250_000));
    }

    #[test]
    fn test_decode_negative_fields() {
        let decoded = TimestampMessage::decode(b"-5,-20").unwrap();
        assert_eq!(decoded, TimestampMessage::new(-5, -20));
    }

    #[test]
    fn test_decode_passes_out_of_range_micros_through() {
        let decoded = TimestampMessage::decode(b"10,2500000").unwrap();
        assert_eq!(decoded.microseconds, 2_500_000);
    }

    #[test]
    fn test_decode_missing_comma() {
        assert_eq!(
            TimestampMessage::decode(b"1700000000"),
            Err(DecodeError::MissingComma)
        );
    }

    #[test]
    fn test_decode_invalid_seconds() {
        assert!(matches!(
            TimestampMessage::decode(b",250000"),
            Err(DecodeError::InvalidSeconds(_))
        ));
        assert!(matches!(
            TimestampMessage::decode(b"17x0,250000"),
            Err(DecodeError::InvalidSeconds(_))
        ));
        assert!(matches!(
            TimestampMessage::decode(b"99999999999999999999,1"),
            Err(DecodeError::InvalidSeconds(_))
        ));
    }

    #[test]
    fn test_decode_invalid_microseconds() {
        assert!(matches!(
            TimestampMessage::decode(b"1700000000,"),
            Err(DecodeError::InvalidMicroseconds(_))
        ));
        assert!(matches!(
            TimestampMessage::decode(b"1700000000,25,0"),
            Err(DecodeError::InvalidMicroseconds(_))
        ));
    }

    #[test]
    fn test_longest_encoding_fits() {
        let message = TimestampMessage::new(i64::MIN, i64::MIN);
        assert!(message.encode().len() <= MAX_MESSAGE_SIZE);
    }

    #[test]
    fn test_from_micros_normalizes_negative() {
        let ts = TimestampMessage::from_micros(-1);
        assert_eq!(ts, TimestampMessage::new(-1, 999_999));
    }

    #[test]
    fn test_shift_carries_into_seconds() {
        let ts = TimestampMessage::new(10, 900_000).shifted_by_micros(200_000);
        assert_eq!(ts, TimestampMessage::new(11, 100_000));
    }
}
