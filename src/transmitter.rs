//! Transmitter module - Calibration frame construction and submission
//!
//! Builds the self-describing message the compositor expects and hands it to
//! the notifier. Frame layout:
//!
//! ```text
//! [7-bit encoded u32: name byte count][name: UTF-8]
//! [i32 little-endian: N]
//! [N raw artifact bytes]
//! ```
//!
//! The string prefix matches .NET `BinaryWriter.Write(string)`, which is what
//! the receiving side reads with.

use bytes::{BufMut, Bytes, BytesMut};

use crate::contracts::CalibrationArtifact;
use crate::errors::{CalibrationError, Result};
use crate::notifier::ConnectionNotifier;

/// Width of the payload length field
const LENGTH_FIELD_SIZE: usize = 4;

/// Transmitter - Frames artifacts and submits them for broadcast
///
/// Stateless; every call builds a fresh buffer sized exactly once.
pub struct Transmitter;

impl Transmitter {
    /// Frame an arbitrary named payload
    ///
    /// # Arguments
    /// * `name` - Message name, written length-prefixed
    /// * `payload` - Raw bytes, written after the i32 length
    ///
    /// # Errors
    /// `FrameTooLarge` if the payload exceeds `i32::MAX` bytes,
    /// `NameTooLong` if the name byte count exceeds `i32::MAX`.
    pub fn frame_message(name: &str, payload: &[u8]) -> Result<Bytes> {
        let name_len = check_name_len(name.len())?;
        let payload_len = check_payload_len(payload.len())?;

        let mut frame = BytesMut::with_capacity(Self::frame_len(name, payload.len()));
        put_7bit_encoded(&mut frame, name_len);
        frame.put_slice(name.as_bytes());
        frame.put_i32_le(payload_len);
        frame.put_slice(payload);

        Ok(frame.freeze())
    }

    /// Frame the calibration artifact under its well-known name
    pub fn frame_calibration(artifact: &CalibrationArtifact) -> Result<Bytes> {
        Self::frame_message(crate::CALIBRATION_DATA_NAME, artifact.as_bytes())
    }

    /// Exact size of the frame for `name` and a payload of `payload_len` bytes
    pub fn frame_len(name: &str, payload_len: usize) -> usize {
        encoded_7bit_len(name.len() as u32) + name.len() + LENGTH_FIELD_SIZE + payload_len
    }

    /// Hand a complete frame to the notifier
    ///
    /// Always passes the full range (offset 0, length = frame size).
    /// Delivery failures belong to the notifier and are not reported here.
    ///
    /// # Returns
    /// Number of bytes submitted
    pub fn submit(notifier: &dyn ConnectionNotifier, frame: &[u8]) -> usize {
        notifier.broadcast(frame, 0, frame.len());
        frame.len()
    }
}

fn check_name_len(len: usize) -> Result<u32> {
    if len > i32::MAX as usize {
        return Err(CalibrationError::NameTooLong { len });
    }
    Ok(len as u32)
}

fn check_payload_len(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| CalibrationError::FrameTooLarge {
        size: len,
        max: crate::MAX_ARTIFACT_SIZE,
    })
}

/// Low 7 bits first, high bit set while more bytes follow
fn put_7bit_encoded(buf: &mut BytesMut, mut value: u32) {
    while value >= 0x80 {
        buf.put_u8((value as u8) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

fn encoded_7bit_len(mut value: u32) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: u32) -> Vec<u8> {
        let mut buf = BytesMut::new();
        put_7bit_encoded(&mut buf, value);
        buf.to_vec()
    }

    #[test]
    fn test_7bit_prefix() {
        assert_eq!(encode(0), vec![0x00]);
        assert_eq!(encode(15), vec![0x0F]);
        assert_eq!(encode(127), vec![0x7F]);
        assert_eq!(encode(128), vec![0x80, 0x01]);
        assert_eq!(encode(300), vec![0xAC, 0x02]);
        assert_eq!(encode(i32::MAX as u32), vec![0xFF, 0xFF, 0xFF, 0xFF, 0x07]);

        for value in [0, 127, 128, 16_383, 16_384, i32::MAX as u32] {
            assert_eq!(encoded_7bit_len(value), encode(value).len());
        }
    }

    #[test]
    fn test_calibration_frame_layout() {
        let artifact = CalibrationArtifact::from(vec![0x7B, 0x22, 0x61, 0x22, 0x3A, 0x31, 0x7D]);
        let frame = Transmitter::frame_calibration(&artifact).unwrap();

        let mut expected = vec![0x0F];
        expected.extend_from_slice(b"CalibrationData");
        expected.extend_from_slice(&7i32.to_le_bytes());
        expected.extend_from_slice(br#"{"a":1}"#);

        assert_eq!(frame.as_ref(), expected.as_slice());
        assert_eq!(frame.len(), 27);
        assert_eq!(frame.len(), Transmitter::frame_len(crate::CALIBRATION_DATA_NAME, 7));
    }

    #[test]
    fn test_empty_artifact_frame() {
        let frame = Transmitter::frame_calibration(&CalibrationArtifact::default()).unwrap();

        assert_eq!(frame.len(), 1 + 15 + 4);
        assert_eq!(&frame[16..20], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_name_prefix_counts_utf8_bytes() {
        let frame = Transmitter::frame_message("Kalibrierungsdatenä", &[1, 2]).unwrap();

        // 'ä' is two bytes in UTF-8
        assert_eq!(frame[0], 20);
        assert_eq!(frame.len(), Transmitter::frame_len("Kalibrierungsdatenä", 2));
    }

    #[test]
    fn test_long_name_uses_multibyte_prefix() {
        let name = "n".repeat(200);
        let frame = Transmitter::frame_message(&name, &[]).unwrap();

        assert_eq!(&frame[..2], &[0xC8, 0x01]);
        assert_eq!(frame.len(), 2 + 200 + 4);
    }

    #[test]
    fn test_payload_length_limit() {
        assert_eq!(check_payload_len(0).unwrap(), 0);
        assert_eq!(check_payload_len(i32::MAX as usize).unwrap(), i32::MAX);

        let err = check_payload_len(i32::MAX as usize + 1).unwrap_err();
        assert!(matches!(
            err,
            CalibrationError::FrameTooLarge { size, max }
                if size == i32::MAX as usize + 1 && max == crate::MAX_ARTIFACT_SIZE
        ));
    }

    #[test]
    fn test_name_length_limit() {
        assert!(check_name_len(15).is_ok());
        assert!(matches!(
            check_name_len(i32::MAX as usize + 1),
            Err(CalibrationError::NameTooLong { .. })
        ));
    }
}
