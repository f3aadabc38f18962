use uuid::Uuid;

use crate::error::{LinkError, Result};

/// Heart Rate Measurement characteristic (0x2A37).
pub const HEART_RATE_MEASUREMENT_UUID: Uuid = Uuid::from_u128(0x00002a3700001000800000805f9b34fb);

/// A single heart rate reading in beats per minute.
pub type Measurement = u8;

/// Reads the heart rate out of a measurement notification.
///
/// Only the 8-bit layout is understood: the value is always taken from the
/// second byte and the flags byte is ignored, so sensors that send 16-bit
/// values are misread rather than rejected.
pub fn decode(frame: &[u8]) -> Result<Measurement> {
    match frame.get(1) {
        Some(&bpm) => Ok(bpm),
        None => Err(LinkError::MalformedFrame(frame.len())),
    }
}
