use log::debug;

use crate::device::constants::FLAG_VALUE_FORMAT_U16;
use crate::device::types::HeartRateReading;
use crate::error::DecodeError;

const FLAGS_OFFSET: usize = 0;
const VALUE_OFFSET: usize = 1;

/// Decodes a Heart Rate Measurement notification.
///
/// Only the 8-bit value at offset 1 is read. The flags byte is not interpreted, so a peripheral sending a
/// 16-bit value yields its low byte.
pub fn decode_measurement(payload: &[u8]) -> Result<HeartRateReading, DecodeError> {
    let value = *payload.get(VALUE_OFFSET).ok_or(DecodeError::TooShort { len: payload.len() })?;

    if payload[FLAGS_OFFSET] & FLAG_VALUE_FORMAT_U16 != 0 {
        debug!("Measurement flags announce a 16-bit value; reading the low byte only");
    }

    Ok(HeartRateReading::new(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_value_after_flags() {
        assert_eq!(decode_measurement(&[0x00, 72]), Ok(HeartRateReading::new(72)));
    }

    #[test]
    fn flags_byte_is_ignored() {
        assert_eq!(decode_measurement(&[0x01, 128]), Ok(HeartRateReading::new(128)));
        assert_eq!(decode_measurement(&[0x16, 60, 0x10, 0x03]), Ok(HeartRateReading::new(60)));
    }

    #[test]
    fn short_payload_is_rejected() {
        assert_eq!(decode_measurement(&[]), Err(DecodeError::TooShort { len: 0 }));
        assert_eq!(decode_measurement(&[0x00]), Err(DecodeError::TooShort { len: 1 }));
    }
}
