use btleplug::api::bleuuid::uuid_from_u16;
use uuid::Uuid;

/**
 * How often (milliseconds) to poll the adapter for newly discovered peripherals while scanning.
 */
pub const POLL_DELAY: u64 = 100;

/**
 * How long (milliseconds) to scan for a heart rate peripheral before giving up, unless configured otherwise.
 */
pub const DEFAULT_SCAN_TIMEOUT: u64 = 10_000;

/**
 * Identifier of the standard Heart Rate GATT service.
 */
pub const HEART_RATE_SERVICE: &str = "heart_rate";

/**
 * Identifier of the Heart Rate Measurement characteristic (notify only).
 */
pub const HEART_RATE_MEASUREMENT: &str = "heart_rate_measurement";

const HEART_RATE_SERVICE_UUID16: u16 = 0x180D;
const HEART_RATE_MEASUREMENT_UUID16: u16 = 0x2A37;

/**
 * Heart Rate Measurement flags, bit 0: the value is an u16 instead of an u8.
 */
pub const FLAG_VALUE_FORMAT_U16: u8 = 0x01;

pub fn make_heart_rate_service_uuid() -> Uuid {
    uuid_from_u16(HEART_RATE_SERVICE_UUID16)
}

pub fn make_heart_rate_measurement_uuid() -> Uuid {
    uuid_from_u16(HEART_RATE_MEASUREMENT_UUID16)
}

/// Maps a GATT identifier to its UUID. Accepts the standard names used by this crate or a full UUID string.
pub fn resolve_uuid(id: &str) -> Option<Uuid> {
    match id {
        HEART_RATE_SERVICE => Some(make_heart_rate_service_uuid()),
        HEART_RATE_MEASUREMENT => Some(make_heart_rate_measurement_uuid()),
        other => Uuid::parse_str(other).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_names_resolve_to_sig_uuids() {
        assert_eq!(
            resolve_uuid(HEART_RATE_SERVICE),
            Some(Uuid::parse_str("0000180d-0000-1000-8000-00805f9b34fb").unwrap())
        );
        assert_eq!(
            resolve_uuid(HEART_RATE_MEASUREMENT),
            Some(Uuid::parse_str("00002a37-0000-1000-8000-00805f9b34fb").unwrap())
        );
    }

    #[test]
    fn literal_uuids_pass_through() {
        let id = "bc2f4cc6-aaef-4351-9034-d66268e328f0";
        assert_eq!(resolve_uuid(id), Some(Uuid::parse_str(id).unwrap()));
        assert_eq!(resolve_uuid("battery_level_typo"), None);
    }
}
