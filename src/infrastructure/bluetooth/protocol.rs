//! Smartwatch GATT Protocol
//!
//! Well-known service/characteristic identifiers and the payload decoders
//! for the two telemetry characteristics the driver subscribes to. Pure
//! byte-level code, no I/O.

use crate::domain::measurement::Measurement;
use crate::error::DecodeError;
use btleplug::api::bleuuid::uuid_from_u16;
use uuid::Uuid;

/// Heart Rate Service (assigned number 0x180D)
pub const HEART_RATE_SERVICE: Uuid = uuid_from_u16(0x180D);

/// Heart Rate Measurement characteristic (0x2A37)
pub const HEART_RATE_MEASUREMENT: Uuid = uuid_from_u16(0x2A37);

/// Health Thermometer Service (0x1809)
pub const HEALTH_THERMOMETER_SERVICE: Uuid = uuid_from_u16(0x1809);

/// Temperature Measurement characteristic (0x2A1C)
pub const TEMPERATURE_MEASUREMENT: Uuid = uuid_from_u16(0x2A1C);

/// Heart Rate Measurement flags byte, bit 0: value is u16 LE instead of u8.
const HR_FLAG_RATE_16BIT: u8 = 0x01;

// The remaining flag bits (sensor contact 0x02/0x04, energy expended 0x08,
// RR intervals 0x10) gate trailing fields this driver does not consume.
// Their presence is tolerated; the fields they gate are never parsed.

/// Decode a notification payload for a subscribed characteristic.
pub fn decode(characteristic: Uuid, payload: &[u8]) -> Result<Measurement, DecodeError> {
    if characteristic == HEART_RATE_MEASUREMENT {
        decode_heart_rate(payload)
    } else if characteristic == TEMPERATURE_MEASUREMENT {
        decode_temperature(payload)
    } else {
        Err(DecodeError::UnknownCharacteristic(characteristic))
    }
}

/// Heart Rate Measurement layout:
///
/// ```text
/// [0]    : flags byte
/// [1]    : heart rate (u8, bpm)           when flags bit 0 clear
/// [1-2]  : heart rate (u16 LE, bpm)       when flags bit 0 set
/// [3..]  : optional energy-expended / RR-interval fields (ignored)
/// ```
fn decode_heart_rate(payload: &[u8]) -> Result<Measurement, DecodeError> {
    if payload.len() < 2 {
        return Err(DecodeError::Truncated {
            got: payload.len(),
            need: 2,
        });
    }

    let flags = payload[0];
    let bpm = if flags & HR_FLAG_RATE_16BIT != 0 {
        if payload.len() < 3 {
            return Err(DecodeError::Truncated {
                got: payload.len(),
                need: 3,
            });
        }
        u16::from_le_bytes([payload[1], payload[2]])
    } else {
        u16::from(payload[1])
    };

    Ok(Measurement::HeartRate(bpm))
}

/// Temperature Measurement layout:
///
/// ```text
/// [0]    : flags byte (ignored)
/// [1-4]  : temperature in Celsius (IEEE-754 f32, little-endian)
/// ```
///
/// The Celsius value is converted to Fahrenheit before it leaves the codec.
fn decode_temperature(payload: &[u8]) -> Result<Measurement, DecodeError> {
    if payload.len() < 5 {
        return Err(DecodeError::Truncated {
            got: payload.len(),
            need: 5,
        });
    }

    let celsius = f32::from_le_bytes([payload[1], payload[2], payload[3], payload[4]]);
    let fahrenheit = celsius * 9.0 / 5.0 + 32.0;

    Ok(Measurement::TemperatureF(fahrenheit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heart_rate_8bit() {
        let m = decode(HEART_RATE_MEASUREMENT, &[0x00, 0x48]).unwrap();
        assert_eq!(m, Measurement::HeartRate(72));
    }

    #[test]
    fn test_heart_rate_16bit() {
        let m = decode(HEART_RATE_MEASUREMENT, &[0x01, 0x48, 0x01]).unwrap();
        assert_eq!(m, Measurement::HeartRate(0x0148));
    }

    #[test]
    fn test_heart_rate_ignores_unrelated_flags_and_trailing_fields() {
        // Sensor contact + energy expended flags set, trailing bytes present.
        let m = decode(HEART_RATE_MEASUREMENT, &[0x0E, 0x55, 0x12, 0x34]).unwrap();
        assert_eq!(m, Measurement::HeartRate(0x55));
    }

    #[test]
    fn test_heart_rate_truncated() {
        assert_eq!(
            decode(HEART_RATE_MEASUREMENT, &[0x00]),
            Err(DecodeError::Truncated { got: 1, need: 2 })
        );
        // Flags promise a 16-bit value but only one value byte follows.
        assert_eq!(
            decode(HEART_RATE_MEASUREMENT, &[0x01, 0x48]),
            Err(DecodeError::Truncated { got: 2, need: 3 })
        );
        assert_eq!(
            decode(HEART_RATE_MEASUREMENT, &[]),
            Err(DecodeError::Truncated { got: 0, need: 2 })
        );
    }

    #[test]
    fn test_temperature_37c_is_98_6f() {
        let mut payload = vec![0x00];
        payload.extend_from_slice(&37.0f32.to_le_bytes());
        assert_eq!(payload[1..], [0x00, 0x00, 0x14, 0x42]);

        let m = decode(TEMPERATURE_MEASUREMENT, &payload).unwrap();
        match m {
            Measurement::TemperatureF(f) => assert!((f - 98.6).abs() < 0.05),
            other => panic!("unexpected measurement: {:?}", other),
        }
    }

    #[test]
    fn test_temperature_freezing_point() {
        let mut payload = vec![0x00];
        payload.extend_from_slice(&0.0f32.to_le_bytes());
        let m = decode(TEMPERATURE_MEASUREMENT, &payload).unwrap();
        assert_eq!(m, Measurement::TemperatureF(32.0));
    }

    #[test]
    fn test_temperature_truncated() {
        assert_eq!(
            decode(TEMPERATURE_MEASUREMENT, &[0x00, 0x00, 0x00, 0x14]),
            Err(DecodeError::Truncated { got: 4, need: 5 })
        );
    }

    #[test]
    fn test_unknown_characteristic() {
        let battery_level = uuid_from_u16(0x2A19);
        assert_eq!(
            decode(battery_level, &[0x64]),
            Err(DecodeError::UnknownCharacteristic(battery_level))
        );
    }
}
