//! Decoded telemetry values.

/// The metrics the watch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    HeartRate,
    Temperature,
}

/// A single decoded measurement.
///
/// Heart rate is whole beats per minute; temperature is degrees Fahrenheit
/// (converted from the Celsius value on the wire).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measurement {
    HeartRate(u16),
    TemperatureF(f32),
}

impl Measurement {
    pub fn kind(&self) -> MetricKind {
        match self {
            Self::HeartRate(_) => MetricKind::HeartRate,
            Self::TemperatureF(_) => MetricKind::Temperature,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measurement_kind() {
        assert_eq!(Measurement::HeartRate(72).kind(), MetricKind::HeartRate);
        assert_eq!(
            Measurement::TemperatureF(98.6).kind(),
            MetricKind::Temperature
        );
    }
}
