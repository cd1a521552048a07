//! Rolling telemetry windows.
//!
//! Holds the latest decoded value per metric plus a short FIFO history.
//! Written by the notification pump, read by whatever is displaying the
//! data, so the whole thing sits behind one mutex and readers only ever
//! get snapshots.

use crate::domain::measurement::Measurement;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// Maximum entries retained per metric.
pub const WINDOW_CAPACITY: usize = 12;

#[derive(Debug, Default)]
struct Window<T> {
    entries: VecDeque<(SystemTime, T)>,
}

impl<T: Copy> Window<T> {
    fn push(&mut self, at: SystemTime, value: T) {
        if self.entries.len() == WINDOW_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back((at, value));
    }

    fn latest(&self) -> Option<T> {
        self.entries.back().map(|&(_, value)| value)
    }

    fn snapshot(&self) -> Vec<(SystemTime, T)> {
        self.entries.iter().copied().collect()
    }
}

#[derive(Debug, Default)]
struct Windows {
    heart_rate: Window<u16>,
    temperature: Window<f32>,
}

/// Shared store of the most recent readings, one window per metric.
///
/// Cloning is cheap and clones observe the same windows.
#[derive(Debug, Clone, Default)]
pub struct TelemetryStore {
    inner: Arc<Mutex<Windows>>,
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a measurement stamped with the current time.
    pub fn record(&self, measurement: Measurement) {
        self.record_at(SystemTime::now(), measurement);
    }

    pub(crate) fn record_at(&self, at: SystemTime, measurement: Measurement) {
        let mut windows = self.inner.lock().unwrap();
        match measurement {
            Measurement::HeartRate(bpm) => windows.heart_rate.push(at, bpm),
            Measurement::TemperatureF(degrees) => windows.temperature.push(at, degrees),
        }
    }

    /// Most recent heart rate in bpm, if any has arrived.
    pub fn latest_heart_rate(&self) -> Option<u16> {
        self.inner.lock().unwrap().heart_rate.latest()
    }

    /// Most recent body temperature in degrees Fahrenheit, if any has arrived.
    pub fn latest_temperature_f(&self) -> Option<f32> {
        self.inner.lock().unwrap().temperature.latest()
    }

    /// Heart-rate window, oldest first.
    pub fn heart_rate_history(&self) -> Vec<(SystemTime, u16)> {
        self.inner.lock().unwrap().heart_rate.snapshot()
    }

    /// Temperature window, oldest first.
    pub fn temperature_history(&self) -> Vec<(SystemTime, f32)> {
        self.inner.lock().unwrap().temperature.snapshot()
    }

    /// Drop all recorded readings.
    pub fn clear(&self) {
        let mut windows = self.inner.lock().unwrap();
        windows.heart_rate.entries.clear();
        windows.temperature.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_empty_store() {
        let store = TelemetryStore::new();
        assert_eq!(store.latest_heart_rate(), None);
        assert_eq!(store.latest_temperature_f(), None);
        assert!(store.heart_rate_history().is_empty());
        assert!(store.temperature_history().is_empty());
    }

    #[test]
    fn test_latest_follows_insertion_order() {
        let store = TelemetryStore::new();
        let base = SystemTime::UNIX_EPOCH;
        store.record_at(base, Measurement::HeartRate(60));
        store.record_at(base + Duration::from_secs(1), Measurement::HeartRate(72));
        store.record_at(base, Measurement::TemperatureF(98.6));

        assert_eq!(store.latest_heart_rate(), Some(72));
        assert_eq!(store.latest_temperature_f(), Some(98.6));
    }

    #[test]
    fn test_window_evicts_oldest_beyond_capacity() {
        let store = TelemetryStore::new();
        let base = SystemTime::UNIX_EPOCH;
        for i in 0..20u16 {
            store.record_at(
                base + Duration::from_secs(i as u64),
                Measurement::HeartRate(60 + i),
            );
        }

        let history = store.heart_rate_history();
        assert_eq!(history.len(), WINDOW_CAPACITY);
        // Exactly the last 12, oldest first.
        let values: Vec<u16> = history.iter().map(|&(_, v)| v).collect();
        assert_eq!(values, (68..80).collect::<Vec<u16>>());
    }

    #[test]
    fn test_metrics_are_independent() {
        let store = TelemetryStore::new();
        store.record(Measurement::HeartRate(65));
        assert_eq!(store.latest_heart_rate(), Some(65));
        assert_eq!(store.latest_temperature_f(), None);
        assert!(store.temperature_history().is_empty());
    }

    #[test]
    fn test_clear_empties_both_windows() {
        let store = TelemetryStore::new();
        store.record(Measurement::HeartRate(70));
        store.record(Measurement::TemperatureF(97.9));
        store.clear();
        assert_eq!(store.latest_heart_rate(), None);
        assert_eq!(store.latest_temperature_f(), None);
    }
}
