//! Fixed-cadence analog sampler

use crate::hardware::AnalogSensor;
use crate::protocol::Reading;
use tracing::debug;

/// Default sampling cadence
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 5_000;

/// Emits at most one [`Reading`] per interval
///
/// After firing, the next deadline is measured from the tick that fired,
/// not from the previous deadline. Under scheduler jitter the cadence drifts
/// late but never skips or duplicates a sample.
#[derive(Debug, Clone)]
pub struct PeriodicSampler {
    interval_ms: u64,
    last_fire_millis: Option<u64>,
}

impl PeriodicSampler {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_fire_millis: None,
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub fn last_fire_millis(&self) -> Option<u64> {
        self.last_fire_millis
    }

    /// Whether a sample is due at `now`; the first tick is always due
    pub fn is_due(&self, now: u64) -> bool {
        match self.last_fire_millis {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.interval_ms,
        }
    }

    /// Sample `sensor` if the interval has elapsed
    pub fn tick<S: AnalogSensor + ?Sized>(&mut self, now: u64, sensor: &mut S) -> Option<Reading> {
        if !self.is_due(now) {
            return None;
        }

        self.last_fire_millis = Some(now);
        let value = sensor.read();
        debug!(value, timestamp_millis = now, "Sensor sampled");

        Some(Reading {
            value,
            timestamp_millis: now,
        })
    }
}

impl Default for PeriodicSampler {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_INTERVAL_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(i32);

    impl AnalogSensor for Counter {
        fn read(&mut self) -> i32 {
            self.0 += 1;
            self.0
        }
    }

    #[test]
    fn test_fires_on_first_tick_then_every_interval() {
        let mut sampler = PeriodicSampler::new(5_000);
        let mut sensor = Counter(0);

        let fired: Vec<u64> = (0..=6)
            .map(|i| i * 1_000)
            .filter(|&now| sampler.tick(now, &mut sensor).is_some())
            .collect();

        assert_eq!(fired, vec![0, 5_000]);
    }

    #[test]
    fn test_reading_carries_sensor_value_and_tick_time() {
        let mut sampler = PeriodicSampler::default();
        let mut sensor = Counter(41);

        let reading = sampler.tick(1_234, &mut sensor).unwrap();
        assert_eq!(reading.value, 42);
        assert_eq!(reading.timestamp_millis, 1_234);
    }

    #[test]
    fn test_anchor_moves_to_fire_time() {
        let mut sampler = PeriodicSampler::new(5_000);
        let mut sensor = Counter(0);

        assert!(sampler.tick(0, &mut sensor).is_some());
        // Late tick: fires at 5_300 and the next deadline is 10_300, not 10_000
        assert!(sampler.tick(5_300, &mut sensor).is_some());
        assert!(sampler.tick(10_000, &mut sensor).is_none());
        assert!(sampler.tick(10_299, &mut sensor).is_none());
        assert!(sampler.tick(10_300, &mut sensor).is_some());
        assert_eq!(sampler.last_fire_millis(), Some(10_300));
    }

    #[test]
    fn test_sensor_not_read_between_intervals() {
        let mut sampler = PeriodicSampler::new(100);
        let mut sensor = Counter(0);

        sampler.tick(0, &mut sensor);
        sampler.tick(50, &mut sensor);
        sampler.tick(99, &mut sensor);
        assert_eq!(sensor.0, 1);
    }

    #[test]
    fn test_clock_going_backwards_does_not_fire() {
        let mut sampler = PeriodicSampler::new(100);
        let mut sensor = Counter(0);

        sampler.tick(1_000, &mut sensor);
        assert!(sampler.tick(10, &mut sensor).is_none());
    }
}
