//! Signal sampler - RSSI averaging and distance estimation.
//!
//! Uses the log-distance path loss model:
//!
//! ```text
//! distance = 10 ^ ((measured_power - rssi) / (10 * N))
//! ```
//!
//! where `measured_power` is the expected RSSI at 1 m and `N` the
//! environmental factor. The result is saturated at the configured
//! ceiling so a vanishing signal reads as "far" instead of overflowing.

use heapless::Deque;

use crate::config::{MAX_DISTANCE_M, RSSI_WINDOW_LEN};

/// One tick's worth of sensor readings.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Sample {
    /// Connection RSSI (dBm).
    pub rssi: i8,
    /// Expected RSSI at 1 m (dBm).
    pub measured_power: i8,
    /// Battery voltage (V).
    pub voltage: f32,
    /// Monotonic timestamp (ms since boot).
    pub timestamp_ms: u64,
}

/// Approximate distance to the tag.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DistanceEstimate {
    pub meters: f32,
}

impl DistanceEstimate {
    pub fn within(&self, threshold_m: f32) -> bool {
        self.meters <= threshold_m
    }
}

/// Estimate distance from a sample using the default ceiling.
pub fn estimate_distance(sample: &Sample, measured_power: i8, n: f32) -> DistanceEstimate {
    DistanceEstimate {
        meters: distance_from_rssi(sample.rssi as f32, measured_power as f32, n, MAX_DISTANCE_M),
    }
}

/// Path loss model on a (possibly averaged) RSSI, saturated at `ceiling_m`.
pub fn distance_from_rssi(rssi: f32, measured_power: f32, n: f32, ceiling_m: f32) -> f32 {
    let exponent = (measured_power - rssi) / (10.0 * n);
    let meters = libm::powf(10.0, exponent);
    if meters.is_nan() {
        ceiling_m
    } else {
        meters.min(ceiling_m)
    }
}

/// RSSI at which the path loss model reads `meters`; inverse of
/// [`distance_from_rssi`] below the ceiling.
pub fn rssi_at_distance(meters: f32, measured_power: f32, n: f32) -> f32 {
    measured_power - 10.0 * n * libm::log10f(meters)
}

/// Sliding window over the most recent RSSI readings.
///
/// Single readings jump by several dB between connection events; the
/// mean of the last few is what the distance estimate is computed from.
#[derive(Clone, Debug, Default)]
pub struct RssiWindow {
    readings: Deque<i8, RSSI_WINDOW_LEN>,
}

impl RssiWindow {
    pub const fn new() -> Self {
        Self {
            readings: Deque::new(),
        }
    }

    /// Add a reading, evicting the oldest one when full.
    pub fn push(&mut self, rssi: i8) {
        if self.readings.is_full() {
            self.readings.pop_front();
        }
        let _ = self.readings.push_back(rssi);
    }

    /// Mean of the buffered readings, `None` when empty.
    pub fn mean(&self) -> Option<f32> {
        if self.readings.is_empty() {
            return None;
        }
        let sum: i32 = self.readings.iter().map(|&r| r as i32).sum();
        Some(sum as f32 / self.readings.len() as f32)
    }

    /// Mean rounded to whole dBm, the resolution the radio reports in.
    pub fn mean_dbm(&self) -> Option<i8> {
        self.mean().map(|m| libm::roundf(m) as i8)
    }

    /// Buffered readings, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = i8> + '_ {
        self.readings.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Forget everything; used when the link drops.
    pub fn clear(&mut self) {
        self.readings.clear();
    }
}
