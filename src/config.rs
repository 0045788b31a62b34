//! Application-wide constants and compile-time configuration.
//!
//! All hardware pin assignments, timing parameters, and proximity
//! thresholds live here so they can be tuned in one place.

use crate::error::ConfigError;

// BLE

/// Address of the paired tag, least-significant byte first (SoftDevice
/// order). Replace with the address printed by your tag.
pub const PERIPHERAL_ADDRESS: [u8; 6] = [0x4c, 0x1e, 0x7a, 0x90, 0x2d, 0xc3];

/// How long a single search for the tag's advertisement may run (seconds).
pub const BLE_SCAN_TIMEOUT_SECS: u64 = 5;

/// Primary advertisements from the tag to wait through for a scan
/// response before settling on the default measured power.
pub const BLE_SCAN_RSP_WAIT_REPORTS: u8 = 3;

/// BLE connection interval range (in 1.25 ms units).
/// 24..40 = 30..50 ms: frequent enough for a stable RSSI average.
pub const BLE_CONN_INTERVAL_MIN: u16 = 24;
pub const BLE_CONN_INTERVAL_MAX: u16 = 40;

/// BLE slave latency (number of connection events the peripheral can skip).
pub const BLE_SLAVE_LATENCY: u16 = 0;

/// BLE supervision timeout (in 10 ms units). 400 = 4 s.
pub const BLE_SUP_TIMEOUT: u16 = 400;

/// How often the link task publishes the connection RSSI (ms).
pub const BLE_RSSI_POLL_MS: u64 = 250;

/// Pause between failed searches for the tag (ms).
pub const BLE_RETRY_MS: u64 = 1_000;

/// Free-space loss between 0 m and 1 m at 2.4 GHz. The advertised TX
/// power level minus this is used as the 1 m measured power.
pub const TX_POWER_TO_1M_LOSS_DB: i8 = 41;

// Proximity

/// Expected RSSI at 1 m when the tag does not advertise a TX power level.
pub const DEFAULT_MEASURED_POWER_DBM: i8 = -59;

/// Path-loss exponent N. 2 = free space, 4 = cluttered indoor space.
pub const ENVIRONMENTAL_FACTOR: f32 = 2.0;

/// Distance above which the tag counts as too far away (meters).
pub const PROXIMITY_THRESHOLD_M: f32 = 5.0;

/// Distance the tag must come back within to dismiss an alert (meters).
/// Equal to the threshold by default, i.e. no hysteresis band.
pub const PROXIMITY_RELEASE_M: f32 = 5.0;

/// Distance estimates saturate here; a vanishing signal reads as "far".
pub const MAX_DISTANCE_M: f32 = 100.0;

/// Number of RSSI readings averaged before estimating distance.
pub const RSSI_WINDOW_LEN: usize = 10;

/// Time after (re)boot during which a missing tag does not raise an alert.
pub const STARTUP_GRACE_MS: u64 = 10_000;

/// Sampling / state evaluation period.
pub const TICK_MS: u64 = 1_000;

// Battery

/// Below this voltage the LiPo is reported as low.
pub const LOW_BATTERY_VOLTS: f32 = 3.6;

/// SAADC full scale with the internal 0.6 V reference and 1/6 gain.
pub const ADC_FULL_SCALE_VOLTS: f32 = 3.6;

/// SAADC resolution (12-bit).
pub const ADC_RESOLUTION: u16 = 4096;

/// The VBAT sense line goes through a 1:2 resistor divider.
pub const VBAT_DIVIDER: f32 = 2.0;

// GPIO pin assignments (Feather nRF52840 defaults)
//
// Logical names only; the concrete `embassy_nrf::peripherals::*` are
// picked in `main.rs`.  Adjust for your own bracelet PCB.
//
//   Action button  → P1.02 (active-low)
//   LED red        → P0.13 (active-low, common anode)
//   LED green      → P0.14
//   LED blue       → P0.15
//   I²C SDA        → P0.12 (DRV2605)
//   I²C SCL        → P0.11
//   VBAT sense     → P0.29 / AIN5

/// Button sampling period (ms).
pub const BUTTON_POLL_MS: u64 = 5;

/// Button level must be stable this long to count (ms).
pub const BUTTON_DEBOUNCE_MS: u64 = 20;

/// Holding the button at least this long is a long press (ms).
pub const LONG_PRESS_MS: u64 = 1_000;

// Actuators

/// Actuator frame period; blink and pulse cadence resolve to this (ms).
pub const ACTUATOR_FRAME_MS: u64 = 20;

/// Blink period while the tag is nearby (ms).
pub const STATUS_BLINK_MS: u32 = 4_500;

/// Blink period while alerting (ms).
pub const ALERT_BLINK_MS: u32 = 1_000;

/// How long the LED stays lit within each blink period (ms).
pub const LED_FLASH_MS: u64 = 250;

/// Length of the single cyan blink at startup (ms).
pub const STARTUP_BLINK_MS: u64 = 500;

/// Half period and count of the purple farewell blinks before powering off.
pub const SHUTDOWN_BLINK_MS: u64 = 100;
pub const SHUTDOWN_BLINK_COUNT: u64 = 5;

/// Alert haptic pulse period (ms).
pub const HAPTIC_ALERT_PERIOD_MS: u64 = 1_000;

/// Haptic strengths (percent) for the startup notification and the alert.
pub const HAPTIC_NOTIFY_LEVEL: u8 = 80;
pub const HAPTIC_ALERT_LEVEL: u8 = 100;

/// DRV2605 7-bit I²C address.
pub const DRV2605_ADDRESS: u8 = 0x5A;

/// Runtime view of the tunables the control logic depends on.
///
/// Built from the constants above and validated once at boot; an invalid
/// configuration keeps the firmware out of its main loop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    pub environmental_factor: f32,
    pub default_measured_power: i8,
    pub proximity_threshold_m: f32,
    pub proximity_release_m: f32,
    pub max_distance_m: f32,
    pub low_battery_volts: f32,
    pub startup_grace_ms: u64,
    pub debounce_ms: u64,
    pub long_press_ms: u64,
    pub status_blink_ms: u32,
    pub alert_blink_ms: u32,
}

impl Config {
    pub const DEFAULT: Self = Self {
        environmental_factor: ENVIRONMENTAL_FACTOR,
        default_measured_power: DEFAULT_MEASURED_POWER_DBM,
        proximity_threshold_m: PROXIMITY_THRESHOLD_M,
        proximity_release_m: PROXIMITY_RELEASE_M,
        max_distance_m: MAX_DISTANCE_M,
        low_battery_volts: LOW_BATTERY_VOLTS,
        startup_grace_ms: STARTUP_GRACE_MS,
        debounce_ms: BUTTON_DEBOUNCE_MS,
        long_press_ms: LONG_PRESS_MS,
        status_blink_ms: STATUS_BLINK_MS,
        alert_blink_ms: ALERT_BLINK_MS,
    };

    /// Check every tunable against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let n = self.environmental_factor;
        if !(2.0..=4.0).contains(&n) {
            return Err(ConfigError::EnvironmentalFactor);
        }

        let threshold = self.proximity_threshold_m;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(ConfigError::ProximityThreshold);
        }

        let release = self.proximity_release_m;
        if !release.is_finite() || release <= 0.0 || release > threshold {
            return Err(ConfigError::ReleaseThreshold);
        }

        if !self.max_distance_m.is_finite() || self.max_distance_m <= threshold {
            return Err(ConfigError::DistanceCeiling);
        }

        let volts = self.low_battery_volts;
        if !volts.is_finite() || volts <= 0.0 || volts > 5.0 {
            return Err(ConfigError::BatteryThreshold);
        }

        if self.long_press_ms <= self.debounce_ms {
            return Err(ConfigError::ButtonTiming);
        }

        if self.alert_blink_ms == 0
            || (self.alert_blink_ms as u64) <= LED_FLASH_MS
            || self.status_blink_ms <= self.alert_blink_ms
        {
            return Err(ConfigError::BlinkCadence);
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}
