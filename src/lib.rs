//! tetherband - control logic for a child-proximity bracelet.
//!
//! The bracelet keeps a BLE connection to a tag carried by the child,
//! estimates the distance from the connection RSSI, and alerts with LED
//! and vibration once the tag drifts out of range.
//!
//! Everything that decides (sampling, debouncing, the state machine, the
//! actuator cadence) is pure and testable on the host:
//!
//! Usage: `cargo test`
//!
//! The embedded binary (`--features embedded`) adds the Embassy tasks
//! that bind this logic to the nRF52840 peripherals and the SoftDevice.

#![cfg_attr(not(test), no_std)]

// ═══════════════════════════════════════════════════════════════════════════
// Pure logic (host-testable)
// ═══════════════════════════════════════════════════════════════════════════

pub mod actuator;
pub mod ble;
pub mod config;
pub mod control_logic;
pub mod error;
pub mod power_logic;
pub mod proximity;
pub mod signal;
pub mod ui;

// ═══════════════════════════════════════════════════════════════════════════
// Embedded tasks (nRF52840 + SoftDevice)
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(feature = "embedded")]
pub mod control;
#[cfg(feature = "embedded")]
pub mod power;

pub use control_logic::{ControlLoop, DeviceInfo, RawTick};
pub use error::Error;

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::actuator::LedColor;
    use super::config::Config;
    use super::power_logic::*;
    use super::proximity::{command_for, BraceletState};

    // ════════════════════════════════════════════════════════════════════════
    // Battery Monitor
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn battery_below_threshold_is_low() {
        assert_eq!(classify(3.59), BatteryLevel::Low);
        assert_eq!(classify(3.4), BatteryLevel::Low);
        assert_eq!(classify(0.0), BatteryLevel::Low);
    }

    #[test]
    fn battery_at_or_above_threshold_is_normal() {
        assert_eq!(classify(3.6), BatteryLevel::Normal);
        assert_eq!(classify(3.7), BatteryLevel::Normal);
        assert_eq!(classify(4.2), BatteryLevel::Normal);
    }

    #[test]
    fn battery_threshold_is_configurable() {
        assert_eq!(classify_with(3.5, 3.3), BatteryLevel::Normal);
        assert_eq!(classify_with(3.2, 3.3), BatteryLevel::Low);
    }

    #[test]
    fn adc_counts_convert_to_volts() {
        // Half scale through the 1:2 divider is 3.6 V at the cell.
        let v = volts_from_raw(2048).unwrap();
        assert!((v - 3.6).abs() < 1e-4);

        let v = volts_from_raw(2389).unwrap();
        assert!((v - 4.2).abs() < 0.01);
    }

    #[test]
    fn adc_rails_are_rejected() {
        assert_eq!(volts_from_raw(0), None);
        assert_eq!(volts_from_raw(-12), None);
        assert_eq!(volts_from_raw(4095), None);
        assert_eq!(volts_from_raw(i16::MAX), None);
        assert!(volts_from_raw(1).is_some());
        assert!(volts_from_raw(4094).is_some());
    }

    // ════════════════════════════════════════════════════════════════════════
    // Output policy
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn every_state_has_a_command() {
        let cfg = Config::DEFAULT;
        for state in BraceletState::ALL {
            for battery in [BatteryLevel::Normal, BatteryLevel::Low] {
                for muted in [false, true] {
                    let cmd = command_for(state, battery, muted, &cfg);
                    if cmd.haptic_enabled {
                        assert_eq!(state, BraceletState::Alert);
                    }
                    if matches!(state, BraceletState::Off | BraceletState::Startup) {
                        assert_eq!(cmd.led_color, LedColor::Off);
                    }
                }
            }
        }
    }

    #[test]
    fn low_battery_recolors_only_nearby() {
        let cfg = Config::DEFAULT;
        let nearby = command_for(BraceletState::Nearby, BatteryLevel::Low, false, &cfg);
        assert_eq!(nearby.led_color, LedColor::Red);
        assert_eq!(nearby.led_blink_interval_ms, Some(cfg.status_blink_ms));

        let alert = command_for(BraceletState::Alert, BatteryLevel::Low, false, &cfg);
        assert_eq!(alert.led_color, LedColor::Yellow);
        assert!(alert.haptic_enabled);
    }

    #[test]
    fn mute_silences_alert_haptic_only() {
        let cfg = Config::DEFAULT;
        let alert = command_for(BraceletState::Alert, BatteryLevel::Normal, true, &cfg);
        assert!(!alert.haptic_enabled);
        assert_eq!(alert.led_color, LedColor::Yellow);
        assert_eq!(alert.led_blink_interval_ms, Some(cfg.alert_blink_ms));
    }

    #[test]
    fn state_labels_match_log_names() {
        assert_eq!(BraceletState::Startup.label(), "STARTUP");
        assert_eq!(BraceletState::Nearby.label(), "NORMAL");
        assert_eq!(BraceletState::Alert.label(), "ALARMING");
        assert_eq!(BraceletState::Off.label(), "OFF");
    }
}
