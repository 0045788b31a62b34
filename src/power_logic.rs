use crate::config::{ADC_FULL_SCALE_VOLTS, ADC_RESOLUTION, LOW_BATTERY_VOLTS, VBAT_DIVIDER};

/// Battery classification against the low-battery threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BatteryLevel {
    #[default]
    Normal,
    Low,
}

/// Classify a battery voltage against the default 3.6 V threshold.
pub fn classify(voltage: f32) -> BatteryLevel {
    classify_with(voltage, LOW_BATTERY_VOLTS)
}

/// Classify a battery voltage against an explicit threshold.
pub fn classify_with(voltage: f32, low_threshold: f32) -> BatteryLevel {
    if voltage < low_threshold {
        BatteryLevel::Low
    } else {
        BatteryLevel::Normal
    }
}

/// Convert a raw 12-bit SAADC reading of the VBAT divider to volts.
///
/// Returns `None` for readings at either rail: the divider is floating or
/// the input is saturated, neither of which is a real battery voltage.
pub fn volts_from_raw(raw: i16) -> Option<f32> {
    if raw <= 0 || raw as u16 >= ADC_RESOLUTION - 1 {
        return None;
    }
    Some(raw as f32 * ADC_FULL_SCALE_VOLTS / ADC_RESOLUTION as f32 * VBAT_DIVIDER)
}
