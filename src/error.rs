//! Unified error type for tetherband.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` (behind the `defmt` feature) for efficient
//! on-target logging.

/// Top-level error type used across the application.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A sensor read failed or the peripheral is gone. Recovered locally:
    /// the last known value is carried forward until the next tick.
    SensorUnavailable(Sensor),

    /// An actuator write failed. Counted and reported; the other
    /// actuator keeps running.
    ActuatorFault(Actuator),

    /// A configuration constant is out of range. Fatal at boot.
    InvalidConfiguration(ConfigError),
}

/// Sensors the control tick reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Sensor {
    /// BLE link RSSI.
    Rssi,
    /// Battery voltage via the SAADC.
    BatteryAdc,
}

/// Output peripherals driven by the actuator frame loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Actuator {
    Led,
    Haptic,
}

/// Which configuration value failed validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Environmental factor N outside [2, 4].
    EnvironmentalFactor,
    /// Proximity threshold not a positive finite distance.
    ProximityThreshold,
    /// Release threshold negative or above the proximity threshold.
    ReleaseThreshold,
    /// Distance ceiling below the proximity threshold.
    DistanceCeiling,
    /// Low-battery threshold outside (0, 5] V.
    BatteryThreshold,
    /// Long press not longer than the debounce window.
    ButtonTiming,
    /// Blink cadences zero or not distinguishable.
    BlinkCadence,
}

// Convenience conversions

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::InvalidConfiguration(e)
    }
}

impl From<Sensor> for Error {
    fn from(s: Sensor) -> Self {
        Error::SensorUnavailable(s)
    }
}

impl From<Actuator> for Error {
    fn from(a: Actuator) -> Self {
        Error::ActuatorFault(a)
    }
}
