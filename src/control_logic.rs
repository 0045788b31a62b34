//! Per-tick glue between the raw sensor readings and the state machine.
//!
//! `ControlLoop` owns the RSSI window, the last known readings and the
//! sensor fault counters, turns a [`RawTick`] into a [`TickInput`], and
//! assembles the device-info report on request. It never blocks and
//! never touches hardware, so whole sessions can be replayed on the host.

use heapless::Vec;

use crate::actuator::ActuatorFaults;
use crate::ble::LinkReading;
use crate::config::{Config, RSSI_WINDOW_LEN};
use crate::error::{Error, Sensor};
use crate::power_logic::{classify_with, BatteryLevel};
use crate::proximity::{
    BraceletState, ConnectionEvent, ConnectionState, ProximityMachine, TickInput, Transition,
};
use crate::signal::{estimate_distance, rssi_at_distance, DistanceEstimate, RssiWindow, Sample};
use crate::ui::ButtonEvent;

/// What the tick collected from the outside world.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RawTick {
    pub now_ms: u64,
    pub button: ButtonEvent,
    pub connection: Option<ConnectionEvent>,
    /// `None` when no RSSI could be read.
    pub link: Option<LinkReading>,
    /// `None` when the ADC read failed.
    pub voltage: Option<f32>,
}

/// Snapshot printed on a short press.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceInfo {
    pub state: BraceletState,
    pub muted: bool,
    pub connection: ConnectionState,
    pub rssi: Option<i8>,
    pub rssi_mean: Option<f32>,
    /// Window contents, oldest first.
    pub rssi_history: Vec<i8, RSSI_WINDOW_LEN>,
    pub measured_power: Option<i8>,
    pub distance_m: Option<f32>,
    pub threshold_m: f32,
    /// Mean RSSI at which the estimate crosses `threshold_m`.
    pub threshold_rssi: Option<f32>,
    pub voltage: Option<f32>,
    pub battery: BatteryLevel,
    pub uptime_ms: u64,
    pub sensor_faults: u16,
    pub actuator_faults: ActuatorFaults,
    pub last_sensor_fault: Option<Error>,
}

pub struct ControlLoop {
    machine: ProximityMachine,
    window: RssiWindow,
    last_reading: Option<LinkReading>,
    /// Averaged sample the last distance was computed from.
    last_sample: Option<Sample>,
    last_distance: Option<DistanceEstimate>,
    last_voltage: Option<f32>,
    sensor_faults: u16,
    last_sensor_fault: Option<Error>,
    booted_ms: u64,
}

impl ControlLoop {
    /// Validate `config` and boot. The transition carries the startup cue.
    pub fn new(config: Config, now_ms: u64) -> Result<(Self, Transition), Error> {
        let (machine, boot) = ProximityMachine::new(config, now_ms)?;
        Ok((
            Self {
                machine,
                window: RssiWindow::new(),
                last_reading: None,
                last_sample: None,
                last_distance: None,
                last_voltage: None,
                sensor_faults: 0,
                last_sensor_fault: None,
                booted_ms: now_ms,
            },
            boot,
        ))
    }

    pub fn machine(&self) -> &ProximityMachine {
        &self.machine
    }

    pub fn state(&self) -> BraceletState {
        self.machine.state()
    }

    pub fn last_distance(&self) -> Option<DistanceEstimate> {
        self.last_distance
    }

    pub fn last_sample(&self) -> Option<Sample> {
        self.last_sample
    }

    /// Fold one tick of raw readings into the state machine.
    ///
    /// A reading whose `seq` was already consumed (a button woke the tick
    /// before the link task sampled again) is not averaged twice; that
    /// tick carries no distance.
    pub fn tick(&mut self, raw: RawTick) -> Transition {
        let config = *self.machine.config();

        let voltage = match raw.voltage {
            Some(v) if v.is_finite() => {
                self.last_voltage = Some(v);
                Some(v)
            }
            _ => {
                self.sensor_fault(Sensor::BatteryAdc);
                None
            }
        };
        let battery = voltage.map(|v| classify_with(v, config.low_battery_volts));

        let connected = match raw.connection {
            Some(ConnectionEvent::Established) => true,
            Some(ConnectionEvent::Lost) => false,
            None => self.machine.connection() == ConnectionState::Connected,
        };
        if !connected {
            self.window.clear();
            self.last_distance = None;
        }

        let mut distance = None;
        match raw.link {
            Some(link) if connected => {
                let fresh = self.last_reading.map_or(true, |last| last.seq != link.seq);
                if fresh {
                    self.last_reading = Some(link);
                    self.window.push(link.rssi);
                    distance = self.estimate(link.measured_power, raw.now_ms, &config);
                    self.last_distance = distance;
                }
            }
            None if connected => self.sensor_fault(Sensor::Rssi),
            _ => {}
        }

        self.machine.step(&TickInput {
            now_ms: raw.now_ms,
            button: raw.button,
            connection: raw.connection,
            distance,
            battery,
        })
    }

    /// Distance from the averaged window, capped at the configured ceiling.
    fn estimate(
        &mut self,
        measured_power: i8,
        now_ms: u64,
        config: &Config,
    ) -> Option<DistanceEstimate> {
        let sample = Sample {
            rssi: self.window.mean_dbm()?,
            measured_power,
            voltage: self.last_voltage.unwrap_or(f32::NAN),
            timestamp_ms: now_ms,
        };
        self.last_sample = Some(sample);
        let estimate = estimate_distance(&sample, measured_power, config.environmental_factor);
        Some(DistanceEstimate {
            meters: estimate.meters.min(config.max_distance_m),
        })
    }

    /// Snapshot for the short-press report.
    pub fn device_info(&self, now_ms: u64, actuator_faults: ActuatorFaults) -> DeviceInfo {
        let config = self.machine.config();
        let measured_power = self.last_reading.map(|r| r.measured_power);
        DeviceInfo {
            state: self.machine.state(),
            muted: self.machine.muted(),
            connection: self.machine.connection(),
            rssi: self.last_reading.map(|r| r.rssi),
            rssi_mean: self.window.mean(),
            rssi_history: self.window.iter().collect(),
            measured_power,
            distance_m: self.last_distance.map(|d| d.meters),
            threshold_m: config.proximity_threshold_m,
            threshold_rssi: measured_power.map(|mp| {
                rssi_at_distance(
                    config.proximity_threshold_m,
                    mp as f32,
                    config.environmental_factor,
                )
            }),
            voltage: self.last_voltage,
            battery: self.machine.battery(),
            uptime_ms: now_ms.saturating_sub(self.booted_ms),
            sensor_faults: self.sensor_faults,
            actuator_faults,
            last_sensor_fault: self.last_sensor_fault,
        }
    }

    fn sensor_fault(&mut self, sensor: Sensor) {
        self.sensor_faults = self.sensor_faults.saturating_add(1);
        self.last_sensor_fault = Some(Error::SensorUnavailable(sensor));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::LedColor;

    const NEAR: i8 = -60;
    const FAR: i8 = -80;

    fn tick(now_ms: u64) -> RawTick {
        RawTick {
            now_ms,
            voltage: Some(3.9),
            ..RawTick::default()
        }
    }

    /// A tick carrying a reading the link task sampled at `now_ms`.
    fn reading(rssi: i8, now_ms: u64) -> RawTick {
        RawTick {
            link: Some(LinkReading {
                rssi,
                measured_power: -59,
                seq: now_ms as u32,
            }),
            ..tick(now_ms)
        }
    }

    fn connected() -> ControlLoop {
        let (mut c, _) = ControlLoop::new(Config::DEFAULT, 0).unwrap();
        let t = c.tick(RawTick {
            connection: Some(ConnectionEvent::Established),
            ..reading(NEAR, 1_000)
        });
        assert_eq!(t.to, BraceletState::Nearby);
        c
    }

    #[test]
    fn averaging_delays_the_alert_for_a_single_dip() {
        let mut c = connected();
        // One far reading among near ones keeps the mean close.
        let t = c.tick(reading(FAR, 2_000));
        assert_eq!(t.to, BraceletState::Nearby);

        let mut now = 3_000;
        let mut state = t.to;
        for _ in 0..RSSI_WINDOW_LEN {
            state = c.tick(reading(FAR, now)).to;
            now += 1_000;
        }
        assert_eq!(state, BraceletState::Alert);
        let d = c.last_distance().unwrap().meters;
        assert!((d - 11.22).abs() < 0.01);
    }

    #[test]
    fn distance_comes_from_the_averaged_sample() {
        let mut c = connected();
        c.tick(reading(FAR, 2_000));

        // Mean of -60 and -80.
        let sample = c.last_sample().unwrap();
        assert_eq!(sample.rssi, -70);
        assert_eq!(sample.measured_power, -59);
        assert_eq!(sample.voltage, 3.9);
        assert_eq!(sample.timestamp_ms, 2_000);

        let expected = estimate_distance(&sample, -59, Config::DEFAULT.environmental_factor);
        assert_eq!(c.last_distance(), Some(expected));
    }

    #[test]
    fn repeated_reading_is_averaged_once() {
        let mut c = connected();
        let far = reading(FAR, 2_000);
        c.tick(far);
        let after_first = c.last_distance();

        // Button-driven ticks within the same second see the same reading.
        for now in [2_100, 2_200, 2_300] {
            let t = c.tick(RawTick {
                now_ms: now,
                button: ButtonEvent::ShortPress,
                ..far
            });
            assert_eq!(t.to, BraceletState::Nearby);
        }
        assert_eq!(c.last_distance(), after_first);
        let info = c.device_info(2_300, ActuatorFaults::default());
        assert_eq!(info.rssi_history.as_slice(), &[NEAR, FAR]);
        assert_eq!(info.sensor_faults, 0);
    }

    #[test]
    fn losing_the_link_clears_the_window() {
        let mut c = connected();
        let t = c.tick(RawTick {
            connection: Some(ConnectionEvent::Lost),
            ..reading(NEAR, 2_000)
        });
        assert_eq!(t.to, BraceletState::Alert);
        assert_eq!(c.last_distance(), None);
        let info = c.device_info(2_000, ActuatorFaults::default());
        assert_eq!(info.rssi_mean, None);
        assert!(info.rssi_history.is_empty());
    }

    #[test]
    fn missing_readings_count_as_sensor_faults() {
        let mut c = connected();
        let t = c.tick(RawTick {
            link: None,
            voltage: None,
            ..tick(2_000)
        });
        // Nothing fresh: the state and command carry forward.
        assert_eq!(t.to, BraceletState::Nearby);
        assert_eq!(t.command.led_color, LedColor::Blue);

        let info = c.device_info(2_000, ActuatorFaults::default());
        assert_eq!(info.sensor_faults, 2);
        assert_eq!(info.voltage, Some(3.9));
        assert_eq!(
            info.last_sensor_fault,
            Some(Error::SensorUnavailable(Sensor::Rssi))
        );
    }

    #[test]
    fn report_reflects_latest_readings() {
        let mut c = connected();
        c.tick(RawTick {
            button: ButtonEvent::ShortPress,
            voltage: Some(3.4),
            ..reading(NEAR, 5_000)
        });
        let info = c.device_info(5_000, ActuatorFaults::default());
        assert_eq!(info.state, BraceletState::Nearby);
        assert!(info.muted);
        assert_eq!(info.connection, ConnectionState::Connected);
        assert_eq!(info.rssi, Some(NEAR));
        assert_eq!(info.rssi_history.as_slice(), &[NEAR, NEAR]);
        assert_eq!(info.measured_power, Some(-59));
        assert_eq!(info.battery, BatteryLevel::Low);
        assert_eq!(info.uptime_ms, 5_000);
        assert_eq!(info.threshold_m, 5.0);
        // 5 m at N = 2 is 14 dB below the 1 m power.
        let threshold_rssi = info.threshold_rssi.unwrap();
        assert!((threshold_rssi + 72.98).abs() < 0.01);
    }

    #[test]
    fn readings_while_disconnected_are_ignored() {
        let (mut c, _) = ControlLoop::new(Config::DEFAULT, 0).unwrap();
        let t = c.tick(reading(NEAR, 1_000));
        assert_eq!(t.to, BraceletState::Startup);
        assert_eq!(c.last_distance(), None);
        assert_eq!(c.last_sample(), None);
    }
}
