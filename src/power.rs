//! Battery monitor - samples the VBAT divider through the SAADC.
//!
//! nRF52840 SAADC setup:
//! - Internal 0.6 V reference, 1/6 gain: 3.6 V full scale
//! - 12-bit resolution
//! - VBAT on AIN5 (P0.29) behind a 1:2 divider
//!
//! Classification against the low-battery threshold is pure and lives in
//! `power_logic`; this module only turns the ADC into volts.

use defmt::{debug, warn};
use embassy_nrf::saadc::Saadc;

use crate::error::{Error, Sensor};
use crate::power_logic;

pub struct BatteryMonitor {
    adc: Saadc<'static, 1>,
    last_raw: Option<i16>,
}

impl BatteryMonitor {
    /// Calibrate the converter once; later reads reuse the calibration.
    pub async fn new(adc: Saadc<'static, 1>) -> Self {
        adc.calibrate().await;
        Self { adc, last_raw: None }
    }

    /// Sample the battery once.
    pub async fn read_volts(&mut self) -> Result<f32, Error> {
        let mut buf = [0i16; 1];
        self.adc.sample(&mut buf).await;
        let raw = buf[0];

        match power_logic::volts_from_raw(raw) {
            Some(volts) => {
                if self.last_raw != Some(raw) {
                    debug!("VBAT raw={} ({} V)", raw, volts);
                }
                self.last_raw = Some(raw);
                Ok(volts)
            }
            None => {
                warn!("VBAT reading at rail: raw={}", raw);
                Err(Error::SensorUnavailable(Sensor::BatteryAdc))
            }
        }
    }
}
