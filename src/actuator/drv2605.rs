//! TI DRV2605 haptic driver over blocking I²C.
//!
//! Only the subset the bracelet needs: ERM motor in open loop, ROM
//! library 1, internal trigger. An effect is played by loading it into
//! the first waveform slot and setting GO.

use embedded_hal::i2c::I2c;

use super::{HapticEffect, HapticPort};
use crate::error::{Actuator, Error};

const REG_STATUS: u8 = 0x00;
const REG_MODE: u8 = 0x01;
const REG_RTP_INPUT: u8 = 0x02;
const REG_LIBRARY: u8 = 0x03;
const REG_WAVESEQ1: u8 = 0x04;
const REG_WAVESEQ2: u8 = 0x05;
const REG_GO: u8 = 0x0C;
const REG_OVERDRIVE: u8 = 0x0D;
const REG_SUSTAIN_POS: u8 = 0x0E;
const REG_SUSTAIN_NEG: u8 = 0x0F;
const REG_BRAKE: u8 = 0x10;
const REG_FEEDBACK: u8 = 0x1A;
const REG_CONTROL3: u8 = 0x1D;

const MODE_INTERNAL_TRIGGER: u8 = 0x00;
const LIBRARY_ERM_A: u8 = 0x01;
const FEEDBACK_LRA: u8 = 0x80;
const CONTROL3_ERM_OPEN_LOOP: u8 = 0x20;

pub struct Drv2605<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Drv2605<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Bring the chip out of standby and configure it for an ERM motor.
    ///
    /// Returns the raw STATUS register, whose top three bits carry the
    /// device id (3 = DRV2605, 7 = DRV2605L).
    pub fn init(&mut self) -> Result<u8, Error> {
        let status = self.read(REG_STATUS)?;

        self.write(REG_MODE, MODE_INTERNAL_TRIGGER)?;
        self.write(REG_RTP_INPUT, 0)?;
        self.write(REG_WAVESEQ1, 0)?;
        self.write(REG_WAVESEQ2, 0)?;
        for reg in [REG_OVERDRIVE, REG_SUSTAIN_POS, REG_SUSTAIN_NEG, REG_BRAKE] {
            self.write(reg, 0)?;
        }

        let feedback = self.read(REG_FEEDBACK)?;
        self.write(REG_FEEDBACK, feedback & !FEEDBACK_LRA)?;
        let control3 = self.read(REG_CONTROL3)?;
        self.write(REG_CONTROL3, control3 | CONTROL3_ERM_OPEN_LOOP)?;

        self.write(REG_LIBRARY, LIBRARY_ERM_A)?;
        Ok(status)
    }

    fn write(&mut self, reg: u8, value: u8) -> Result<(), Error> {
        self.i2c
            .write(self.address, &[reg, value])
            .map_err(|_| Error::ActuatorFault(Actuator::Haptic))
    }

    fn read(&mut self, reg: u8) -> Result<u8, Error> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[reg], &mut buf)
            .map_err(|_| Error::ActuatorFault(Actuator::Haptic))?;
        Ok(buf[0])
    }
}

impl<I2C: I2c> HapticPort for Drv2605<I2C> {
    fn play(&mut self, effect: HapticEffect) -> Result<(), Error> {
        self.write(REG_WAVESEQ1, effect.0)?;
        // A zero in the next slot terminates the sequence.
        self.write(REG_WAVESEQ2, 0)?;
        self.write(REG_GO, 1)
    }

    fn stop(&mut self) -> Result<(), Error> {
        self.write(REG_GO, 0)
    }
}
