//! Lock-free hand-off between the control tick and the actuator frames.
//!
//! Both values fit a single `AtomicU32`, so the frame loop reads them
//! with one aligned load and can never see half of an update.

use core::sync::atomic::{AtomicU32, Ordering};

use super::{ActuatorCommand, ActuatorFaults, LedColor};

const COLOR_MASK: u32 = 0x0F;
const HAPTIC_BIT: u32 = 1 << 4;
const BLINK_BIT: u32 = 1 << 5;
const INTERVAL_SHIFT: u32 = 8;
const INTERVAL_MAX: u32 = 0x00FF_FFFF;

/// Current [`ActuatorCommand`], packed.
pub struct CommandCell(AtomicU32);

impl CommandCell {
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    pub fn store(&self, command: ActuatorCommand) {
        self.0.store(pack(command), Ordering::Release);
    }

    pub fn load(&self) -> ActuatorCommand {
        unpack(self.0.load(Ordering::Acquire))
    }
}

impl Default for CommandCell {
    fn default() -> Self {
        Self::new()
    }
}

fn color_index(color: LedColor) -> u32 {
    match color {
        LedColor::Off => 0,
        LedColor::Cyan => 1,
        LedColor::Blue => 2,
        LedColor::Yellow => 3,
        LedColor::Red => 4,
        LedColor::Purple => 5,
    }
}

fn color_from_index(index: u32) -> LedColor {
    match index {
        1 => LedColor::Cyan,
        2 => LedColor::Blue,
        3 => LedColor::Yellow,
        4 => LedColor::Red,
        5 => LedColor::Purple,
        _ => LedColor::Off,
    }
}

fn pack(command: ActuatorCommand) -> u32 {
    let mut raw = color_index(command.led_color);
    if command.haptic_enabled {
        raw |= HAPTIC_BIT;
    }
    if let Some(interval) = command.led_blink_interval_ms {
        raw |= BLINK_BIT | (interval.min(INTERVAL_MAX) << INTERVAL_SHIFT);
    }
    raw
}

fn unpack(raw: u32) -> ActuatorCommand {
    ActuatorCommand {
        led_color: color_from_index(raw & COLOR_MASK),
        led_blink_interval_ms: (raw & BLINK_BIT != 0).then_some(raw >> INTERVAL_SHIFT),
        haptic_enabled: raw & HAPTIC_BIT != 0,
    }
}

/// Latest [`ActuatorFaults`] counters published by the frame loop.
///
/// Only the two counters travel; the last error kind stays with the driver.
pub struct FaultCell(AtomicU32);

impl FaultCell {
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    pub fn store(&self, faults: ActuatorFaults) {
        let raw = (faults.led as u32) | ((faults.haptic as u32) << 16);
        self.0.store(raw, Ordering::Relaxed);
    }

    pub fn load(&self) -> ActuatorFaults {
        let raw = self.0.load(Ordering::Relaxed);
        ActuatorFaults {
            led: (raw & 0xFFFF) as u16,
            haptic: (raw >> 16) as u16,
            last: None,
        }
    }
}

impl Default for FaultCell {
    fn default() -> Self {
        Self::new()
    }
}
