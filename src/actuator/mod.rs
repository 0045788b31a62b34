//! Actuator driver - LED blink cadence and haptic pulse pattern.
//!
//! The control tick hands over an [`ActuatorCommand`] once a second; the
//! frame loop calls [`ActuatorDriver::refresh`] every `ACTUATOR_FRAME_MS`
//! to turn it into actual LED and haptic writes. Cadence therefore stays
//! smooth even when a sample takes longer than expected.
//!
//! Writes are deduplicated against what was last sent, so re-applying an
//! unchanged command is free. One-shot [`Cue`]s (startup, shutdown)
//! temporarily take precedence over the command.
//!
//! Hardware backends:
//! - `led`     - three-GPIO RGB LED
//! - `drv2605` - TI DRV2605 haptic driver over I²C
//!
//! The embedded frame loop lives in `task`.

pub mod cell;
pub mod drv2605;
pub mod led;
#[cfg(feature = "embedded")]
pub mod task;

#[cfg(test)]
mod tests;

use crate::config::{
    HAPTIC_ALERT_LEVEL, HAPTIC_ALERT_PERIOD_MS, HAPTIC_NOTIFY_LEVEL, LED_FLASH_MS,
    SHUTDOWN_BLINK_COUNT, SHUTDOWN_BLINK_MS, STARTUP_BLINK_MS,
};
use crate::error::{Actuator, Error};

/// Colors the bracelet LED can show.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LedColor {
    Off,
    Cyan,
    Blue,
    Yellow,
    Red,
    Purple,
}

impl LedColor {
    /// Which of the red, green and blue channels are lit.
    pub const fn rgb(self) -> (bool, bool, bool) {
        match self {
            LedColor::Off => (false, false, false),
            LedColor::Cyan => (false, true, true),
            LedColor::Blue => (false, false, true),
            LedColor::Yellow => (true, true, false),
            LedColor::Red => (true, false, false),
            LedColor::Purple => (true, false, true),
        }
    }
}

/// ROM library effect number for the DRV2605.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HapticEffect(pub u8);

impl HapticEffect {
    /// "Transition click" at the given strength.
    ///
    /// Effects 58..=62 of library 1 are the same click at 100, 80, 60, 40
    /// and 20 %; levels in between round down to the next step.
    pub const fn click(level_percent: u8) -> Self {
        let level = if level_percent < 20 {
            20
        } else if level_percent > 100 {
            100
        } else {
            level_percent
        };
        Self(58 + 5 - level / 20)
    }
}

/// What the LED and haptic motor should be doing right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ActuatorCommand {
    pub led_color: LedColor,
    /// Blink period; `None` keeps the LED solid.
    pub led_blink_interval_ms: Option<u32>,
    /// Pulse the alert haptic pattern.
    pub haptic_enabled: bool,
}

impl ActuatorCommand {
    pub const OFF: Self = Self {
        led_color: LedColor::Off,
        led_blink_interval_ms: None,
        haptic_enabled: false,
    };

    pub const fn blinking(color: LedColor, interval_ms: u32) -> Self {
        Self {
            led_color: color,
            led_blink_interval_ms: Some(interval_ms),
            haptic_enabled: false,
        }
    }

    pub const fn with_haptic(self, enabled: bool) -> Self {
        Self {
            haptic_enabled: enabled,
            ..self
        }
    }
}

/// One-shot feedback sequences.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Cue {
    /// One notify pulse and a single cyan blink.
    Startup,
    /// Haptic off, quick purple blinks, then dark.
    Shutdown,
}

impl Cue {
    pub const fn duration_ms(self) -> u64 {
        match self {
            Cue::Startup => STARTUP_BLINK_MS,
            Cue::Shutdown => 2 * SHUTDOWN_BLINK_MS * SHUTDOWN_BLINK_COUNT,
        }
    }

    fn led_at(self, elapsed_ms: u64) -> LedColor {
        match self {
            Cue::Startup => LedColor::Cyan,
            Cue::Shutdown if (elapsed_ms / SHUTDOWN_BLINK_MS) % 2 == 0 => LedColor::Purple,
            Cue::Shutdown => LedColor::Off,
        }
    }
}

/// Output side of the LED.
pub trait LedPort {
    fn set(&mut self, color: LedColor) -> Result<(), Error>;
}

/// Output side of the haptic motor driver.
pub trait HapticPort {
    fn play(&mut self, effect: HapticEffect) -> Result<(), Error>;
    fn stop(&mut self) -> Result<(), Error>;
}

/// Failed writes per actuator since boot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ActuatorFaults {
    pub led: u16,
    pub haptic: u16,
    pub last: Option<Error>,
}

impl ActuatorFaults {
    fn record(&mut self, error: Error) {
        match error {
            Error::ActuatorFault(Actuator::Led) => self.led = self.led.saturating_add(1),
            _ => self.haptic = self.haptic.saturating_add(1),
        }
        self.last = Some(error);
    }

    /// Actuator that has started failing since the `logged` snapshot.
    ///
    /// A dead part fails on every write; only its first failure is news.
    pub fn newly_failing(&self, logged: &ActuatorFaults) -> Option<Actuator> {
        if self.led > 0 && logged.led == 0 {
            Some(Actuator::Led)
        } else if self.haptic > 0 && logged.haptic == 0 {
            Some(Actuator::Haptic)
        } else {
            None
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Playback {
    cue: Cue,
    started_ms: u64,
    haptic_done: bool,
}

/// Turns commands and cues into deduplicated LED / haptic writes.
pub struct ActuatorDriver<L, H> {
    led: L,
    haptic: H,
    command: ActuatorCommand,
    /// Blink phase reference; reset when the command changes.
    origin_ms: u64,
    playback: Option<Playback>,
    /// Last color written, `None` until the first write.
    shown: Option<LedColor>,
    haptic_active: bool,
    last_pulse_ms: Option<u64>,
    faults: ActuatorFaults,
}

impl<L: LedPort, H: HapticPort> ActuatorDriver<L, H> {
    pub fn new(led: L, haptic: H) -> Self {
        Self {
            led,
            haptic,
            command: ActuatorCommand::OFF,
            origin_ms: 0,
            playback: None,
            shown: None,
            haptic_active: false,
            last_pulse_ms: None,
            faults: ActuatorFaults::default(),
        }
    }

    pub fn command(&self) -> ActuatorCommand {
        self.command
    }

    pub fn faults(&self) -> ActuatorFaults {
        self.faults
    }

    /// True while a cue overrides the command.
    pub fn cue_active(&self) -> bool {
        self.playback.is_some()
    }

    /// Adopt `command`. Re-applying the current command is a no-op.
    pub fn apply(&mut self, command: ActuatorCommand, now_ms: u64) {
        if command == self.command {
            return;
        }
        self.command = command;
        self.origin_ms = now_ms;
        self.last_pulse_ms = None;
        self.render(now_ms);
    }

    /// Start a one-shot cue, replacing any cue still running.
    pub fn play_cue(&mut self, cue: Cue, now_ms: u64) {
        self.playback = Some(Playback {
            cue,
            started_ms: now_ms,
            haptic_done: false,
        });
        self.render(now_ms);
    }

    /// Advance blink and pulse cadence to `now_ms`.
    pub fn refresh(&mut self, now_ms: u64) {
        self.render(now_ms);
    }

    fn render(&mut self, now_ms: u64) {
        if let Some(mut playback) = self.playback {
            let elapsed = now_ms.saturating_sub(playback.started_ms);
            if elapsed < playback.cue.duration_ms() {
                if !playback.haptic_done {
                    match playback.cue {
                        Cue::Startup => self.pulse(HapticEffect::click(HAPTIC_NOTIFY_LEVEL)),
                        Cue::Shutdown => self.silence(),
                    }
                    playback.haptic_done = true;
                }
                self.playback = Some(playback);
                self.show(playback.cue.led_at(elapsed));
                return;
            }
            // Cue over: the level pattern starts from a fresh phase.
            self.playback = None;
            self.origin_ms = now_ms;
            self.last_pulse_ms = None;
        }

        let command = self.command;
        let color = match command.led_blink_interval_ms {
            None => command.led_color,
            Some(interval) => {
                let phase = now_ms.saturating_sub(self.origin_ms) % (interval.max(1) as u64);
                if phase < LED_FLASH_MS {
                    command.led_color
                } else {
                    LedColor::Off
                }
            }
        };
        self.show(color);

        if command.haptic_enabled {
            let due = self
                .last_pulse_ms
                .map_or(true, |t| now_ms.saturating_sub(t) >= HAPTIC_ALERT_PERIOD_MS);
            if due {
                self.last_pulse_ms = Some(now_ms);
                self.pulse(HapticEffect::click(HAPTIC_ALERT_LEVEL));
            }
        } else if self.haptic_active {
            self.silence();
        }
    }

    fn show(&mut self, color: LedColor) {
        if self.shown == Some(color) {
            return;
        }
        // Remember the request even on failure; the next color change
        // retries instead of hammering a dead pin every frame.
        self.shown = Some(color);
        if let Err(e) = self.led.set(color) {
            self.faults.record(e);
        }
    }

    fn pulse(&mut self, effect: HapticEffect) {
        self.haptic_active = true;
        if let Err(e) = self.haptic.play(effect) {
            self.faults.record(e);
        }
    }

    fn silence(&mut self) {
        self.haptic_active = false;
        if let Err(e) = self.haptic.stop() {
            self.faults.record(e);
        }
    }
}
