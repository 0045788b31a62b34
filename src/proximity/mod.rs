//! Proximity state machine - the core of the bracelet.
//!
//! Once per tick the machine takes the latest button event, connection
//! event, distance estimate and battery classification and decides which
//! of four states the bracelet is in:
//!
//! ```text
//!            ShortPress (wake)
//!   Off ───────────────────────▶ Startup
//!    ▲                            │  connected / in range      ┌─────────┐
//!    │ LongPress (from any)       ├──────────────────────────▶ │ Nearby  │
//!    │                            │  absent after grace        └─────────┘
//!    │                            └──────────────────────────▶ ┌─────────┐
//!    │                                 out of range / lost ──▶ │  Alert  │
//!    │                                 back in range ◀──────── └─────────┘
//! ```
//!
//! The transition table itself is the pure [`next_state`]; the machine
//! only decides which [`Trigger`] fired this tick. Button and connection
//! triggers are considered before distance. Distance transitions are edge
//! triggered (only a crossing changes state) while the actuator command is
//! recomputed from the current state on every tick.

mod policy;


pub use policy::command_for;

use crate::actuator::{ActuatorCommand, Cue};
use crate::config::Config;
use crate::error::Error;
use crate::power_logic::BatteryLevel;
use crate::signal::DistanceEstimate;
use crate::ui::ButtonEvent;

/// Operating state of the bracelet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BraceletState {
    /// Just booted or woken; waiting for the tag.
    Startup,
    /// Tag connected and within range.
    Nearby,
    /// Tag too far away or link lost.
    Alert,
    /// Powered down; only a short press wakes it.
    Off,
}

impl BraceletState {
    pub const ALL: [Self; 4] = [Self::Startup, Self::Nearby, Self::Alert, Self::Off];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Startup => "STARTUP",
            Self::Nearby => "NORMAL",
            Self::Alert => "ALARMING",
            Self::Off => "OFF",
        }
    }
}

/// Link status as last reported by the BLE task.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

/// Link up/down notifications from the BLE task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionEvent {
    Established,
    Lost,
}

/// Everything that can move the state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Trigger {
    ShortPress,
    LongPress,
    ConnectionEstablished,
    ConnectionLost,
    InRange,
    OutOfRange,
    /// The startup grace period ran out with no tag connected.
    GraceExpired,
}

impl Trigger {
    pub const ALL: [Self; 7] = [
        Self::ShortPress,
        Self::LongPress,
        Self::ConnectionEstablished,
        Self::ConnectionLost,
        Self::InRange,
        Self::OutOfRange,
        Self::GraceExpired,
    ];
}

impl From<ConnectionEvent> for Trigger {
    fn from(event: ConnectionEvent) -> Self {
        match event {
            ConnectionEvent::Established => Trigger::ConnectionEstablished,
            ConnectionEvent::Lost => Trigger::ConnectionLost,
        }
    }
}

/// The transition table. Total: every pair maps to a state, most of them
/// to "stay".
pub const fn next_state(state: BraceletState, trigger: Trigger) -> BraceletState {
    use BraceletState::*;
    match (state, trigger) {
        (_, Trigger::LongPress) => Off,
        (Off, Trigger::ShortPress) => Startup,
        (Off, _) => Off,
        (Startup, Trigger::ConnectionEstablished | Trigger::InRange) => Nearby,
        (Startup, Trigger::OutOfRange | Trigger::GraceExpired) => Alert,
        (Nearby, Trigger::OutOfRange | Trigger::ConnectionLost) => Alert,
        (Alert, Trigger::InRange) => Nearby,
        (s, _) => s,
    }
}

/// What the control tick observed since the previous tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TickInput {
    pub now_ms: u64,
    pub button: ButtonEvent,
    pub connection: Option<ConnectionEvent>,
    /// Only present while connected and a fresh RSSI arrived.
    pub distance: Option<DistanceEstimate>,
    /// `None` when the battery could not be read this tick.
    pub battery: Option<BatteryLevel>,
}

/// Result of one machine step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transition {
    pub from: BraceletState,
    pub to: BraceletState,
    /// The trigger that changed the state, if any did.
    pub trigger: Option<Trigger>,
    /// Level command for the actuators, valid until the next tick.
    pub command: ActuatorCommand,
    /// One-shot feedback to play on top of the command.
    pub cue: Option<Cue>,
    /// A short press asked for the device-info report.
    pub report_info: bool,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Owns the bracelet state and everything the transitions depend on.
#[derive(Clone, Debug)]
pub struct ProximityMachine {
    config: Config,
    state: BraceletState,
    connection: ConnectionState,
    battery: BatteryLevel,
    muted: bool,
    entered_ms: u64,
}

impl ProximityMachine {
    /// Validate `config` and boot into `Startup`.
    ///
    /// The returned transition carries the startup cue, exactly as a wake
    /// from `Off` does.
    pub fn new(config: Config, now_ms: u64) -> Result<(Self, Transition), Error> {
        config.validate()?;
        let machine = Self {
            config,
            state: BraceletState::Startup,
            connection: ConnectionState::Disconnected,
            battery: BatteryLevel::Normal,
            muted: false,
            entered_ms: now_ms,
        };
        let boot = Transition {
            from: BraceletState::Startup,
            to: BraceletState::Startup,
            trigger: None,
            command: machine.command(),
            cue: Some(Cue::Startup),
            report_info: true,
        };
        Ok((machine, boot))
    }

    pub fn state(&self) -> BraceletState {
        self.state
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn battery(&self) -> BatteryLevel {
        self.battery
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Actuator command for the current state.
    pub fn command(&self) -> ActuatorCommand {
        command_for(self.state, self.battery, self.muted, &self.config)
    }

    /// Advance one tick.
    pub fn step(&mut self, input: &TickInput) -> Transition {
        let from = self.state;
        let mut report_info = false;

        if let Some(level) = input.battery {
            self.battery = level;
        }
        if let Some(event) = input.connection {
            self.connection = match event {
                ConnectionEvent::Established => ConnectionState::Connected,
                ConnectionEvent::Lost => ConnectionState::Disconnected,
            };
        }

        let button = match input.button {
            ButtonEvent::LongPress => Some(Trigger::LongPress),
            ButtonEvent::ShortPress if from == BraceletState::Off => Some(Trigger::ShortPress),
            ButtonEvent::ShortPress => {
                self.muted = !self.muted;
                report_info = true;
                None
            }
            ButtonEvent::None => None,
        };

        let candidates = [
            button,
            input.connection.map(Trigger::from),
            self.distance_trigger(input),
            self.grace_trigger(input.now_ms),
        ];
        let fired = candidates
            .into_iter()
            .flatten()
            .find(|&t| next_state(from, t) != from);

        let mut cue = None;
        if let Some(trigger) = fired {
            self.state = next_state(from, trigger);
            self.entered_ms = input.now_ms;
            match self.state {
                BraceletState::Off => cue = Some(Cue::Shutdown),
                BraceletState::Startup => {
                    self.muted = false;
                    cue = Some(Cue::Startup);
                    report_info = true;
                }
                _ => {}
            }
        }

        Transition {
            from,
            to: self.state,
            trigger: fired,
            command: self.command(),
            cue,
            report_info,
        }
    }

    fn distance_trigger(&self, input: &TickInput) -> Option<Trigger> {
        if self.connection != ConnectionState::Connected {
            return None;
        }
        let distance = input.distance?;
        let threshold = match self.state {
            BraceletState::Alert => self.config.proximity_release_m,
            _ => self.config.proximity_threshold_m,
        };
        if distance.within(threshold) {
            Some(Trigger::InRange)
        } else if self.state == BraceletState::Startup && !self.grace_over(input.now_ms) {
            None
        } else {
            Some(Trigger::OutOfRange)
        }
    }

    fn grace_trigger(&self, now_ms: u64) -> Option<Trigger> {
        let waiting = self.state == BraceletState::Startup
            && self.connection == ConnectionState::Disconnected;
        (waiting && self.grace_over(now_ms)).then_some(Trigger::GraceExpired)
    }

    fn grace_over(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.entered_ms) >= self.config.startup_grace_ms
    }
}
