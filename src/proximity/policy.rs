use crate::actuator::{ActuatorCommand, LedColor};
use crate::config::Config;
use crate::power_logic::BatteryLevel;

use super::BraceletState;

/// Output policy per state.
///
/// Low battery only recolors the nearby status blink; the alert pattern
/// always wins. Mute suppresses the alert haptic, never the LED.
pub fn command_for(
    state: BraceletState,
    battery: BatteryLevel,
    muted: bool,
    config: &Config,
) -> ActuatorCommand {
    match state {
        BraceletState::Startup | BraceletState::Off => ActuatorCommand::OFF,
        BraceletState::Nearby => {
            let color = match battery {
                BatteryLevel::Normal => LedColor::Blue,
                BatteryLevel::Low => LedColor::Red,
            };
            ActuatorCommand::blinking(color, config.status_blink_ms)
        }
        BraceletState::Alert => {
            ActuatorCommand::blinking(LedColor::Yellow, config.alert_blink_ms).with_haptic(!muted)
        }
    }
}
