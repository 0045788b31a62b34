//! User input - the single action button on the bracelet.
//!
//! - `input_logic` - debounce and short/long classification (pure)
//! - `buttons`     - GPIO polling task (embedded only)
//!
//! Short press: toggle vibration mute and print device info, or wake
//! the bracelet when it is off. Long press: power off.

#[cfg(feature = "embedded")]
pub mod buttons;
pub mod input_logic;

/// Classified button events (after debouncing).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonEvent {
    /// No press completed since the last poll.
    #[default]
    None,
    ShortPress,
    LongPress,
}
