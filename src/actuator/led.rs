//! Discrete RGB LED on three GPIO outputs.
//!
//! Generic over `embedded_hal::digital::OutputPin` so the firmware passes
//! `embassy_nrf::gpio::Output` and tests pass plain mocks. Common-anode
//! parts are wired active-low.

use embedded_hal::digital::{OutputPin, PinState};

use super::{LedColor, LedPort};
use crate::error::{Actuator, Error};

pub struct RgbLed<R, G, B> {
    red: R,
    green: G,
    blue: B,
    active_low: bool,
}

impl<R: OutputPin, G: OutputPin, B: OutputPin> RgbLed<R, G, B> {
    pub fn new(red: R, green: G, blue: B, active_low: bool) -> Self {
        Self {
            red,
            green,
            blue,
            active_low,
        }
    }

    fn level(&self, lit: bool) -> PinState {
        PinState::from(lit != self.active_low)
    }
}

impl<R: OutputPin, G: OutputPin, B: OutputPin> LedPort for RgbLed<R, G, B> {
    fn set(&mut self, color: LedColor) -> Result<(), Error> {
        let (r, g, b) = color.rgb();
        let (r, g, b) = (self.level(r), self.level(g), self.level(b));
        // Drive every channel even if one fails so the LED never sticks
        // on a mixed color.
        let red = self.red.set_state(r).is_ok();
        let green = self.green.set_state(g).is_ok();
        let blue = self.blue.set_state(b).is_ok();
        if red && green && blue {
            Ok(())
        } else {
            Err(Error::ActuatorFault(Actuator::Led))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::{ErrorKind, ErrorType};

    #[derive(Default)]
    struct Pin {
        high: bool,
    }

    impl ErrorType for Pin {
        type Error = Infallible;
    }

    impl OutputPin for Pin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.high = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.high = true;
            Ok(())
        }
    }

    struct BrokenPin;

    impl ErrorType for BrokenPin {
        type Error = ErrorKind;
    }

    impl OutputPin for BrokenPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            Err(ErrorKind::Other)
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            Err(ErrorKind::Other)
        }
    }

    #[test]
    fn active_high_yellow_lights_red_and_green() {
        let mut led = RgbLed::new(Pin::default(), Pin::default(), Pin::default(), false);
        led.set(LedColor::Yellow).unwrap();
        assert!(led.red.high && led.green.high && !led.blue.high);
    }

    #[test]
    fn active_low_inverts_levels() {
        let mut led = RgbLed::new(Pin::default(), Pin::default(), Pin::default(), true);
        led.set(LedColor::Blue).unwrap();
        assert!(led.red.high && led.green.high && !led.blue.high);

        led.set(LedColor::Off).unwrap();
        assert!(led.red.high && led.green.high && led.blue.high);
    }

    #[test]
    fn pin_failure_is_an_led_fault() {
        let mut led = RgbLed::new(Pin::default(), BrokenPin, Pin::default(), false);
        assert_eq!(
            led.set(LedColor::Cyan),
            Err(Error::ActuatorFault(Actuator::Led))
        );
        // The healthy channels were still driven.
        assert!(led.blue.high);
    }
}
