//! GPIO action button with polled debouncing.
//!
//! The button is active-low with the internal pull-up. While nobody
//! touches it the task sleeps on a GPIOTE edge; during a press it polls
//! every `BUTTON_POLL_MS` so `ButtonInput` can time the settle window
//! and the long-press threshold without blocking.

use crate::config::{BUTTON_DEBOUNCE_MS, BUTTON_POLL_MS, LONG_PRESS_MS};
use crate::ui::input_logic::ButtonInput;
use crate::ui::ButtonEvent;
use defmt::{info, warn};
use embassy_nrf::gpio::{AnyPin, Input, Pull};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;
use embassy_time::{Duration, Instant, Timer};

/// Run the button polling loop, forwarding each classified press.
pub async fn button_task(
    pin: AnyPin,
    tx: &Sender<'static, CriticalSectionRawMutex, ButtonEvent, 4>,
) -> ! {
    let mut btn = Input::new(pin, Pull::Up);
    let mut input = ButtonInput::new(BUTTON_DEBOUNCE_MS, LONG_PRESS_MS);

    loop {
        if input.is_idle() && btn.is_high() {
            btn.wait_for_low().await;
        }

        let event = input.poll(btn.is_low(), Instant::now().as_millis());
        if event != ButtonEvent::None {
            info!("Button: {}", event);
            // The control tick consumes at most one event per pass; if it
            // is behind, drop rather than stall the debouncer.
            if tx.try_send(event).is_err() {
                warn!("Button channel full - dropping {}", event);
            }
        }

        Timer::after(Duration::from_millis(BUTTON_POLL_MS)).await;
    }
}
