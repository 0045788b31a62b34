//! Actuator frame loop.
//!
//! Runs independently of the 1 s control tick so blink and pulse cadence
//! stay at frame resolution. The current command is read from the
//! [`CommandCell`] every frame; cues arrive through a [`Signal`] so a
//! newer cue replaces one the loop has not picked up yet.

use defmt::warn;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Ticker};

use super::cell::{CommandCell, FaultCell};
use super::{ActuatorDriver, Cue, HapticPort, LedPort};
use crate::config::ACTUATOR_FRAME_MS;

pub async fn actuator_task<L: LedPort, H: HapticPort>(
    mut driver: ActuatorDriver<L, H>,
    commands: &CommandCell,
    cues: &Signal<CriticalSectionRawMutex, Cue>,
    faults: &FaultCell,
) -> ! {
    let mut ticker = Ticker::every(Duration::from_millis(ACTUATOR_FRAME_MS));
    let mut published = driver.faults();
    let mut logged = published;

    loop {
        let now = Instant::now().as_millis();

        if let Some(cue) = cues.try_take() {
            driver.play_cue(cue, now);
        }
        driver.apply(commands.load(), now);
        driver.refresh(now);

        let current = driver.faults();
        if current != published {
            if let Some(part) = current.newly_failing(&logged) {
                warn!("{} write failed (led={} haptic={})", part, current.led, current.haptic);
                logged = current;
            }
            faults.store(current);
            published = current;
        }

        ticker.next().await;
    }
}
