//! Unit tests for the actuator driver.
//!
//! Mock ports record every write into one shared log so the tests can
//! assert exact sequences, including the absence of repeated writes.

use std::cell::RefCell;
use std::rc::Rc;

use super::*;
use crate::config::{ALERT_BLINK_MS, STATUS_BLINK_MS};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Call {
    Led(LedColor),
    Play(u8),
    Stop,
}

type Log = Rc<RefCell<Vec<Call>>>;

struct Led {
    log: Log,
    broken: bool,
}

struct Haptic {
    log: Log,
    broken: bool,
}

impl LedPort for Led {
    fn set(&mut self, color: LedColor) -> Result<(), Error> {
        if self.broken {
            return Err(Error::ActuatorFault(Actuator::Led));
        }
        self.log.borrow_mut().push(Call::Led(color));
        Ok(())
    }
}

impl HapticPort for Haptic {
    fn play(&mut self, effect: HapticEffect) -> Result<(), Error> {
        if self.broken {
            return Err(Error::ActuatorFault(Actuator::Haptic));
        }
        self.log.borrow_mut().push(Call::Play(effect.0));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Error> {
        if self.broken {
            return Err(Error::ActuatorFault(Actuator::Haptic));
        }
        self.log.borrow_mut().push(Call::Stop);
        Ok(())
    }
}

fn driver_with(led_broken: bool, haptic_broken: bool) -> (ActuatorDriver<Led, Haptic>, Log) {
    let log: Log = Rc::default();
    let driver = ActuatorDriver::new(
        Led {
            log: log.clone(),
            broken: led_broken,
        },
        Haptic {
            log: log.clone(),
            broken: haptic_broken,
        },
    );
    (driver, log)
}

fn driver() -> (ActuatorDriver<Led, Haptic>, Log) {
    driver_with(false, false)
}

/// Run frames every 20 ms over `[from, to)`.
fn frames(d: &mut ActuatorDriver<Led, Haptic>, from: u64, to: u64) {
    let mut t = from;
    while t < to {
        d.refresh(t);
        t += 20;
    }
}

fn alert() -> ActuatorCommand {
    ActuatorCommand::blinking(LedColor::Yellow, ALERT_BLINK_MS).with_haptic(true)
}

// ═══════════════════════════════════════════════════════════════════════════
// Effects
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn click_levels_map_to_rom_effects() {
    assert_eq!(HapticEffect::click(100), HapticEffect(58));
    assert_eq!(HapticEffect::click(80), HapticEffect(59));
    assert_eq!(HapticEffect::click(20), HapticEffect(62));
    assert_eq!(HapticEffect::click(0), HapticEffect(62));
    assert_eq!(HapticEffect::click(255), HapticEffect(58));
}

// ═══════════════════════════════════════════════════════════════════════════
// Idempotence
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn reapplying_a_command_has_no_extra_effect() {
    let (mut d, log) = driver();
    d.apply(alert(), 0);
    let after_first = log.borrow().clone();

    d.apply(alert(), 0);
    d.refresh(0);
    d.apply(alert(), 0);
    assert_eq!(*log.borrow(), after_first);
    assert_eq!(after_first, vec![Call::Led(LedColor::Yellow), Call::Play(58)]);
}

#[test]
fn reapplying_mid_cycle_keeps_the_phase() {
    let (mut d, log) = driver();
    d.apply(alert(), 0);
    frames(&mut d, 0, 600);
    d.apply(alert(), 600);
    frames(&mut d, 600, 1_000);
    // One blink (on, off) and one pulse; re-apply at 600 restarted nothing.
    assert_eq!(
        *log.borrow(),
        vec![
            Call::Led(LedColor::Yellow),
            Call::Play(58),
            Call::Led(LedColor::Off),
        ]
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// Cadence
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn alert_blinks_and_pulses_every_second() {
    let (mut d, log) = driver();
    d.apply(alert(), 0);
    frames(&mut d, 0, 3_000);
    let log = log.borrow();
    let lit = log.iter().filter(|c| **c == Call::Led(LedColor::Yellow)).count();
    let pulses = log.iter().filter(|c| **c == Call::Play(58)).count();
    assert_eq!(lit, 3);
    assert_eq!(pulses, 3);
}

#[test]
fn nearby_blinks_slowly_without_haptic() {
    let (mut d, log) = driver();
    d.apply(ActuatorCommand::blinking(LedColor::Blue, STATUS_BLINK_MS), 0);
    frames(&mut d, 0, 9_000);
    let log = log.borrow();
    let lit = log.iter().filter(|c| **c == Call::Led(LedColor::Blue)).count();
    assert_eq!(lit, 2);
    assert!(!log.iter().any(|c| matches!(c, Call::Play(_))));
}

#[test]
fn solid_command_writes_once() {
    let (mut d, log) = driver();
    d.apply(
        ActuatorCommand {
            led_color: LedColor::Red,
            led_blink_interval_ms: None,
            haptic_enabled: false,
        },
        0,
    );
    frames(&mut d, 0, 5_000);
    assert_eq!(*log.borrow(), vec![Call::Led(LedColor::Red)]);
}

#[test]
fn leaving_alert_stops_the_motor() {
    let (mut d, log) = driver();
    d.apply(alert(), 0);
    d.apply(ActuatorCommand::blinking(LedColor::Blue, STATUS_BLINK_MS), 100);
    assert_eq!(
        *log.borrow(),
        vec![
            Call::Led(LedColor::Yellow),
            Call::Play(58),
            Call::Led(LedColor::Blue),
            Call::Stop,
        ]
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// Cues
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn startup_cue_is_one_cyan_blink_and_one_pulse() {
    let (mut d, log) = driver();
    d.play_cue(Cue::Startup, 0);
    assert!(d.cue_active());
    frames(&mut d, 0, 2_000);
    assert!(!d.cue_active());
    assert_eq!(
        *log.borrow(),
        vec![
            Call::Play(59),
            Call::Led(LedColor::Cyan),
            Call::Led(LedColor::Off),
            Call::Stop,
        ]
    );
}

#[test]
fn shutdown_cue_blinks_purple_five_times_then_goes_dark() {
    let (mut d, log) = driver();
    d.apply(alert(), 0);
    log.borrow_mut().clear();

    d.apply(ActuatorCommand::OFF, 500);
    d.play_cue(Cue::Shutdown, 500);
    frames(&mut d, 500, 3_000);

    let log = log.borrow();
    assert_eq!(log.iter().filter(|c| **c == Call::Led(LedColor::Purple)).count(), 5);
    assert!(!log.iter().any(|c| matches!(c, Call::Play(_))));
    assert!(log.contains(&Call::Stop));
    assert_eq!(log.last(), Some(&Call::Led(LedColor::Off)));
}

#[test]
fn cue_overrides_command_until_done() {
    let (mut d, log) = driver();
    d.play_cue(Cue::Startup, 0);
    d.apply(ActuatorCommand::blinking(LedColor::Blue, STATUS_BLINK_MS), 0);
    frames(&mut d, 0, 480);
    assert!(!log.borrow().contains(&Call::Led(LedColor::Blue)));
    frames(&mut d, 500, 520);
    assert!(log.borrow().contains(&Call::Led(LedColor::Blue)));
}

// ═══════════════════════════════════════════════════════════════════════════
// Faults
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn dead_haptic_is_counted_and_led_keeps_working() {
    let (mut d, log) = driver_with(false, true);
    d.apply(alert(), 0);
    frames(&mut d, 0, 2_000);

    let faults = d.faults();
    assert_eq!(faults.led, 0);
    assert_eq!(faults.haptic, 2);
    assert_eq!(faults.last, Some(Error::ActuatorFault(Actuator::Haptic)));
    assert_eq!(
        log.borrow()
            .iter()
            .filter(|c| **c == Call::Led(LedColor::Yellow))
            .count(),
        2
    );
}

#[test]
fn dead_led_is_counted_and_haptic_keeps_working() {
    let (mut d, log) = driver_with(true, false);
    d.apply(alert(), 0);
    frames(&mut d, 0, 2_000);

    assert!(d.faults().led >= 2);
    assert_eq!(d.faults().haptic, 0);
    assert_eq!(*log.borrow(), vec![Call::Play(58), Call::Play(58)]);
}

#[test]
fn dead_haptic_is_news_only_once_per_alert() {
    let (mut d, _log) = driver_with(false, true);
    d.apply(alert(), 0);

    let mut logged = d.faults();
    let mut reports = 0;
    let mut t = 0;
    while t < 10_000 {
        d.refresh(t);
        let current = d.faults();
        if current.newly_failing(&logged).is_some() {
            reports += 1;
            logged = current;
        }
        t += 20;
    }
    assert!(d.faults().haptic >= 10);
    assert_eq!(reports, 1);
}

#[test]
fn second_actuator_failing_is_reported_separately() {
    let logged = ActuatorFaults {
        led: 0,
        haptic: 4,
        last: Some(Error::ActuatorFault(Actuator::Haptic)),
    };
    let both = ActuatorFaults {
        led: 1,
        haptic: 5,
        last: Some(Error::ActuatorFault(Actuator::Led)),
    };
    assert_eq!(both.newly_failing(&logged), Some(Actuator::Led));
    assert_eq!(both.newly_failing(&both), None);
    assert_eq!(
        logged.newly_failing(&ActuatorFaults::default()),
        Some(Actuator::Haptic)
    );
}
