//! Debounce and short/long classification for the action button.
//!
//! Driven by polling: feed the raw level and a monotonic timestamp every
//! few milliseconds. A level change only counts once it has held for the
//! settle window, so contact bounce can never yield a second event.

use crate::ui::ButtonEvent;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    /// Held since `since_ms`; `reported` once a long press fired while held.
    Pressed { since_ms: u64, reported: bool },
}

/// Two-state press tracker with a timestamp-based settle window.
#[derive(Clone, Debug)]
pub struct ButtonInput {
    phase: Phase,
    raw: bool,
    raw_since_ms: u64,
    stable: bool,
    debounce_ms: u64,
    long_press_ms: u64,
}

impl ButtonInput {
    pub const fn new(debounce_ms: u64, long_press_ms: u64) -> Self {
        Self {
            phase: Phase::Idle,
            raw: false,
            raw_since_ms: 0,
            stable: false,
            debounce_ms,
            long_press_ms,
        }
    }

    /// True while no press is in progress.
    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle && !self.raw
    }

    /// Sample the button. Returns at most one event per physical press.
    ///
    /// A press held past the long-press threshold reports `LongPress`
    /// immediately; its eventual release then reports nothing.
    pub fn poll(&mut self, pressed: bool, now_ms: u64) -> ButtonEvent {
        if pressed != self.raw {
            self.raw = pressed;
            self.raw_since_ms = now_ms;
        }

        if self.raw != self.stable && now_ms.saturating_sub(self.raw_since_ms) >= self.debounce_ms {
            self.stable = self.raw;
            return self.on_settled_edge();
        }

        if let Phase::Pressed {
            since_ms,
            reported: false,
        } = self.phase
        {
            // A release still settling does not count as holding.
            if self.raw && now_ms.saturating_sub(since_ms) >= self.long_press_ms {
                self.phase = Phase::Pressed {
                    since_ms,
                    reported: true,
                };
                return ButtonEvent::LongPress;
            }
        }

        ButtonEvent::None
    }

    fn on_settled_edge(&mut self) -> ButtonEvent {
        if self.stable {
            self.phase = Phase::Pressed {
                since_ms: self.raw_since_ms,
                reported: false,
            };
            return ButtonEvent::None;
        }

        let phase = core::mem::replace(&mut self.phase, Phase::Idle);
        match phase {
            Phase::Pressed { reported: true, .. } | Phase::Idle => ButtonEvent::None,
            Phase::Pressed { since_ms, .. } => {
                if self.raw_since_ms.saturating_sub(since_ms) < self.long_press_ms {
                    ButtonEvent::ShortPress
                } else {
                    ButtonEvent::LongPress
                }
            }
        }
    }
}
