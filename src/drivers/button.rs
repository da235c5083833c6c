//! Factory-reset button hold detector.
//!
//! ## Hardware
//!
//! The BOOT button (GPIO 0, active low, internal pull-up).  The level is
//! sampled from the main loop once per tick; there is no ISR.
//!
//! ## Gesture
//!
//! | Condition                                   | Result            |
//! |---------------------------------------------|-------------------|
//! | Held continuously for more than `hold_ms`   | `true`, once      |
//! | Released at any point before that           | hold timer resets |
//! | Still held after firing                     | nothing further   |
//!
//! The trigger is on hold duration, not on release, so a user who keeps
//! the button down after the reset starts does not re-arm it.

/// Internal hold state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HoldState {
    Released,
    Held { since_ms: u64 },
    /// Threshold crossed during this hold; waiting for release.
    Fired,
}

pub struct ResetHoldDetector {
    hold_ms: u64,
    state: HoldState,
}

impl ResetHoldDetector {
    pub fn new(hold_ms: u32) -> Self {
        Self {
            hold_ms: u64::from(hold_ms),
            state: HoldState::Released,
        }
    }

    /// Feed one sample.  Returns `true` on the single tick where the
    /// continuous hold first exceeds the threshold.
    pub fn sample(&mut self, now_ms: u64, pressed: bool) -> bool {
        if !pressed {
            self.state = HoldState::Released;
            return false;
        }

        match self.state {
            HoldState::Released => {
                self.state = HoldState::Held { since_ms: now_ms };
                false
            }
            HoldState::Held { since_ms } => {
                if now_ms.saturating_sub(since_ms) > self.hold_ms {
                    self.state = HoldState::Fired;
                    return true;
                }
                false
            }
            HoldState::Fired => false,
        }
    }
}
