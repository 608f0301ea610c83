use std::fmt;

/// Spoken prompt the session should play.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Alert {
    /// First disengagement after an engaged stretch.
    StayEngaged,
    /// Disengagement persisting well past the last alert.
    FocusReminder,
}

impl Alert {
    pub fn message(self) -> &'static str {
        match self {
            Alert::StayEngaged => "Please stay engaged!",
            Alert::FocusReminder => "Please focus on the screen!",
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Cooldown-gated alert state machine, fed once per frame.
///
/// Fires `StayEngaged` on the first disengaged frame after an engaged one
/// once the cooldown has elapsed since the previous alert, and
/// `FocusReminder` during sustained disengagement once twice the cooldown
/// has elapsed. Everything else is suppressed.
pub struct AlertPolicy {
    cooldown: u64,
    last_alert_time: u64,
    last_disengaged: bool,
}

impl AlertPolicy {
    pub fn new(cooldown: u64) -> Self {
        Self {
            cooldown,
            last_alert_time: 0,
            last_disengaged: false,
        }
    }

    /// Observe one frame's verdict at wall-clock second `now`.
    pub fn observe(&mut self, disengaged: bool, now: u64) -> Option<Alert> {
        let mut fired = None;
        if disengaged && now.saturating_sub(self.last_alert_time) >= self.cooldown {
            if !self.last_disengaged {
                self.last_alert_time = now;
                fired = Some(Alert::StayEngaged);
            } else if now.saturating_sub(self.last_alert_time) >= self.cooldown * 2 {
                self.last_alert_time = now;
                fired = Some(Alert::FocusReminder);
            }
        }
        self.last_disengaged = disengaged;
        fired
    }
}
