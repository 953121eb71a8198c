use std::time::{Duration, Instant};

/// How long a first click keeps the gate armed.
pub const ARM_WINDOW: Duration = Duration::from_millis(5000);

/// Author string substituted for empty input and for old records that carry
/// no author field.
pub const NO_AUTHOR: &str = "no author";

/// Outcome of pressing the submit control.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateAction {
    /// Gate armed — show the "click again" notice, perform no network call.
    Armed,
    /// Second click inside the window — proceed with the submission.
    Proceed,
}

// ============================================================================
// SUBMISSION GATE — two-click confirmation with an expiry instant
// ============================================================================

/// Guards the irreversible remote submission behind a second click.
///
/// The armed state is an expiry `Instant`, not a boolean flipped back by a
/// timer callback: expiry is compared against the click's own timestamp
/// inside [`poke`](Self::poke), so a click racing the end of the window is
/// unambiguously either a confirmation (strictly before expiry) or a fresh
/// first click (at/after expiry). A stale click can never submit.
pub struct SubmissionGate {
    armed_until: Option<Instant>,
    window: Duration,
}

impl Default for SubmissionGate {
    fn default() -> Self {
        Self::new(ARM_WINDOW)
    }
}

impl SubmissionGate {
    pub fn new(window: Duration) -> Self {
        Self {
            armed_until: None,
            window,
        }
    }

    /// Register a click on the submit control at time `now`.
    pub fn poke(&mut self, now: Instant) -> GateAction {
        match self.armed_until {
            Some(expiry) if now < expiry => {
                self.armed_until = None;
                GateAction::Proceed
            }
            _ => {
                self.armed_until = Some(now + self.window);
                GateAction::Armed
            }
        }
    }

    /// True while a first click is still awaiting confirmation.
    pub fn is_armed(&self, now: Instant) -> bool {
        matches!(self.armed_until, Some(expiry) if now < expiry)
    }

    /// Drop the armed state (used when submission is refused, e.g. the
    /// record ceiling was hit).
    pub fn disarm(&mut self) {
        self.armed_until = None;
    }
}

/// Trim the author input; empty or whitespace-only input becomes
/// [`NO_AUTHOR`].
pub fn normalize_author(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        NO_AUTHOR.to_string()
    } else {
        trimmed.to_string()
    }
}
