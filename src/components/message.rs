use std::time::{Duration, Instant};

use eframe::egui;

/// How long a message stays up when the caller doesn't specify.
pub const DEFAULT_DURATION: Duration = Duration::from_millis(3000);

/// Fade-out tail appended after the hold duration.
const FADE: Duration = Duration::from_millis(500);

// ============================================================================
// MESSAGE BAR — single-slot transient notice
// ============================================================================

/// Shows one message at a time. A new message replaces the current one and
/// restarts the clock; after its duration the text fades out.
#[derive(Default)]
pub struct MessageBar {
    text: String,
    shown_at: Option<Instant>,
    duration: Duration,
}

impl MessageBar {
    pub fn show(&mut self, text: impl Into<String>, now: Instant) {
        self.show_for(text, DEFAULT_DURATION, now);
    }

    pub fn show_for(&mut self, text: impl Into<String>, duration: Duration, now: Instant) {
        self.text = text.into();
        self.duration = duration;
        self.shown_at = Some(now);
    }

    /// Current opacity in (0, 1], or `None` once the message has expired.
    pub fn opacity(&self, now: Instant) -> Option<f32> {
        let shown_at = self.shown_at?;
        let elapsed = now.duration_since(shown_at);
        if elapsed < self.duration {
            Some(1.0)
        } else if elapsed < self.duration + FADE {
            let into_fade = (elapsed - self.duration).as_secs_f32() / FADE.as_secs_f32();
            Some(1.0 - into_fade)
        } else {
            None
        }
    }

    pub fn is_visible(&self, now: Instant) -> bool {
        self.opacity(now).is_some()
    }

    /// Draw the bar (empty placeholder height when nothing is showing, so
    /// the layout doesn't jump).
    pub fn ui(&mut self, ui: &mut egui::Ui, now: Instant) {
        match self.opacity(now) {
            Some(opacity) => {
                let color = ui
                    .visuals()
                    .strong_text_color()
                    .gamma_multiply(opacity);
                ui.colored_label(color, &self.text);
                ui.ctx().request_repaint_after(Duration::from_millis(100));
            }
            None => {
                self.shown_at = None;
                ui.label(" ");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_holds_then_fades_then_hides() {
        let mut bar = MessageBar::default();
        let t0 = Instant::now();
        bar.show("Uploading...", t0);

        assert_eq!(bar.opacity(t0 + Duration::from_millis(2999)), Some(1.0));
        let fading = bar.opacity(t0 + Duration::from_millis(3250)).unwrap();
        assert!(fading > 0.0 && fading < 1.0);
        assert_eq!(bar.opacity(t0 + Duration::from_millis(3600)), None);
    }

    #[test]
    fn a_new_message_replaces_and_restarts() {
        let mut bar = MessageBar::default();
        let t0 = Instant::now();
        bar.show("first", t0);
        let t1 = t0 + Duration::from_millis(2900);
        bar.show("second", t1);
        // Old expiry no longer applies
        assert!(bar.is_visible(t0 + Duration::from_millis(4000)));
    }

    #[test]
    fn caller_specified_duration_is_honored() {
        let mut bar = MessageBar::default();
        let t0 = Instant::now();
        bar.show_for("quick", Duration::from_millis(500), t0);
        assert!(bar.is_visible(t0 + Duration::from_millis(400)));
        assert!(!bar.is_visible(t0 + Duration::from_millis(1100)));
    }
}
