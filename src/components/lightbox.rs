use std::time::{Duration, Instant};

use eframe::egui;

/// Interval between automatic advances while autoplaying.
pub const AUTOPLAY_INTERVAL: Duration = Duration::from_millis(3000);

/// One image of the active lightbox collection. Textures are shared handles
/// into the gallery/playlist caches; `None` means the image never resolved
/// (the lightbox only ever receives resolved items, but the field stays
/// optional so tests can build items without a GPU context).
#[derive(Clone)]
pub struct LightboxItem {
    pub texture: Option<egui::TextureHandle>,
    pub alt: String,
}

// ============================================================================
// LIGHTBOX — modal viewer over an ordered image list
// ============================================================================

/// State machine over {Closed, Open-Static, Open-Autoplaying}.
///
/// Opening replaces the item list wholesale — the submission gallery and
/// every curated playlist share this single instance, and lists are never
/// merged. The index is only ever stepped modulo the list length, so no
/// out-of-range state is observable while open.
pub struct Lightbox {
    items: Vec<LightboxItem>,
    current: usize,
    open: bool,
    autoplay: bool,
    /// Restarted on every index change, manual or automatic, so the progress
    /// indicator is always accurate to the current item.
    progress_started: Instant,
}

impl Default for Lightbox {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            current: 0,
            open: false,
            autoplay: false,
            progress_started: Instant::now(),
        }
    }
}

impl Lightbox {
    /// Open over `items` with the clicked image at `index`. A click on an
    /// empty collection is ignored.
    pub fn open_at(&mut self, items: Vec<LightboxItem>, index: usize, now: Instant) {
        if items.is_empty() {
            return;
        }
        self.current = index.min(items.len() - 1);
        self.items = items;
        self.open = true;
        self.autoplay = false;
        self.progress_started = now;
    }

    /// Close and reset. Cancels autoplay; the item list is dropped.
    pub fn close(&mut self) {
        self.open = false;
        self.autoplay = false;
        self.items.clear();
        self.current = 0;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_autoplaying(&self) -> bool {
        self.open && self.autoplay
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_item(&self) -> Option<&LightboxItem> {
        if self.open { self.items.get(self.current) } else { None }
    }

    /// Advance to the next image, wrapping at the end.
    pub fn next(&mut self, now: Instant) {
        if !self.open || self.items.is_empty() {
            return;
        }
        self.current = (self.current + 1) % self.items.len();
        self.progress_started = now;
    }

    /// Step back to the previous image, wrapping at the start.
    pub fn prev(&mut self, now: Instant) {
        if !self.open || self.items.is_empty() {
            return;
        }
        self.current = (self.current + self.items.len() - 1) % self.items.len();
        self.progress_started = now;
    }

    /// Toggle autoplay. Starting restarts the progress clock; toggling twice
    /// in a row therefore returns to the stopped state.
    pub fn toggle_autoplay(&mut self, now: Instant) {
        if !self.open {
            return;
        }
        self.autoplay = !self.autoplay;
        if self.autoplay {
            self.progress_started = now;
        }
    }

    /// Drive the autoplay timer. Advances at most one step per call once the
    /// interval has elapsed; returns whether an advance happened. Safe no-op
    /// while closed or static (a tick from a stale timer does nothing).
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.is_autoplaying() {
            return false;
        }
        if now.duration_since(self.progress_started) >= AUTOPLAY_INTERVAL {
            self.next(now);
            return true;
        }
        false
    }

    /// Progress of the current item's autoplay slot in [0, 1].
    pub fn progress(&self, now: Instant) -> f32 {
        let elapsed = now.duration_since(self.progress_started).as_secs_f32();
        (elapsed / AUTOPLAY_INTERVAL.as_secs_f32()).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(n: usize) -> Vec<LightboxItem> {
        (0..n)
            .map(|i| LightboxItem {
                texture: None,
                alt: format!("image {}", i),
            })
            .collect()
    }

    #[test]
    fn next_wraps_circularly_back_to_start() {
        let mut lb = Lightbox::default();
        let t0 = Instant::now();
        lb.open_at(items(5), 2, t0);

        let mut seen = Vec::new();
        for _ in 0..5 {
            lb.next(t0);
            seen.push(lb.current_index());
        }
        assert_eq!(seen, vec![3, 4, 0, 1, 2]);
    }

    #[test]
    fn prev_wraps_at_the_first_item() {
        let mut lb = Lightbox::default();
        let t0 = Instant::now();
        lb.open_at(items(3), 0, t0);
        lb.prev(t0);
        assert_eq!(lb.current_index(), 2);
    }

    #[test]
    fn autoplay_toggle_twice_stops() {
        let mut lb = Lightbox::default();
        let t0 = Instant::now();
        lb.open_at(items(3), 0, t0);
        lb.toggle_autoplay(t0);
        assert!(lb.is_autoplaying());
        lb.toggle_autoplay(t0);
        assert!(!lb.is_autoplaying());
        // Stopped: the timer no longer advances anything
        assert!(!lb.tick(t0 + AUTOPLAY_INTERVAL));
        assert_eq!(lb.current_index(), 0);
    }

    #[test]
    fn tick_advances_after_the_interval_and_restarts_progress() {
        let mut lb = Lightbox::default();
        let t0 = Instant::now();
        lb.open_at(items(3), 0, t0);
        lb.toggle_autoplay(t0);

        assert!(!lb.tick(t0 + Duration::from_millis(2999)));
        assert!(lb.tick(t0 + AUTOPLAY_INTERVAL));
        assert_eq!(lb.current_index(), 1);
        // Progress restarted at the advance instant
        assert_eq!(lb.progress(t0 + AUTOPLAY_INTERVAL), 0.0);
    }

    #[test]
    fn manual_navigation_restarts_the_progress_indicator() {
        let mut lb = Lightbox::default();
        let t0 = Instant::now();
        lb.open_at(items(4), 0, t0);
        lb.toggle_autoplay(t0);

        let mid = t0 + Duration::from_millis(1500);
        assert!(lb.progress(mid) > 0.4);
        lb.next(mid);
        assert_eq!(lb.progress(mid), 0.0);
    }

    #[test]
    fn close_resets_state_and_discards_stale_ticks() {
        let mut lb = Lightbox::default();
        let t0 = Instant::now();
        lb.open_at(items(3), 1, t0);
        lb.toggle_autoplay(t0);
        lb.close();

        assert!(!lb.is_open());
        assert_eq!(lb.len(), 0);
        assert!(lb.current_item().is_none());
        // A timer callback firing after close is a safe no-op
        assert!(!lb.tick(t0 + AUTOPLAY_INTERVAL));
    }

    #[test]
    fn opening_replaces_the_item_list_wholesale() {
        let mut lb = Lightbox::default();
        let t0 = Instant::now();
        lb.open_at(items(5), 4, t0);
        lb.open_at(items(2), 0, t0);
        assert_eq!(lb.len(), 2);
        assert_eq!(lb.current_index(), 0);
    }

    #[test]
    fn open_at_clamps_an_out_of_range_index() {
        let mut lb = Lightbox::default();
        let t0 = Instant::now();
        lb.open_at(items(3), 9, t0);
        assert_eq!(lb.current_index(), 2);
    }
}
