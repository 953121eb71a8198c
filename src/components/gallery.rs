use eframe::egui;
use serde::Deserialize;

use crate::components::gate::NO_AUTHOR;
use crate::components::lightbox::LightboxItem;

/// One metadata record from the document store. Old records may predate the
/// author field; a broken record may carry no timestamp (`0` then, matching
/// the original data).
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct GalleryRecord {
    pub id: String,
    pub path: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub author: Option<String>,
}

/// Per-entry image resolution state. Resolution is asynchronous and
/// unordered across entries.
#[derive(Clone)]
pub enum EntryImage {
    Pending,
    Ready(egui::TextureHandle),
    /// Renders as a labeled broken-image placeholder, never silently dropped.
    Failed,
}

pub struct GalleryEntry {
    pub record: GalleryRecord,
    pub image: EntryImage,
}

impl GalleryEntry {
    pub fn timestamp_label(&self) -> String {
        format_timestamp_ms(self.record.timestamp)
    }

    pub fn author_label(&self) -> &str {
        match self.record.author.as_deref() {
            Some(a) if !a.trim().is_empty() => a,
            _ => NO_AUTHOR,
        }
    }
}

/// Container-level state of the last load.
#[derive(Clone, Debug, PartialEq)]
pub enum GalleryStatus {
    Loading,
    Loaded,
    /// Zero records — an explicit "No images yet." state, not an empty grid.
    Empty,
    /// List failure replaces the whole container; no partial list is shown.
    Error(String),
}

// ============================================================================
// GALLERY — bounded, time-ordered view of submitted drawings
// ============================================================================

/// Backing state for the submitted-images grid.
///
/// Entries keep their listing-order position once created even though their
/// images resolve out of order. Loads carry a generation number; completions
/// from a superseded load are discarded (in-flight requests are never
/// cancelled, their results just become no-ops).
pub struct GalleryPanel {
    status: GalleryStatus,
    entries: Vec<GalleryEntry>,
    generation: u64,
}

impl Default for GalleryPanel {
    fn default() -> Self {
        Self {
            status: GalleryStatus::Loading,
            entries: Vec::new(),
            generation: 0,
        }
    }
}

impl GalleryPanel {
    /// Discard everything shown and start a new load. Returns the new load's
    /// generation to tag the store request with.
    pub fn begin_reload(&mut self) -> u64 {
        self.generation += 1;
        self.entries.clear();
        self.status = GalleryStatus::Loading;
        self.generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn status(&self) -> &GalleryStatus {
        &self.status
    }

    /// Entries in listing order. Mutation goes through the `apply_*`
    /// operations so the generation guard cannot be bypassed.
    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    /// Listing arrived: one entry per record, newest first, images pending.
    pub fn apply_listing(&mut self, generation: u64, records: Vec<GalleryRecord>) {
        if generation != self.generation {
            return;
        }
        if records.is_empty() {
            self.status = GalleryStatus::Empty;
            return;
        }
        self.entries = records
            .into_iter()
            .map(|record| GalleryEntry {
                record,
                image: EntryImage::Pending,
            })
            .collect();
        self.status = GalleryStatus::Loaded;
    }

    pub fn apply_list_failed(&mut self, generation: u64, error: String) {
        if generation != self.generation {
            return;
        }
        self.entries.clear();
        self.status = GalleryStatus::Error(error);
    }

    pub fn apply_resolved(&mut self, generation: u64, index: usize, texture: egui::TextureHandle) {
        if generation != self.generation {
            return;
        }
        if let Some(entry) = self.entries.get_mut(index) {
            entry.image = EntryImage::Ready(texture);
        }
    }

    pub fn apply_resolve_failed(&mut self, generation: u64, index: usize) {
        if generation != self.generation {
            return;
        }
        if let Some(entry) = self.entries.get_mut(index) {
            entry.image = EntryImage::Failed;
        }
    }

    /// The lightbox backing list: every resolved entry, in entry order.
    pub fn lightbox_items(&self) -> Vec<LightboxItem> {
        self.entries
            .iter()
            .filter_map(|e| match &e.image {
                EntryImage::Ready(texture) => Some(LightboxItem {
                    texture: Some(texture.clone()),
                    alt: format!("{} — {}", e.timestamp_label(), e.author_label()),
                }),
                _ => None,
            })
            .collect()
    }

    /// Position of entry `index` inside [`lightbox_items`](Self::lightbox_items),
    /// or `None` if that entry has not resolved.
    pub fn lightbox_position(&self, index: usize) -> Option<usize> {
        match self.entries.get(index).map(|e| &e.image) {
            Some(EntryImage::Ready(_)) => Some(
                self.entries[..index]
                    .iter()
                    .filter(|e| matches!(e.image, EntryImage::Ready(_)))
                    .count(),
            ),
            _ => None,
        }
    }
}

// ============================================================================
// TIMESTAMP LABELS
// ============================================================================

/// Format epoch milliseconds as `M.D.YY @ HH:MM` (UTC) — the label shown
/// under each gallery thumbnail. Month and day are unpadded, matching the
/// site's established look. Negative timestamps clamp to the epoch.
pub fn format_timestamp_ms(ms: i64) -> String {
    let secs = (ms.max(0)) / 1000;
    let days = secs.div_euclid(86400);
    let (y, m, d) = civil_from_days(days);
    let in_day = secs.rem_euclid(86400);
    format!(
        "{}.{}.{:02} @ {:02}:{:02}",
        m,
        d,
        y.rem_euclid(100),
        in_day / 3600,
        (in_day % 3600) / 60
    )
}

/// Days-since-epoch to (year, month, day). Standard civil-calendar
/// conversion; no chrono dep.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let y = yoe + era * 400 + if m <= 2 { 1 } else { 0 };
    (y, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, ts: i64) -> GalleryRecord {
        GalleryRecord {
            id: id.to_string(),
            path: format!("oekaki/{}.png", id),
            timestamp: ts,
            author: None,
        }
    }

    #[test]
    fn zero_records_is_an_explicit_empty_state() {
        let mut gallery = GalleryPanel::default();
        let generation = gallery.begin_reload();
        gallery.apply_listing(generation, Vec::new());
        assert_eq!(gallery.status(), &GalleryStatus::Empty);
        assert!(gallery.entries().is_empty());
    }

    #[test]
    fn one_failed_resolution_leaves_siblings_intact() {
        let mut gallery = GalleryPanel::default();
        let generation = gallery.begin_reload();
        gallery.apply_listing(generation, (0..100).map(|i| record(&i.to_string(), i)).collect());

        gallery.apply_resolve_failed(generation, 7);
        assert_eq!(gallery.status(), &GalleryStatus::Loaded);
        assert!(matches!(gallery.entries()[7].image, EntryImage::Failed));
        let pending = gallery
            .entries()
            .iter()
            .filter(|e| matches!(e.image, EntryImage::Pending))
            .count();
        assert_eq!(pending, 99);
    }

    #[test]
    fn list_failure_replaces_the_whole_container() {
        let mut gallery = GalleryPanel::default();
        let generation = gallery.begin_reload();
        gallery.apply_list_failed(generation, "connection refused".into());
        assert!(matches!(gallery.status(), GalleryStatus::Error(_)));
        assert!(gallery.entries().is_empty());
    }

    #[test]
    fn completions_from_a_superseded_load_are_discarded() {
        let mut gallery = GalleryPanel::default();
        let old = gallery.begin_reload();
        let new = gallery.begin_reload();
        gallery.apply_listing(old, vec![record("stale", 1)]);
        assert_eq!(gallery.status(), &GalleryStatus::Loading);
        gallery.apply_list_failed(old, "stale failure".into());
        assert_eq!(gallery.status(), &GalleryStatus::Loading);
        gallery.apply_listing(new, vec![record("fresh", 2)]);
        assert_eq!(gallery.entries()[0].record.id, "fresh");
    }

    #[test]
    fn lightbox_position_counts_only_resolved_predecessors() {
        let mut gallery = GalleryPanel::default();
        let generation = gallery.begin_reload();
        gallery.apply_listing(generation, (0..4).map(|i| record(&i.to_string(), i)).collect());
        gallery.apply_resolve_failed(generation, 0);

        // Entries 1..4 pending/failed mixes: none resolved yet
        assert_eq!(gallery.lightbox_position(1), None);
        assert!(gallery.lightbox_items().is_empty());
        // Failed entries never open the lightbox
        assert_eq!(gallery.lightbox_position(0), None);
    }

    #[test]
    fn record_decodes_with_missing_optional_fields() {
        let rec: GalleryRecord =
            serde_json::from_str(r#"{"id": "r1", "path": "oekaki/a.png"}"#).unwrap();
        assert_eq!(rec.timestamp, 0);
        assert_eq!(rec.author, None);

        let entry = GalleryEntry {
            record: rec,
            image: EntryImage::Pending,
        };
        assert_eq!(entry.author_label(), "no author");
    }

    #[test]
    fn timestamp_labels_match_the_site_format() {
        assert_eq!(format_timestamp_ms(0), "1.1.70 @ 00:00");
        // 2001-09-09 01:46:40 UTC
        assert_eq!(format_timestamp_ms(1_000_000_000_000), "9.9.01 @ 01:46");
        assert_eq!(format_timestamp_ms(-5), "1.1.70 @ 00:00");
    }
}
