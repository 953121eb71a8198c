use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use eframe::egui;
use egui::{Align2, Color32, ColorImage, FontId, Pos2, Rect, TextureOptions, Vec2};
use uuid::Uuid;

use crate::canvas::{CANVAS_HEIGHT, CANVAS_WIDTH, CanvasState, PenState};
use crate::cli::CliArgs;
use crate::components::gallery::{EntryImage, GalleryPanel, GalleryStatus};
use crate::components::gate::{GateAction, SubmissionGate, normalize_author};
use crate::components::history::UndoStack;
use crate::components::lightbox::{Lightbox, LightboxItem};
use crate::components::message::MessageBar;
use crate::host::HostLink;
use crate::playlist::{self, PlaylistItem};
use crate::settings::Settings;
use crate::store::{DecodedImage, StoreCommand, StoreEvent, StoreHandle};
use crate::{log_err, log_info};

const FULL_UV: Rect = Rect {
    min: Pos2::new(0.0, 0.0),
    max: Pos2::new(1.0, 1.0),
};

/// Thumbnail edge length in the gallery grid and playlist strips.
const THUMB_EDGE: f32 = 120.0;

// ============================================================================
// CURATED PLAYLIST VIEW
// ============================================================================

/// One curated playlist: manifest items plus their per-item image state.
/// Shares the gallery's Pending/Ready/Failed model and the single lightbox.
struct PlaylistView {
    name: String,
    items: Vec<PlaylistItem>,
    images: Vec<EntryImage>,
}

impl PlaylistView {
    fn lightbox_items(&self) -> Vec<LightboxItem> {
        self.items
            .iter()
            .zip(&self.images)
            .filter_map(|(item, image)| match image {
                EntryImage::Ready(texture) => Some(LightboxItem {
                    texture: Some(texture.clone()),
                    alt: item.alt.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    fn lightbox_position(&self, index: usize) -> Option<usize> {
        match self.images.get(index) {
            Some(EntryImage::Ready(_)) => Some(
                self.images[..index]
                    .iter()
                    .filter(|i| matches!(i, EntryImage::Ready(_)))
                    .count(),
            ),
            _ => None,
        }
    }
}

// ============================================================================
// APPLICATION
// ============================================================================

pub struct OekakiApp {
    args: CliArgs,

    // Drawing surface
    canvas: CanvasState,
    pen: PenState,
    undo: UndoStack,

    // Submission
    gate: SubmissionGate,
    author_input: String,

    // Remote content
    store: StoreHandle,
    gallery: GalleryPanel,
    playlists: Vec<PlaylistView>,

    // Viewing
    lightbox: Lightbox,
    lightbox_was_open: bool,

    // Chrome
    message: MessageBar,
    host: Option<HostLink>,
    settings: Settings,
}

impl OekakiApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, args: CliArgs) -> Self {
        let settings = Settings::load();
        let store = StoreHandle::spawn(args.store_url.clone(), args.collection.clone());

        // Load playlist manifests up front; their images stream in via the
        // store worker like gallery items do.
        let mut playlists = Vec::new();
        for path in &args.playlist {
            match playlist::load_manifest(path) {
                Ok(items) => {
                    let name = playlist::manifest_name(path);
                    for (index, item) in items.iter().enumerate() {
                        store.send(StoreCommand::FetchPlaylistImage {
                            list: playlists.len(),
                            index,
                            src: item.src.clone(),
                        });
                    }
                    log_info!("playlist '{}': {} items", name, items.len());
                    playlists.push(PlaylistView {
                        name,
                        images: vec![EntryImage::Pending; items.len()],
                        items,
                    });
                }
                Err(e) => log_err!("playlist {} skipped: {}", path.display(), e),
            }
        }

        let mut app = Self {
            canvas: CanvasState::new(CANVAS_WIDTH, CANVAS_HEIGHT),
            pen: settings.pen(),
            undo: UndoStack::default(),
            gate: SubmissionGate::default(),
            author_input: settings.author.clone(),
            store,
            gallery: GalleryPanel::default(),
            playlists,
            lightbox: Lightbox::default(),
            lightbox_was_open: false,
            message: MessageBar::default(),
            host: if args.host_messages {
                Some(HostLink::stdout())
            } else {
                None
            },
            settings,
            args,
        };
        app.trigger_reload();
        app
    }

    fn trigger_reload(&mut self) {
        let generation = self.gallery.begin_reload();
        self.store.send(StoreCommand::Reload {
            generation,
            limit: self.args.gallery_limit,
        });
    }

    // ------------------------------------------------------------------
    // Store event routing
    // ------------------------------------------------------------------

    fn handle_store_event(&mut self, ctx: &egui::Context, event: StoreEvent, now: Instant) {
        match event {
            StoreEvent::Submitted => {
                self.message.show("Image submitted successfully!", now);
                self.trigger_reload();
            }
            StoreEvent::SubmitFailed(_) => {
                // Canvas is untouched — the user can retry without redrawing
                self.message.show("Upload failed.", now);
            }
            StoreEvent::LimitReached { limit, .. } => {
                self.gate.disarm();
                self.message.show(
                    format!(
                        "Image limit reached ({}). Please delete an older drawing first.",
                        limit
                    ),
                    now,
                );
            }
            StoreEvent::Listed {
                generation,
                records,
            } => {
                self.gallery.apply_listing(generation, records);
            }
            StoreEvent::ListFailed { generation, error } => {
                self.gallery.apply_list_failed(generation, error.to_string());
            }
            StoreEvent::ItemResolved {
                generation,
                index,
                image,
            } => {
                if generation == self.gallery.generation() {
                    let name = format!("gallery-{}-{}", generation, index);
                    let texture = upload_texture(ctx, &name, image);
                    self.gallery.apply_resolved(generation, index, texture);
                }
            }
            StoreEvent::ItemResolveFailed {
                generation, index, ..
            } => {
                self.gallery.apply_resolve_failed(generation, index);
            }
            StoreEvent::PlaylistImage {
                list,
                index,
                result,
            } => {
                if let Some(view) = self.playlists.get_mut(list)
                    && let Some(slot) = view.images.get_mut(index)
                {
                    *slot = match result {
                        Ok(image) => {
                            let name = format!("playlist-{}-{}", list, index);
                            EntryImage::Ready(upload_texture(ctx, &name, image))
                        }
                        Err(e) => {
                            log_err!("playlist image {}/{}: {}", list, index, e);
                            EntryImage::Failed
                        }
                    };
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Submission
    // ------------------------------------------------------------------

    fn submit_clicked(&mut self, now: Instant) {
        match self.gate.poke(now) {
            GateAction::Armed => {
                self.message.show("Click again to submit.", now);
            }
            GateAction::Proceed => match self.canvas.encode_png() {
                Ok(png) => {
                    let timestamp_ms = epoch_ms();
                    let key = format!(
                        "oekaki/canvas_{}_{}.png",
                        timestamp_ms,
                        Uuid::new_v4().simple()
                    );
                    let payload = format!("data:image/png;base64,{}", BASE64.encode(&png));
                    self.message.show("Uploading...", now);
                    self.store.send(StoreCommand::Submit {
                        key,
                        payload,
                        timestamp_ms,
                        author: normalize_author(&self.author_input),
                        limit: self.args.record_limit,
                    });
                }
                Err(e) => {
                    log_err!("submit: {}", e);
                    self.message.show("Upload failed.", now);
                }
            },
        }
    }

    // ------------------------------------------------------------------
    // Drawing surface + controls
    // ------------------------------------------------------------------

    fn canvas_ui(&mut self, ui: &mut egui::Ui) {
        let size = Vec2::new(CANVAS_WIDTH as f32, CANVAS_HEIGHT as f32);
        let (rect, response) = ui.allocate_exact_size(size, egui::Sense::drag());

        let texture_id = self.canvas.texture(ui.ctx()).id();
        ui.painter()
            .image(texture_id, rect, FULL_UV, Color32::WHITE);
        ui.painter().rect_stroke(
            rect,
            0.0,
            egui::Stroke::new(1.0, ui.visuals().widgets.noninteractive.fg_stroke.color),
        );

        let to_canvas = |pos: Pos2| (pos.x - rect.min.x, pos.y - rect.min.y);

        if response.drag_started()
            && let Some(pos) = response.interact_pointer_pos()
        {
            // Snapshot before the first pixel changes so undo restores the
            // pristine pre-stroke raster
            self.undo.snapshot(&self.canvas);
            self.canvas.begin_stroke(to_canvas(pos));
        }
        if response.dragged()
            && self.canvas.stroke_active()
            && let Some(pos) = response.interact_pointer_pos()
        {
            if rect.contains(pos) {
                self.canvas.stroke_to(to_canvas(pos), &self.pen);
            } else {
                // Pointer left the canvas: the stroke ends there
                self.canvas.end_stroke();
            }
        }
        if response.drag_released() {
            self.canvas.end_stroke();
        }
    }

    fn controls_ui(&mut self, ui: &mut egui::Ui, now: Instant) {
        ui.horizontal(|ui| {
            ui.label("Pen:");
            ui.color_edit_button_srgba(&mut self.pen.color);
            ui.add(
                egui::Slider::new(&mut self.pen.width, 1.0..=24.0)
                    .text("width")
                    .clamp_to_range(true),
            );
            ui.separator();
            if ui.button("Undo").clicked() {
                self.undo.undo();
            }
            if ui.button("Clear").clicked() {
                // snapshot-then-erase: a clear is itself undoable
                self.undo.snapshot(&self.canvas);
                self.canvas.erase_all();
            }
        });

        ui.horizontal(|ui| {
            ui.label("Author:");
            ui.add(
                egui::TextEdit::singleline(&mut self.author_input)
                    .desired_width(160.0)
                    .hint_text("no author"),
            );
            let label = if self.gate.is_armed(now) {
                "Confirm submit"
            } else {
                "Submit"
            };
            if ui.button(label).clicked() {
                self.submit_clicked(now);
            }
        });
    }

    // ------------------------------------------------------------------
    // Gallery + playlists
    // ------------------------------------------------------------------

    fn gallery_ui(&mut self, ui: &mut egui::Ui, now: Instant) {
        ui.heading("Submitted Images");

        match self.gallery.status() {
            GalleryStatus::Loading => {
                ui.label("Loading...");
                return;
            }
            GalleryStatus::Empty => {
                ui.label("No images yet.");
                return;
            }
            GalleryStatus::Error(_) => {
                ui.colored_label(ui.visuals().error_fg_color, "Failed to load gallery.");
                return;
            }
            GalleryStatus::Loaded => {}
        }

        let mut clicked_entry = None;
        ui.horizontal_wrapped(|ui| {
            for (i, entry) in self.gallery.entries().iter().enumerate() {
                ui.vertical(|ui| {
                    ui.set_width(THUMB_EDGE);
                    if thumbnail_slot(ui, &entry.image) {
                        clicked_entry = Some(i);
                    }
                    ui.small(entry.timestamp_label());
                    ui.small(entry.author_label());
                });
            }
        });

        if let Some(i) = clicked_entry
            && let Some(position) = self.gallery.lightbox_position(i)
        {
            self.lightbox
                .open_at(self.gallery.lightbox_items(), position, now);
        }
    }

    fn playlists_ui(&mut self, ui: &mut egui::Ui, now: Instant) {
        let mut open_request = None;
        for (li, view) in self.playlists.iter().enumerate() {
            ui.add_space(8.0);
            ui.heading(&view.name);
            egui::ScrollArea::horizontal()
                .id_source(("playlist-strip", li))
                .show(ui, |ui| {
                    ui.horizontal(|ui| {
                        for (ii, image) in view.images.iter().enumerate() {
                            if thumbnail_slot(ui, image) {
                                open_request = Some((li, ii));
                            }
                        }
                    });
                });
        }

        if let Some((li, ii)) = open_request
            && let Some(position) = self.playlists[li].lightbox_position(ii)
        {
            self.lightbox
                .open_at(self.playlists[li].lightbox_items(), position, now);
        }
    }

    // ------------------------------------------------------------------
    // Lightbox overlay
    // ------------------------------------------------------------------

    fn lightbox_ui(&mut self, ctx: &egui::Context, now: Instant) {
        if !self.lightbox.is_open() {
            return;
        }

        if ctx.input(|i| i.key_pressed(egui::Key::ArrowRight)) {
            self.lightbox.next(now);
        }
        if ctx.input(|i| i.key_pressed(egui::Key::ArrowLeft)) {
            self.lightbox.prev(now);
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.lightbox.close();
            return;
        }

        let screen = ctx.screen_rect();
        egui::Area::new(egui::Id::new("lightbox"))
            .order(egui::Order::Foreground)
            .fixed_pos(screen.min)
            .show(ctx, |ui| {
                let (bg, response) = ui.allocate_exact_size(screen.size(), egui::Sense::click());
                let painter = ui.painter();
                painter.rect_filled(bg, 0.0, Color32::from_black_alpha(217));

                // Current image, fitted with margins for the controls
                let mut image_rect = Rect::NOTHING;
                if let Some(item) = self.lightbox.current_item() {
                    if let Some(texture) = &item.texture {
                        let avail = bg.size() - Vec2::new(160.0, 140.0);
                        let size = fit_inside(texture.size_vec2(), avail);
                        image_rect = Rect::from_center_size(bg.center(), size);
                        painter.image(texture.id(), image_rect, FULL_UV, Color32::WHITE);
                    }
                    painter.text(
                        Pos2::new(bg.center().x, bg.bottom() - 64.0),
                        Align2::CENTER_CENTER,
                        format!(
                            "{}  ({} / {})",
                            item.alt,
                            self.lightbox.current_index() + 1,
                            self.lightbox.len()
                        ),
                        FontId::proportional(14.0),
                        Color32::WHITE,
                    );
                }

                // Controls are painted glyphs with manual hit zones — no
                // overlapping widget ambiguity on the modal layer
                let prev_zone =
                    Rect::from_center_size(Pos2::new(bg.left() + 40.0, bg.center().y), Vec2::new(56.0, 120.0));
                let next_zone =
                    Rect::from_center_size(Pos2::new(bg.right() - 40.0, bg.center().y), Vec2::new(56.0, 120.0));
                let close_zone =
                    Rect::from_center_size(Pos2::new(bg.right() - 36.0, bg.top() + 36.0), Vec2::new(48.0, 48.0));
                let play_zone =
                    Rect::from_center_size(Pos2::new(bg.center().x, bg.bottom() - 32.0), Vec2::new(48.0, 40.0));

                let glyphs = FontId::proportional(32.0);
                painter.text(prev_zone.center(), Align2::CENTER_CENTER, "‹", glyphs.clone(), Color32::WHITE);
                painter.text(next_zone.center(), Align2::CENTER_CENTER, "›", glyphs.clone(), Color32::WHITE);
                painter.text(close_zone.center(), Align2::CENTER_CENTER, "✕", FontId::proportional(22.0), Color32::WHITE);
                let play_glyph = if self.lightbox.is_autoplaying() { "⏸" } else { "▶" };
                painter.text(play_zone.center(), Align2::CENTER_CENTER, play_glyph, FontId::proportional(22.0), Color32::WHITE);

                if self.lightbox.is_autoplaying() {
                    let bar = Rect::from_min_size(
                        Pos2::new(bg.left() + 24.0, bg.bottom() - 10.0),
                        Vec2::new(bg.width() - 48.0, 4.0),
                    );
                    painter.rect_filled(bar, 2.0, Color32::from_gray(70));
                    let frac = self.lightbox.progress(now);
                    painter.rect_filled(
                        Rect::from_min_size(bar.min, Vec2::new(bar.width() * frac, bar.height())),
                        2.0,
                        Color32::WHITE,
                    );
                }

                if response.clicked()
                    && let Some(pos) = response.interact_pointer_pos()
                {
                    if prev_zone.contains(pos) {
                        self.lightbox.prev(now);
                    } else if next_zone.contains(pos) {
                        self.lightbox.next(now);
                    } else if play_zone.contains(pos) {
                        self.lightbox.toggle_autoplay(now);
                    } else if close_zone.contains(pos) || !image_rect.contains(pos) {
                        // Clicking outside the image closes the viewer
                        self.lightbox.close();
                    }
                }
            });
    }
}

impl eframe::App for OekakiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();

        for event in self.store.poll_events() {
            self.handle_store_event(ctx, event, now);
        }
        for raster in self.undo.poll_restores() {
            self.canvas.replace_raster(raster);
        }
        self.lightbox.tick(now);

        let mut content_height = 0.0;
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                self.canvas_ui(ui);
                self.controls_ui(ui, now);
                self.message.ui(ui, now);
                ui.separator();
                self.gallery_ui(ui, now);
                self.playlists_ui(ui, now);
                content_height = ui.min_rect().height();
            });
        });

        self.lightbox_ui(ctx, now);

        // Host-frame notifications: expand/shrink around the modal, height
        // updates while inline
        let open = self.lightbox.is_open();
        if let Some(host) = &mut self.host {
            if open != self.lightbox_was_open {
                if open {
                    host.expand();
                } else {
                    host.shrink();
                }
            }
            if !open {
                host.resize(content_height.round() as u32);
            }
        }
        self.lightbox_was_open = open;

        // Heartbeat: background completions (decodes, network) must surface
        // without user input, and autoplay needs steady progress frames
        ctx.request_repaint_after(Duration::from_millis(if open { 50 } else { 250 }));
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.settings.remember_pen(&self.pen);
        self.settings.author = self.author_input.clone();
        self.settings.save();
        self.store.shutdown();
        log_info!("session ended");
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Upload a worker-decoded raster as a UI texture.
fn upload_texture(ctx: &egui::Context, name: &str, image: DecodedImage) -> egui::TextureHandle {
    let color = ColorImage::from_rgba_unmultiplied([image.width, image.height], &image.rgba);
    ctx.load_texture(name, color, TextureOptions::LINEAR)
}

/// Draw one grid/strip slot for an entry image. Returns true when a ready
/// thumbnail was clicked.
fn thumbnail_slot(ui: &mut egui::Ui, image: &EntryImage) -> bool {
    let slot = Vec2::splat(THUMB_EDGE);
    match image {
        EntryImage::Ready(texture) => {
            let (rect, response) = ui.allocate_exact_size(slot, egui::Sense::click());
            let fitted = fit_inside(texture.size_vec2(), slot);
            let image_rect = Rect::from_center_size(rect.center(), fitted);
            ui.painter()
                .image(texture.id(), image_rect, FULL_UV, Color32::WHITE);
            if response.hovered() {
                ui.painter().rect_stroke(
                    image_rect,
                    0.0,
                    egui::Stroke::new(2.0, ui.visuals().hyperlink_color),
                );
            }
            response.clicked()
        }
        EntryImage::Pending => {
            let (rect, _) = ui.allocate_exact_size(slot, egui::Sense::hover());
            egui::Spinner::new().paint_at(ui, Rect::from_center_size(rect.center(), Vec2::splat(24.0)));
            false
        }
        EntryImage::Failed => {
            let (rect, _) = ui.allocate_exact_size(slot, egui::Sense::hover());
            ui.painter().rect_stroke(
                rect,
                0.0,
                egui::Stroke::new(1.0, ui.visuals().weak_text_color()),
            );
            ui.painter().text(
                rect.center(),
                Align2::CENTER_CENTER,
                "Failed to load image",
                FontId::proportional(11.0),
                ui.visuals().weak_text_color(),
            );
            false
        }
    }
}

/// Scale `size` to fit inside `bounds`, preserving aspect ratio and never
/// upscaling beyond 2x.
fn fit_inside(size: Vec2, bounds: Vec2) -> Vec2 {
    if size.x <= 0.0 || size.y <= 0.0 {
        return bounds;
    }
    let scale = (bounds.x / size.x).min(bounds.y / size.y).min(2.0);
    size * scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_inside_preserves_aspect_ratio() {
        let fitted = fit_inside(Vec2::new(400.0, 200.0), Vec2::new(100.0, 100.0));
        assert_eq!(fitted, Vec2::new(100.0, 50.0));
    }

    #[test]
    fn fit_inside_caps_upscaling() {
        let fitted = fit_inside(Vec2::new(10.0, 10.0), Vec2::new(500.0, 500.0));
        assert_eq!(fitted, Vec2::new(20.0, 20.0));
    }
}
