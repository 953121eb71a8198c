use eframe::egui;
use egui::{Color32, ColorImage, TextureOptions};
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, Rgba, RgbaImage};

/// Logical raster size of the drawing area, rendered 1:1 in UI points.
pub const CANVAS_WIDTH: u32 = 480;
pub const CANVAS_HEIGHT: u32 = 360;

/// Canvas background. Submissions are flattened onto this, so the raster is
/// always fully opaque.
pub const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

// ============================================================================
// PEN STATE
// ============================================================================

/// Current pen configuration. Mutated only by the UI controls, read by the
/// stroke engine on every draw sample. Cached across sessions via `Settings`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PenState {
    pub color: Color32,
    /// Stroke diameter in pixels. Always positive.
    pub width: f32,
}

impl Default for PenState {
    fn default() -> Self {
        Self {
            color: Color32::BLACK,
            width: 4.0,
        }
    }
}

// ============================================================================
// CANVAS STATE — raster + stroke engine
// ============================================================================

/// Owns the drawing raster and the in-progress stroke.
///
/// Strokes are rendered as straight segments between pointer samples with
/// round caps and no interpolation, so fast movements produce visible facets.
/// The raster is mutated in place; a finished stroke cannot be edited, only
/// undone wholesale via the undo stack.
pub struct CanvasState {
    raster: RgbaImage,
    /// Last sample of the active stroke; `None` when no stroke is active.
    stroke_last: Option<(f32, f32)>,
    /// Set whenever the raster changes; cleared when the texture is re-uploaded.
    dirty: bool,
    texture: Option<egui::TextureHandle>,
}

impl CanvasState {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            raster: RgbaImage::from_pixel(width, height, BACKGROUND),
            stroke_last: None,
            dirty: true,
            texture: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    pub fn height(&self) -> u32 {
        self.raster.height()
    }

    pub fn raster(&self) -> &RgbaImage {
        &self.raster
    }

    pub fn stroke_active(&self) -> bool {
        self.stroke_last.is_some()
    }

    /// Begin a stroke at `pos`. The caller must snapshot the raster *before*
    /// calling this so undo captures the pristine pre-stroke state.
    pub fn begin_stroke(&mut self, pos: (f32, f32)) {
        self.stroke_last = Some(pos);
    }

    /// Extend the active stroke to `pos`, rendering one straight segment with
    /// the current pen. No-op when no stroke is active.
    pub fn stroke_to(&mut self, pos: (f32, f32), pen: &PenState) {
        let Some(from) = self.stroke_last else {
            return;
        };
        self.draw_segment(from, pos, pen);
        self.stroke_last = Some(pos);
        self.dirty = true;
    }

    /// End the active stroke. Further `stroke_to` calls are no-ops until the
    /// next `begin_stroke`. Also called when the pointer leaves the canvas.
    pub fn end_stroke(&mut self) {
        self.stroke_last = None;
    }

    /// Wipe the raster back to the background color. Callers wanting an
    /// undoable clear must snapshot first.
    pub fn erase_all(&mut self) {
        for px in self.raster.pixels_mut() {
            *px = BACKGROUND;
        }
        self.dirty = true;
    }

    /// Replace the whole raster (undo replay). Full overwrite, not composited.
    pub fn replace_raster(&mut self, raster: RgbaImage) {
        // A snapshot from a previous session geometry is still applied as-is;
        // resize never happens at runtime so dimensions always match.
        self.raster = raster;
        self.stroke_last = None;
        self.dirty = true;
    }

    /// Encode the current raster as PNG (used by snapshots and submission).
    pub fn encode_png(&self) -> Result<Vec<u8>, String> {
        encode_png(&self.raster)
    }

    /// Rasterize one round-capped segment. Hard edge by design — distance to
    /// the segment decides coverage, nothing is anti-aliased or smoothed.
    fn draw_segment(&mut self, from: (f32, f32), to: (f32, f32), pen: &PenState) {
        let radius = (pen.width * 0.5).max(0.5);
        let color = Rgba([pen.color.r(), pen.color.g(), pen.color.b(), 255]);

        let (w, h) = (self.raster.width() as i32, self.raster.height() as i32);
        let min_x = ((from.0.min(to.0) - radius).floor() as i32).max(0);
        let min_y = ((from.1.min(to.1) - radius).floor() as i32).max(0);
        let max_x = ((from.0.max(to.0) + radius).ceil() as i32).min(w - 1);
        let max_y = ((from.1.max(to.1) + radius).ceil() as i32).min(h - 1);

        let r_sq = radius * radius;
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let d_sq = dist_sq_to_segment((x as f32 + 0.5, y as f32 + 0.5), from, to);
                if d_sq <= r_sq {
                    self.raster.put_pixel(x as u32, y as u32, color);
                }
            }
        }
    }

    /// Upload the raster to a texture when dirty and return the handle.
    pub fn texture(&mut self, ctx: &egui::Context) -> &egui::TextureHandle {
        if self.dirty || self.texture.is_none() {
            let size = [self.raster.width() as usize, self.raster.height() as usize];
            let img = ColorImage::from_rgba_unmultiplied(size, self.raster.as_raw());
            match &mut self.texture {
                Some(handle) => handle.set(img, TextureOptions::NEAREST),
                None => {
                    self.texture = Some(ctx.load_texture("canvas", img, TextureOptions::NEAREST));
                }
            }
            self.dirty = false;
        }
        self.texture.as_ref().unwrap()
    }
}

/// PNG-encode an RGBA raster.
pub fn encode_png(raster: &RgbaImage) -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(
            raster.as_raw(),
            raster.width(),
            raster.height(),
            ColorType::Rgba8,
        )
        .map_err(|e| format!("PNG encode error: {}", e))?;
    Ok(buf)
}

/// Decode PNG bytes back to an RGBA raster.
pub fn decode_png(bytes: &[u8]) -> Result<RgbaImage, String> {
    Ok(image::load_from_memory(bytes)
        .map_err(|e| format!("PNG decode error: {}", e))?
        .to_rgba8())
}

/// Squared distance from point `p` to segment `a`–`b`.
fn dist_sq_to_segment(p: (f32, f32), a: (f32, f32), b: (f32, f32)) -> f32 {
    let (apx, apy) = (p.0 - a.0, p.1 - a.1);
    let (abx, aby) = (b.0 - a.0, b.1 - a.1);
    let ab_sq = abx * abx + aby * aby;
    let t = if ab_sq <= f32::EPSILON {
        0.0
    } else {
        ((apx * abx + apy * aby) / ab_sq).clamp(0.0, 1.0)
    };
    let (dx, dy) = (p.0 - (a.0 + t * abx), p.1 - (a.1 + t * aby));
    dx * dx + dy * dy
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pen() -> PenState {
        PenState {
            color: Color32::from_rgb(200, 30, 30),
            width: 4.0,
        }
    }

    #[test]
    fn stroke_mutates_raster_in_place() {
        let mut canvas = CanvasState::new(32, 32);
        canvas.begin_stroke((4.0, 16.0));
        canvas.stroke_to((28.0, 16.0), &pen());
        canvas.end_stroke();

        assert_eq!(*canvas.raster().get_pixel(16, 16), Rgba([200, 30, 30, 255]));
        // Well outside the stroke radius: untouched background
        assert_eq!(*canvas.raster().get_pixel(16, 2), BACKGROUND);
    }

    #[test]
    fn stroke_to_without_begin_is_a_noop() {
        let mut canvas = CanvasState::new(16, 16);
        canvas.stroke_to((8.0, 8.0), &pen());
        assert!(canvas.raster().pixels().all(|p| *p == BACKGROUND));
    }

    #[test]
    fn end_stroke_stops_segments() {
        let mut canvas = CanvasState::new(32, 32);
        canvas.begin_stroke((4.0, 4.0));
        canvas.end_stroke();
        canvas.stroke_to((28.0, 28.0), &pen());
        assert!(canvas.raster().pixels().all(|p| *p == BACKGROUND));
    }

    #[test]
    fn round_cap_dot_at_segment_end() {
        let mut canvas = CanvasState::new(32, 32);
        let mut wide = pen();
        wide.width = 8.0;
        canvas.begin_stroke((16.0, 16.0));
        canvas.stroke_to((16.0, 16.0), &wide);

        // Degenerate segment stamps a filled disc (the round cap)
        assert_ne!(*canvas.raster().get_pixel(16, 16), BACKGROUND);
        assert_ne!(*canvas.raster().get_pixel(19, 16), BACKGROUND);
        assert_eq!(*canvas.raster().get_pixel(25, 16), BACKGROUND);
    }

    #[test]
    fn png_roundtrip_is_bit_exact() {
        let mut canvas = CanvasState::new(24, 24);
        canvas.begin_stroke((2.0, 2.0));
        canvas.stroke_to((20.0, 20.0), &pen());
        let encoded = canvas.encode_png().unwrap();
        let decoded = decode_png(&encoded).unwrap();
        assert_eq!(decoded.as_raw(), canvas.raster().as_raw());
    }

    #[test]
    fn erase_all_restores_background() {
        let mut canvas = CanvasState::new(16, 16);
        canvas.begin_stroke((8.0, 8.0));
        canvas.stroke_to((12.0, 12.0), &pen());
        canvas.erase_all();
        assert!(canvas.raster().pixels().all(|p| *p == BACKGROUND));
    }
}
