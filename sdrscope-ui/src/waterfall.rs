use std::sync::Arc;

use eframe::egui::{ColorImage, Image, Response, TextureHandle, TextureOptions, Ui, Widget};
use eframe::epaint::Color32;
use sdrscope_engine::WaterfallHistory;

/// Color stops from weakest to strongest signal.
const COLORMAP: [Color32; 5] = [
    Color32::from_rgb(0x44, 0x01, 0x54),
    Color32::from_rgb(0x3b, 0x52, 0x8b),
    Color32::from_rgb(0x21, 0x90, 0x8c),
    Color32::from_rgb(0x5d, 0xc8, 0x63),
    Color32::from_rgb(0xfd, 0xe7, 0x25),
];

/// Waterfall display widget that renders the engine's spectrum history.
///
/// Pixels are rebuilt only when the engine publishes a new history (tracked
/// by pointer), and the texture is uploaded only after a rebuild.
pub struct Waterfall {
    image: ColorImage,
    needs_gpu_upload: bool,
    waterfall_texture_handle: Option<TextureHandle>,
    source: Option<Arc<WaterfallHistory>>,
}

impl Waterfall {
    pub fn new() -> Self {
        Self {
            image: ColorImage::default(),
            needs_gpu_upload: false,
            waterfall_texture_handle: None,
            source: None,
        }
    }

    /// Rebuild the image from `history`, newest row at the top.
    pub fn update(&mut self, history: &Arc<WaterfallHistory>) {
        if self
            .source
            .as_ref()
            .is_some_and(|seen| Arc::ptr_eq(seen, history))
        {
            return;
        }
        self.source = Some(Arc::clone(history));

        let width = history.width();
        let depth = history.depth();
        if width == 0 || depth == 0 {
            return;
        }
        let (min_db, max_db) = history.range().unwrap_or((0.0, 0.0));

        let mut pixels = Vec::with_capacity(width * depth);
        for row in history.rows().rev() {
            pixels.extend(row.iter().map(|&db| db_to_color(db, min_db, max_db)));
        }

        self.image.pixels = pixels;
        self.image.size = [width, depth];
        self.needs_gpu_upload = true;
    }

    #[cfg(test)]
    fn size(&self) -> [usize; 2] {
        self.image.size
    }

    #[cfg(test)]
    fn pixel(&self, x: usize, y: usize) -> Color32 {
        self.image.pixels[y * self.image.size[0] + x]
    }
}

/// Map a level in dB onto the colormap, scaled to `[min_db, max_db]`.
pub fn db_to_color(db: f32, min_db: f32, max_db: f32) -> Color32 {
    let range = (max_db - min_db).max(0.01);
    let scaled = ((db - min_db) / range).clamp(0.0, 1.0);

    let position = scaled * (COLORMAP.len() - 1) as f32;
    let lower = (position.floor() as usize).min(COLORMAP.len() - 2);
    let t = position - lower as f32;
    lerp_color(COLORMAP[lower], COLORMAP[lower + 1], t)
}

fn lerp_color(a: Color32, b: Color32, t: f32) -> Color32 {
    let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
    Color32::from_rgb(mix(a.r(), b.r()), mix(a.g(), b.g()), mix(a.b(), b.b()))
}

impl Widget for &mut Waterfall {
    fn ui(self, ui: &mut Ui) -> Response {
        if self.image.pixels.is_empty() {
            ui.label("Waiting for spectrum data...");
            return ui.response();
        }

        if self.needs_gpu_upload {
            match &mut self.waterfall_texture_handle {
                Some(texture) => texture.set(self.image.clone(), TextureOptions::LINEAR),
                None => {
                    let texture = ui.ctx().load_texture(
                        "waterfall",
                        self.image.clone(),
                        TextureOptions::LINEAR,
                    );
                    self.waterfall_texture_handle = Some(texture);
                }
            }
            self.needs_gpu_upload = false;
        }

        if let Some(texture_handle) = &self.waterfall_texture_handle {
            let available_size = ui.available_size();
            ui.add(Image::new(texture_handle).fit_to_exact_size(available_size));
        }

        ui.response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colormap_endpoints() {
        assert_eq!(db_to_color(-100.0, -100.0, 0.0), COLORMAP[0]);
        assert_eq!(db_to_color(0.0, -100.0, 0.0), COLORMAP[4]);
        assert_eq!(db_to_color(-50.0, -100.0, 0.0), COLORMAP[2]);
    }

    #[test]
    fn test_colormap_clamps_out_of_range() {
        assert_eq!(db_to_color(-300.0, -100.0, 0.0), COLORMAP[0]);
        assert_eq!(db_to_color(40.0, -100.0, 0.0), COLORMAP[4]);
    }

    #[test]
    fn test_flat_history_does_not_divide_by_zero() {
        assert_eq!(db_to_color(-100.0, -100.0, -100.0), COLORMAP[0]);
    }

    #[test]
    fn test_newest_row_drawn_at_top() {
        let mut history = WaterfallHistory::new(3, 2, -100.0);
        history.push(&[0.0, 0.0]);
        let history = Arc::new(history);

        let mut waterfall = Waterfall::new();
        waterfall.update(&history);

        assert_eq!(waterfall.size(), [2, 3]);
        assert_eq!(waterfall.pixel(0, 0), COLORMAP[4]);
        assert_eq!(waterfall.pixel(1, 2), COLORMAP[0]);
    }

    #[test]
    fn test_same_history_is_not_rebuilt() {
        let history = Arc::new(WaterfallHistory::new(2, 2, -100.0));
        let mut waterfall = Waterfall::new();
        waterfall.update(&history);
        waterfall.needs_gpu_upload = false;

        waterfall.update(&history);
        assert!(!waterfall.needs_gpu_upload);
    }
}
