use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ab_glyph::FontVec;
use anyhow::{Context, Result, anyhow, bail};
use bytemuck::{cast_slice, cast_slice_mut};
use iat_core::{Element, Region, Surface};
use tiny_skia::{Color, FilterQuality, Paint, Pixmap, PixmapPaint, Rect, Transform};
use tracing::{debug, warn};

use crate::screen::ScreenState;
use crate::stimulus::{fit_scale, load_pixmap, placeholder};
use crate::text::{BLACK, ERROR_RED, GREY, TextCache, TextStyle, WHITE, wrap_text};

const BODY: TextStyle = TextStyle::new(26, WHITE);
const LABEL: TextStyle = TextStyle::new(30, WHITE);
const SMALL: TextStyle = TextStyle::new(20, WHITE);
const INPUT: TextStyle = TextStyle::new(48, WHITE);
const ERROR: TextStyle = TextStyle::new(22, ERROR_RED);
const BUTTON_ON: TextStyle = TextStyle::new(26, BLACK);
const BUTTON_OFF: TextStyle = TextStyle::new(26, GREY);

const BUTTON_W: f32 = 220.0;
const BUTTON_H: f32 = 60.0;
const MARGIN: f32 = 40.0;

pub fn load_font(path: &Path) -> Result<FontVec> {
    let bytes = fs::read(path).with_context(|| format!("failed to read font {}", path.display()))?;
    FontVec::try_from_vec(bytes).map_err(|_| anyhow!("invalid font file {}", path.display()))
}

/// Where the continue control sits on a `width`×`height` canvas.
pub fn continue_button_rect(width: u32, height: u32) -> Option<Rect> {
    Rect::from_xywh(
        (width as f32 - BUTTON_W) * 0.5,
        height as f32 - BUTTON_H - 2.0 * MARGIN - 30.0,
        BUTTON_W,
        BUTTON_H,
    )
}

/// Software renderer for the session screens.
///
/// Surface updates only change state and mark the frame dirty; pixels are
/// produced by [`SkiaRenderer::render_frame`].
pub struct SkiaRenderer {
    width: u32,
    height: u32,
    center: (f32, f32),
    canvas: Pixmap,
    text: TextCache,

    screen: ScreenState,
    start_prompt: String,
    end_text: String,

    stimulus: Option<Arc<Pixmap>>,
    images: HashMap<PathBuf, Arc<Pixmap>>,
    placeholder: Option<Arc<Pixmap>>,

    dirty: bool,
}

impl SkiaRenderer {
    pub fn new(
        width: u32,
        height: u32,
        font: FontVec,
        start_prompt: &str,
        end_text: &str,
    ) -> Result<Self> {
        let canvas = Pixmap::new(width, height)
            .with_context(|| format!("invalid canvas size {width}x{height}"))?;
        Ok(Self {
            width,
            height,
            center: (width as f32 / 2.0, height as f32 / 2.0),
            canvas,
            text: TextCache::new(font),
            screen: ScreenState::default(),
            start_prompt: start_prompt.to_string(),
            end_text: end_text.to_string(),
            stimulus: None,
            images: HashMap::new(),
            placeholder: placeholder(256).map(Arc::new),
            dirty: true,
        })
    }

    pub fn resize(&mut self, new_width: u32, new_height: u32) -> Result<()> {
        self.canvas = Pixmap::new(new_width, new_height)
            .with_context(|| format!("invalid canvas size {new_width}x{new_height}"))?;
        self.width = new_width;
        self.height = new_height;
        self.center = (new_width as f32 / 2.0, new_height as f32 / 2.0);
        self.dirty = true;
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_start_input(&mut self, input: &str) {
        if self.screen.start_input != input {
            self.screen.start_input = input.to_string();
            self.dirty = true;
        }
    }

    /// Decodes the requested stimulus. Returns `true` when a request was
    /// completed, successfully or not; an image that fails to decode is
    /// replaced by a placeholder so the trial can still run.
    pub fn finish_pending_load(&mut self) -> bool {
        let Some(path) = self.screen.pending.take() else {
            return false;
        };
        let pm = match self.images.get(&path) {
            Some(pm) => Some(Arc::clone(pm)),
            None => match load_pixmap(&path) {
                Ok(pm) => {
                    debug!(
                        path = %path.display(),
                        w = pm.width(),
                        h = pm.height(),
                        "stimulus decoded"
                    );
                    let pm = Arc::new(pm);
                    self.images.insert(path, Arc::clone(&pm));
                    Some(pm)
                }
                Err(e) => {
                    warn!(error = ?e, "stimulus unavailable, drawing placeholder");
                    self.placeholder.clone()
                }
            },
        };
        self.stimulus = pm;
        self.dirty = true;
        true
    }

    /// Whether a click at `(x, y)` lands on an enabled continue control.
    pub fn hits_continue(&self, x: f64, y: f64) -> bool {
        if !self.screen.shows(Region::Instruction) || !self.screen.continue_enabled {
            return false;
        }
        continue_button_rect(self.width, self.height).is_some_and(|r| {
            let (x, y) = (x as f32, y as f32);
            x >= r.left() && x <= r.right() && y >= r.top() && y <= r.bottom()
        })
    }

    /// Draws the current screen and copies it into `frame_buffer` (RGBA8,
    /// same size as the canvas).
    pub fn render_frame(&mut self, frame_buffer: &mut [u8]) -> Result<()> {
        if frame_buffer.len() != self.canvas.data().len() {
            bail!(
                "frame buffer holds {} bytes, canvas {}",
                frame_buffer.len(),
                self.canvas.data().len()
            );
        }
        self.canvas.fill(Color::from_rgba8(0, 0, 0, 255));

        if self.screen.shows(Region::Start) {
            self.draw_start();
        }
        if self.screen.shows(Region::Instruction) {
            self.draw_instructions();
        }
        if self.screen.shows(Region::Trial) {
            self.draw_trial();
        }
        if self.screen.shows(Region::End) {
            let end = self.end_text.clone();
            self.draw_paragraph(&end, BODY, self.center.1 - 40.0);
        }
        if self.screen.shows(Region::Progress) {
            self.draw_progress();
        }

        frame_buffer.copy_from_slice(self.canvas.data());
        self.dirty = false;
        Ok(())
    }

    fn draw_start(&mut self) {
        let prompt = self.start_prompt.clone();
        self.draw_paragraph(&prompt, BODY, self.height as f32 * 0.3);

        let input = if self.screen.start_input.is_empty() {
            "_ _ _".to_string()
        } else {
            self.screen.start_input.clone()
        };
        self.draw_centered(&input, INPUT, self.center.1);

        let error = self.screen.text(Element::StartError).to_string();
        self.draw_centered(&error, ERROR, self.center.1 + 80.0);
    }

    fn draw_instructions(&mut self) {
        let body = self.screen.text(Element::InstructionBody).to_string();
        self.draw_paragraph(&body, BODY, self.height as f32 * 0.1);

        let Some(button) = continue_button_rect(self.width, self.height) else {
            return;
        };
        let countdown = self.screen.text(Element::CountdownText).to_string();
        self.draw_centered(&countdown, SMALL, button.top() - 50.0);

        let enabled = self.screen.continue_enabled;
        let mut paint = Paint::default();
        let [r, g, b, a] = if enabled { WHITE } else { [60, 60, 60, 255] };
        paint.set_color(Color::from_rgba8(r, g, b, a));
        self.canvas
            .fill_rect(button, &paint, Transform::identity(), None);

        let label = self.screen.text(Element::ContinueControl).to_string();
        let style = if enabled { BUTTON_ON } else { BUTTON_OFF };
        if let Some(pm) = self.text.get_or_render(&label, style) {
            let x = button.left() + (button.width() - pm.width() as f32) * 0.5;
            let y = button.top() + (button.height() - pm.height() as f32) * 0.5;
            self.blit(&pm, x as i32, y as i32);
        }
    }

    fn draw_trial(&mut self) {
        let label = self.screen.text(Element::CategoryLabel).to_string();
        self.draw_centered(&label, LABEL, MARGIN * 1.5);

        if !self.screen.stimulus_visible {
            return;
        }
        let Some(pm) = self.stimulus.clone() else {
            return;
        };
        let max_w = self.width as f32 * 0.7;
        let max_h = self.height as f32 * 0.6;
        let s = fit_scale(pm.width(), pm.height(), max_w, max_h);
        let tx = self.center.0 - pm.width() as f32 * s * 0.5;
        let ty = self.center.1 - pm.height() as f32 * s * 0.5;
        let paint = PixmapPaint {
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        self.canvas.draw_pixmap(
            0,
            0,
            Pixmap::as_ref(&pm),
            &paint,
            Transform::from_row(s, 0.0, 0.0, s, tx, ty),
            None,
        );
    }

    fn draw_progress(&mut self) {
        let Some((percent, label)) = self.screen.progress.clone() else {
            return;
        };
        let track_w = self.width as f32 - 2.0 * MARGIN;
        let y = self.height as f32 - MARGIN;

        let mut paint = Paint::default();
        paint.set_color(Color::from_rgba8(50, 50, 50, 255));
        if let Some(track) = Rect::from_xywh(MARGIN, y, track_w, 10.0) {
            self.canvas
                .fill_rect(track, &paint, Transform::identity(), None);
        }
        let filled = track_w * f32::from(percent) / 100.0;
        paint.set_color(Color::from_rgba8(255, 255, 255, 255));
        if let Some(bar) = Rect::from_xywh(MARGIN, y, filled, 10.0) {
            self.canvas
                .fill_rect(bar, &paint, Transform::identity(), None);
        }

        if let Some(pm) = self.text.get_or_render(&label, SMALL) {
            self.blit(&pm, MARGIN as i32, (y - 12.0) as i32 - pm.height() as i32);
        }
    }

    fn draw_centered(&mut self, text: &str, style: TextStyle, y_top: f32) {
        if let Some(pm) = self.text.get_or_render(text, style) {
            let x = self.center.0 - pm.width() as f32 * 0.5;
            self.blit(&pm, x as i32, y_top as i32);
        }
    }

    /// Wrapped, centered block of text starting at `y_top`.
    fn draw_paragraph(&mut self, text: &str, style: TextStyle, y_top: f32) {
        let max_w = (self.width as f32 - 4.0 * MARGIN).min(1100.0);
        let lines = wrap_text(text, max_w, |s| self.text.measure(s, style.size_px));
        let step = self.text.line_height(style.size_px);
        for (i, line) in lines.iter().enumerate() {
            self.draw_centered(line, style, y_top + i as f32 * step);
        }
    }

    /// Premultiplied src-over of `pm` at `(x, y)`, clipped to the canvas.
    fn blit(&mut self, pm: &Pixmap, x: i32, y: i32) {
        let (w, h) = (pm.width() as i32, pm.height() as i32);
        let (cw, ch) = (self.width as i32, self.height as i32);
        if x + w <= 0 || y + h <= 0 || x >= cw || y >= ch {
            return;
        }

        let dst_x = x.max(0);
        let dst_y = y.max(0);
        let src_x = dst_x - x;
        let src_y = dst_y - y;
        let copy_w = (w - src_x).min(cw - dst_x) as usize;
        let copy_h = (h - src_y).min(ch - dst_y) as usize;

        let src: &[[u8; 4]] = cast_slice(pm.data());
        let dst: &mut [[u8; 4]] = cast_slice_mut(self.canvas.data_mut());
        for row in 0..copy_h {
            let s0 = (src_y as usize + row) * w as usize + src_x as usize;
            let d0 = (dst_y as usize + row) * cw as usize + dst_x as usize;
            for i in 0..copy_w {
                let s = src[s0 + i];
                let d = &mut dst[d0 + i];
                let inv = 255 - u32::from(s[3]);
                for c in 0..4 {
                    d[c] = (u32::from(s[c]) + (u32::from(d[c]) * inv + 127) / 255) as u8;
                }
            }
        }
    }
}

impl Surface for SkiaRenderer {
    fn show_only(&mut self, region: Option<Region>) {
        self.screen.show_only(region);
        self.dirty = true;
    }

    fn remove_start(&mut self) {
        self.screen.remove_start();
        self.dirty = true;
    }

    fn set_text(&mut self, element: Element, text: &str) {
        if self.screen.text(element) != text {
            self.screen.set_text(element, text);
            self.dirty = true;
        }
    }

    fn set_continue_enabled(&mut self, enabled: bool) {
        self.screen.set_continue_enabled(enabled);
        self.dirty = true;
    }

    fn set_stimulus_visible(&mut self, visible: bool) {
        self.screen.set_stimulus_visible(visible);
        self.dirty = true;
    }

    fn request_stimulus(&mut self, path: &Path) {
        self.stimulus = None;
        self.screen.request_stimulus(path);
        self.dirty = true;
    }

    fn set_progress(&mut self, percent: u8, label: &str) {
        self.screen.set_progress(percent, label);
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_is_centered_and_above_progress() {
        let r = continue_button_rect(1280, 720).unwrap();
        assert_eq!(r.left() + r.width() * 0.5, 640.0);
        assert!(r.bottom() < 720.0 - MARGIN);
    }

    #[test]
    fn missing_font_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_font(&dir.path().join("missing.ttf")).unwrap_err();
        assert!(err.to_string().contains("missing.ttf"));
    }

    #[test]
    fn garbage_font_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ttf");
        fs::write(&path, b"not a font").unwrap();
        assert!(load_font(&path).is_err());
    }
}
