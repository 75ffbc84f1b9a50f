use std::collections::HashMap;
use std::sync::Arc;

use ab_glyph::{Font, FontVec, Glyph, PxScale, ScaleFont, point};
use string_cache::DefaultAtom as Atom;
use tiny_skia::{Pixmap, PremultipliedColorU8};

pub const WHITE: [u8; 4] = [255, 255, 255, 255];
pub const BLACK: [u8; 4] = [0, 0, 0, 255];
pub const GREY: [u8; 4] = [140, 140, 140, 255];
pub const ERROR_RED: [u8; 4] = [230, 80, 80, 255];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextStyle {
    pub size_px: u16,
    pub color: [u8; 4],
}

impl TextStyle {
    pub const fn new(size_px: u16, color: [u8; 4]) -> Self {
        Self { size_px, color }
    }
}

/// Rasterized strings, keyed by interned text and style.
pub struct TextCache {
    font: FontVec,
    map: HashMap<(Atom, TextStyle), Arc<Pixmap>>,
}

impl TextCache {
    pub fn new(font: FontVec) -> Self {
        Self {
            font,
            map: HashMap::new(),
        }
    }

    /// `None` for text with nothing to draw.
    pub fn get_or_render(&mut self, text: &str, style: TextStyle) -> Option<Arc<Pixmap>> {
        let key = (Atom::from(text), style);
        if let Some(p) = self.map.get(&key) {
            return Some(Arc::clone(p));
        }
        let pm = Arc::new(render_text_pixmap(
            text,
            f32::from(style.size_px),
            &self.font,
            style.color,
        )?);
        self.map.insert(key, Arc::clone(&pm));
        Some(pm)
    }

    pub fn measure(&self, text: &str, size_px: u16) -> f32 {
        measure(text, f32::from(size_px), &self.font)
    }

    pub fn line_height(&self, size_px: u16) -> f32 {
        let sf = self.font.as_scaled(PxScale::from(f32::from(size_px)));
        sf.height() + sf.line_gap()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Horizontal advance of `text` on one line.
pub fn measure<F: Font>(text: &str, font_size: f32, font: &F) -> f32 {
    let sf = font.as_scaled(PxScale::from(font_size));
    let mut width = 0.0f32;
    let mut prev = None;
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(p) = prev {
            width += sf.kern(p, id);
        }
        width += sf.h_advance(id);
        prev = Some(id);
    }
    width
}

/// Greedy word wrap. Explicit newlines always break; a blank input line is
/// kept as an empty line. A single word wider than `max_width` gets a line
/// of its own.
pub fn wrap_text(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            if line.is_empty() {
                line.push_str(word);
                continue;
            }
            let candidate = format!("{line} {word}");
            if measure(&candidate) <= max_width {
                line = candidate;
            } else {
                lines.push(std::mem::take(&mut line));
                line.push_str(word);
            }
        }
        lines.push(line);
    }
    lines
}

pub fn render_text_pixmap<F: Font>(
    text: &str,
    font_size: f32,
    font: &F,
    color: [u8; 4],
) -> Option<Pixmap> {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);

    // Layout with baseline at ascent
    let mut pen_x = 0.0f32;
    let mut glyphs = Vec::<Glyph>::new();
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += sf.kern(prev.id, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, sf.ascent()),
        });
        pen_x += sf.h_advance(id);
    }

    let outlines: Vec<_> = glyphs
        .into_iter()
        .filter_map(|g| font.outline_glyph(g))
        .collect();
    if outlines.is_empty() {
        return None;
    }

    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;
    for out in &outlines {
        let b = out.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }

    let w = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let h = (max_y.ceil() - min_y.floor()).max(1.0) as u32;
    let mut pm = Pixmap::new(w, h)?;
    let stride = w as usize;
    let dst = pm.pixels_mut();

    for out in &outlines {
        let b = out.px_bounds();
        out.draw(|x, y, cov| {
            if cov <= f32::EPSILON {
                return;
            }
            let ix = (x as f32 + b.min.x - min_x).floor() as i32;
            let iy = (y as f32 + b.min.y - min_y).floor() as i32;
            if ix < 0 || iy < 0 || ix >= w as i32 || iy >= h as i32 {
                return;
            }
            let i = iy as usize * stride + ix as usize;

            // Premultiply source by coverage, then src-over the glyph already there.
            let a_lin = (cov * f32::from(color[3]) / 255.0).clamp(0.0, 1.0);
            let sa = (a_lin * 255.0) as u8;
            let sr = (f32::from(color[0]) * a_lin) as u8;
            let sg = (f32::from(color[1]) * a_lin) as u8;
            let sb = (f32::from(color[2]) * a_lin) as u8;

            let bg = dst[i];
            let inv = 1.0 - f32::from(sa) / 255.0;
            let r = sr.saturating_add((f32::from(bg.red()) * inv) as u8);
            let g = sg.saturating_add((f32::from(bg.green()) * inv) as u8);
            let bl = sb.saturating_add((f32::from(bg.blue()) * inv) as u8);
            let a = sa.saturating_add((f32::from(bg.alpha()) * inv) as u8);
            dst[i] = PremultipliedColorU8::from_rgba(r, g, bl, a).unwrap_or(bg);
        });
    }

    Some(pm)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Fixed-width stand-in for a font: 10 px per char.
    fn mono(s: &str) -> f32 {
        s.chars().count() as f32 * 10.0
    }

    #[test]
    fn wraps_on_word_boundaries() {
        let lines = wrap_text("uno due tre quattro", 75.0, mono);
        assert_eq!(lines, vec!["uno due", "tre", "quattro"]);
    }

    #[test]
    fn keeps_explicit_and_blank_lines() {
        let lines = wrap_text("A = sinistra\n\nL = destra", 1000.0, mono);
        assert_eq!(lines, vec!["A = sinistra", "", "L = destra"]);
    }

    #[test]
    fn overlong_word_gets_own_line() {
        let lines = wrap_text("a israeliano-palestinese b", 50.0, mono);
        assert_eq!(lines, vec!["a", "israeliano-palestinese", "b"]);
    }
}
