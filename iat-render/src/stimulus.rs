use std::path::Path;

use anyhow::{Context, Result};
use tiny_skia::{ColorU8, Pixmap};

/// Decodes an image file into a premultiplied pixmap.
pub fn load_pixmap(path: &Path) -> Result<Pixmap> {
    let rgba = image::open(path)
        .with_context(|| format!("failed to decode {}", path.display()))?
        .into_rgba8();
    let (w, h) = rgba.dimensions();
    let mut pm = Pixmap::new(w, h).with_context(|| format!("empty image {}", path.display()))?;
    for (dst, px) in pm.pixels_mut().iter_mut().zip(rgba.pixels()) {
        let [r, g, b, a] = px.0;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Ok(pm)
}

/// Grey tile drawn in place of a stimulus that failed to load.
pub fn placeholder(size: u32) -> Option<Pixmap> {
    let mut pm = Pixmap::new(size, size)?;
    pm.fill(tiny_skia::Color::from_rgba8(70, 70, 70, 255));
    Some(pm)
}

/// Uniform scale that fits `(w, h)` inside `(max_w, max_h)`, never enlarging.
pub fn fit_scale(w: u32, h: u32, max_w: f32, max_h: f32) -> f32 {
    if w == 0 || h == 0 {
        return 1.0;
    }
    (max_w / w as f32).min(max_h / h as f32).min(1.0)
}
