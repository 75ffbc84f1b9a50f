pub mod render;
pub mod screen;
pub mod stimulus;
pub mod text;

pub use render::{SkiaRenderer, continue_button_rect, load_font};
pub use screen::ScreenState;

pub use ab_glyph::FontVec;
