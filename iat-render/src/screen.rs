use std::collections::HashMap;
use std::path::{Path, PathBuf};

use iat_core::{Element, Region, Surface};

/// What the surface currently shows, independent of how it is drawn.
#[derive(Debug, Clone)]
pub struct ScreenState {
    pub start_visible: bool,
    pub visible: Option<Region>,
    pub texts: HashMap<Element, String>,
    pub continue_enabled: bool,
    pub stimulus_visible: bool,
    pub progress: Option<(u8, String)>,
    /// Stimulus requested but not yet loaded.
    pub pending: Option<PathBuf>,
    /// Typed identifier digits on the start screen.
    pub start_input: String,
}

impl Default for ScreenState {
    fn default() -> Self {
        Self {
            start_visible: true,
            visible: None,
            texts: HashMap::new(),
            continue_enabled: false,
            stimulus_visible: false,
            progress: None,
            pending: None,
            start_input: String::new(),
        }
    }
}

impl ScreenState {
    pub fn text(&self, element: Element) -> &str {
        self.texts.get(&element).map(String::as_str).unwrap_or("")
    }

    pub fn shows(&self, region: Region) -> bool {
        match region {
            Region::Start => self.start_visible,
            Region::Progress => self.progress.is_some() && !self.start_visible,
            r => self.visible == Some(r),
        }
    }
}

impl Surface for ScreenState {
    fn show_only(&mut self, region: Option<Region>) {
        self.visible = match region {
            Some(Region::Start) | Some(Region::Progress) => None,
            r => r,
        };
    }

    fn remove_start(&mut self) {
        self.start_visible = false;
        self.start_input.clear();
    }

    fn set_text(&mut self, element: Element, text: &str) {
        self.texts.insert(element, text.to_string());
    }

    fn set_continue_enabled(&mut self, enabled: bool) {
        self.continue_enabled = enabled;
    }

    fn set_stimulus_visible(&mut self, visible: bool) {
        self.stimulus_visible = visible;
    }

    fn request_stimulus(&mut self, path: &Path) {
        self.pending = Some(path.to_path_buf());
    }

    fn set_progress(&mut self, percent: u8, label: &str) {
        self.progress = Some((percent.min(100), label.to_string()));
    }
}
