use std::path::Path;

/// Screens of the presentation surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Start,
    Instruction,
    Trial,
    End,
    Progress,
}

/// Sub-elements the engine writes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Element {
    StartError,
    InstructionBody,
    CountdownText,
    ContinueControl,
    StimulusImage,
    CategoryLabel,
}

/// Where the session draws.
///
/// Implementations silently skip updates for elements they do not have;
/// a missing element never aborts a session.
pub trait Surface {
    /// Hides the instruction, trial and end screens, then shows `region` if any.
    fn show_only(&mut self, region: Option<Region>);

    /// Tears the start screen down for good.
    fn remove_start(&mut self);

    fn set_text(&mut self, element: Element, text: &str);

    fn set_continue_enabled(&mut self, enabled: bool);

    /// Shows or hides [`Element::StimulusImage`].
    fn set_stimulus_visible(&mut self, visible: bool);

    /// Starts loading the stimulus at `path` into [`Element::StimulusImage`].
    /// Completion is reported back to the session by the driver through
    /// `Session::asset_ready`; a surface without the element has nothing to
    /// load, so the driver may signal ready right away.
    fn request_stimulus(&mut self, path: &Path);

    fn set_progress(&mut self, percent: u8, label: &str);
}
