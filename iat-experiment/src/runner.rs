use std::path::Path;
use std::time::Duration;

use iat_core::{Element, Region, ResponseKeys, Surface, Trial, TrialState};
use iat_timing::{Scheduler, TaskHandle, TimerSlot, deadline_after};
use tracing::{debug, warn};

use crate::scorer::{self, Score};
use crate::state::SessionTask;

/// Lifecycle of the trial on screen.
///
/// `active_start_ns` is the only guard against scoring a trial twice: it is
/// set when the stimulus becomes visible and taken the instant a response is
/// accepted, so a second key on the same trial finds it empty.
#[derive(Debug, Default)]
pub struct TrialRunner {
    state: TrialState,
    active_start_ns: Option<u64>,
    hide: TimerSlot,
}

impl TrialRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts `trial` on screen with its stimulus hidden and requests the image.
    pub fn present<S: Surface + ?Sized>(
        &mut self,
        trial: &Trial,
        label: Option<&str>,
        asset: &Path,
        scheduler: &mut Scheduler<SessionTask>,
        surface: &mut S,
    ) {
        surface.show_only(None);
        surface.set_text(Element::CategoryLabel, label.unwrap_or(&trial.category));
        surface.set_stimulus_visible(false);
        self.hide.clear(scheduler);
        self.active_start_ns = None;
        self.state = TrialState::AwaitingAsset;

        surface.request_stimulus(asset);
        surface.show_only(Some(Region::Trial));
    }

    /// The requested image is ready: start the reaction clock and the
    /// exposure window. Ignored unless an image is awaited.
    pub fn asset_ready<S: Surface + ?Sized>(
        &mut self,
        now_ns: u64,
        exposure: Duration,
        scheduler: &mut Scheduler<SessionTask>,
        surface: &mut S,
    ) -> bool {
        if self.state != TrialState::AwaitingAsset {
            return false;
        }
        self.active_start_ns = Some(now_ns);
        surface.set_stimulus_visible(true);
        let handle =
            scheduler.schedule_once(deadline_after(now_ns, exposure), SessionTask::HideStimulus);
        self.hide.replace(scheduler, handle);
        self.state = TrialState::Visible;
        true
    }

    /// Exposure is over. Input stays open.
    pub fn hide_elapsed<S: Surface + ?Sized>(
        &mut self,
        handle: TaskHandle,
        surface: &mut S,
    ) -> bool {
        if !self.hide.take_if(handle) {
            return false;
        }
        surface.set_stimulus_visible(false);
        if self.state == TrialState::Visible {
            self.state = TrialState::HiddenAwaitingInput;
        }
        true
    }

    /// Scores a key press. Unknown keys and presses without an active trial
    /// leave the runner untouched.
    pub fn respond(
        &mut self,
        keys: &ResponseKeys,
        key: char,
        trial: &Trial,
        now_ns: u64,
    ) -> Option<Score> {
        keys.recognize(key)?;
        let Some(start_ns) = self.active_start_ns.take() else {
            warn!(key = %key, "response with no active trial");
            return None;
        };
        let score = scorer::score(keys, key, trial, start_ns, now_ns)?;
        self.state = TrialState::Scored;
        debug!(
            block = trial.block,
            image = %trial.image,
            response = %score.response,
            expected = %trial.correct_response,
            rt_ms = score.reaction_time_ms,
            correct = score.correct,
            "response"
        );
        Some(score)
    }

    /// Drops any pending hide and returns to idle.
    pub fn reset(&mut self, scheduler: &mut Scheduler<SessionTask>) {
        self.hide.clear(scheduler);
        self.active_start_ns = None;
        self.state = TrialState::Idle;
    }

    pub fn state(&self) -> TrialState {
        self.state
    }
}
