use std::path::PathBuf;

use iat_core::{
    Element, KeyInput, ParticipantId, ParticipantIdError, Phase, Surface, Trial,
    TrialResult, TrialState,
};
use iat_timing::{Clock, Scheduler};
use tracing::{debug, error, info, warn};

use crate::config::ExperimentConfig;
use crate::export::{self, ResultSink};
use crate::gate::InstructionGate;
use crate::plan::{Block, BlockPlan};
use crate::progress;
use crate::runner::TrialRunner;

/// Work the session schedules for itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTask {
    Countdown,
    HideStimulus,
}

/// Which handler receives key presses on the current screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyListener {
    InstructionAccept,
    TrialResponse,
}

/// What happened to the results file at the end of the session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExportStatus {
    #[default]
    Pending,
    /// Nothing to save: no trial of a saved block was scored.
    Skipped,
    Saved(PathBuf),
    Failed(String),
}

/// One participant's run through the block plan.
///
/// The driver feeds it participant input, asset-ready signals and the
/// passage of time (`poll`); the session mutates only itself and writes to
/// the surface it is handed.
pub struct Session<C: Clock, K: ResultSink> {
    clock: C,
    config: ExperimentConfig,
    blocks: Vec<Block>,
    scheduler: Scheduler<SessionTask>,
    gate: InstructionGate,
    runner: TrialRunner,
    listener: Option<KeyListener>,
    sink: K,

    phase: Phase,
    participant: Option<ParticipantId>,
    current_block_index: usize,
    current_trial_index: usize,
    completed_trials: usize,
    total_trials: usize,
    results: Vec<TrialResult>,
    progress: Option<u8>,
    export: ExportStatus,
}

impl<C: Clock, K: ResultSink> Session<C, K> {
    pub fn new(config: ExperimentConfig, plan: BlockPlan, clock: C, sink: K) -> Self {
        Self {
            clock,
            config,
            total_trials: plan.total_trials,
            blocks: plan.blocks,
            scheduler: Scheduler::new(),
            gate: InstructionGate::new(),
            runner: TrialRunner::new(),
            listener: None,
            sink,
            phase: Phase::Start,
            participant: None,
            current_block_index: 0,
            current_trial_index: 0,
            completed_trials: 0,
            results: Vec::new(),
            progress: None,
            export: ExportStatus::Pending,
        }
    }

    /// Validates the identifier and starts the first block. Invalid input
    /// shows the validation message and changes nothing else.
    pub fn submit_participant<S: Surface + ?Sized>(
        &mut self,
        input: &str,
        surface: &mut S,
    ) -> Result<(), ParticipantIdError> {
        if !self.phase.is_start() {
            debug!("participant already set, ignoring submission");
            return Ok(());
        }
        let id = match input.parse::<ParticipantId>() {
            Ok(id) => id,
            Err(e) => {
                surface.set_text(Element::StartError, &self.config.texts.invalid_id);
                return Err(e);
            }
        };
        surface.set_text(Element::StartError, "");
        info!(participant = %id, "session started");
        self.participant = Some(id);

        surface.remove_start();
        self.update_progress(0, surface);
        self.current_block_index = 0;
        if self.blocks.is_empty() {
            warn!("block plan is empty");
            self.finish(surface);
        } else {
            self.enter_instructions(surface);
        }
        Ok(())
    }

    fn enter_instructions<S: Surface + ?Sized>(&mut self, surface: &mut S) {
        self.phase = Phase::Instructions;
        let now = self.clock.now();
        let block = &self.blocks[self.current_block_index];
        info!(block = block.number, "instructions");
        self.gate.enter(
            block,
            &self.config.texts,
            self.config.countdown_poll(),
            now,
            &mut self.scheduler,
            surface,
        );
        self.subscribe(KeyListener::InstructionAccept);
    }

    /// The on-screen continue control. Ignored until the dwell is over.
    pub fn continue_pressed<S: Surface + ?Sized>(&mut self, surface: &mut S) -> bool {
        if !self.phase.allows_continue() {
            return false;
        }
        if !self.gate.try_continue(&mut self.scheduler, surface) {
            return false;
        }
        self.unsubscribe();
        self.current_trial_index = 0;
        self.start_block_trials(surface);
        true
    }

    /// Routes a key press to whichever listener the current screen installed.
    pub fn key_pressed<S: Surface + ?Sized>(&mut self, key: KeyInput, surface: &mut S) {
        let Some(listener) = self.listener else {
            return;
        };
        match (listener, key) {
            (KeyListener::InstructionAccept, KeyInput::Enter) => {
                self.continue_pressed(surface);
            }
            (KeyListener::TrialResponse, KeyInput::Char(c)) => self.handle_response(c, surface),
            _ => {}
        }
    }

    /// The stimulus image requested by the current trial finished loading.
    pub fn asset_ready<S: Surface + ?Sized>(&mut self, surface: &mut S) -> bool {
        if !self.phase.allows_response() {
            return false;
        }
        let now = self.clock.now();
        self.runner.asset_ready(
            now,
            self.config.stimulus_duration(),
            &mut self.scheduler,
            surface,
        )
    }

    /// Fires every timer that is due. Returns how many did something.
    pub fn poll<S: Surface + ?Sized>(&mut self, surface: &mut S) -> usize {
        let now = self.clock.now();
        let mut handled = 0;
        for (handle, task) in self.scheduler.fire_due(now) {
            let acted = match task {
                SessionTask::Countdown => self.gate.tick(
                    handle,
                    now,
                    &self.config.texts,
                    &mut self.scheduler,
                    surface,
                ),
                SessionTask::HideStimulus => self.runner.hide_elapsed(handle, surface),
            };
            if acted {
                handled += 1;
            } else {
                debug!(?task, "stale timer ignored");
            }
        }
        handled
    }

    /// Earliest pending timer, in the session clock's nanoseconds.
    pub fn next_deadline(&self) -> Option<u64> {
        self.scheduler.next_deadline()
    }

    fn start_block_trials<S: Surface + ?Sized>(&mut self, surface: &mut S) {
        self.phase = Phase::Trials;
        surface.show_only(None);

        let block = &self.blocks[self.current_block_index];
        if block.trials.is_empty() {
            warn!(block = block.number, "block has no trials, skipping");
            self.next_block_or_finish(surface);
            return;
        }
        info!(block = block.number, trials = block.trials.len(), "block started");

        self.subscribe(KeyListener::TrialResponse);
        self.show_next_trial(surface);
    }

    fn show_next_trial<S: Surface + ?Sized>(&mut self, surface: &mut S) {
        let block = &self.blocks[self.current_block_index];
        let Some(trial) = block.trials.get(self.current_trial_index) else {
            self.end_current_block(surface);
            return;
        };
        debug!(
            block = trial.block,
            trial = self.current_trial_index + 1,
            of = block.trials.len(),
            image = %trial.image,
            "trial"
        );

        self.update_progress(self.completed_trials, surface);
        let block = &self.blocks[self.current_block_index];
        let trial = &block.trials[self.current_trial_index];
        let asset = self.config.asset_path(trial);
        self.runner.present(
            trial,
            block.label.as_deref(),
            &asset,
            &mut self.scheduler,
            surface,
        );
    }

    fn handle_response<S: Surface + ?Sized>(&mut self, key: char, surface: &mut S) {
        let now = self.clock.now();
        let block = &self.blocks[self.current_block_index];
        let Some(trial) = block.trials.get(self.current_trial_index) else {
            return;
        };
        let Some(score) = self
            .runner
            .respond(&self.config.response_keys, key, trial, now)
        else {
            return;
        };

        self.completed_trials += 1;
        if self.config.is_saved(trial.block) {
            let participant = self
                .participant
                .as_ref()
                .map(ParticipantId::to_string)
                .unwrap_or_default();
            self.results.push(TrialResult {
                participant_id: participant,
                image: trial.image.clone(),
                category: trial.category.clone(),
                response: score.response.to_string(),
                correct_response: trial.correct_response.clone(),
                correct: score.correct,
                reaction_time_ms: score.reaction_time_ms,
                block: trial.block,
            });
        }

        self.current_trial_index += 1;
        self.show_next_trial(surface);
    }

    fn end_current_block<S: Surface + ?Sized>(&mut self, surface: &mut S) {
        info!(block = self.current_block_index + 1, "block finished");
        self.unsubscribe();
        self.runner.reset(&mut self.scheduler);
        self.next_block_or_finish(surface);
    }

    fn next_block_or_finish<S: Surface + ?Sized>(&mut self, surface: &mut S) {
        self.current_block_index += 1;
        if self.current_block_index >= self.blocks.len() {
            self.finish(surface);
        } else {
            self.enter_instructions(surface);
        }
    }

    fn finish<S: Surface + ?Sized>(&mut self, surface: &mut S) {
        if self.phase.is_finished() {
            return;
        }
        self.phase = Phase::Finished;
        self.unsubscribe();
        self.gate.leave(&mut self.scheduler);
        self.runner.reset(&mut self.scheduler);

        surface.show_only(Some(self.phase.region()));
        info!(
            saved = self.results.len(),
            completed = self.completed_trials,
            "experiment finished"
        );
        // No update at all for an empty plan.
        self.update_progress(self.total_trials, surface);
        self.export = self.run_export();
    }

    fn run_export(&mut self) -> ExportStatus {
        let Some(participant) = self.participant.as_ref() else {
            return ExportStatus::Skipped;
        };
        match export::export(&mut self.sink, participant, &self.results) {
            Ok(Some(path)) => ExportStatus::Saved(path),
            Ok(None) => ExportStatus::Skipped,
            Err(e) => {
                error!(error = %e, "failed to save results");
                ExportStatus::Failed(e.to_string())
            }
        }
    }

    fn update_progress<S: Surface + ?Sized>(&mut self, completed: usize, surface: &mut S) {
        if let Some(percent) = progress::percent(completed, self.total_trials) {
            surface.set_progress(percent, &self.config.texts.progress(percent));
            self.progress = Some(percent);
        }
    }

    /// Installs the listener for the screen being entered. At most one is
    /// ever installed.
    fn subscribe(&mut self, listener: KeyListener) {
        if let Some(old) = self.listener.replace(listener) {
            warn!(old = ?old, new = ?listener, "key listener still installed, replacing");
        }
    }

    fn unsubscribe(&mut self) {
        self.listener = None;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_finished()
    }

    pub fn participant(&self) -> Option<&ParticipantId> {
        self.participant.as_ref()
    }

    pub fn key_listener(&self) -> Option<KeyListener> {
        self.listener
    }

    pub fn can_continue(&self) -> bool {
        self.phase.allows_continue() && self.gate.can_continue()
    }

    pub fn trial_state(&self) -> TrialState {
        self.runner.state()
    }

    /// The trial on screen, if trials are running.
    pub fn current_trial(&self) -> Option<&Trial> {
        if !self.phase.allows_response() {
            return None;
        }
        self.blocks
            .get(self.current_block_index)?
            .trials
            .get(self.current_trial_index)
    }

    pub fn current_block(&self) -> Option<&Block> {
        self.blocks.get(self.current_block_index)
    }

    pub fn current_block_index(&self) -> usize {
        self.current_block_index
    }

    pub fn current_trial_index(&self) -> usize {
        self.current_trial_index
    }

    pub fn completed_trials(&self) -> usize {
        self.completed_trials
    }

    pub fn total_trials(&self) -> usize {
        self.total_trials
    }

    pub fn results(&self) -> &[TrialResult] {
        &self.results
    }

    /// Last percentage pushed to the progress indicator.
    pub fn progress(&self) -> Option<u8> {
        self.progress
    }

    pub fn export_status(&self) -> &ExportStatus {
        &self.export
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }
}
