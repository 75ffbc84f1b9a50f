#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use iat_core::{Element, KeyInput, Region, Surface, Trial};
use iat_experiment::{Block, BlockPlan, ExperimentConfig, MemorySink, ResultSink, Session};
use iat_timing::ManualClock;

/// Surface that records everything the session asks of it.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub visible: Option<Region>,
    pub start_removed: bool,
    pub texts: HashMap<Element, String>,
    pub continue_enabled: bool,
    pub stimulus_visible: bool,
    pub requested: Vec<PathBuf>,
    pub progress: Vec<u8>,
    pub progress_label: String,
    pub shown: Vec<Option<Region>>,
    /// Elements this surface pretends not to have.
    pub missing: HashSet<Element>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without(elements: &[Element]) -> Self {
        Self {
            missing: elements.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn text(&self, element: Element) -> &str {
        self.texts.get(&element).map(String::as_str).unwrap_or("")
    }

    pub fn last_progress(&self) -> Option<u8> {
        self.progress.last().copied()
    }
}

impl Surface for RecordingSurface {
    fn show_only(&mut self, region: Option<Region>) {
        self.visible = region;
        self.shown.push(region);
    }

    fn remove_start(&mut self) {
        self.start_removed = true;
    }

    fn set_text(&mut self, element: Element, text: &str) {
        if self.missing.contains(&element) {
            return;
        }
        self.texts.insert(element, text.to_string());
    }

    fn set_continue_enabled(&mut self, enabled: bool) {
        self.continue_enabled = enabled;
    }

    fn set_stimulus_visible(&mut self, visible: bool) {
        if self.missing.contains(&Element::StimulusImage) {
            return;
        }
        self.stimulus_visible = visible;
    }

    fn request_stimulus(&mut self, path: &Path) {
        if self.missing.contains(&Element::StimulusImage) {
            return;
        }
        self.requested.push(path.to_path_buf());
    }

    fn set_progress(&mut self, percent: u8, label: &str) {
        self.progress.push(percent);
        self.progress_label = label.to_string();
    }
}

pub fn trial(image: &str, category: &str, correct: &str, block: u32) -> Trial {
    Trial {
        image: image.to_string(),
        category: category.to_string(),
        correct_response: correct.to_string(),
        group: "images1".to_string(),
        block,
    }
}

/// `count` trials alternating between A and L answers.
pub fn trials(block: u32, count: usize) -> Vec<Trial> {
    (0..count)
        .map(|i| {
            let (category, correct) = if i % 2 == 0 {
                ("Conflitto", "A")
            } else {
                ("Neutre", "L")
            };
            trial(&format!("b{block}_{i}.jpg"), category, correct, block)
        })
        .collect()
}

pub fn block(number: u32, trials: Vec<Trial>, dwell_ms: Option<u64>) -> Block {
    Block {
        number,
        trials,
        instructions: format!("Istruzioni {number}"),
        label: None,
        min_dwell: dwell_ms.map(Duration::from_millis),
    }
}

pub fn config(saved: &[u32]) -> ExperimentConfig {
    ExperimentConfig {
        stim_folders: BTreeMap::from([("images1".into(), PathBuf::from("stimuli/images1"))]),
        saved_blocks: saved.iter().copied().collect::<BTreeSet<u32>>(),
        ..ExperimentConfig::default()
    }
}

pub type TestSession = Session<ManualClock, MemorySink>;

pub fn session(blocks: Vec<Block>, saved: &[u32]) -> (TestSession, ManualClock) {
    session_with_sink(blocks, saved, MemorySink::default())
}

pub fn session_with_sink<K: ResultSink>(
    blocks: Vec<Block>,
    saved: &[u32],
    sink: K,
) -> (Session<ManualClock, K>, ManualClock) {
    let clock = ManualClock::new();
    let session = Session::new(config(saved), BlockPlan::new(blocks), clock.clone(), sink);
    (session, clock)
}

/// Waits out the current instruction dwell and presses Enter.
pub fn pass_instructions<K: ResultSink>(
    session: &mut Session<ManualClock, K>,
    clock: &ManualClock,
    surface: &mut RecordingSurface,
) {
    if let Some(dwell) = session.current_block().and_then(|b| b.min_dwell) {
        clock.advance(dwell + session.config().countdown_poll());
        session.poll(surface);
    }
    session.key_pressed(KeyInput::Enter, surface);
}

/// Loads the stimulus, waits `rt_ms`, and answers the current trial
/// correctly.
pub fn answer_correctly<K: ResultSink>(
    session: &mut Session<ManualClock, K>,
    clock: &ManualClock,
    surface: &mut RecordingSurface,
    rt_ms: u64,
) {
    let key = session
        .current_trial()
        .and_then(|t| t.correct_response.chars().next())
        .expect("a trial on screen");
    session.asset_ready(surface);
    clock.advance_ms(rt_ms);
    session.poll(surface);
    session.key_pressed(KeyInput::Char(key), surface);
}

/// Drives the session from the start screen to the end.
pub fn run_to_end<K: ResultSink>(
    session: &mut Session<ManualClock, K>,
    clock: &ManualClock,
    surface: &mut RecordingSurface,
) {
    session.submit_participant("123", surface).unwrap();
    while !session.is_finished() {
        if session.current_trial().is_some() {
            answer_correctly(session, clock, surface, 400);
        } else {
            pass_instructions(session, clock, surface);
        }
    }
}
