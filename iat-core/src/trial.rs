use serde::{Deserialize, Serialize};

use crate::stimulus::Stimulus;

/// Trial lifecycle, driven by the trial runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrialState {
    #[default]
    Idle,
    AwaitingAsset,
    Visible,
    HiddenAwaitingInput,
    Scored,
}

/// A stimulus assigned to a block. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trial {
    pub image: String,
    pub category: String,
    pub correct_response: String,
    pub group: String,
    /// 1-based block number.
    pub block: u32,
}

impl Trial {
    pub fn from_stimulus(stimulus: &Stimulus, block: u32) -> Self {
        Self {
            image: stimulus.image.clone(),
            category: stimulus.category.clone(),
            correct_response: stimulus.correct_response.clone(),
            group: stimulus.group.clone(),
            block,
        }
    }
}

/// Recorded result per scored trial of a saved block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialResult {
    pub participant_id: String,
    pub image: String,
    pub category: String,
    pub response: String,
    pub correct_response: String,
    pub correct: bool,
    pub reaction_time_ms: u64,
    pub block: u32,
}

impl TrialResult {
    pub fn correctness(&self) -> u8 {
        u8::from(self.correct)
    }
}
