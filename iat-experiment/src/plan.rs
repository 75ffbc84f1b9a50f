use std::time::Duration;

use iat_core::{Stimulus, Trial};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use crate::config::{Draw, ExperimentConfig};
use crate::stimulus::StimulusSets;

/// Trials of one block with the context shown before them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// 1-based.
    pub number: u32,
    pub trials: Vec<Trial>,
    pub instructions: String,
    pub label: Option<String>,
    pub min_dwell: Option<Duration>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockPlan {
    pub blocks: Vec<Block>,
    pub total_trials: usize,
}

impl BlockPlan {
    pub fn new(blocks: Vec<Block>) -> Self {
        let total_trials = blocks.iter().map(|b| b.trials.len()).sum();
        Self {
            blocks,
            total_trials,
        }
    }

    /// Builds every configured block from `sets`.
    ///
    /// Returns an empty plan when any referenced set has no stimuli.
    pub fn build<R: Rng + ?Sized>(
        config: &ExperimentConfig,
        sets: &StimulusSets,
        rng: &mut R,
    ) -> Self {
        let missing = config
            .blocks
            .iter()
            .flat_map(|b| &b.draws)
            .find(|d| sets.get(&d.set).is_empty());
        if let Some(draw) = missing {
            warn!(set = %draw.set, "stimulus set is empty, no blocks prepared");
            return Self::default();
        }

        let mut blocks = Vec::with_capacity(config.blocks.len());
        for (i, spec) in config.blocks.iter().enumerate() {
            let number = i as u32 + 1;
            let mut trials: Vec<Trial> = Vec::new();
            for draw in &spec.draws {
                let picked = pick(sets.get(&draw.set), draw, rng);
                debug!(block = number, set = %draw.set, picked = picked.len(), "draw");
                trials.extend(picked.iter().map(|s| Trial::from_stimulus(s, number)));
            }
            trials.shuffle(rng);

            blocks.push(Block {
                number,
                trials,
                instructions: spec
                    .instructions
                    .clone()
                    .unwrap_or_else(|| config.texts.instruction_fallback(number)),
                label: spec.label.clone(),
                min_dwell: spec
                    .min_dwell_ms
                    .filter(|&ms| ms > 0)
                    .map(Duration::from_millis),
            });
        }

        let plan = Self::new(blocks);
        info!(
            blocks = plan.blocks.len(),
            total_trials = plan.total_trials,
            "block plan prepared"
        );
        plan
    }
}

fn matches_category(category: &str, patterns: &[String]) -> bool {
    if patterns.is_empty() {
        return true;
    }
    let category = category.to_lowercase();
    patterns
        .iter()
        .any(|p| category.contains(&p.to_lowercase()))
}

/// Filters `pool` by the draw's categories, then samples without replacement.
fn pick<'a, R: Rng + ?Sized>(pool: &'a [Stimulus], draw: &Draw, rng: &mut R) -> Vec<&'a Stimulus> {
    let mut candidates: Vec<&Stimulus> = pool
        .iter()
        .filter(|s| matches_category(&s.category, &draw.categories))
        .collect();
    if let Some(n) = draw.sample {
        candidates.shuffle(rng);
        candidates.truncate(n);
    }
    candidates
}
