use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use iat_core::{ResponseKeys, Stimulus};
use tracing::{info, warn};

use crate::config::ExperimentConfig;

pub const COLUMN_IMAGE: &str = "Immagine";
pub const COLUMN_CATEGORY: &str = "Categoria";
pub const COLUMN_CORRECT: &str = "RispostaCorretta";

#[derive(Debug, thiserror::Error)]
pub enum StimulusError {
    #[error("failed to read stimulus file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "stimulus file for {set} is missing columns {missing:?}; expected Immagine; Categoria; RispostaCorretta"
    )]
    MissingColumns {
        set: String,
        missing: Vec<&'static str>,
    },
}

/// Parses a delimited stimulus table.
///
/// The delimiter is `;` when the header contains one and `,` otherwise.
/// Rows without an image are skipped.
pub fn parse_stimuli(text: &str, set: &str) -> Result<Vec<Stimulus>, StimulusError> {
    let lines: Vec<&str> = text.trim().lines().collect();
    if lines.len() < 2 {
        warn!(set, "stimulus file is empty or has only a header");
        return Ok(Vec::new());
    }

    let header = lines[0];
    let delimiter = if header.contains(';') { ';' } else { ',' };
    let headers: Vec<&str> = header.split(delimiter).map(str::trim).collect();
    let position = |name: &str| headers.iter().position(|h| *h == name);

    let (image_idx, category_idx, correct_idx) = match (
        position(COLUMN_IMAGE),
        position(COLUMN_CATEGORY),
        position(COLUMN_CORRECT),
    ) {
        (Some(i), Some(c), Some(r)) => (i, c, r),
        (i, c, r) => {
            let missing = [(i, COLUMN_IMAGE), (c, COLUMN_CATEGORY), (r, COLUMN_CORRECT)]
                .into_iter()
                .filter(|(idx, _)| idx.is_none())
                .map(|(_, name)| name)
                .collect();
            return Err(StimulusError::MissingColumns {
                set: set.to_string(),
                missing,
            });
        }
    };

    let mut out = Vec::with_capacity(lines.len() - 1);
    for line in &lines[1..] {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split(delimiter).map(str::trim).collect();
        let field = |idx: usize| parts.get(idx).copied().unwrap_or("");

        let image = field(image_idx);
        if image.is_empty() {
            continue;
        }
        out.push(Stimulus {
            image: image.to_string(),
            category: field(category_idx).to_string(),
            correct_response: field(correct_idx).to_uppercase(),
            group: set.to_string(),
        });
    }
    Ok(out)
}

pub fn read_stimuli(path: &Path, set: &str) -> Result<Vec<Stimulus>, StimulusError> {
    let text = fs::read_to_string(path).map_err(|source| StimulusError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_stimuli(&text, set)
}

/// Keeps the first stimulus for every (group, image) pair, preserving order.
pub fn dedupe(set: &str, stimuli: Vec<Stimulus>) -> Vec<Stimulus> {
    let before = stimuli.len();
    let mut seen = HashSet::new();
    let kept: Vec<Stimulus> = stimuli
        .into_iter()
        .filter(|s| seen.insert((s.group.clone(), s.image.clone())))
        .collect();
    let dropped = before - kept.len();
    if dropped > 0 {
        warn!(set, dropped, "duplicate stimuli dropped");
    }
    kept
}

/// Every stimulus set available to the block plan, by name.
#[derive(Debug, Clone, Default)]
pub struct StimulusSets {
    sets: BTreeMap<String, Vec<Stimulus>>,
}

impl StimulusSets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads every configured file, then derives the mirror sets.
    pub fn load(config: &ExperimentConfig) -> Result<Self, StimulusError> {
        let mut sets = Self::new();
        for (name, path) in &config.stim_files {
            sets.insert(name, read_stimuli(path, name)?, config.dedupe_stimuli);
        }
        sets.add_mirrors(&config.mirror_sets, &config.response_keys);

        for (name, stimuli) in &sets.sets {
            info!(set = %name, count = stimuli.len(), "stimulus set ready");
        }
        Ok(sets)
    }

    pub fn insert(&mut self, name: &str, stimuli: Vec<Stimulus>, dedupe_stimuli: bool) {
        let stimuli = if dedupe_stimuli {
            dedupe(name, stimuli)
        } else {
            stimuli
        };
        self.sets.insert(name.to_string(), stimuli);
    }

    /// Adds each mirror as a copy of its source with the response keys
    /// swapped. The copy keeps the source's group so images still resolve.
    pub fn add_mirrors(&mut self, mirrors: &BTreeMap<String, String>, keys: &ResponseKeys) {
        for (name, source) in mirrors {
            let mirrored: Vec<Stimulus> = self
                .get(source)
                .iter()
                .map(|s| s.mirrored(keys))
                .collect();
            self.sets.insert(name.clone(), mirrored);
        }
    }

    /// Stimuli of `name`; empty for an unknown set.
    pub fn get(&self, name: &str) -> &[Stimulus] {
        self.sets.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Immagine;Categoria;RispostaCorretta\n\
                          c1.jpg;Conflitto;a\r\n\
                          \n\
                          n1.jpg ; Neutre ; L\n\
                          ;Neutre;L\n";

    #[test]
    fn parses_semicolon_file() {
        let stimuli = parse_stimuli(SAMPLE, "images1").unwrap();
        assert_eq!(stimuli.len(), 2);
        assert_eq!(stimuli[0].correct_response, "A");
        assert_eq!(stimuli[1].image, "n1.jpg");
        assert_eq!(stimuli[1].category, "Neutre");
        assert!(stimuli.iter().all(|s| s.group == "images1"));
    }

    #[test]
    fn comma_header_and_any_column_order() {
        let text = "RispostaCorretta,Immagine,Categoria\nL,x.png,Piacevole\n";
        let stimuli = parse_stimuli(text, "images2").unwrap();
        assert_eq!(stimuli[0].image, "x.png");
        assert_eq!(stimuli[0].category, "Piacevole");
        assert_eq!(stimuli[0].correct_response, "L");
    }

    #[test]
    fn short_rows_leave_fields_empty() {
        let text = "Immagine;Categoria;RispostaCorretta\nonly.jpg\n";
        let stimuli = parse_stimuli(text, "s").unwrap();
        assert_eq!(stimuli[0].category, "");
        assert_eq!(stimuli[0].correct_response, "");
    }

    #[test]
    fn missing_columns_are_fatal() {
        let err = parse_stimuli("Image;Categoria\nx;y\n", "images1").unwrap_err();
        match err {
            StimulusError::MissingColumns { set, missing } => {
                assert_eq!(set, "images1");
                assert_eq!(missing, vec![COLUMN_IMAGE, COLUMN_CORRECT]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn header_only_file_is_empty() {
        assert!(parse_stimuli("Immagine;Categoria;RispostaCorretta\n", "s")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn dedupe_keeps_first_per_group_and_image() {
        let text = "Immagine;Categoria;RispostaCorretta\na.jpg;X;A\na.jpg;Y;L\nb.jpg;X;A\n";
        let stimuli = dedupe("s", parse_stimuli(text, "s").unwrap());
        assert_eq!(stimuli.len(), 2);
        assert_eq!(stimuli[0].category, "X");
        assert_eq!(stimuli[1].image, "b.jpg");
    }

    #[test]
    fn mirror_set_flips_answers_and_keeps_group() {
        let mut sets = StimulusSets::new();
        sets.insert("images1", parse_stimuli(SAMPLE, "images1").unwrap(), false);
        sets.add_mirrors(
            &BTreeMap::from([("images3".to_string(), "images1".to_string())]),
            &ResponseKeys::default(),
        );
        let mirrored = sets.get("images3");
        assert_eq!(mirrored.len(), 2);
        assert_eq!(mirrored[0].correct_response, "L");
        assert_eq!(mirrored[1].correct_response, "A");
        assert_eq!(mirrored[0].group, "images1");
        assert!(sets.get("unknown").is_empty());
    }

    #[test]
    fn load_reads_files_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("images1.csv");
        fs::write(&path, SAMPLE).unwrap();

        let mut config = ExperimentConfig::default();
        config.stim_files = BTreeMap::from([("images1".to_string(), path)]);
        let sets = StimulusSets::load(&config).unwrap();
        assert_eq!(sets.get("images1").len(), 2);
        assert_eq!(sets.get("images3").len(), 2);
    }

    #[test]
    fn unreadable_file_is_fatal() {
        let mut config = ExperimentConfig::default();
        config.stim_files = BTreeMap::from([(
            "images1".to_string(),
            PathBuf::from("/nonexistent/images1.csv"),
        )]);
        assert!(matches!(
            StimulusSets::load(&config),
            Err(StimulusError::Io { .. })
        ));
    }
}
