use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use iat_core::{ResponseKeys, Trial};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// One pick of stimuli for a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draw {
    pub set: String,
    /// Case-insensitive substrings matched against the category; empty takes
    /// every stimulus of the set.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Random subset size; `None` takes the whole pool.
    #[serde(default)]
    pub sample: Option<usize>,
}

impl Draw {
    fn new(set: &str, categories: &[&str], sample: Option<usize>) -> Self {
        Self {
            set: set.to_string(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
            sample,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockSpec {
    pub draws: Vec<Draw>,
    pub instructions: Option<String>,
    /// Fixed label shown with every stimulus; the stimulus category otherwise.
    pub label: Option<String>,
    pub min_dwell_ms: Option<u64>,
}

/// Participant-facing strings. `{secs}`, `{percent}` and `{block}` are
/// substituted where they appear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiTexts {
    pub start_prompt: String,
    pub invalid_id: String,
    pub instruction_fallback: String,
    pub countdown: String,
    pub ready: String,
    pub continue_label: String,
    pub progress: String,
    pub end: String,
}

impl Default for UiTexts {
    fn default() -> Self {
        Self {
            start_prompt: "Inserisci le ultime 3 cifre del tuo numero di telefono e premi Invio."
                .into(),
            invalid_id: "Inserisci esattamente 3 cifre numeriche.".into(),
            instruction_fallback: "Istruzioni per il blocco {block}".into(),
            countdown: "Potrai iniziare tra {secs} secondi...".into(),
            ready: "Ora puoi iniziare (premi Invio o Continua).".into(),
            continue_label: "Continua".into(),
            progress: "Progresso: {percent}%".into(),
            end: "Test completato. Grazie per la partecipazione!".into(),
        }
    }
}

impl UiTexts {
    pub fn countdown(&self, secs: u64) -> String {
        self.countdown.replace("{secs}", &secs.to_string())
    }

    pub fn progress(&self, percent: u8) -> String {
        self.progress.replace("{percent}", &percent.to_string())
    }

    pub fn instruction_fallback(&self, block: u32) -> String {
        self.instruction_fallback
            .replace("{block}", &block.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Stimulus set name → delimited file.
    pub stim_files: BTreeMap<String, PathBuf>,
    /// Stimulus group → folder its images live in.
    pub stim_folders: BTreeMap<String, PathBuf>,
    /// Derived set name → set it mirrors with the response keys swapped.
    pub mirror_sets: BTreeMap<String, String>,
    /// Keep only the first stimulus per (group, image) of each set.
    pub dedupe_stimuli: bool,
    pub stimulus_duration_ms: u64,
    pub countdown_poll_ms: u64,
    pub response_keys: ResponseKeys,
    pub saved_blocks: BTreeSet<u32>,
    pub blocks: Vec<BlockSpec>,
    pub texts: UiTexts,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            stim_files: BTreeMap::from([
                ("images1".into(), PathBuf::from("images1.csv")),
                ("images2".into(), PathBuf::from("images2.csv")),
            ]),
            stim_folders: BTreeMap::from([
                ("images1".into(), PathBuf::from("images1")),
                ("images2".into(), PathBuf::from("images2")),
            ]),
            mirror_sets: BTreeMap::from([("images3".into(), "images1".into())]),
            dedupe_stimuli: false,
            stimulus_duration_ms: 1000,
            countdown_poll_ms: 250,
            response_keys: ResponseKeys::default(),
            saved_blocks: BTreeSet::from([3, 5]),
            blocks: default_blocks(),
            texts: UiTexts::default(),
        }
    }
}

fn default_blocks() -> Vec<BlockSpec> {
    vec![
        BlockSpec {
            draws: vec![
                Draw::new("images1", &["confl"], Some(5)),
                Draw::new("images1", &["neut"], Some(5)),
            ],
            instructions: Some(
                "In questo test verranno presentate delle immagini di diversa natura.\n\n\
                 Lo scopo del partecipante è quello di categorizzarle come:\n\n\
                 Immagini relative al conflitto israeliano-palestinese = premere il tasto A\n\n\
                 Immagini neutre = premere il tasto L"
                    .into(),
            ),
            label: Some("Conflitto = A    Neutre = L".into()),
            min_dwell_ms: Some(15_000),
        },
        BlockSpec {
            draws: vec![
                Draw::new("images2", &["spiac"], Some(5)),
                Draw::new("images2", &["piace", "neutr"], Some(5)),
            ],
            instructions: Some(
                "Adesso è richiesto al partecipante di categorizzare le immagini, che verranno \
                 mostrate successivamente, come:\n\n\
                 Spiacevoli = premere il tasto A\n\n\
                 Piacevoli-Neutre = premere il tasto L"
                    .into(),
            ),
            label: Some("Spiacevoli = A    Piacevoli-Neutre = L".into()),
            min_dwell_ms: Some(15_000),
        },
        BlockSpec {
            draws: vec![
                Draw::new("images1", &[], None),
                Draw::new("images2", &[], None),
            ],
            instructions: Some(
                "In questa sezione il partecipante vedrà sullo schermo due gruppi di categorie, \
                 uno a sinistra e uno a destra.\n\n\
                 Al centro dello schermo verranno presentate, una alla volta, le immagini di \
                 diverso tipo.\n\n\
                 Il compito è classificare ogni immagine il più rapidamente e accuratamente \
                 possibile, premendo:\n\n\
                 il tasto A se l'immagine appartiene a una delle categorie mostrate a sinistra \
                 (Conflitto e Spiacevole)\n\n\
                 il tasto L se l'immagine appartiene a una delle categorie mostrate a destra \
                 (Neutre e Piacevole/Neutra)\n\n\
                 Rispondi il più velocemente possibile, senza pensarci troppo, cercando allo \
                 stesso tempo di evitare errori."
                    .into(),
            ),
            label: Some("Conflitto e Spiacevole = A    Neutre e Piacevole/Neutra = L".into()),
            min_dwell_ms: Some(30_000),
        },
        BlockSpec {
            draws: vec![
                Draw::new("images3", &["confl"], Some(5)),
                Draw::new("images3", &["neut"], Some(5)),
            ],
            instructions: Some(
                "Attenzione: in questa parte le immagini conflitto e neutre cambieranno \
                 posizione.\n\n\
                 Da ora in poi, le categorie associate ai tasti A e L sono diverse rispetto al \
                 blocco precedente.\n\n\
                 Il tuo compito è classificare ogni immagine il più rapidamente e accuratamente \
                 possibile, premendo:\n\n\
                 il tasto A per le immagini Neutre\n\n\
                 il tasto L per le immagini del Conflitto"
                    .into(),
            ),
            label: Some("Neutre = A    Conflitto = L".into()),
            min_dwell_ms: Some(15_000),
        },
        BlockSpec {
            draws: vec![
                Draw::new("images2", &[], None),
                Draw::new("images3", &[], None),
            ],
            instructions: Some(
                "Benvenuti nella sezione finale!\n\n\
                 In questa sezione il partecipante vedrà nuovamente sullo schermo due gruppi di \
                 categorie, uno a sinistra e uno a destra dello schermo.\n\n\
                 Il compito è classificare ogni immagine il più rapidamente e accuratamente \
                 possibile, premendo:\n\n\
                 il tasto A se l'immagine appartiene a una delle categorie mostrate a sinistra \
                 (Neutre e Spiacevole)\n\n\
                 il tasto L se l'immagine appartiene a una delle categorie mostrate a destra \
                 (Conflitto e Piacevole/Neutra)\n\n\
                 Rispondi il più velocemente possibile, senza pensarci troppo, cercando allo \
                 stesso tempo di evitare errori."
                    .into(),
            ),
            label: Some("Neutre o Spiacevole = A    Conflitto o Piacevole/Neutra = L".into()),
            min_dwell_ms: Some(30_000),
        },
    ]
}

impl ExperimentConfig {
    /// Reads a JSON config. Relative stimulus paths are taken relative to the
    /// directory holding the file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = serde_json::from_str(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        for p in self
            .stim_files
            .values_mut()
            .chain(self.stim_folders.values_mut())
        {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stimulus_duration_ms == 0 {
            return Err(ConfigError::Invalid(
                "stimulus_duration_ms must be positive".into(),
            ));
        }
        if self.countdown_poll_ms == 0 {
            return Err(ConfigError::Invalid(
                "countdown_poll_ms must be positive".into(),
            ));
        }
        if !self.response_keys.are_distinct() {
            return Err(ConfigError::Invalid(
                "the two response keys must differ".into(),
            ));
        }
        for (mirror, source) in &self.mirror_sets {
            if !self.stim_files.contains_key(source) {
                return Err(ConfigError::Invalid(format!(
                    "mirror set {mirror} refers to unknown set {source}"
                )));
            }
        }
        for (i, block) in self.blocks.iter().enumerate() {
            for draw in &block.draws {
                if !self.knows_set(&draw.set) {
                    return Err(ConfigError::Invalid(format!(
                        "block {} draws from unknown set {}",
                        i + 1,
                        draw.set
                    )));
                }
            }
        }
        let block_count = self.blocks.len() as u32;
        if let Some(b) = self
            .saved_blocks
            .iter()
            .find(|&&b| b == 0 || b > block_count)
        {
            return Err(ConfigError::Invalid(format!(
                "saved block {b} is outside 1..={block_count}"
            )));
        }
        Ok(())
    }

    fn knows_set(&self, name: &str) -> bool {
        self.stim_files.contains_key(name) || self.mirror_sets.contains_key(name)
    }

    pub fn is_saved(&self, block: u32) -> bool {
        self.saved_blocks.contains(&block)
    }

    pub fn stimulus_duration(&self) -> Duration {
        Duration::from_millis(self.stimulus_duration_ms)
    }

    pub fn countdown_poll(&self) -> Duration {
        Duration::from_millis(self.countdown_poll_ms)
    }

    /// Image path of a trial: its group's folder joined with the image name.
    pub fn asset_path(&self, trial: &Trial) -> PathBuf {
        match self.stim_folders.get(&trial.group) {
            Some(folder) => folder.join(&trial.image),
            None => PathBuf::from(&trial.image),
        }
    }
}
