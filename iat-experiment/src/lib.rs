pub mod config;
pub mod export;
pub mod gate;
pub mod plan;
pub mod progress;
pub mod runner;
pub mod scorer;
pub mod state;
pub mod stimulus;

pub use config::{BlockSpec, ConfigError, Draw, ExperimentConfig, UiTexts};
pub use export::{ExportError, FileSink, MemorySink, ResultSink};
pub use plan::{Block, BlockPlan};
pub use state::{ExportStatus, KeyListener, Session, SessionTask};
pub use stimulus::{StimulusError, StimulusSets};
