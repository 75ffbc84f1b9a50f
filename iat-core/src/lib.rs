pub mod input;
pub mod participant;
pub mod phase;
pub mod response;
pub mod stimulus;
pub mod surface;
pub mod trial;

pub use input::KeyInput;
pub use participant::{ParticipantId, ParticipantIdError};
pub use phase::Phase;
pub use response::ResponseKeys;
pub use stimulus::Stimulus;
pub use surface::{Element, Region, Surface};
pub use trial::{Trial, TrialResult, TrialState};
