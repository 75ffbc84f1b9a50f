use serde::{Deserialize, Serialize};

use crate::response::ResponseKeys;

/// One row of a stimulus set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stimulus {
    pub image: String,
    pub category: String,
    /// Uppercased response symbol; may be empty if the source left it blank.
    pub correct_response: String,
    /// Set the image file lives in, used to resolve its base path.
    pub group: String,
}

impl Stimulus {
    /// Same stimulus with the two response symbols swapped.
    pub fn mirrored(&self, keys: &ResponseKeys) -> Self {
        Self {
            correct_response: keys.flip(&self.correct_response),
            ..self.clone()
        }
    }
}
