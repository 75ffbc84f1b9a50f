use crate::surface::Region;

/// Screens a session moves through, in order.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Start,
    Instructions,
    Trials,
    Finished,
}

impl Phase {
    /// Response keys are only routed to the trial runner while trials run.
    pub fn allows_response(&self) -> bool {
        matches!(self, Self::Trials)
    }

    pub fn allows_continue(&self) -> bool {
        matches!(self, Self::Instructions)
    }

    pub fn is_start(&self) -> bool {
        matches!(self, Self::Start)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }

    /// The screen region that is visible during this phase.
    pub fn region(&self) -> Region {
        match self {
            Self::Start => Region::Start,
            Self::Instructions => Region::Instruction,
            Self::Trials => Region::Trial,
            Self::Finished => Region::End,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_trials_accept_responses() {
        assert!(Phase::Trials.allows_response());
        assert!(!Phase::Instructions.allows_response());
        assert!(!Phase::Start.allows_response());
        assert!(!Phase::Finished.allows_response());
    }

    #[test]
    fn phases_map_to_their_regions() {
        assert_eq!(Phase::default().region(), Region::Start);
        assert_eq!(Phase::Instructions.region(), Region::Instruction);
        assert_eq!(Phase::Finished.region(), Region::End);
    }
}
