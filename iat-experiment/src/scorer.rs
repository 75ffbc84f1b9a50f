use iat_core::{ResponseKeys, Trial};

/// Outcome of one accepted response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    /// Uppercased response symbol.
    pub response: char,
    pub correct: bool,
    pub reaction_time_ms: u64,
}

/// Elapsed time between two clock readings, rounded to the nearest
/// millisecond. Never negative.
pub fn reaction_time_ms(start_ns: u64, now_ns: u64) -> u64 {
    (now_ns.saturating_sub(start_ns) + 500_000) / 1_000_000
}

/// Scores `key` against `trial`. Keys other than the two response symbols
/// give `None`.
pub fn score(
    keys: &ResponseKeys,
    key: char,
    trial: &Trial,
    start_ns: u64,
    now_ns: u64,
) -> Option<Score> {
    let response = keys.recognize(key)?;
    let correct = trial.correct_response.chars().eq(std::iter::once(response));
    Some(Score {
        response,
        correct,
        reaction_time_ms: reaction_time_ms(start_ns, now_ns),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: u64 = 1_000_000;

    fn trial(correct: &str) -> Trial {
        Trial {
            image: "img.jpg".into(),
            category: "Conflitto".into(),
            correct_response: correct.into(),
            group: "images1".into(),
            block: 3,
        }
    }

    #[test]
    fn lowercase_press_matches_uppercase_answer() {
        let s = score(&ResponseKeys::default(), 'a', &trial("A"), 0, 420 * MS).unwrap();
        assert!(s.correct);
        assert_eq!(s.response, 'A');
        assert_eq!(s.reaction_time_ms, 420);
    }

    #[test]
    fn wrong_key_scores_zero() {
        let s = score(&ResponseKeys::default(), 'a', &trial("L"), 0, MS).unwrap();
        assert!(!s.correct);
    }

    #[test]
    fn unknown_key_is_not_scored() {
        assert_eq!(score(&ResponseKeys::default(), 'x', &trial("A"), 0, MS), None);
    }

    #[test]
    fn mirrored_answer_inverts_correctness() {
        let keys = ResponseKeys::default();
        for key in ['a', 'l'] {
            let plain = score(&keys, key, &trial("A"), 0, MS).unwrap();
            let mirrored = score(&keys, key, &trial(&keys.flip("A")), 0, MS).unwrap();
            assert_ne!(plain.correct, mirrored.correct);
        }
    }

    #[test]
    fn reaction_time_rounds_and_saturates() {
        assert_eq!(reaction_time_ms(0, 1_499_999), 1);
        assert_eq!(reaction_time_ms(0, 1_500_000), 2);
        assert_eq!(reaction_time_ms(10 * MS, 5 * MS), 0);
    }
}
