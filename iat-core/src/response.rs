use serde::{Deserialize, Serialize};

/// The two response symbols of the task, stored uppercased.
///
/// The left key answers the categories listed on the left of the label,
/// the right key the ones on the right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseKeys {
    pub left: char,
    pub right: char,
}

impl Default for ResponseKeys {
    fn default() -> Self {
        Self {
            left: 'A',
            right: 'L',
        }
    }
}

impl ResponseKeys {
    /// Maps a typed character to its response symbol, case-insensitively.
    pub fn recognize(&self, key: char) -> Option<char> {
        let upper = key.to_ascii_uppercase();
        (upper == self.left.to_ascii_uppercase() || upper == self.right.to_ascii_uppercase())
            .then_some(upper)
    }

    /// Swaps the two symbols; any other value is returned unchanged.
    pub fn flip(&self, symbol: &str) -> String {
        let left = self.left.to_ascii_uppercase().to_string();
        let right = self.right.to_ascii_uppercase().to_string();
        if symbol == left {
            right
        } else if symbol == right {
            left
        } else {
            symbol.to_string()
        }
    }

    pub fn are_distinct(&self) -> bool {
        self.left.to_ascii_uppercase() != self.right.to_ascii_uppercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_both_cases() {
        let keys = ResponseKeys::default();
        assert_eq!(keys.recognize('a'), Some('A'));
        assert_eq!(keys.recognize('A'), Some('A'));
        assert_eq!(keys.recognize('l'), Some('L'));
    }

    #[test]
    fn ignores_other_keys() {
        let keys = ResponseKeys::default();
        assert_eq!(keys.recognize('b'), None);
        assert_eq!(keys.recognize(' '), None);
        assert_eq!(keys.recognize('1'), None);
    }

    #[test]
    fn flip_swaps_only_known_symbols() {
        let keys = ResponseKeys::default();
        assert_eq!(keys.flip("A"), "L");
        assert_eq!(keys.flip("L"), "A");
        assert_eq!(keys.flip("X"), "X");
        assert_eq!(keys.flip(""), "");
    }
}
