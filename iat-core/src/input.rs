/// A key press as the session sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    /// The accept key (Enter).
    Enter,
    /// A single printable character.
    Char(char),
    Other,
}

impl KeyInput {
    /// Maps a key label the way windowing toolkits report it: named keys as
    /// words (`"Enter"`), printable keys as the text they produce.
    pub fn from_label(label: &str) -> Self {
        if label == "Enter" {
            return Self::Enter;
        }
        let mut chars = label.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::Char(c),
            _ => Self::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_map_to_inputs() {
        assert_eq!(KeyInput::from_label("Enter"), KeyInput::Enter);
        assert_eq!(KeyInput::from_label("a"), KeyInput::Char('a'));
        assert_eq!(KeyInput::from_label("Shift"), KeyInput::Other);
        assert_eq!(KeyInput::from_label(""), KeyInput::Other);
    }
}
