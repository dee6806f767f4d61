/// Key as reported by a source, before normalization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RawKey {
    Char(char),
    Space,
    Escape,
    Other,
}

/// Normalized command key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyEvent {
    /// Printable character, lowercased.
    Char(char),
    Space,
    Quit,
}

impl KeyEvent {
    /// `None` for keys that carry no command.
    pub fn normalize(raw: RawKey) -> Option<Self> {
        match raw {
            RawKey::Char(' ') | RawKey::Space => Some(KeyEvent::Space),
            RawKey::Char('\u{1b}') | RawKey::Escape => Some(KeyEvent::Quit),
            RawKey::Char(c) if !c.is_control() => {
                Some(KeyEvent::Char(c.to_lowercase().next().unwrap_or(c)))
            }
            RawKey::Char(_) | RawKey::Other => None,
        }
    }

    pub fn is_grab(self) -> bool {
        matches!(self, KeyEvent::Char('g') | KeyEvent::Space)
    }

    pub fn is_quit(self) -> bool {
        matches!(self, KeyEvent::Char('q') | KeyEvent::Quit)
    }
}
