//! DOM key normalization.
//!
//! Browsers disagree on what a `keydown` carries: modern ones set `key`
//! (`"Escape"`), older ones only set `keyCode` (`27`), and some legacy
//! engines report `"Esc"`. [`KeyEvent::from_dom`] folds these into one
//! [`KeyCode`], preferring the logical `key` and falling back to `keyCode`.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Escape,
    Enter,
    Tab,
    Backspace,
    Char(char),
    /// Anything the widget does not react to.
    Other,
}

/// Legacy `KeyboardEvent.keyCode` values.
const KEY_CODE_BACKSPACE: u32 = 8;
const KEY_CODE_TAB: u32 = 9;
const KEY_CODE_ENTER: u32 = 13;
const KEY_CODE_ESCAPE: u32 = 27;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub code: KeyCode,
    /// Auto-repeat from a held key.
    pub repeat: bool,
}

impl KeyEvent {
    #[must_use]
    pub const fn new(code: KeyCode) -> Self {
        Self {
            code,
            repeat: false,
        }
    }

    #[must_use]
    pub const fn with_repeat(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }

    /// Normalize a DOM `keydown` from its `key` and `keyCode` fields.
    #[must_use]
    pub fn from_dom(key: &str, key_code: u32) -> Self {
        let code = parse_key(key).unwrap_or_else(|| parse_legacy_key_code(key_code));
        Self::new(code)
    }

    /// A fresh Escape press (auto-repeat excluded).
    #[must_use]
    pub const fn is_escape_press(&self) -> bool {
        matches!(self.code, KeyCode::Escape) && !self.repeat
    }
}

fn parse_key(key: &str) -> Option<KeyCode> {
    match key {
        "" | "Unidentified" => None,
        "Escape" | "Esc" => Some(KeyCode::Escape),
        "Enter" => Some(KeyCode::Enter),
        "Tab" => Some(KeyCode::Tab),
        "Backspace" => Some(KeyCode::Backspace),
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(KeyCode::Char(c)),
                _ => Some(KeyCode::Other),
            }
        }
    }
}

fn parse_legacy_key_code(key_code: u32) -> KeyCode {
    match key_code {
        KEY_CODE_ESCAPE => KeyCode::Escape,
        KEY_CODE_ENTER => KeyCode::Enter,
        KEY_CODE_TAB => KeyCode::Tab,
        KEY_CODE_BACKSPACE => KeyCode::Backspace,
        _ => KeyCode::Other,
    }
}
