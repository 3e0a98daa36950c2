mod dvorak;

use evdev::KeyCode;
use serde::{Deserialize, Serialize};

/// Keyboard layout the host OS interprets our virtual keyboard with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    #[default]
    Qwerty,
    Dvorak,
}

impl Layout {
    /// Physical key that produces `key`'s US symbol under this layout.
    pub fn resolve_reverse(self, key: &KeyCode) -> KeyCode {
        match self {
            Layout::Qwerty => *key,
            Layout::Dvorak => dvorak::resolve_reverse(key),
        }
    }
}
