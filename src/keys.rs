use crate::error::ConfigError;
use evdev::KeyCode;
use std::str::FromStr;

/// Keys pressed together, then released in reverse order.
pub type Chord = Vec<KeyCode>;

/// A comma separated sequence of chords, e.g. `ctrl+c,ctrl+v`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombo(Vec<Chord>);

impl KeyCombo {
    pub fn chords(&self) -> &[Chord] {
        &self.0
    }
}

impl FromStr for KeyCombo {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chords = s
            .split(',')
            .map(|chord| {
                let mut keys = Chord::new();
                for name in chord.split('+') {
                    keys.extend(parse_key(name)?);
                }
                Ok(keys)
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(KeyCombo(chords))
    }
}

/// Resolves one key name. Shifted characters expand to `shift` plus the base key.
pub fn parse_key(name: &str) -> Result<Vec<KeyCode>, ConfigError> {
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return char_key(c)
            .map(|(key, shifted)| {
                if shifted {
                    vec![KeyCode::KEY_LEFTSHIFT, key]
                } else {
                    vec![key]
                }
            })
            .ok_or_else(|| ConfigError::UnknownKey(name.to_owned()));
    }

    let key = match name.to_ascii_lowercase().as_str() {
        "space" => KeyCode::KEY_SPACE,
        "enter" | "return" => KeyCode::KEY_ENTER,
        "tab" => KeyCode::KEY_TAB,
        "esc" | "escape" => KeyCode::KEY_ESC,
        "backspace" => KeyCode::KEY_BACKSPACE,
        "delete" => KeyCode::KEY_DELETE,
        "insert" => KeyCode::KEY_INSERT,
        "home" => KeyCode::KEY_HOME,
        "end" => KeyCode::KEY_END,
        "page_up" => KeyCode::KEY_PAGEUP,
        "page_down" => KeyCode::KEY_PAGEDOWN,
        "up" => KeyCode::KEY_UP,
        "down" => KeyCode::KEY_DOWN,
        "left" => KeyCode::KEY_LEFT,
        "right" => KeyCode::KEY_RIGHT,
        "cmd" | "command" | "super" => KeyCode::KEY_LEFTMETA,
        "ctrl" | "control" => KeyCode::KEY_LEFTCTRL,
        "alt" => KeyCode::KEY_LEFTALT,
        "shift" => KeyCode::KEY_LEFTSHIFT,
        "plus" => return Ok(vec![KeyCode::KEY_LEFTSHIFT, KeyCode::KEY_EQUAL]),
        "comma" => KeyCode::KEY_COMMA,
        "period" => KeyCode::KEY_DOT,
        "semicolon" => KeyCode::KEY_SEMICOLON,
        "apostrophe" => KeyCode::KEY_APOSTROPHE,
        "backslash" => KeyCode::KEY_BACKSLASH,
        "slash" => KeyCode::KEY_SLASH,
        "f1" => KeyCode::KEY_F1,
        "f2" => KeyCode::KEY_F2,
        "f3" => KeyCode::KEY_F3,
        "f4" => KeyCode::KEY_F4,
        "f5" => KeyCode::KEY_F5,
        "f6" => KeyCode::KEY_F6,
        "f7" => KeyCode::KEY_F7,
        "f8" => KeyCode::KEY_F8,
        "f9" => KeyCode::KEY_F9,
        "f10" => KeyCode::KEY_F10,
        "f11" => KeyCode::KEY_F11,
        "f12" => KeyCode::KEY_F12,
        _ => return Err(ConfigError::UnknownKey(name.to_owned())),
    };
    Ok(vec![key])
}

/// US layout position of a printable character and whether it needs shift.
fn char_key(c: char) -> Option<(KeyCode, bool)> {
    let lower = c.to_ascii_lowercase();
    let letter = match lower {
        'a' => Some(KeyCode::KEY_A),
        'b' => Some(KeyCode::KEY_B),
        'c' => Some(KeyCode::KEY_C),
        'd' => Some(KeyCode::KEY_D),
        'e' => Some(KeyCode::KEY_E),
        'f' => Some(KeyCode::KEY_F),
        'g' => Some(KeyCode::KEY_G),
        'h' => Some(KeyCode::KEY_H),
        'i' => Some(KeyCode::KEY_I),
        'j' => Some(KeyCode::KEY_J),
        'k' => Some(KeyCode::KEY_K),
        'l' => Some(KeyCode::KEY_L),
        'm' => Some(KeyCode::KEY_M),
        'n' => Some(KeyCode::KEY_N),
        'o' => Some(KeyCode::KEY_O),
        'p' => Some(KeyCode::KEY_P),
        'q' => Some(KeyCode::KEY_Q),
        'r' => Some(KeyCode::KEY_R),
        's' => Some(KeyCode::KEY_S),
        't' => Some(KeyCode::KEY_T),
        'u' => Some(KeyCode::KEY_U),
        'v' => Some(KeyCode::KEY_V),
        'w' => Some(KeyCode::KEY_W),
        'x' => Some(KeyCode::KEY_X),
        'y' => Some(KeyCode::KEY_Y),
        'z' => Some(KeyCode::KEY_Z),
        _ => None,
    };
    if let Some(key) = letter {
        return Some((key, c.is_ascii_uppercase()));
    }

    let plain = |key| Some((key, false));
    let shifted = |key| Some((key, true));
    match c {
        ' ' => plain(KeyCode::KEY_SPACE),
        '0' => plain(KeyCode::KEY_0),
        '1' => plain(KeyCode::KEY_1),
        '2' => plain(KeyCode::KEY_2),
        '3' => plain(KeyCode::KEY_3),
        '4' => plain(KeyCode::KEY_4),
        '5' => plain(KeyCode::KEY_5),
        '6' => plain(KeyCode::KEY_6),
        '7' => plain(KeyCode::KEY_7),
        '8' => plain(KeyCode::KEY_8),
        '9' => plain(KeyCode::KEY_9),
        '-' => plain(KeyCode::KEY_MINUS),
        '=' => plain(KeyCode::KEY_EQUAL),
        '[' => plain(KeyCode::KEY_LEFTBRACE),
        ']' => plain(KeyCode::KEY_RIGHTBRACE),
        ';' => plain(KeyCode::KEY_SEMICOLON),
        '\'' => plain(KeyCode::KEY_APOSTROPHE),
        '`' => plain(KeyCode::KEY_GRAVE),
        '\\' => plain(KeyCode::KEY_BACKSLASH),
        '.' => plain(KeyCode::KEY_DOT),
        '/' => plain(KeyCode::KEY_SLASH),
        '!' => shifted(KeyCode::KEY_1),
        '@' => shifted(KeyCode::KEY_2),
        '#' => shifted(KeyCode::KEY_3),
        '$' => shifted(KeyCode::KEY_4),
        '%' => shifted(KeyCode::KEY_5),
        '^' => shifted(KeyCode::KEY_6),
        '&' => shifted(KeyCode::KEY_7),
        '*' => shifted(KeyCode::KEY_8),
        '(' => shifted(KeyCode::KEY_9),
        ')' => shifted(KeyCode::KEY_0),
        '_' => shifted(KeyCode::KEY_MINUS),
        '{' => shifted(KeyCode::KEY_LEFTBRACE),
        '}' => shifted(KeyCode::KEY_RIGHTBRACE),
        ':' => shifted(KeyCode::KEY_SEMICOLON),
        '"' => shifted(KeyCode::KEY_APOSTROPHE),
        '~' => shifted(KeyCode::KEY_GRAVE),
        '|' => shifted(KeyCode::KEY_BACKSLASH),
        '<' => shifted(KeyCode::KEY_COMMA),
        '>' => shifted(KeyCode::KEY_DOT),
        '?' => shifted(KeyCode::KEY_SLASH),
        _ => None,
    }
}
