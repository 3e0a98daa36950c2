use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const WIDTH: usize = 5;
const ONES: [char; 2] = ['●', 'x'];
const ZEROS: [char; 3] = ['○', 'o', '-'];

/// Which fingers were down together, one bit per finger (thumb is bit 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawTapCode", into = "RawTapCode")]
pub struct TapCode(u8);

impl TapCode {
    pub const MAX: u8 = 31;

    pub fn new(value: u8) -> Option<Self> {
        (value <= Self::MAX).then_some(Self(value))
    }

    /// Keeps the low five bits of `bits`.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::MAX)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Renders the code as filled/empty circles, thumb first.
    pub fn pattern(self) -> String {
        (0..WIDTH)
            .map(|bit| if (self.0 >> bit) & 1 == 1 { '●' } else { '○' })
            .collect()
    }
}

impl fmt::Display for TapCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.pattern())
    }
}

impl FromStr for TapCode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ConfigError::MalformedTapCode(s.to_owned());

        if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
            return s
                .parse::<u8>()
                .ok()
                .and_then(TapCode::new)
                .ok_or_else(malformed);
        }

        if s.chars().count() != WIDTH {
            return Err(malformed());
        }

        let mut value = 0u8;
        for (bit, c) in s.chars().enumerate() {
            if ONES.contains(&c) {
                value |= 1 << bit;
            } else if !ZEROS.contains(&c) {
                return Err(malformed());
            }
        }
        Ok(TapCode(value))
    }
}

/// What a tap code looks like in a config file before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTapCode {
    Number(u64),
    Text(String),
}

impl TryFrom<RawTapCode> for TapCode {
    type Error = ConfigError;

    fn try_from(raw: RawTapCode) -> Result<Self, Self::Error> {
        match raw {
            RawTapCode::Number(n) => u8::try_from(n)
                .ok()
                .and_then(TapCode::new)
                .ok_or_else(|| ConfigError::MalformedTapCode(n.to_string())),
            RawTapCode::Text(text) => text.parse(),
        }
    }
}

impl From<TapCode> for RawTapCode {
    fn from(code: TapCode) -> Self {
        RawTapCode::Number(code.0 as u64)
    }
}
