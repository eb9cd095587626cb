//! Dial sequence validation.
//!
//! The sequence is spliced into `ATDT<sequence>;`, so anything other than
//! digits and the `,` pause directive could smuggle extra modem commands.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A non-empty string of DTMF digits and `,` pauses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialSequence(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidDialSequence {
    #[error("dial sequence must not be empty")]
    Empty,

    #[error("character {character:?} at position {position} is not a digit or ','")]
    InvalidCharacter { character: char, position: usize },
}

impl DialSequence {
    /// The validated sequence.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for DialSequence {
    type Err = InvalidDialSequence;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(InvalidDialSequence::Empty);
        }
        if let Some((position, character)) = s
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_digit() || *c == ','))
        {
            return Err(InvalidDialSequence::InvalidCharacter {
                character,
                position,
            });
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for DialSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
