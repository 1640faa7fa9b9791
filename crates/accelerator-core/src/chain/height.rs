//! Block height of the upstream chain.
//!
//! Tendermint reports heights as decimal strings (`"last_height": "12345"`) so that
//! JavaScript clients do not lose precision. The value is kept as an arbitrary
//! precision integer and never narrowed to a machine word.

use bigdecimal::num_bigint::BigInt;
use std::{cmp::Ordering, fmt, str::FromStr};
use thiserror::Error;

/// Errors produced when decoding a height string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeightParseError {
    #[error("height string is empty")]
    Empty,

    #[error("height contains a non-digit character: {0:?}")]
    InvalidDigit(char),

    #[error("height could not be parsed: {0}")]
    Malformed(String),
}

/// Last confirmed block height of the upstream chain.
///
/// `Unknown` is the state at startup and after any failed height fetch. Every
/// access site has to handle it explicitly; there is no "zero means unknown".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Height {
    #[default]
    Unknown,
    Known(BigInt),
}

/// Outcome of feeding a new observation into the current height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeightTransition {
    /// Height went from `Unknown` to a concrete value.
    Established,
    /// Height moved to a strictly greater value.
    Advanced,
    /// Observation was less than or equal to the current height.
    Unchanged,
    /// Height was known and is now `Unknown`.
    Lost,
    /// Height was already `Unknown` and stays that way.
    StillUnknown,
}

impl HeightTransition {
    /// Returns `true` when the transition invalidates every cached entry.
    #[must_use]
    pub fn clears_cache(self) -> bool {
        matches!(self, Self::Established | Self::Advanced | Self::Lost | Self::StillUnknown)
    }
}

impl Height {
    /// Creates a known height from any integer convertible into [`BigInt`].
    #[must_use]
    pub fn known(value: impl Into<BigInt>) -> Self {
        Self::Known(value.into())
    }

    #[must_use]
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// Computes how `next` relates to `self` without mutating anything.
    ///
    /// A failure to observe the height is modelled as `next == Unknown`.
    #[must_use]
    pub fn transition_to(&self, next: &Height) -> HeightTransition {
        match (self, next) {
            (Self::Unknown, Self::Unknown) => HeightTransition::StillUnknown,
            (Self::Known(_), Self::Unknown) => HeightTransition::Lost,
            (Self::Unknown, Self::Known(_)) => HeightTransition::Established,
            (Self::Known(current), Self::Known(observed)) => match observed.cmp(current) {
                Ordering::Greater => HeightTransition::Advanced,
                Ordering::Less | Ordering::Equal => HeightTransition::Unchanged,
            },
        }
    }
}

impl FromStr for Height {
    type Err = HeightParseError;

    /// Parses a non-negative decimal height. Signs and whitespace are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(HeightParseError::Empty);
        }
        if let Some(c) = s.chars().find(|c| !c.is_ascii_digit()) {
            return Err(HeightParseError::InvalidDigit(c));
        }

        s.parse::<BigInt>()
            .map(Self::Known)
            .map_err(|e| HeightParseError::Malformed(e.to_string()))
    }
}

impl fmt::Display for Height {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("unknown"),
            Self::Known(value) => write!(f, "{value}"),
        }
    }
}
