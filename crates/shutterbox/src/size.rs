//! The optional size segment of an image request.

use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use thiserror::Error;

/// Token meaning "serve the stored bytes as they are".
pub const ORIGINAL: &str = "original";

/// Requested rendition of a stored image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeSpec {
    /// Stored bytes, unmodified.
    Original,
    /// Scaled to fit inside the box, aspect ratio preserved, never enlarged.
    Bounded {
        width: NonZeroU32,
        height: NonZeroU32,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SizeSpecError {
    #[error("size must be \"original\" or WIDTHxHEIGHT, got {0:?}")]
    Format(String),

    #[error("size dimensions must be positive, got {0:?}")]
    Zero(String),
}

impl SizeSpec {
    /// Parse the optional path segment. A missing segment means [`SizeSpec::Original`].
    pub fn from_token(token: Option<&str>) -> Result<Self, SizeSpecError> {
        match token {
            None => Ok(Self::Original),
            Some(token) => token.parse(),
        }
    }
}

fn parse_dimension(digits: &str, token: &str) -> Result<NonZeroU32, SizeSpecError> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SizeSpecError::Format(token.to_string()));
    }
    let value: u32 = digits
        .parse()
        .map_err(|_| SizeSpecError::Format(token.to_string()))?;
    NonZeroU32::new(value).ok_or_else(|| SizeSpecError::Zero(token.to_string()))
}

impl FromStr for SizeSpec {
    type Err = SizeSpecError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        if token.is_empty() || token == ORIGINAL {
            return Ok(Self::Original);
        }

        let (width, height) = token
            .split_once('x')
            .ok_or_else(|| SizeSpecError::Format(token.to_string()))?;

        Ok(Self::Bounded {
            width: parse_dimension(width, token)?,
            height: parse_dimension(height, token)?,
        })
    }
}

impl fmt::Display for SizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Original => f.write_str(ORIGINAL),
            Self::Bounded { width, height } => write!(f, "{width}x{height}"),
        }
    }
}
