use serde::Deserialize;
use std::fmt;

/// The format of the payload carried inside the message envelope.
///
/// Any string deserializes into a `Format`: `json` and `csv` (case-insensitive) map onto the
/// supported variants, everything else is kept as [`Format::Unsupported`] and rejected when a
/// message is decoded (see [`DecodeError::UnsupportedFormat`]).
///
/// [`DecodeError::UnsupportedFormat`]: crate::decoding::DecodeError::UnsupportedFormat
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum Format {
    #[default]
    Json,
    Csv,
    Unsupported(String),
}

impl Format {
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }
}

impl From<&str> for Format {
    fn from(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "csv" => Self::Csv,
            _ => Self::Unsupported(value.to_owned()),
        }
    }
}

impl From<String> for Format {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
            Self::Unsupported(other) => write!(f, "{other}"),
        }
    }
}
