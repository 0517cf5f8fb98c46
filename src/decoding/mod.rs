//! Decoding of raw message bodies.
//!
//! Message bodies are always a JSON envelope, `{"Message": "<payload>"}`, as produced by a
//! notification service fanning out to a queue. The payload is itself a string, in the
//! [`Format`] the poller is configured with:
//!
//! - [`Format::Json`]: an object decodes into one [`Record`], an array of objects into a
//!   sequence of records;
//! - [`Format::Csv`]: text with a header row decodes into one record per data row, always as a
//!   sequence. Fields are strings, keyed by header.
//!
//! ```rust
//! use queue_poller::decoding::{decode, Envelope, Format};
//!
//! let body = Envelope::new(r#"{"id":42}"#).to_body();
//! let message = decode(&body, &Format::Json).unwrap();
//! assert_eq!(message.records()[0].get("id").unwrap().as_i64(), Some(42));
//! ```
mod error;
mod format;
mod value;

pub use error::DecodeError;
pub use format::Format;
pub use value::{AccessError, Record, Scalar, Value};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The outer wrapper around every message payload.
///
/// Other envelope fields (topic, timestamps, signatures, ...) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "Message")]
    pub message: String,
}

impl Envelope {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Serialize the envelope into a message body.
    pub fn to_body(&self) -> String {
        serde_json::json!({ "Message": self.message }).to_string()
    }
}

/// A decoded message payload: either one record or a sequence of records.
///
/// Handlers get to decide how to interpret either shape; [`DecodedMessage::records`] offers a
/// uniform view over both.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DecodedMessage {
    Record(Record),
    Records(Vec<Record>),
}

impl DecodedMessage {
    /// All records in the message, in payload order.
    pub fn records(&self) -> &[Record] {
        match self {
            Self::Record(record) => std::slice::from_ref(record),
            Self::Records(records) => records,
        }
    }

    pub fn into_records(self) -> Vec<Record> {
        match self {
            Self::Record(record) => vec![record],
            Self::Records(records) => records,
        }
    }

    /// Returns the record if the payload was a single object.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(record) => Some(record),
            Self::Records(_) => None,
        }
    }
}

/// Decode a raw message body according to `format`.
///
/// The envelope is always parsed as JSON; `format` only governs its `Message` payload.
pub fn decode(raw_body: &str, format: &Format) -> Result<DecodedMessage, DecodeError> {
    let envelope: Envelope = serde_json::from_str(raw_body).map_err(DecodeError::Envelope)?;
    match format {
        Format::Json => decode_json(&envelope.message),
        Format::Csv => decode_csv(&envelope.message),
        Format::Unsupported(other) => Err(DecodeError::UnsupportedFormat(other.clone())),
    }
}

fn decode_json(payload: &str) -> Result<DecodedMessage, DecodeError> {
    let parsed: serde_json::Value = serde_json::from_str(payload).map_err(DecodeError::Json)?;
    match parsed {
        serde_json::Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| into_record(item, Some(index)))
            .collect::<Result<Vec<_>, _>>()
            .map(DecodedMessage::Records),
        other => into_record(other, None).map(DecodedMessage::Record),
    }
}

fn into_record(value: serde_json::Value, index: Option<usize>) -> Result<Record, DecodeError> {
    match Value::from(value) {
        Value::Mapping(record) => Ok(record),
        other => Err(DecodeError::NotARecord {
            index,
            found: other.kind(),
        }),
    }
}

fn decode_csv(payload: &str) -> Result<DecodedMessage, DecodeError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(payload.as_bytes());
    let headers = reader.headers().map_err(DecodeError::Csv)?.clone();
    let mut seen = HashSet::new();
    if let Some(duplicate) = headers.iter().find(|header| !seen.insert(*header)) {
        return Err(DecodeError::DuplicateHeader(duplicate.to_owned()));
    }

    reader
        .records()
        .map(|row| {
            let row = row.map_err(DecodeError::Csv)?;
            Ok(headers
                .iter()
                .zip(row.iter())
                .map(|(header, field)| (header.to_owned(), Value::from(field)))
                .collect())
        })
        .collect::<Result<Vec<Record>, DecodeError>>()
        .map(DecodedMessage::Records)
}
