/// Failure to turn a raw message body into a [`DecodedMessage`](super::DecodedMessage).
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    /// The body is not a JSON envelope with a string `Message` field.
    #[error("The message body is not a valid envelope.")]
    Envelope(#[source] serde_json::Error),
    /// The envelope's `Message` is not valid JSON.
    #[error("The message payload is not valid JSON.")]
    Json(#[source] serde_json::Error),
    /// The envelope's `Message` is not valid CSV.
    #[error("The message payload is not valid CSV.")]
    Csv(#[source] csv::Error),
    /// A JSON payload (or one of its elements, if it is an array) is not an object.
    #[error(
        "Expected a JSON object{}, found a {found}.",
        .index.map(|i| format!(" at index {i}")).unwrap_or_default()
    )]
    NotARecord {
        index: Option<usize>,
        found: &'static str,
    },
    /// A CSV header row names the same column twice.
    #[error("The CSV header `{0}` appears more than once.")]
    DuplicateHeader(String),
    #[error("Unknown format `{0}`. Valid formats: csv, json.")]
    UnsupportedFormat(String),
}
