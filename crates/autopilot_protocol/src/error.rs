use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown status `{0}`")]
    UnknownStatus(String),
    #[error("failed to serialize protocol line: {0}")]
    Serialize(#[from] serde_json::Error),
}
