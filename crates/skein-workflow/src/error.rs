use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReferenceError {
  #[error("malformed reference '{reference}': {reason}")]
  Malformed { reference: String, reason: String },
}
