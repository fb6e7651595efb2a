use skein_config::DataMover;
use thiserror::Error;

/// Errors raised while moving a dependency's output into place.
#[derive(Debug, Error)]
pub enum StagingError {
  /// An out-of-band mover was selected but no service is configured for it.
  #[error("{mover} selected but no transfer service is configured")]
  ServiceNotConfigured { mover: DataMover },

  /// The transfer service could not be reached or answered badly.
  #[error("{mover} transfer failed: {source}")]
  Transfer {
    mover: DataMover,
    #[source]
    source: TransferError,
  },

  /// The transfer service reported the transfer as failed.
  #[error("{mover} transfer {transfer_id} ended with status {status}")]
  Failed {
    mover: DataMover,
    transfer_id: String,
    status: String,
  },
}

/// Errors from a transfer service client.
#[derive(Debug, Error)]
pub enum TransferError {
  #[error("http request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("transfer service returned {status}: {body}")]
  Status { status: u16, body: String },

  #[error("invalid transfer service response: {message}")]
  Decode { message: String },
}
