use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use skein_config::ServiceConfig;

use crate::error::TransferError;

/// One transfer between two service endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
  pub source_endpoint: String,
  pub destination_endpoint: String,
  pub source_path: String,
  pub destination_path: String,
  /// Directory transfer. Cleared on the single-file retry.
  pub recursive: bool,
}

/// Status reported by a transfer service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferStatus {
  Active,
  Succeeded,
  Failed(String),
  /// A recursive transfer was pointed at a plain file.
  NotADirectory,
}

impl TransferStatus {
  pub fn is_settled(&self) -> bool {
    !matches!(self, TransferStatus::Active)
  }
}

/// Client of an asynchronous bulk transfer service (GridFTP, SkyCDS).
#[async_trait]
pub trait TransferService: Send + Sync {
  /// Submit a transfer and return its id.
  async fn submit(&self, request: &TransferRequest) -> Result<String, TransferError>;

  async fn status(&self, transfer_id: &str) -> Result<TransferStatus, TransferError>;

  async fn cancel(&self, transfer_id: &str) -> Result<(), TransferError>;
}

/// REST client for a transfer service.
///
/// - `POST {url}/transfers` with the request body, answering `{"id": ...}`
/// - `GET {url}/transfers/{id}`, answering `{"status": ..., "message": ...}`
/// - `POST {url}/transfers/{id}/cancel`
pub struct HttpTransferService {
  client: Client,
  url: String,
  token: Option<String>,
}

#[derive(Deserialize)]
struct SubmitResponse {
  id: String,
}

#[derive(Deserialize)]
struct StatusResponse {
  status: String,
  #[serde(default)]
  message: Option<String>,
}

impl HttpTransferService {
  pub fn new(config: &ServiceConfig) -> Self {
    Self {
      client: Client::new(),
      url: config.url.trim_end_matches('/').to_string(),
      token: config.token.clone(),
    }
  }

  fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
    match &self.token {
      Some(token) => request.bearer_auth(token),
      None => request,
    }
  }

  async fn check(response: Response) -> Result<Response, TransferError> {
    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TransferError::Status {
      status: status.as_u16(),
      body,
    })
  }
}

#[async_trait]
impl TransferService for HttpTransferService {
  async fn submit(&self, request: &TransferRequest) -> Result<String, TransferError> {
    let builder = self
      .client
      .post(format!("{}/transfers", self.url))
      .json(request);
    let response = Self::check(self.authorize(builder).send().await?).await?;
    let body: SubmitResponse = response.json().await?;
    Ok(body.id)
  }

  async fn status(&self, transfer_id: &str) -> Result<TransferStatus, TransferError> {
    let builder = self
      .client
      .get(format!("{}/transfers/{}", self.url, transfer_id));
    let response = Self::check(self.authorize(builder).send().await?).await?;
    let body: StatusResponse = response.json().await?;
    parse_status(&body.status, body.message)
  }

  async fn cancel(&self, transfer_id: &str) -> Result<(), TransferError> {
    let builder = self
      .client
      .post(format!("{}/transfers/{}/cancel", self.url, transfer_id));
    Self::check(self.authorize(builder).send().await?).await?;
    Ok(())
  }
}

fn parse_status(status: &str, message: Option<String>) -> Result<TransferStatus, TransferError> {
  match status.to_ascii_uppercase().as_str() {
    "ACTIVE" | "PENDING" | "QUEUED" => Ok(TransferStatus::Active),
    "SUCCEEDED" => Ok(TransferStatus::Succeeded),
    "NOT_A_DIRECTORY" => Ok(TransferStatus::NotADirectory),
    "FAILED" | "CANCELED" | "CANCELLED" => {
      Ok(TransferStatus::Failed(message.unwrap_or_else(|| status.to_string())))
    }
    other => Err(TransferError::Decode {
      message: format!("unknown transfer status '{}'", other),
    }),
  }
}
