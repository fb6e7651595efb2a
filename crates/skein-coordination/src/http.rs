use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use skein_workflow::{TaskJson, TaskStatus, WorkflowJson};
use tracing::debug;

use crate::types::RemoteTask;
use crate::{CoordinationError, Coordinator};

/// REST client for the coordination service.
///
/// | Operation | Route |
/// |---|---|
/// | create workflow | `POST /create` |
/// | add task | `POST /add_task/{id}` |
/// | update status | `PUT /changestatus/{id}/{task}/{status}` |
/// | update attribute | `PUT /update/{id}/{task}/{attribute}?value=` |
/// | add dependency | `PUT /dependency/{id}/{task}/{dependency}` |
/// | get task | `GET /task/{workflow}/{task}` |
pub struct HttpCoordinator {
  client: Client,
  base_url: String,
}

#[derive(Deserialize)]
struct CreatedResponse {
  id: u64,
}

impl HttpCoordinator {
  /// Connect to the service, failing with [`CoordinationError::Unavailable`]
  /// when nothing answers at `url`.
  pub async fn connect(url: &str) -> Result<Self, CoordinationError> {
    let coordinator = Self {
      client: Client::new(),
      base_url: url.trim_end_matches('/').to_string(),
    };

    coordinator
      .client
      .get(&coordinator.base_url)
      .send()
      .await
      .map_err(|source| CoordinationError::Unavailable {
        url: coordinator.base_url.clone(),
        source,
      })?;

    Ok(coordinator)
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.base_url, path)
  }

  async fn check(response: Response) -> Result<Response, CoordinationError> {
    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CoordinationError::Status {
      status: status.as_u16(),
      body,
    })
  }
}

#[async_trait]
impl Coordinator for HttpCoordinator {
  async fn create_workflow(&self, workflow: &WorkflowJson) -> Result<u64, CoordinationError> {
    let response = self
      .client
      .post(self.url("/create"))
      .json(workflow)
      .send()
      .await?;
    let created: CreatedResponse = Self::check(response).await?.json().await?;
    debug!(workflow = %workflow.name, id = created.id, "workflow_registered");
    Ok(created.id)
  }

  async fn add_task(&self, workflow_id: u64, task: &TaskJson) -> Result<(), CoordinationError> {
    let response = self
      .client
      .post(self.url(&format!("/add_task/{workflow_id}")))
      .json(task)
      .send()
      .await?;
    Self::check(response).await?;
    Ok(())
  }

  async fn update_task_status(
    &self,
    workflow_id: u64,
    task: &str,
    status: TaskStatus,
  ) -> Result<(), CoordinationError> {
    let response = self
      .client
      .put(self.url(&format!("/changestatus/{workflow_id}/{task}/{status}")))
      .send()
      .await?;
    Self::check(response).await?;
    Ok(())
  }

  async fn update_task(
    &self,
    workflow_id: u64,
    task: &str,
    attribute: &str,
    value: &str,
  ) -> Result<(), CoordinationError> {
    let response = self
      .client
      .put(self.url(&format!("/update/{workflow_id}/{task}/{attribute}")))
      .query(&[("value", value)])
      .send()
      .await?;
    Self::check(response).await?;
    Ok(())
  }

  async fn add_dependency(
    &self,
    workflow_id: u64,
    task: &str,
    dependency: &str,
  ) -> Result<(), CoordinationError> {
    let response = self
      .client
      .put(self.url(&format!("/dependency/{workflow_id}/{task}/{dependency}")))
      .send()
      .await?;
    Self::check(response).await?;
    Ok(())
  }

  async fn get_task(&self, workflow: &str, task: &str) -> Result<RemoteTask, CoordinationError> {
    let response = self
      .client
      .get(self.url(&format!("/task/{workflow}/{task}")))
      .send()
      .await?;
    if response.status() == StatusCode::NOT_FOUND {
      return Err(CoordinationError::NotFound {
        workflow: workflow.to_string(),
        task: task.to_string(),
      });
    }
    let mut remote: RemoteTask = Self::check(response).await?.json().await?;
    if remote.workflow.is_empty() {
      remote.workflow = workflow.to_string();
    }
    Ok(remote)
  }
}
