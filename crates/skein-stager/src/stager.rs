use std::sync::Arc;
use std::time::Duration;

use skein_config::{DataMover, StagerMode, TransferConfig};
use skein_workflow::{ContextInfo, shell_quote};
use tracing::{debug, info, warn};

use crate::directive::{join_directive, render_directive};
use crate::error::{StagingError, TransferError};
use crate::select::select_mover;
use crate::transfer::{HttpTransferService, TransferRequest, TransferService, TransferStatus};

/// One end of a staging operation.
#[derive(Debug, Clone, Default)]
pub struct Site {
  /// Qualified task name, used in errors and logs.
  pub task: String,
  /// Context-probe report, absent until the probe ran (or in dry mode).
  pub info: Option<ContextInfo>,
  /// Transfer-service endpoint id of the host.
  pub endpoint: Option<String>,
}

/// Everything needed to stage a single reference.
#[derive(Debug, Clone)]
pub struct StageRequest<'a> {
  pub consumer: &'a Site,
  pub producer: &'a Site,
  /// Path of the referenced data on the producer's host.
  pub source_path: String,
  /// Path the data must appear at on the consumer's host.
  pub target_path: String,
  /// Mover used when a context report is missing.
  pub default_mover: DataMover,
}

/// What the stager decided for one reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagePlan {
  /// A launcher-script fragment, already framed for the stager mode.
  Directive { mover: DataMover, script: String },
  /// An out-of-band transfer the stager runs itself.
  Transfer { mover: DataMover, request: TransferRequest },
}

impl StagePlan {
  pub fn mover(&self) -> DataMover {
    match self {
      StagePlan::Directive { mover, .. } | StagePlan::Transfer { mover, .. } => *mover,
    }
  }
}

pub struct Stager {
  mode: StagerMode,
  gridftp: Option<Arc<dyn TransferService>>,
  skycds: Option<Arc<dyn TransferService>>,
  poll_interval: Duration,
}

impl Stager {
  pub fn new(mode: StagerMode) -> Self {
    Self {
      mode,
      gridftp: None,
      skycds: None,
      poll_interval: Duration::from_secs(1),
    }
  }

  /// Build a stager with HTTP transfer clients for every configured service.
  pub fn from_config(mode: StagerMode, config: &TransferConfig) -> Self {
    let mut stager = Self::new(mode).with_poll_interval(config.poll_interval());
    if let Some(gridftp) = &config.gridftp {
      stager = stager.with_gridftp(Arc::new(HttpTransferService::new(gridftp)));
    }
    if let Some(skycds) = &config.skycds {
      stager = stager.with_skycds(Arc::new(HttpTransferService::new(skycds)));
    }
    stager
  }

  pub fn with_gridftp(mut self, service: Arc<dyn TransferService>) -> Self {
    self.gridftp = Some(service);
    self
  }

  pub fn with_skycds(mut self, service: Arc<dyn TransferService>) -> Self {
    self.skycds = Some(service);
    self
  }

  pub fn with_poll_interval(mut self, interval: Duration) -> Self {
    self.poll_interval = interval;
    self
  }

  pub fn mode(&self) -> StagerMode {
    self.mode
  }

  /// Closing fragment for parallel directives, if the mode needs one.
  pub fn join(&self) -> Option<String> {
    join_directive(self.mode)
  }

  /// Decide how to stage one reference without moving anything.
  ///
  /// A selected mover that cannot be carried out, because the producer's
  /// host or a transfer endpoint is unknown, degrades to `LINK`.
  pub fn plan(&self, request: &StageRequest<'_>) -> StagePlan {
    let endpoints_available = request.consumer.endpoint.is_some() && request.producer.endpoint.is_some();
    let selected = select_mover(
      request.consumer.info.as_ref(),
      request.producer.info.as_ref(),
      endpoints_available,
      request.default_mover,
    );

    self.plan_with(selected, request).unwrap_or_else(|| {
      warn!(
        consumer = %request.consumer.task,
        producer = %request.producer.task,
        mover = %selected,
        "mover_unavailable_linking"
      );
      self.link(request)
    })
  }

  fn plan_with(&self, mover: DataMover, request: &StageRequest<'_>) -> Option<StagePlan> {
    let source = shell_quote(&request.source_path);
    let target = shell_quote(&request.target_path);

    let command = match mover {
      DataMover::Link => return Some(self.link(request)),
      DataMover::Copy => format!("cp -r {source} {target}"),
      DataMover::Scp => {
        let host = request.producer.info.as_ref()?;
        format!(
          "scp -o StrictHostKeyChecking=no -r {}@{}:{} {}",
          host.user, host.ip, source, target
        )
      }
      DataMover::Ftp => {
        let host = request.producer.info.as_ref()?;
        let url = format!(
          "ftp://{}@{}/{}",
          host.user,
          host.ip,
          request.source_path.trim_start_matches('/')
        );
        format!("curl -s --create-dirs -o {target} {}", shell_quote(&url))
      }
      DataMover::Gridftp | DataMover::Skycds => {
        return Some(StagePlan::Transfer {
          mover,
          request: TransferRequest {
            source_endpoint: service_endpoint(mover, request.producer)?,
            destination_endpoint: service_endpoint(mover, request.consumer)?,
            source_path: request.source_path.clone(),
            destination_path: request.target_path.clone(),
            recursive: true,
          },
        });
      }
    };

    Some(StagePlan::Directive {
      mover,
      script: render_directive(&command, self.mode),
    })
  }

  fn link(&self, request: &StageRequest<'_>) -> StagePlan {
    let command = format!(
      "ln -sfn {} {}",
      shell_quote(&request.source_path),
      shell_quote(&request.target_path)
    );
    StagePlan::Directive {
      mover: DataMover::Link,
      script: render_directive(&command, self.mode),
    }
  }

  /// Stage one reference.
  ///
  /// Returns the launcher fragment for shell movers. Out-of-band movers
  /// transfer immediately and return `None` once the service reports success.
  pub async fn stage_in(&self, request: &StageRequest<'_>) -> Result<Option<String>, StagingError> {
    match self.plan(request) {
      StagePlan::Directive { mover, script } => {
        debug!(
          consumer = %request.consumer.task,
          producer = %request.producer.task,
          mover = %mover,
          "stage_directive"
        );
        Ok(Some(script))
      }
      StagePlan::Transfer { mover, request } => {
        self.transfer(mover, request).await?;
        Ok(None)
      }
    }
  }

  /// Run an out-of-band transfer to completion.
  ///
  /// A GridFTP directory transfer that turns out to point at a file is
  /// cancelled and resubmitted once as a single-file transfer.
  pub async fn transfer(&self, mover: DataMover, mut request: TransferRequest) -> Result<(), StagingError> {
    let service = match mover {
      DataMover::Gridftp => self.gridftp.as_ref(),
      DataMover::Skycds => self.skycds.as_ref(),
      _ => None,
    }
    .ok_or(StagingError::ServiceNotConfigured { mover })?;

    let wrap = |source: TransferError| StagingError::Transfer { mover, source };
    let mut retried = false;

    loop {
      let transfer_id = service.submit(&request).await.map_err(wrap)?;
      info!(
        mover = %mover,
        transfer_id = %transfer_id,
        source = %request.source_path,
        destination = %request.destination_path,
        recursive = request.recursive,
        "transfer_submitted"
      );

      let status = self
        .await_settled(service.as_ref(), &transfer_id)
        .await
        .map_err(wrap)?;

      match status {
        TransferStatus::Succeeded => {
          info!(mover = %mover, transfer_id = %transfer_id, "transfer_succeeded");
          return Ok(());
        }
        TransferStatus::NotADirectory
          if mover == DataMover::Gridftp && request.recursive && !retried =>
        {
          warn!(mover = %mover, transfer_id = %transfer_id, "transfer_retry_as_file");
          service.cancel(&transfer_id).await.map_err(wrap)?;
          request.recursive = false;
          retried = true;
        }
        TransferStatus::NotADirectory => {
          return Err(StagingError::Failed {
            mover,
            transfer_id,
            status: "NOT_A_DIRECTORY".to_string(),
          });
        }
        TransferStatus::Failed(status) => {
          return Err(StagingError::Failed {
            mover,
            transfer_id,
            status,
          });
        }
        TransferStatus::Active => {
          return Err(StagingError::Failed {
            mover,
            transfer_id,
            status: "ACTIVE".to_string(),
          });
        }
      }
    }
  }

  async fn await_settled(
    &self,
    service: &dyn TransferService,
    transfer_id: &str,
  ) -> Result<TransferStatus, TransferError> {
    loop {
      let status = service.status(transfer_id).await?;
      if status.is_settled() {
        return Ok(status);
      }
      tokio::time::sleep(self.poll_interval).await;
    }
  }
}

/// Endpoint id a transfer service knows the site's host by.
///
/// GridFTP needs an explicit endpoint; SkyCDS falls back to the reported IP.
fn service_endpoint(mover: DataMover, site: &Site) -> Option<String> {
  match mover {
    DataMover::Skycds => site
      .endpoint
      .clone()
      .or_else(|| site.info.as_ref().map(|info| info.ip.clone())),
    _ => site.endpoint.clone(),
  }
}

#[cfg(test)]
mod tests {
  use std::collections::VecDeque;
  use std::sync::Mutex;

  use async_trait::async_trait;

  use super::*;

  fn info(ip: &str, scp: &str, gridftp: &str) -> ContextInfo {
    ContextInfo {
      machine_type: "cluster-frontend".to_string(),
      ip: ip.to_string(),
      user: "alice".to_string(),
      scp: scp.to_string(),
      ftp: "none".to_string(),
      gridftp: gridftp.to_string(),
      skycds: "none".to_string(),
    }
  }

  fn site(task: &str, info: Option<ContextInfo>, endpoint: Option<&str>) -> Site {
    Site {
      task: task.to_string(),
      info,
      endpoint: endpoint.map(str::to_string),
    }
  }

  fn request<'a>(consumer: &'a Site, producer: &'a Site, default_mover: DataMover) -> StageRequest<'a> {
    StageRequest {
      consumer,
      producer,
      source_path: "/scratch/1-A/f1".to_string(),
      target_path: "/scratch/2-B/.skein/inputs/wf/A/f1".to_string(),
      default_mover,
    }
  }

  /// Transfer service double answering from a script of statuses.
  struct ScriptedService {
    statuses: Mutex<VecDeque<TransferStatus>>,
    submitted: Mutex<Vec<TransferRequest>>,
    cancelled: Mutex<Vec<String>>,
  }

  impl ScriptedService {
    fn new(statuses: Vec<TransferStatus>) -> Arc<Self> {
      Arc::new(Self {
        statuses: Mutex::new(statuses.into()),
        submitted: Mutex::new(Vec::new()),
        cancelled: Mutex::new(Vec::new()),
      })
    }
  }

  #[async_trait]
  impl TransferService for ScriptedService {
    async fn submit(&self, request: &TransferRequest) -> Result<String, TransferError> {
      let mut submitted = self.submitted.lock().unwrap();
      submitted.push(request.clone());
      Ok(format!("t{}", submitted.len()))
    }

    async fn status(&self, _transfer_id: &str) -> Result<TransferStatus, TransferError> {
      Ok(
        self
          .statuses
          .lock()
          .unwrap()
          .pop_front()
          .unwrap_or(TransferStatus::Succeeded),
      )
    }

    async fn cancel(&self, transfer_id: &str) -> Result<(), TransferError> {
      self.cancelled.lock().unwrap().push(transfer_id.to_string());
      Ok(())
    }
  }

  #[test]
  fn test_same_host_renders_link_over_copy_default() {
    let consumer = site("wf/B", Some(info("10.0.0.1", "active", "none")), None);
    let producer = site("wf/A", Some(info("10.0.0.1", "active", "none")), None);
    let stager = Stager::new(StagerMode::Sequential);

    let plan = stager.plan(&request(&consumer, &producer, DataMover::Copy));
    assert_eq!(plan.mover(), DataMover::Link);
    let StagePlan::Directive { script, .. } = plan else {
      panic!("expected a directive");
    };
    assert!(script.starts_with("ln -sfn /scratch/1-A/f1 /scratch/2-B/.skein/inputs/wf/A/f1\n"));
  }

  #[test]
  fn test_missing_info_uses_copy_default() {
    let consumer = site("wf/B", None, None);
    let producer = site("wf/A", None, None);
    let stager = Stager::new(StagerMode::LocalParallel);

    let plan = stager.plan(&request(&consumer, &producer, DataMover::Copy));
    assert_eq!(
      plan,
      StagePlan::Directive {
        mover: DataMover::Copy,
        script: "cp -r /scratch/1-A/f1 /scratch/2-B/.skein/inputs/wf/A/f1 &\npids=\"$pids $!\"\n"
          .to_string(),
      }
    );
  }

  #[test]
  fn test_scp_pulls_from_producer_host() {
    let consumer = site("wf/B", Some(info("10.0.0.2", "none", "none")), None);
    let producer = site("wf/A", Some(info("10.0.0.1", "active", "none")), None);
    let stager = Stager::new(StagerMode::Sequential);

    let plan = stager.plan(&request(&consumer, &producer, DataMover::Link));
    let StagePlan::Directive { mover, script } = plan else {
      panic!("expected a directive");
    };
    assert_eq!(mover, DataMover::Scp);
    assert!(script.contains("scp -o StrictHostKeyChecking=no -r alice@10.0.0.1:/scratch/1-A/f1"));
  }

  #[test]
  fn test_scp_default_without_source_info_links() {
    let consumer = site("wf/B", Some(info("10.0.0.2", "none", "none")), None);
    let producer = site("wf/A", None, None);
    let stager = Stager::new(StagerMode::Sequential);

    let plan = stager.plan(&request(&consumer, &producer, DataMover::Scp));
    assert_eq!(plan.mover(), DataMover::Link);
    let StagePlan::Directive { script, .. } = plan else {
      panic!("expected a directive");
    };
    assert!(script.starts_with("ln -sfn /scratch/1-A/f1 "));
  }

  #[test]
  fn test_ftp_default_without_any_info_links() {
    let consumer = site("wf/B", None, None);
    let producer = site("wf/A", None, None);
    let stager = Stager::new(StagerMode::LocalParallel);

    let plan = stager.plan(&request(&consumer, &producer, DataMover::Ftp));
    assert_eq!(plan.mover(), DataMover::Link);
  }

  #[test]
  fn test_gridftp_default_without_endpoints_links() {
    let consumer = site("wf/B", None, Some("ep-b"));
    let producer = site("wf/A", None, None);
    let stager = Stager::new(StagerMode::Sequential);

    let plan = stager.plan(&request(&consumer, &producer, DataMover::Gridftp));
    assert_eq!(plan.mover(), DataMover::Link);
  }

  #[test]
  fn test_skycds_default_uses_endpoints_when_known() {
    let consumer = site("wf/B", None, Some("cds-b"));
    let producer = site("wf/A", None, Some("cds-a"));
    let stager = Stager::new(StagerMode::Sequential);

    let plan = stager.plan(&request(&consumer, &producer, DataMover::Skycds));
    let StagePlan::Transfer { mover, request } = plan else {
      panic!("expected a transfer");
    };
    assert_eq!(mover, DataMover::Skycds);
    assert_eq!(request.source_endpoint, "cds-a");
    assert_eq!(request.destination_endpoint, "cds-b");
  }

  #[tokio::test]
  async fn test_gridftp_transfer_polls_until_success() {
    let service = ScriptedService::new(vec![
      TransferStatus::Active,
      TransferStatus::Active,
      TransferStatus::Succeeded,
    ]);
    let stager = Stager::new(StagerMode::Sequential)
      .with_gridftp(service.clone())
      .with_poll_interval(Duration::from_millis(1));

    let consumer = site("wf/B", Some(info("10.0.0.2", "none", "none")), Some("ep-b"));
    let producer = site("wf/A", Some(info("10.0.0.1", "active", "active")), Some("ep-a"));

    let out = stager
      .stage_in(&request(&consumer, &producer, DataMover::Link))
      .await
      .unwrap();
    assert_eq!(out, None);

    let submitted = service.submitted.lock().unwrap();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].source_endpoint, "ep-a");
    assert_eq!(submitted[0].destination_endpoint, "ep-b");
    assert!(submitted[0].recursive);
  }

  #[tokio::test]
  async fn test_gridftp_not_a_directory_retries_once_as_file() {
    let service = ScriptedService::new(vec![
      TransferStatus::NotADirectory,
      TransferStatus::Succeeded,
    ]);
    let stager = Stager::new(StagerMode::Sequential)
      .with_gridftp(service.clone())
      .with_poll_interval(Duration::from_millis(1));

    let transfer = TransferRequest {
      source_endpoint: "ep-a".to_string(),
      destination_endpoint: "ep-b".to_string(),
      source_path: "/a/file".to_string(),
      destination_path: "/b/file".to_string(),
      recursive: true,
    };
    stager.transfer(DataMover::Gridftp, transfer).await.unwrap();

    let submitted = service.submitted.lock().unwrap();
    assert_eq!(submitted.len(), 2);
    assert!(!submitted[1].recursive);
    assert_eq!(*service.cancelled.lock().unwrap(), vec!["t1".to_string()]);
  }

  #[tokio::test]
  async fn test_gridftp_second_mismatch_fails() {
    let service = ScriptedService::new(vec![
      TransferStatus::NotADirectory,
      TransferStatus::NotADirectory,
    ]);
    let stager = Stager::new(StagerMode::Sequential)
      .with_gridftp(service.clone())
      .with_poll_interval(Duration::from_millis(1));

    let transfer = TransferRequest {
      source_endpoint: "ep-a".to_string(),
      destination_endpoint: "ep-b".to_string(),
      source_path: "/a".to_string(),
      destination_path: "/b".to_string(),
      recursive: true,
    };
    let err = stager.transfer(DataMover::Gridftp, transfer).await.unwrap_err();
    assert!(matches!(err, StagingError::Failed { status, .. } if status == "NOT_A_DIRECTORY"));
  }

  #[tokio::test]
  async fn test_skycds_failure_is_reported() {
    let service = ScriptedService::new(vec![
      TransferStatus::Active,
      TransferStatus::Failed("quota".to_string()),
    ]);
    let stager = Stager::new(StagerMode::Sequential)
      .with_skycds(service.clone())
      .with_poll_interval(Duration::from_millis(1));

    let consumer = site("wf/B", None, Some("cds-b"));
    let producer = site("wf/A", None, Some("cds-a"));

    let err = stager
      .stage_in(&request(&consumer, &producer, DataMover::Skycds))
      .await
      .unwrap_err();
    assert!(matches!(err, StagingError::Failed { ref status, .. } if status == "quota"));
    assert_eq!(service.submitted.lock().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn test_transfer_without_service_fails() {
    let stager = Stager::new(StagerMode::Sequential);
    let transfer = TransferRequest {
      source_endpoint: "a".to_string(),
      destination_endpoint: "b".to_string(),
      source_path: "/a".to_string(),
      destination_path: "/b".to_string(),
      recursive: true,
    };
    let err = stager.transfer(DataMover::Skycds, transfer).await.unwrap_err();
    assert!(matches!(err, StagingError::ServiceNotConfigured { .. }));
  }
}
