mod common;

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::{RecordingExecutor, local_context, task};
use skein_config::StagerMode;
use skein_runtime::Workflow;
use skein_stager::{Stager, TransferError, TransferRequest, TransferService, TransferStatus};
use skein_workflow::{ContextInfo, TaskStatus};

/// Producer host: GridFTP enabled, different address from the consumer.
fn gridftp_host() -> ContextInfo {
  ContextInfo {
    ip: "192.0.2.30".to_string(),
    gridftp: "active".to_string(),
    ..local_context()
  }
}

/// Transfer service double. Stays `ACTIVE` for a few polls, then settles
/// with `outcome`; a successful transfer copies the file on the way.
struct LocalTransferService {
  active_polls: Mutex<usize>,
  outcome: TransferStatus,
  submitted: Mutex<Vec<TransferRequest>>,
  polls: Mutex<usize>,
}

impl LocalTransferService {
  fn new(active_polls: usize, outcome: TransferStatus) -> Arc<Self> {
    Arc::new(Self {
      active_polls: Mutex::new(active_polls),
      outcome,
      submitted: Mutex::new(Vec::new()),
      polls: Mutex::new(0),
    })
  }
}

#[async_trait]
impl TransferService for LocalTransferService {
  async fn submit(&self, request: &TransferRequest) -> Result<String, TransferError> {
    let mut submitted = self.submitted.lock().unwrap();
    submitted.push(request.clone());
    Ok(format!("t{}", submitted.len()))
  }

  async fn status(&self, _transfer_id: &str) -> Result<TransferStatus, TransferError> {
    *self.polls.lock().unwrap() += 1;
    {
      let mut active = self.active_polls.lock().unwrap();
      if *active > 0 {
        *active -= 1;
        return Ok(TransferStatus::Active);
      }
    }

    if self.outcome == TransferStatus::Succeeded {
      let request = self.submitted.lock().unwrap().last().cloned().unwrap();
      let destination = Path::new(&request.destination_path);
      fs::create_dir_all(destination.parent().unwrap()).unwrap();
      fs::copy(&request.source_path, destination).unwrap();
    }
    Ok(self.outcome.clone())
  }

  async fn cancel(&self, _transfer_id: &str) -> Result<(), TransferError> {
    Ok(())
  }
}

fn gridftp_workflow(base: &Path, service: Arc<LocalTransferService>) -> Workflow {
  let stager = Stager::new(StagerMode::Sequential)
    .with_gridftp(service)
    .with_poll_interval(Duration::from_millis(5));
  Workflow::builder("wf")
    .stager(stager)
    .scratch_dir_base(base)
    .build()
    .unwrap()
}

#[tokio::test]
async fn test_gridftp_transfer_completes_before_launcher_runs() {
  let base = tempfile::tempdir().unwrap();
  let service = LocalTransferService::new(3, TransferStatus::Succeeded);
  let a_exec = RecordingExecutor::with_context(gridftp_host());
  let b_exec = RecordingExecutor::new();

  let mut workflow = gridftp_workflow(base.path(), Arc::clone(&service));
  let a = workflow
    .add_task(task("A", "echo remote > f1", &a_exec).with_endpoint("ep-a"))
    .unwrap();
  let b = workflow
    .add_task(task("B", "cat workflow:///A/f1 > f2", &b_exec).with_endpoint("ep-b"))
    .unwrap();

  let summary = workflow.run().await.unwrap();
  assert!(summary.is_success(), "{summary:?}");

  let submitted = service.submitted.lock().unwrap().clone();
  assert_eq!(submitted.len(), 1);
  assert_eq!(submitted[0].source_endpoint, "ep-a");
  assert_eq!(submitted[0].destination_endpoint, "ep-b");
  assert!(submitted[0].source_path.ends_with("/f1"));
  assert_eq!(*service.polls.lock().unwrap(), 4);

  // The data was in place when the launcher ran; no shell mover was emitted.
  let b_dir = b.working_dir().unwrap();
  assert_eq!(fs::read_to_string(b_dir.join("f2")).unwrap(), "remote\n");
  let script = b.last_script().unwrap();
  assert!(!script.contains("ln -sfn"));
  assert!(!script.contains("scp "));
  assert_eq!(a.reference_count(), 0);
}

#[tokio::test]
async fn test_failed_transfer_fails_consumer_without_running_it() {
  let base = tempfile::tempdir().unwrap();
  let service = LocalTransferService::new(1, TransferStatus::Failed("PERMISSION_DENIED".to_string()));
  let a_exec = RecordingExecutor::with_context(gridftp_host());
  let b_exec = RecordingExecutor::new();

  let mut workflow = gridftp_workflow(base.path(), Arc::clone(&service));
  workflow
    .add_task(task("A", "echo remote > f1", &a_exec).with_endpoint("ep-a"))
    .unwrap();
  let b = workflow
    .add_task(task("B", "cat workflow:///A/f1 > f2", &b_exec).with_endpoint("ep-b"))
    .unwrap();

  let summary = workflow.run().await.unwrap();
  assert_eq!(summary.failed, vec!["wf/B"]);
  assert_eq!(b.status(), TaskStatus::Failed);
  assert!(b.last_error().unwrap().contains("PERMISSION_DENIED"));
  assert_eq!(b_exec.launcher_runs(), 0);
}
