use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use skein_config::{EngineConfig, WorkflowDef};
use skein_runtime::{MetaWorkflow, Registry, RunSummary, Workflow, connect_coordinator};
use skein_workflow::WorkflowJson;

/// Skein - A DAG workflow engine for shell tasks across hosts
#[derive(Parser)]
#[command(name = "skein")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the engine configuration (TOML)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run one workflow, or several composed into a meta-workflow
  Run {
    /// Workflow definition files (JSON)
    #[arg(required = true)]
    workflow_files: Vec<PathBuf>,

    /// Build the graph and materialize scripts without executing anything
    #[arg(long)]
    dry: bool,

    /// Name of the meta-workflow when several files are given
    #[arg(long, default_value = "meta")]
    name: String,
  },

  /// Print the dependency graph as JSON without running
  Graph {
    #[arg(required = true)]
    workflow_files: Vec<PathBuf>,

    #[arg(long, default_value = "meta")]
    name: String,
  },

  /// Check the dependency graph for cycles
  Validate {
    #[arg(required = true)]
    workflow_files: Vec<PathBuf>,

    #[arg(long, default_value = "meta")]
    name: String,
  },
}

/// A single workflow or a composition of several.
enum Target {
  Single(Workflow),
  Meta(MetaWorkflow),
}

impl Target {
  async fn load(files: &[PathBuf], name: &str, config: &EngineConfig) -> Result<Self> {
    let defs = files
      .iter()
      .map(|path| load_def(path))
      .collect::<Result<Vec<_>>>()?;

    if let [def] = defs.as_slice() {
      let workflow = Workflow::from_def(def, config, Registry::new())
        .await
        .with_context(|| format!("failed to build workflow '{}'", def.name))?;
      return Ok(Target::Single(workflow));
    }

    let coordinator = match connect_coordinator(config).await {
      Ok(coordinator) => coordinator,
      Err(e) => {
        tracing::warn!(error = %e, "coordination_disabled");
        None
      }
    };

    let mut meta = MetaWorkflow::new(name);
    for def in &defs {
      let workflow = Workflow::from_def_with(def, config, meta.registry().clone(), coordinator.clone())
        .with_context(|| format!("failed to build workflow '{}'", def.name))?;
      meta.add_workflow(workflow)?;
    }
    Ok(Target::Meta(meta))
  }

  async fn make_dependencies(&self) -> Result<()> {
    match self {
      Target::Single(workflow) => workflow.make_dependencies().await,
      Target::Meta(meta) => meta.make_dependencies().await,
    }
    .context("failed to resolve dependencies")
  }

  fn validate(&self) -> Result<()> {
    match self {
      Target::Single(workflow) => workflow.validate(),
      Target::Meta(meta) => meta.validate().map(|_| ()),
    }
    .context("validation failed")
  }

  async fn run(&self) -> Result<RunSummary> {
    match self {
      Target::Single(workflow) => workflow.run().await,
      Target::Meta(meta) => meta.run().await,
    }
    .context("workflow run failed")
  }

  fn set_dry(&self) {
    match self {
      Target::Single(workflow) => workflow.set_dry(true),
      Target::Meta(meta) => meta.set_dry(true),
    }
  }

  fn to_json(&self) -> WorkflowJson {
    match self {
      Target::Single(workflow) => workflow.to_json(),
      Target::Meta(meta) => meta.to_json(),
    }
  }
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let config = match &cli.config {
    Some(path) => EngineConfig::load(path).context("failed to load engine configuration")?,
    None => EngineConfig::default(),
  };

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.filter)))
    .with_target(false)
    .with_writer(std::io::stderr)
    .init();

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async { execute(cli.command, config).await })
}

async fn execute(command: Commands, config: EngineConfig) -> Result<()> {
  match command {
    Commands::Run {
      workflow_files,
      dry,
      name,
    } => {
      let target = Target::load(&workflow_files, &name, &config).await?;
      if dry {
        target.set_dry();
      }

      let summary = target.run().await?;
      print_json(&target.to_json())?;

      eprintln!(
        "Finished: {}, failed: {}",
        summary.finished.len(),
        summary.failed.len()
      );
      if !summary.is_success() {
        bail!("{} task(s) failed: {}", summary.failed.len(), summary.failed.join(", "));
      }
    }
    Commands::Graph {
      workflow_files,
      name,
    } => {
      let target = Target::load(&workflow_files, &name, &config).await?;
      target.make_dependencies().await?;
      print_json(&target.to_json())?;
    }
    Commands::Validate {
      workflow_files,
      name,
    } => {
      let target = Target::load(&workflow_files, &name, &config).await?;
      target.make_dependencies().await?;
      target.validate()?;
      eprintln!("No dependency cycles found");
    }
  }

  Ok(())
}

fn load_def(path: &Path) -> Result<WorkflowDef> {
  let def = WorkflowDef::from_file(path).with_context(|| format!("failed to load workflow file: {}", path.display()))?;
  eprintln!("Loaded workflow: {} ({} tasks)", def.name, def.tasks.len());
  Ok(def)
}

fn print_json(json: &WorkflowJson) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(json)?);
  Ok(())
}
