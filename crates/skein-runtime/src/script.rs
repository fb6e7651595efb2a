//! Launcher script assembly.
//!
//! A pure string transform: given the staging fragments decided for each
//! distinct reference and the staged path of every reference occurrence, it
//! produces the same script every time.

use std::path::{Path, PathBuf};

use skein_executor::CONTROL_DIR;
use skein_workflow::{Reference, quote_path, rewrite_references};

const GUARD: &str = "if [ $? -ne 0 ]; then code=1; fi\n";

/// Staging for one distinct reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageBlock {
  /// Directory created before the data is moved in.
  pub directory: PathBuf,
  /// Launcher fragment, `None` when the data was already transferred.
  pub fragment: Option<String>,
}

/// Inputs to [`launcher_script`].
#[derive(Debug, Clone)]
pub struct LauncherParts<'a> {
  pub working_dir: &'a Path,
  pub command: &'a str,
  /// Every reference occurrence in `command`, in order.
  pub references: &'a [Reference],
  /// Staged path of each entry of `references`.
  pub targets: &'a [PathBuf],
  pub blocks: &'a [StageBlock],
  /// Closing fragment for parallel staging.
  pub join: Option<&'a str>,
}

/// Rewrite every reference in `command` to its staged path.
pub fn rewrite_command(command: &str, references: &[Reference], targets: &[PathBuf]) -> String {
  let mut targets = targets.iter();
  rewrite_references(command, references, |_| {
    targets
      .next()
      .map(|target| target.display().to_string())
      .unwrap_or_default()
  })
}

/// Where the inputs of `<workflow>/<task>` are staged inside a working directory.
pub fn input_dir(working_dir: &Path, workflow: &str, task: &str) -> PathBuf {
  working_dir
    .join(CONTROL_DIR)
    .join("inputs")
    .join(workflow)
    .join(task)
}

pub fn launcher_script(parts: &LauncherParts<'_>) -> String {
  let wd = quote_path(parts.working_dir);
  let stdout = quote_path(&parts.working_dir.join(CONTROL_DIR).join("stdout.txt"));

  let mut script = String::new();
  script.push_str("#!/bin/bash\n");
  script.push_str("# skein launcher script\n\n");
  script.push_str("set -o pipefail\n");
  script.push_str("code=0\n\n");

  script.push_str("# Change to the working directory\n");
  script.push_str(&format!("cd {wd}\n"));
  script.push_str(GUARD);

  if !parts.blocks.is_empty() {
    script.push_str("\n# Stage in\n");
    for block in parts.blocks {
      script.push_str(&format!("mkdir -p {}\n", quote_path(&block.directory)));
      script.push_str(GUARD);
      if let Some(fragment) = &block.fragment {
        script.push_str(fragment);
      }
    }
    if let Some(join) = parts.join {
      script.push_str(join);
    }
  }

  let body = rewrite_command(parts.command, parts.references, parts.targets);
  script.push_str("\n# Invoke the command\n");
  script.push_str("if [ $code -eq 0 ]; then\n");
  script.push_str(&format!("  ( {body}\n  ) | tee {stdout}\n"));
  script.push_str("  if [ $? -ne 0 ]; then code=1; fi\n");
  script.push_str("fi\n\n");
  script.push_str("exit $code\n");
  script
}

#[cfg(test)]
mod tests {
  use skein_workflow::parse_references;

  use super::*;

  #[test]
  fn test_script_without_references() {
    let parts = LauncherParts {
      working_dir: Path::new("/scratch/1-A"),
      command: "echo hi > f1",
      references: &[],
      targets: &[],
      blocks: &[],
      join: None,
    };
    let script = launcher_script(&parts);
    assert!(script.starts_with("#!/bin/bash\n"));
    assert!(script.contains("cd /scratch/1-A\nif [ $? -ne 0 ]; then code=1; fi\n"));
    assert!(script.contains("( echo hi > f1\n  ) | tee /scratch/1-A/.skein/stdout.txt"));
    assert!(script.ends_with("exit $code\n"));
    assert!(!script.contains("# Stage in"));
  }

  #[test]
  fn test_references_are_rewritten_and_staged() {
    let command = "cat workflow:///A/f1 workflow:///A/f1 > f2";
    let references = parse_references(command).unwrap();
    let target = PathBuf::from("/scratch/2-B/.skein/inputs/wf/A/f1");
    let targets = vec![target.clone(), target];
    let blocks = vec![StageBlock {
      directory: PathBuf::from("/scratch/2-B/.skein/inputs/wf/A"),
      fragment: Some("ln -sfn /scratch/1-A/f1 /scratch/2-B/.skein/inputs/wf/A/f1\n".to_string()),
    }];

    let parts = LauncherParts {
      working_dir: Path::new("/scratch/2-B"),
      command,
      references: &references,
      targets: &targets,
      blocks: &blocks,
      join: None,
    };
    let script = launcher_script(&parts);

    assert!(!script.contains("workflow://"));
    assert_eq!(script.matches("mkdir -p").count(), 1);
    assert!(script.contains(
      "cat /scratch/2-B/.skein/inputs/wf/A/f1 /scratch/2-B/.skein/inputs/wf/A/f1 > f2"
    ));
    assert_eq!(launcher_script(&parts), script);
  }

  #[test]
  fn test_join_follows_stage_blocks() {
    let blocks = vec![StageBlock {
      directory: PathBuf::from("/w/.skein/inputs/wf/A"),
      fragment: Some("cp -r /a /w/.skein/inputs/wf/A &\npids=\"$pids $!\"\n".to_string()),
    }];
    let parts = LauncherParts {
      working_dir: Path::new("/w"),
      command: "true",
      references: &[],
      targets: &[],
      blocks: &blocks,
      join: Some("for pid in $pids; do\n  wait $pid || code=1\ndone\n"),
    };
    let script = launcher_script(&parts);
    let copy = script.find("cp -r").unwrap();
    let wait = script.find("wait $pid").unwrap();
    let invoke = script.find("# Invoke").unwrap();
    assert!(copy < wait && wait < invoke);
  }

  #[test]
  fn test_input_dir() {
    assert_eq!(
      input_dir(Path::new("/w"), "wf", "A"),
      PathBuf::from("/w/.skein/inputs/wf/A")
    );
  }
}
