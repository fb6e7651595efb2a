//! `workflow://` references embedded in task commands.
//!
//! Grammar: `workflow://[<workflow-name>]/<task-name>[/<local-path>]`. A token
//! runs from the scheme up to the next whitespace or the end of the command.
//! An empty workflow name means the task's own workflow; an empty local path
//! refers to the producer's whole working directory.

use std::ops::Range;

use crate::error::ReferenceError;

pub const SCHEME: &str = "workflow://";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
  /// Named workflow, `None` for the referencing task's own workflow.
  pub workflow: Option<String>,
  pub task: String,
  /// Path relative to the producer's working directory, without leading or
  /// trailing slashes. Empty for a bare task reference.
  pub path: String,
  /// Byte range of the whole token inside the command.
  pub span: Range<usize>,
}

impl Reference {
  /// Workflow name, falling back to `current` for the implicit form.
  pub fn workflow_or<'a>(&'a self, current: &'a str) -> &'a str {
    self.workflow.as_deref().unwrap_or(current)
  }

  /// The token as written in `command`.
  pub fn raw<'a>(&self, command: &'a str) -> &'a str {
    &command[self.span.clone()]
  }
}

/// Scan a command left to right and return every reference it contains.
pub fn parse_references(command: &str) -> Result<Vec<Reference>, ReferenceError> {
  let mut references = Vec::new();
  let mut pos = 0;

  while let Some(offset) = command[pos..].find(SCHEME) {
    let start = pos + offset;
    let end = command[start..]
      .find(char::is_whitespace)
      .map(|i| start + i)
      .unwrap_or(command.len());

    references.push(parse_token(&command[start..end], start..end)?);
    pos = end;
  }

  Ok(references)
}

fn parse_token(token: &str, span: Range<usize>) -> Result<Reference, ReferenceError> {
  let rest = &token[SCHEME.len()..];
  let mut parts = rest.splitn(3, '/');
  let workflow = parts.next().unwrap_or_default();
  let task = parts.next().unwrap_or_default();
  let path = parts.next().unwrap_or_default();

  if task.is_empty() {
    return Err(ReferenceError::Malformed {
      reference: token.to_string(),
      reason: "missing task name".to_string(),
    });
  }

  Ok(Reference {
    workflow: (!workflow.is_empty()).then(|| workflow.to_string()),
    task: task.to_string(),
    path: path.trim_matches('/').to_string(),
    span,
  })
}

/// Replace every reference token with the text produced by `replacement`.
///
/// Replacement text is never rescanned, so a substitution that itself
/// contains the scheme is emitted verbatim.
pub fn rewrite_references<F>(command: &str, references: &[Reference], mut replacement: F) -> String
where
  F: FnMut(&Reference) -> String,
{
  let mut out = String::with_capacity(command.len());
  let mut cursor = 0;

  for reference in references {
    out.push_str(&command[cursor..reference.span.start]);
    out.push_str(&replacement(reference));
    cursor = reference.span.end;
  }
  out.push_str(&command[cursor..]);

  out
}
