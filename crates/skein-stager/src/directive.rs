use skein_config::StagerMode;
use skein_workflow::shell_quote;

/// Frame one staging command for the launcher script.
///
/// Sequential commands are followed by an exit-code guard. Parallel ones are
/// backgrounded and their pids collected for [`join_directive`].
pub fn render_directive(command: &str, mode: StagerMode) -> String {
  match mode {
    StagerMode::Sequential => format!("{command}\nif [ $? -ne 0 ]; then code=1; fi\n"),
    StagerMode::LocalParallel => format!("{command} &\npids=\"$pids $!\"\n"),
    StagerMode::ClusterParallel => {
      format!("srun -N1 -n1 bash -c {} &\npids=\"$pids $!\"\n", shell_quote(command))
    }
  }
}

/// Wait loop closing a block of parallel directives. `None` in sequential mode.
pub fn join_directive(mode: StagerMode) -> Option<String> {
  match mode {
    StagerMode::Sequential => None,
    StagerMode::LocalParallel | StagerMode::ClusterParallel => {
      Some("for pid in $pids; do\n  wait $pid || code=1\ndone\n".to_string())
    }
  }
}
