//! Context probe run on a task's host before staging.
//!
//! The probe prints one JSON object on its last line of stdout, parsed by
//! `skein_workflow::ContextInfo::from_probe_output`.

/// File name of the probe script under the control directory.
pub const CONTEXT_SCRIPT: &str = "context.sh";

const PROBE_BODY: &str = r#"
machine_type="single-machine"
public_ip=""
user="${USER:-$(id -un 2>/dev/null)}"

if command -v curl >/dev/null 2>&1; then
  public_ip=$(curl -s --max-time 5 https://ipinfo.io/ip)
elif command -v wget >/dev/null 2>&1; then
  public_ip=$(wget -q -T 5 -O- https://ipinfo.io/ip)
fi

if [ -z "$public_ip" ]; then
  machine_type="cluster-frontend"
  public_ip=$(hostname -I 2>/dev/null | tr ' ' '\n' | grep -v '^127\.' | grep -v '^10\.' | grep -v '^192\.168\.' | grep -v '^172\.16\.' | head -n 1)
fi

if [ -z "$public_ip" ]; then
  machine_type="cluster-node"
  public_ip=$(hostname -I 2>/dev/null | tr ' ' '\n' | grep -v '^127\.' | grep -v '^$' | head -n 1)
fi

service_state() {
  state=$(systemctl status "$1" 2>/dev/null | grep 'Active' | awk '{print $2}')
  if [ -z "$state" ]; then
    state="none"
  fi
  echo "$state"
}

status_sshd=$(service_state sshd)
status_ftpd=$(service_state vsftpd)
status_gridftp=$(service_state globus-gridftp-server)
status_skycds=$(service_state skycds)

printf '{"type":"%s","ip":"%s","user":"%s","SCP":"%s","FTP":"%s","GRIDFTP":"%s","SKYCDS":"%s"}\n' \
  "$machine_type" "$public_ip" "$user" "$status_sshd" "$status_ftpd" "$status_gridftp" "$status_skycds"
"#;

/// Build the probe script for a working directory.
pub fn context_probe_script(working_dir: &std::path::Path) -> String {
  format!(
    "#!/bin/bash\n# skein context probe\n\ncd {} || exit 1\n{}",
    skein_workflow::quote_path(working_dir),
    PROBE_BODY
  )
}
