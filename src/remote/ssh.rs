//! Command channel over the system `ssh` and `scp` binaries.
//!
//! Runs the appliance's `ops-cli` tool remotely. Exports write into a
//! per-channel scratch directory on the server and are copied back with
//! `scp`; imports upload the queued files with one `scp` call per kind,
//! each kind into its own remote subdirectory, and then run all import
//! commands in one `ssh` call.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, warn};

use super::channel::{ChannelError, ChannelResult, CommandChannel};
use crate::config::ConnectionSettings;
use crate::sync::workspace::unique_name;

/// `ops-cli` entry point on the appliance.
pub const OPS_CLI: &str = "/usr/lib/vmware-vcops/tools/opscli/ops-cli.sh";

/// Owner used for dashboard import and sharing commands.
const DASHBOARD_OWNER: &str = "admin";

/// A file queued for import and the command that imports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImportKind {
    View,
    Dashboard,
    Report,
    SuperMetric,
    MetricConfig,
}

impl ImportKind {
    const ALL: [Self; 5] = [
        Self::View,
        Self::Dashboard,
        Self::Report,
        Self::SuperMetric,
        Self::MetricConfig,
    ];

    /// Remote subdirectory for uploads of this kind. Archives of different
    /// kinds share `<name>.zip` names and must not overwrite each other.
    const fn remote_subdir(self) -> &'static str {
        match self {
            Self::View => "views",
            Self::Dashboard => "dashboards",
            Self::Report => "reports",
            Self::SuperMetric => "supermetrics",
            Self::MetricConfig => "metricconfigs",
        }
    }

    fn command(self, remote_file: &str) -> String {
        let file = shell_quote(remote_file);
        match self {
            Self::View => format!("{OPS_CLI} view import {file} --force"),
            Self::Dashboard => format!("{OPS_CLI} dashboard import {DASHBOARD_OWNER} {file} --force"),
            Self::Report => format!("{OPS_CLI} report import {file} --force"),
            Self::SuperMetric => format!("{OPS_CLI} supermetric import {file} --force"),
            Self::MetricConfig => format!("{OPS_CLI} file import reskndmetric {file} --force"),
        }
    }
}

#[derive(Debug, Clone)]
struct PendingImport {
    kind: ImportKind,
    file: PathBuf,
}

/// `ssh`/`scp` based [`CommandChannel`].
#[derive(Debug)]
pub struct SshChannel {
    host: String,
    user: String,
    port: u16,
    accept_unknown_hosts: bool,
    connect_timeout: u64,
    remote_dir: String,
    connected: bool,
    pending: Vec<PendingImport>,
}

impl SshChannel {
    pub fn new(host: impl Into<String>, user: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            port,
            accept_unknown_hosts: false,
            connect_timeout: 30,
            remote_dir: format!("/tmp/{}", unique_name("vrsync")),
            connected: false,
            pending: Vec::new(),
        }
    }

    /// Build a channel from resolved connection settings.
    #[must_use]
    pub fn from_settings(settings: &ConnectionSettings) -> Self {
        let mut channel = Self::new(
            settings.host.clone().unwrap_or_default(),
            settings.ssh_user.clone(),
            settings.ssh_port,
        );
        channel.accept_unknown_hosts = settings.insecure;
        channel.connect_timeout = settings.timeout_secs;
        channel
    }

    fn target(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    fn common_options(&self) -> Vec<String> {
        let mut options = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout),
        ];
        if self.accept_unknown_hosts {
            options.push("-o".to_string());
            options.push("StrictHostKeyChecking=no".to_string());
        }
        options
    }

    fn ssh_args(&self, remote_command: &str) -> Vec<String> {
        let mut args = vec!["-p".to_string(), self.port.to_string()];
        args.extend(self.common_options());
        args.push(self.target());
        args.push(remote_command.to_string());
        args
    }

    fn scp_download_args(&self, remote_glob: &str, dest_dir: &Path) -> Vec<String> {
        let mut args = vec!["-P".to_string(), self.port.to_string()];
        args.extend(self.common_options());
        args.push(format!("{}:{}", self.target(), remote_glob));
        args.push(dest_dir.display().to_string());
        args
    }

    fn scp_upload_args(&self, files: &[PathBuf], subdir: &str) -> Vec<String> {
        let mut args = vec!["-P".to_string(), self.port.to_string()];
        args.extend(self.common_options());
        args.extend(files.iter().map(|f| f.display().to_string()));
        args.push(format!("{}:{}/{subdir}/", self.target(), self.remote_dir));
        args
    }

    fn run(program: &str, args: &[String], operation: &str) -> ChannelResult<String> {
        debug!(program, args = ?args, "Running {operation}");
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| ChannelError::new(operation, format!("cannot start {program}: {e}")))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(ChannelError::new(
                operation,
                format!("{program} exited with {}: {stderr}", output.status),
            ))
        }
    }

    fn ensure_connected(&self, operation: &str) -> ChannelResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(ChannelError::new(operation, "channel is not connected"))
        }
    }

    fn remote(&self, command: &str, operation: &str) -> ChannelResult<String> {
        Self::run("ssh", &self.ssh_args(command), operation)
    }

    /// Run an export command into a fresh remote subdirectory and copy the
    /// result into `dest_dir`.
    fn export(&mut self, operation: &str, command: impl FnOnce(&str) -> String, dest_dir: &Path) -> ChannelResult<()> {
        self.ensure_connected(operation)?;
        let remote_out = format!("{}/{}", self.remote_dir, unique_name("export"));
        let quoted = shell_quote(&remote_out);

        self.remote(
            &format!("mkdir -p {quoted} && {}", command(&quoted)),
            operation,
        )?;
        std::fs::create_dir_all(dest_dir)
            .map_err(|e| ChannelError::new(operation, format!("cannot create {}: {e}", dest_dir.display())))?;
        Self::run("scp", &self.scp_download_args(&format!("{remote_out}/*"), dest_dir), operation)?;
        Ok(())
    }

    fn enqueue(&mut self, kind: ImportKind, file: &Path) -> ChannelResult<()> {
        if !file.is_file() {
            return Err(ChannelError::new(
                "queue import",
                format!("{} is not a file", file.display()),
            ));
        }
        debug!(file = %file.display(), ?kind, "Queued for import");
        self.pending.push(PendingImport {
            kind,
            file: file.to_path_buf(),
        });
        Ok(())
    }

    fn sharing(&mut self, action: &str, name: &str, groups: &[String]) -> ChannelResult<()> {
        let operation = format!("{action} dashboard '{name}'");
        self.ensure_connected(&operation)?;
        let mut command = format!(
            "{OPS_CLI} dashboard {action} {DASHBOARD_OWNER} {}",
            shell_quote(name)
        );
        for group in groups {
            command.push(' ');
            command.push_str(&shell_quote(group));
        }
        self.remote(&command, &operation)?;
        Ok(())
    }
}

impl CommandChannel for SshChannel {
    fn connect(&mut self) -> ChannelResult<()> {
        if self.connected {
            return Ok(());
        }
        info!("Connecting to {}", self.describe());
        self.remote(&format!("mkdir -p {}", shell_quote(&self.remote_dir)), "connect")?;
        self.connected = true;
        Ok(())
    }

    fn close(&mut self) {
        self.connected = false;
    }

    fn describe(&self) -> String {
        format!("ssh -p {} {}", self.port, self.target())
    }

    fn export_view(&mut self, name: &str, dest_dir: &Path) -> ChannelResult<()> {
        let name = shell_quote(name);
        self.export(
            "export view",
            |out| format!("{OPS_CLI} view export {name} {out}"),
            dest_dir,
        )
    }

    fn export_dashboard(&mut self, name: &str, dest_dir: &Path) -> ChannelResult<()> {
        let name = shell_quote(name);
        self.export(
            "export dashboard",
            |out| format!("{OPS_CLI} dashboard export {DASHBOARD_OWNER} {name} {out}"),
            dest_dir,
        )
    }

    fn export_report(&mut self, name: &str, dest_dir: &Path) -> ChannelResult<()> {
        let name = shell_quote(name);
        self.export(
            "export report",
            |out| format!("{OPS_CLI} report export {name} {out}"),
            dest_dir,
        )
    }

    fn export_super_metric(&mut self, name: &str, dest_dir: &Path) -> ChannelResult<()> {
        let name = shell_quote(name);
        self.export(
            "export super metric",
            |out| format!("{OPS_CLI} supermetric export {name} {out}"),
            dest_dir,
        )
    }

    fn export_metric_config(&mut self, name: &str, dest_dir: &Path) -> ChannelResult<()> {
        let name = shell_quote(name);
        self.export(
            "export metric config",
            |out| format!("{OPS_CLI} file export reskndmetric {name} {out}"),
            dest_dir,
        )
    }

    fn add_view_to_import_list(&mut self, file: &Path) -> ChannelResult<()> {
        self.enqueue(ImportKind::View, file)
    }

    fn add_dashboard_to_import_list(&mut self, file: &Path) -> ChannelResult<()> {
        self.enqueue(ImportKind::Dashboard, file)
    }

    fn add_report_to_import_list(&mut self, file: &Path) -> ChannelResult<()> {
        self.enqueue(ImportKind::Report, file)
    }

    fn add_super_metric_to_import_list(&mut self, file: &Path) -> ChannelResult<()> {
        self.enqueue(ImportKind::SuperMetric, file)
    }

    fn add_metric_config_to_import_list(&mut self, file: &Path) -> ChannelResult<()> {
        self.enqueue(ImportKind::MetricConfig, file)
    }

    fn import_files(&mut self) -> ChannelResult<()> {
        self.ensure_connected("import")?;
        if self.pending.is_empty() {
            return Ok(());
        }

        let kinds: Vec<ImportKind> = ImportKind::ALL
            .into_iter()
            .filter(|kind| self.pending.iter().any(|p| p.kind == *kind))
            .collect();
        let dirs = kinds
            .iter()
            .map(|kind| shell_quote(&format!("{}/{}", self.remote_dir, kind.remote_subdir())))
            .collect::<Vec<_>>()
            .join(" ");
        self.remote(&format!("mkdir -p {dirs}"), "prepare import")?;

        for kind in kinds {
            let files: Vec<PathBuf> = self
                .pending
                .iter()
                .filter(|p| p.kind == kind)
                .map(|p| p.file.clone())
                .collect();
            Self::run(
                "scp",
                &self.scp_upload_args(&files, kind.remote_subdir()),
                "upload import files",
            )?;
        }

        let script = import_script(&self.remote_dir, &self.pending);
        info!("Importing {} file(s) through {}", self.pending.len(), self.describe());
        self.remote(&script, "import")?;
        Ok(())
    }

    fn share_dashboard(&mut self, name: &str, groups: &[String]) -> ChannelResult<()> {
        self.sharing("share", name, groups)
    }

    fn unshare_dashboard(&mut self, name: &str, groups: &[String]) -> ChannelResult<()> {
        self.sharing("unshare", name, groups)
    }

    fn has_any_commands(&self) -> bool {
        !self.pending.is_empty()
    }

    fn cleanup(&mut self) {
        self.pending.clear();
        if !self.connected {
            return;
        }
        let command = format!("rm -rf {}", shell_quote(&self.remote_dir));
        if let Err(e) = self.remote(&command, "cleanup") {
            warn!("Unable to remove remote scratch directory {}: {e}", self.remote_dir);
        }
    }
}

/// One shell line running every queued import, stopping at the first failure.
fn import_script(remote_dir: &str, pending: &[PendingImport]) -> String {
    pending
        .iter()
        .map(|p| {
            let file_name = p
                .file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            p.kind
                .command(&format!("{remote_dir}/{}/{file_name}", p.kind.remote_subdir()))
        })
        .collect::<Vec<_>>()
        .join(" && ")
}

/// Quote `s` for a POSIX shell.
#[must_use]
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("Foo Bar"), "'Foo Bar'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_ssh_args() {
        let channel = SshChannel::new("ops.example.com", "root", 2222);
        let args = channel.ssh_args("echo ok");
        assert_eq!(&args[..2], ["-p", "2222"]);
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert_eq!(args[args.len() - 2], "root@ops.example.com");
        assert_eq!(args[args.len() - 1], "echo ok");
        assert!(!args.contains(&"StrictHostKeyChecking=no".to_string()));
    }

    #[test]
    fn test_scp_upload_targets_remote_dir() {
        let channel = SshChannel::new("ops", "root", 22);
        let args = channel.scp_upload_args(
            &[PathBuf::from("/tmp/a.zip"), PathBuf::from("/tmp/b.zip")],
            "views",
        );
        assert_eq!(&args[..2], ["-P", "22"]);
        assert!(args.contains(&"/tmp/a.zip".to_string()));
        let last = args.last().unwrap();
        assert!(last.starts_with("root@ops:/tmp/vrsync-"));
        assert!(last.ends_with("/views/"));
    }

    #[test]
    fn test_import_script_joins_commands() {
        let pending = vec![
            PendingImport {
                kind: ImportKind::View,
                file: PathBuf::from("/local/views/Foo.zip"),
            },
            PendingImport {
                kind: ImportKind::MetricConfig,
                file: PathBuf::from("/local/metricconfigs/vm.xml"),
            },
        ];
        let script = import_script("/tmp/x", &pending);
        assert_eq!(
            script,
            format!(
                "{OPS_CLI} view import '/tmp/x/views/Foo.zip' --force && \
                 {OPS_CLI} file import reskndmetric '/tmp/x/metricconfigs/vm.xml' --force"
            )
        );
    }

    #[test]
    fn test_import_script_separates_same_named_archives() {
        let pending = vec![
            PendingImport {
                kind: ImportKind::View,
                file: PathBuf::from("/s/views/Overview.zip"),
            },
            PendingImport {
                kind: ImportKind::Dashboard,
                file: PathBuf::from("/s/dashboards/Overview.zip"),
            },
        ];
        let script = import_script("/tmp/x", &pending);
        assert!(script.contains("view import '/tmp/x/views/Overview.zip'"));
        assert!(script.contains("dashboard import admin '/tmp/x/dashboards/Overview.zip'"));
        assert!(!script.contains("'/tmp/x/Overview.zip'"));
    }

    #[test]
    fn test_queue_requires_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut channel = SshChannel::new("ops", "root", 22);

        assert!(channel
            .add_view_to_import_list(&temp_dir.path().join("missing.zip"))
            .is_err());
        assert!(!channel.has_any_commands());

        let file = temp_dir.path().join("Foo.zip");
        std::fs::write(&file, "zip").unwrap();
        channel.add_view_to_import_list(&file).unwrap();
        assert!(channel.has_any_commands());

        channel.cleanup();
        assert!(!channel.has_any_commands());
    }

    #[test]
    fn test_commands_require_connection() {
        let temp_dir = TempDir::new().unwrap();
        let mut channel = SshChannel::new("ops", "root", 22);
        let err = channel.export_view("Foo", temp_dir.path()).unwrap_err();
        assert!(err.to_string().contains("not connected"));
    }
}
