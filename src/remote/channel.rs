//! Command channel contract.
//!
//! Views, dashboards, reports, super metrics and metric configs are moved
//! with the server-side command line tool rather than the REST API. The
//! channel is stateful: it is connected once, export commands run
//! immediately, and import commands are collected into a pending list that
//! [`CommandChannel::import_files`] submits in one round trip.

use std::path::Path;

use tracing::{debug, warn};

/// Failure of a channel operation.
#[derive(Debug, thiserror::Error)]
#[error("{operation} failed: {message}")]
pub struct ChannelError {
    pub operation: String,
    pub message: String,
}

impl ChannelError {
    pub fn new(operation: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self {
            operation: operation.into(),
            message: message.to_string(),
        }
    }
}

/// Result type for channel operations.
pub type ChannelResult<T> = std::result::Result<T, ChannelError>;

/// Session-based command execution on the server.
pub trait CommandChannel {
    /// Open the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is unreachable or rejects the login.
    fn connect(&mut self) -> ChannelResult<()>;

    /// Close the session. Safe to call when not connected.
    fn close(&mut self);

    /// Troubleshooting description of the channel (target and command line).
    fn describe(&self) -> String;

    /// Export view `name` as `<dest_dir>/<name>.zip`.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote command or the transfer fails.
    fn export_view(&mut self, name: &str, dest_dir: &Path) -> ChannelResult<()>;

    /// Export dashboard `name` as `<dest_dir>/<name>.zip`.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote command or the transfer fails.
    fn export_dashboard(&mut self, name: &str, dest_dir: &Path) -> ChannelResult<()>;

    /// Export report `name` as `<dest_dir>/<name>.zip`.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote command or the transfer fails.
    fn export_report(&mut self, name: &str, dest_dir: &Path) -> ChannelResult<()>;

    /// Export super metric `name` as `<dest_dir>/<name>.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote command or the transfer fails.
    fn export_super_metric(&mut self, name: &str, dest_dir: &Path) -> ChannelResult<()>;

    /// Export metric config `name` into `dest_dir` under the same file name.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote command or the transfer fails.
    fn export_metric_config(&mut self, name: &str, dest_dir: &Path) -> ChannelResult<()>;

    /// Queue a view archive for import.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be registered.
    fn add_view_to_import_list(&mut self, file: &Path) -> ChannelResult<()>;

    /// Queue a dashboard archive for import.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be registered.
    fn add_dashboard_to_import_list(&mut self, file: &Path) -> ChannelResult<()>;

    /// Queue a report archive for import.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be registered.
    fn add_report_to_import_list(&mut self, file: &Path) -> ChannelResult<()>;

    /// Queue a super metric file for import.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be registered.
    fn add_super_metric_to_import_list(&mut self, file: &Path) -> ChannelResult<()>;

    /// Queue a metric config file for import.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be registered.
    fn add_metric_config_to_import_list(&mut self, file: &Path) -> ChannelResult<()>;

    /// Submit every queued file.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload or any import command fails.
    fn import_files(&mut self) -> ChannelResult<()>;

    /// Share dashboard `name` with `groups`.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote command fails.
    fn share_dashboard(&mut self, name: &str, groups: &[String]) -> ChannelResult<()>;

    /// Revoke sharing of dashboard `name` with `groups`.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote command fails.
    fn unshare_dashboard(&mut self, name: &str, groups: &[String]) -> ChannelResult<()>;

    /// Whether anything is queued for import.
    fn has_any_commands(&self) -> bool;

    /// Forget queued files and remove remote scratch data.
    fn cleanup(&mut self);
}

/// Connected channel, closed when dropped.
pub struct ChannelSession<'a, C: CommandChannel + ?Sized> {
    channel: &'a mut C,
}

impl<'a, C: CommandChannel + ?Sized> ChannelSession<'a, C> {
    /// Connect `channel` and guard the session.
    ///
    /// # Errors
    ///
    /// Returns the connect error; nothing needs closing in that case.
    pub fn open(channel: &'a mut C) -> ChannelResult<Self> {
        channel.connect()?;
        debug!(channel = %channel.describe(), "Channel session opened");
        Ok(Self { channel })
    }

    pub fn channel(&mut self) -> &mut C {
        self.channel
    }
}

impl<C: CommandChannel + ?Sized> Drop for ChannelSession<'_, C> {
    fn drop(&mut self) {
        self.channel.close();
        debug!("Channel session closed");
    }
}

impl<C: CommandChannel + ?Sized> std::ops::Deref for ChannelSession<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.channel
    }
}

impl<C: CommandChannel + ?Sized> std::ops::DerefMut for ChannelSession<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.channel
    }
}

/// Run `cleanup()` on a channel when dropped.
pub struct CleanupGuard<'a, C: CommandChannel + ?Sized> {
    channel: &'a mut C,
}

impl<'a, C: CommandChannel + ?Sized> CleanupGuard<'a, C> {
    pub fn new(channel: &'a mut C) -> Self {
        Self { channel }
    }

    pub fn channel(&mut self) -> &mut C {
        self.channel
    }
}

impl<C: CommandChannel + ?Sized> Drop for CleanupGuard<'_, C> {
    fn drop(&mut self) {
        self.channel.cleanup();
        if self.channel.has_any_commands() {
            warn!("Channel still has queued commands after cleanup");
        }
    }
}
