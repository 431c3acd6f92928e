//! Command implementations.

pub mod completions;
pub mod export;
pub mod import;
pub mod status;
pub mod version;

use crate::config::ConnectionSettings;
use crate::error::Result;
use crate::remote::{RestClient, SshChannel};
use crate::sync::PackageSynchronizer;

/// Synchronizer wired to the real Suite API and SSH channel.
///
/// # Errors
///
/// Returns an error if the settings are incomplete or the HTTP client
/// cannot be built.
pub fn connect(settings: &ConnectionSettings) -> Result<PackageSynchronizer<RestClient, SshChannel>> {
    settings.validate()?;
    let query = RestClient::from_settings(settings)?;
    let channel = SshChannel::from_settings(settings);
    Ok(PackageSynchronizer::new(query, channel, settings.workspace_root()))
}
