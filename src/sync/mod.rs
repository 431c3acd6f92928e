//! Content synchronization between a project tree and a server.
//!
//! - **Export**: server content → staged tree → project directory
//! - **Import**: package archive → staged tree → server
//!
//! # Architecture
//!
//! [`PackageSynchronizer`] owns one [`QueryApi`](crate::remote::QueryApi) and
//! one [`CommandChannel`](crate::remote::CommandChannel). Each run works in a
//! [`StagingDir`] that is removed on drop:
//! 1. Export stages one directory per asset category, then copies the staged
//!    tree over the project directory
//! 2. Import unpacks the package, queues archive-based content on the
//!    command channel, submits it in one round trip, then pushes definitions,
//!    policies and custom groups over the query API and applies sharing
//!
//! # Project layout
//!
//! ```text
//! content.yaml
//! views/<name>.xml              views/resources/*.properties
//! dashboards/<name>.json        dashboards/dashboardSharingMetadata.vrops.json
//! reports/<name>/content.xml    reports/<name>/resources/*.properties
//! policies/<name>.zip           policies/policiesMetadata.vrops.json
//! alert_definitions/  symptom_definitions/  recommendations/  custom_groups/
//! supermetrics/<name>.json      metricconfigs/<name>[.xml]
//! ```
//!
//! # Example
//!
//! ```ignore
//! use vrsync::sync::PackageSynchronizer;
//!
//! let mut sync = PackageSynchronizer::new(rest_client, ssh_channel, temp_root);
//! let stats = sync.export_package(&package, &descriptor, false)?;
//! ```

pub mod archive;
pub mod export;
pub mod file;
pub mod import;
pub mod localization;
pub mod matcher;
pub mod metadata;
pub mod synchronizer;
pub mod types;
pub mod view_id;
pub mod workspace;

pub use export::Exporter;
pub use import::Importer;
pub use matcher::NameMatcher;
pub use metadata::{PolicyMetadata, SharingAction, SharingMetadata};
pub use synchronizer::PackageSynchronizer;
pub use types::{BatchReport, ExportStats, ImportStats, ItemFailure, SyncError, SyncResult};
pub use workspace::{default_temp_root, StagingDir};
