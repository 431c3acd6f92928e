//! Data models for vrsync.
//!
//! This module contains the domain models:
//! - Package
//! - PackageDescriptor (`content.yaml`)
//! - AssetKind / DefinitionKind
//! - RemoteAsset and manifest summaries

pub mod asset;
pub mod descriptor;
pub mod package;

pub use asset::{AssetKind, AssetSummary, DefinitionKind, PolicySummary, RemoteAsset};
pub use descriptor::PackageDescriptor;
pub use package::{Package, PACKAGE_TYPE};
