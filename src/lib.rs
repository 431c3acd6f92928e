//! vrsync - Aria Operations content synchronization
//!
//! This crate provides the core functionality for the `vrsync` CLI tool.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Data types (Package, PackageDescriptor, AssetKind, RemoteAsset)
//! - [`remote`] - Query API (Suite API over HTTPS) and command channel (ops-cli over SSH)
//! - [`sync`] - Export/import pipeline, staging workspaces and archive layouts
//! - [`config`] - Connection settings resolution
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod remote;
pub mod sync;

pub use error::{Error, Result};
