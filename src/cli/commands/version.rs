//! Version command implementation.

use crate::error::Result;
use crate::model::PACKAGE_TYPE;
use crate::remote::ssh::OPS_CLI;
use serde::Serialize;

#[derive(Serialize)]
struct VersionOutput<'a> {
    name: &'a str,
    version: &'a str,
    build: &'a str,
    package_type: &'a str,
    ops_cli: &'a str,
}

/// Execute the version command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let output = VersionOutput {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        build: if cfg!(debug_assertions) { "dev" } else { "release" },
        package_type: PACKAGE_TYPE,
        ops_cli: OPS_CLI,
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("vrsync {} ({})", output.version, output.build);
    println!("  package type: {}", output.package_type);
    println!("  server tool:  {}", output.ops_cli);
    Ok(())
}
