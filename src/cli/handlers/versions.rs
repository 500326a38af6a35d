// src/cli/handlers/versions.rs

use crate::core::config_loader;
use crate::core::options::RuntimeOptions;
use crate::system::executor;
use anyhow::{Context, Result};
use log::LevelFilter;

/// Handler for `get-versions`: Terraform's version, then one line per extra command
/// declaring a version argument.
pub fn handle(options: &RuntimeOptions, _args: Vec<String>) -> Result<()> {
    let config = config_loader::read_config(options)
        .with_context(|| format!("Could not load {}", options.config_path.display()))?;

    let quiet = options.with_log_level(LevelFilter::Warn);
    match executor::run_terraform_command_and_capture_output(&quiet, &["--version".to_string()]) {
        Ok(version) => println!("{}", version.trim()),
        Err(err) => options
            .logger
            .warn(format!("Could not get the version of {}: {}", options.terraform_path, err)),
    }

    print!("{}", config.extra_commands.get_versions(options));
    Ok(())
}
