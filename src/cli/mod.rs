// src/cli/mod.rs

use crate::core::config_loader;
use crate::core::options::{Logger, RuntimeOptions};
use crate::core::paths;
use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

pub mod handlers;

/// tfgrunt: a thin Terraform wrapper with inheritable configuration.
///
/// Every argument that is not a `--tfgrunt-*` flag is handed to Terraform, after
/// extra commands, extra arguments and hooks declared in `terraform.tfvars` (or
/// the legacy `.terragrunt`) are applied.
///
/// Built-in commands:
/// - `get-versions`: versions of Terraform and of every extra command.
/// - `list-extensions [lookups...]`: one line per declared extension.
/// - `help-extensions [lookups...]`: detailed help of the declared extensions.
/// - `print-config`: the resolved configuration, includes merged.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Configuration file to use instead of the one in the working directory.
    #[arg(long = "tfgrunt-config", env = "TFGRUNT_CONFIG")]
    pub config: Option<String>,

    /// Terraform executable.
    #[arg(long = "tfgrunt-tfpath", env = "TFGRUNT_TFPATH")]
    pub terraform_path: Option<String>,

    /// Directory Terraform runs in. Defaults to the current directory.
    #[arg(long = "tfgrunt-working-dir", env = "TFGRUNT_WORKING_DIR")]
    pub working_dir: Option<String>,

    /// Overrides the `source` of the `terraform` block.
    #[arg(long = "tfgrunt-source", env = "TFGRUNT_SOURCE")]
    pub source: Option<String>,

    /// Never prompt. Terraform runs with `TF_INPUT=0`.
    #[arg(long = "tfgrunt-non-interactive", env = "TFGRUNT_NON_INTERACTIVE")]
    pub non_interactive: bool,

    /// Most verbose level of the wrapper's own messages.
    #[arg(long = "tfgrunt-log-level", env = "TFGRUNT_LOG_LEVEL", default_value = "info")]
    pub log_level: LevelFilter,

    /// The command and its arguments.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl Cli {
    /// Builds the runtime options described by the flags. The CLI arguments are left
    /// empty; the handlers fill them in.
    pub fn runtime_options(&self) -> Result<RuntimeOptions> {
        let working_dir = match &self.working_dir {
            Some(dir) => expand_path(dir)?,
            None => std::env::current_dir().context("Could not determine the current directory")?,
        };
        let working_dir = paths::absolute_path(&working_dir);
        let config_path = match &self.config {
            Some(path) => paths::absolute_path(&working_dir.join(expand_path(path)?)),
            None => paths::default_config_path(&working_dir),
        };

        let mut options = RuntimeOptions::new(config_path);
        options.working_dir = working_dir;
        options.logger = Logger::new(options.working_dir.display().to_string(), self.log_level);
        if let Some(terraform_path) = &self.terraform_path {
            options.terraform_path = terraform_path.clone();
        }
        options.source = self.source.clone();
        options.non_interactive = self.non_interactive;
        config_loader::import_var_files(&mut options);
        Ok(options)
    }
}

/// Expands `~` and environment variables in a user supplied path.
fn expand_path(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw).with_context(|| format!("Could not expand path '{}'", raw))?;
    Ok(PathBuf::from(expanded.as_ref()))
}
