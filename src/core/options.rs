// src/core/options.rs

use crate::constants::{COMMAND_ENV_VAR, DEFAULT_TERRAFORM_PATH, TERRAFORM_INPUT_ENV_VAR};
use log::{Level, LevelFilter};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::path::{Path, PathBuf};

// --- LOGGER ---

/// Diagnostic output bound to one set of runtime options.
///
/// It forwards to the `log` facade, but first checks its own ceiling. Cloning a
/// logger with a lower ceiling is how a caller silences a nested operation
/// without touching the global logger configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logger {
    prefix: String,
    level: LevelFilter,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new("", LevelFilter::Trace)
    }
}

impl Logger {
    pub fn new(prefix: impl Into<String>, level: LevelFilter) -> Self {
        Self {
            prefix: prefix.into(),
            level,
        }
    }

    /// Returns a copy of this logger limited to `level`.
    pub fn with_level(&self, level: LevelFilter) -> Self {
        Self {
            prefix: self.prefix.clone(),
            level,
        }
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }

    pub fn enabled(&self, level: Level) -> bool {
        level <= self.level
    }

    pub fn error(&self, message: impl Display) {
        self.emit(Level::Error, message);
    }

    pub fn warn(&self, message: impl Display) {
        self.emit(Level::Warn, message);
    }

    pub fn info(&self, message: impl Display) {
        self.emit(Level::Info, message);
    }

    pub fn debug(&self, message: impl Display) {
        self.emit(Level::Debug, message);
    }

    pub fn trace(&self, message: impl Display) {
        self.emit(Level::Trace, message);
    }

    fn emit(&self, level: Level, message: impl Display) {
        if !self.enabled(level) {
            return;
        }
        if self.prefix.is_empty() {
            log::log!(level, "{}", message);
        } else {
            log::log!(level, "[{}] {}", self.prefix, message);
        }
    }
}

// --- VARIABLES ---

/// Where a Terraform variable value came from. Later variants take precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum VariableSource {
    #[default]
    Undefined,
    Environment,
    VarFile,
    VarParameter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub value: String,
    pub source: VariableSource,
}

// --- RUNTIME OPTIONS ---

/// Everything a single invocation needs to know about its environment.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Full path of the configuration file governing `working_dir`.
    pub config_path: PathBuf,
    /// Executable used for provisioning commands.
    pub terraform_path: String,
    /// Arguments as typed by the user; the first one is the command.
    pub terraform_cli_args: Vec<String>,
    pub working_dir: PathBuf,
    pub non_interactive: bool,
    /// Environment handed to every child process.
    pub env: HashMap<String, String>,
    /// Overrides the `source` declared in the `terraform` block.
    pub source: Option<String>,
    /// Terraform variables visible to the `get_var` helper.
    pub variables: BTreeMap<String, Variable>,
    pub logger: Logger,
}

impl RuntimeOptions {
    /// Builds options for `config_path`, inheriting the current process environment.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        let config_path = config_path.into();
        let working_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let logger = Logger::new(working_dir.display().to_string(), LevelFilter::Trace);

        let mut options = Self {
            config_path,
            terraform_path: DEFAULT_TERRAFORM_PATH.to_string(),
            terraform_cli_args: Vec::new(),
            working_dir,
            non_interactive: false,
            env: std::env::vars().collect(),
            source: None,
            variables: BTreeMap::new(),
            logger,
        };
        options.import_variables_from_env();
        options
    }

    /// The command typed by the user, or an empty string if none was given.
    pub fn command(&self) -> &str {
        self.terraform_cli_args
            .first()
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Returns a copy whose logger is capped at `level`. The receiver is left untouched,
    /// so the override lasts exactly as long as the returned value.
    pub fn with_log_level(&self, level: LevelFilter) -> Self {
        Self {
            logger: self.logger.with_level(level),
            ..self.clone()
        }
    }

    /// The environment for a child process running on behalf of `command`.
    pub fn env_for_command(&self, command: &str) -> HashMap<String, String> {
        let mut env = self.env.clone();
        env.insert(COMMAND_ENV_VAR.to_string(), command.to_string());
        if self.non_interactive {
            env.insert(TERRAFORM_INPUT_ENV_VAR.to_string(), "0".to_string());
        }
        env
    }

    /// Records a variable value unless a source with higher precedence already set it.
    /// Returns whether the value was stored.
    pub fn set_variable(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        source: VariableSource,
    ) -> bool {
        let name = name.into();
        if let Some(existing) = self.variables.get(&name) {
            if existing.source > source {
                return false;
            }
        }
        self.variables.insert(
            name,
            Variable {
                value: value.into(),
                source,
            },
        );
        true
    }

    /// Imports every `TF_VAR_<name>` entry of `env` as an environment-sourced variable.
    pub fn import_variables_from_env(&mut self) {
        let imported: Vec<(String, String)> = self
            .env
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix("TF_VAR_")
                    .map(|name| (name.to_string(), value.clone()))
            })
            .collect();
        for (name, value) in imported {
            self.set_variable(name, value, VariableSource::Environment);
        }
    }

    /// Value of the variable `name`, whatever its source.
    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(|variable| variable.value.as_str())
    }

    /// Files passed with `-var-file name` or `-var-file=name`, relative to the working dir.
    pub fn var_files_from_cli(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let mut args = self.terraform_cli_args.iter();
        while let Some(arg) = args.next() {
            let file = if arg == "-var-file" || arg == "--var-file" {
                args.next().cloned()
            } else {
                arg.strip_prefix("-var-file=")
                    .or_else(|| arg.strip_prefix("--var-file="))
                    .map(str::to_string)
            };
            if let Some(file) = file {
                files.push(self.working_dir.join(file));
            }
        }
        files
    }

    /// Imports `-var name=value` and `-var=name=value` pairs from the CLI arguments.
    pub fn import_variables_from_cli(&mut self) {
        let mut pairs = Vec::new();
        let mut args = self.terraform_cli_args.iter();
        while let Some(arg) = args.next() {
            let assignment = if arg == "-var" || arg == "--var" {
                args.next().cloned()
            } else {
                arg.strip_prefix("-var=")
                    .or_else(|| arg.strip_prefix("--var="))
                    .map(str::to_string)
            };
            if let Some((name, value)) = assignment.as_deref().and_then(|a| a.split_once('=')) {
                pairs.push((name.trim().to_string(), value.to_string()));
            }
        }
        for (name, value) in pairs {
            self.set_variable(name, value, VariableSource::VarParameter);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options_with_args(args: &[&str]) -> RuntimeOptions {
        let mut options = RuntimeOptions::new("/infra/app/terraform.tfvars");
        options.terraform_cli_args = args.iter().map(|s| s.to_string()).collect();
        options
    }

    #[test]
    fn test_new_derives_working_dir_from_config_path() {
        let options = RuntimeOptions::new("/infra/app/terraform.tfvars");
        assert_eq!(options.working_dir, PathBuf::from("/infra/app"));
        assert_eq!(options.terraform_path, "terraform");
        assert_eq!(options.command(), "");
    }

    #[cfg(unix)]
    #[test]
    fn test_var_files_from_cli() {
        let options = options_with_args(&["plan", "-var-file", "a.tfvars", "-var-file=/abs/b.tfvars", "-var", "x=1"]);
        assert_eq!(
            options.var_files_from_cli(),
            vec![PathBuf::from("/infra/app/a.tfvars"), PathBuf::from("/abs/b.tfvars")]
        );
    }

    #[test]
    fn test_with_log_level_leaves_original_logger_alone() {
        let options = options_with_args(&[]);
        let quiet = options.with_log_level(LevelFilter::Warn);
        assert!(!quiet.logger.enabled(Level::Info));
        assert!(options.logger.enabled(Level::Info));
    }

    #[test]
    fn test_variable_precedence() {
        let mut options = options_with_args(&[]);
        assert!(options.set_variable("region", "from-file", VariableSource::VarFile));
        assert!(!options.set_variable("region", "from-env", VariableSource::Environment));
        assert!(options.set_variable("region", "from-cli", VariableSource::VarParameter));
        assert_eq!(options.variables["region"].value, "from-cli");
    }

    #[test]
    fn test_import_variables_from_cli() {
        let mut options = options_with_args(&["apply", "-var", "a=1", "-var=b=two=2", "-auto-approve"]);
        options.import_variables_from_cli();
        assert_eq!(options.variables["a"].value, "1");
        assert_eq!(options.variables["b"].value, "two=2");
        assert_eq!(options.variables["b"].source, VariableSource::VarParameter);
    }

    #[test]
    fn test_import_variables_from_env() {
        let mut options = options_with_args(&[]);
        options.env.insert("TF_VAR_stage".to_string(), "dev".to_string());
        options.import_variables_from_env();
        assert_eq!(options.variables["stage"].source, VariableSource::Environment);
    }

    #[test]
    fn test_env_for_command_sets_command_variable() {
        let options = options_with_args(&[]);
        let env = options.env_for_command("plan");
        assert_eq!(env.get(COMMAND_ENV_VAR).map(String::as_str), Some("plan"));
    }

    #[test]
    fn test_env_for_command_disables_terraform_prompts_when_non_interactive() {
        let mut options = options_with_args(&[]);
        options.env.remove(TERRAFORM_INPUT_ENV_VAR);
        assert!(!options.env_for_command("apply").contains_key(TERRAFORM_INPUT_ENV_VAR));

        options.non_interactive = true;
        let env = options.env_for_command("apply");
        assert_eq!(env.get(TERRAFORM_INPUT_ENV_VAR).map(String::as_str), Some("0"));
    }
}
