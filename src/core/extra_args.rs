// src/core/extra_args.rs

use crate::core::extension::{Extension, ExtensionBase, MergeMode};
use crate::core::extension_list::ExtensionList;
use crate::core::options::RuntimeOptions;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtraArgumentsError {
    #[error("Required var file '{path}' of extra_arguments({id}) does not exist.")]
    RequiredVarFileMissing { id: String, path: String },
}

/// Arguments added to the command line of specific commands.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtraArguments {
    pub base: ExtensionBase,
    pub arguments: Vec<String>,
    /// Commands receiving the arguments. Empty means every command.
    pub commands: Vec<String>,
    pub required_var_files: Vec<String>,
    pub optional_var_files: Vec<String>,
}

impl ExtraArguments {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: ExtensionBase::named(name),
            ..Self::default()
        }
    }

    pub fn applies_to(&self, command: &str) -> bool {
        self.commands.is_empty() || self.commands.iter().any(|c| c == command)
    }

    /// The arguments this block contributes, relative var files resolved against `working_dir`.
    pub fn arguments_for(&self, working_dir: &Path) -> Result<Vec<String>, ExtraArgumentsError> {
        let mut args = self.arguments.clone();
        for file in &self.required_var_files {
            if !working_dir.join(file).is_file() {
                return Err(ExtraArgumentsError::RequiredVarFileMissing {
                    id: self.id().to_string(),
                    path: file.clone(),
                });
            }
            args.push(format!("-var-file={}", file));
        }
        for file in &self.optional_var_files {
            if working_dir.join(file).is_file() {
                args.push(format!("-var-file={}", file));
            } else {
                log::debug!("Skipping optional var file {} as it does not exist", file);
            }
        }
        Ok(args)
    }
}

impl Extension for ExtraArguments {
    type Output = Vec<String>;
    const ITEM_TYPE: &'static str = "extra_arguments";
    const MERGE_MODE: MergeMode = MergeMode::Prepend;

    fn base(&self) -> &ExtensionBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ExtensionBase {
        &mut self.base
    }

    /// Returns the arguments to splice in, or nothing when the command is not targeted.
    fn run(&mut self, options: &RuntimeOptions, _args: &[String]) -> anyhow::Result<Vec<String>> {
        if !self.applies_to(options.command()) {
            return Ok(Vec::new());
        }
        Ok(self.arguments_for(&options.working_dir)?)
    }

    fn extra_info(&self) -> String {
        if self.commands.is_empty() {
            String::new()
        } else {
            format!("[{}]", self.commands.join(", "))
        }
    }

    fn help(&self) -> String {
        let mut lines = Vec::new();
        if let Some(description) = &self.base.description {
            lines.push(description.clone());
        }
        if !self.arguments.is_empty() {
            lines.push(format!("Arguments: {}", self.arguments.join(" ")));
        }
        if !self.required_var_files.is_empty() {
            lines.push(format!("Required var files: {}", self.required_var_files.join(", ")));
        }
        if !self.optional_var_files.is_empty() {
            lines.push(format!("Optional var files: {}", self.optional_var_files.join(", ")));
        }
        lines.join("\n")
    }
}

impl ExtensionList<ExtraArguments> {
    /// Collects, in declaration order, the arguments every enabled block adds to the
    /// current command.
    pub fn filter(&self, options: &RuntimeOptions) -> Result<Vec<String>, ExtraArgumentsError> {
        let command = options.command();
        let mut result = Vec::new();
        for item in self.enabled().iter().filter(|item| item.applies_to(command)) {
            result.extend(item.arguments_for(&options.working_dir)?);
        }
        Ok(result)
    }
}
