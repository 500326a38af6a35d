// src/core/config_resolver.rs

//! The resolved configuration of one working directory and the rules merging it
//! with the configuration it includes.

use crate::constants::CONFIG_SECTION_KEY;
use crate::core::config_loader::{ConfigError, ConfigResult};
use crate::core::extension::{Extension, ExtensionBase};
use crate::core::extension_list::ExtensionList;
use crate::core::extra_args::ExtraArguments;
use crate::core::extra_command::ExtraCommand;
use crate::core::hook::Hook;
use crate::core::options::Logger;
use crate::models::{
    ConfigBody, DependenciesBlock, ExtensionFields, ExtraArgumentsBlock,
    ExtraCommandBlock, HookBlock, RemoteStateBlock, TerraformBlock,
};
use indexmap::IndexMap;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// The configuration file whose helpers are being evaluated and whose settings are
/// merged under the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeSpec {
    pub path: PathBuf,
}

impl IncludeSpec {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TerraformConfig {
    pub source: Option<String>,
    pub extra_args: ExtensionList<ExtraArguments>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteState {
    pub backend: String,
    pub config: IndexMap<String, hcl::Value>,
}

impl RemoteState {
    /// The `-backend-config` arguments handed to `terraform init`.
    pub fn to_init_args(&self) -> Vec<String> {
        self.config
            .iter()
            .map(|(key, value)| format!("-backend-config={}={}", key, render_value(value)))
            .collect()
    }
}

/// A value as it is written on a command line.
pub fn render_value(value: &hcl::Value) -> String {
    match value {
        hcl::Value::String(s) => s.clone(),
        hcl::Value::Null => String::new(),
        hcl::Value::Bool(b) => b.to_string(),
        hcl::Value::Number(n) => n.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModuleDependencies {
    pub paths: Vec<String>,
}

/// Everything the wrapper knows about one working directory once includes are merged.
///
/// Unset blocks stay `None`: a child without a `terraform` block is different from a
/// child with an empty one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EffectiveConfig {
    pub terraform: Option<TerraformConfig>,
    pub remote_state: Option<RemoteState>,
    pub dependencies: Option<ModuleDependencies>,
    pub pre_hooks: ExtensionList<Hook>,
    pub post_hooks: ExtensionList<Hook>,
    pub extra_commands: ExtensionList<ExtraCommand>,
}

impl EffectiveConfig {
    /// Converts a decoded body. `path` is the file it came from, for error reporting.
    pub fn from_body(body: ConfigBody, path: &Path) -> ConfigResult<Self> {
        let remote_state = match body.remote_state {
            Some(block) => {
                let backend = block
                    .backend
                    .filter(|backend| !backend.is_empty())
                    .ok_or_else(|| ConfigError::RemoteBackendMissing {
                        path: path.display().to_string(),
                    })?;
                Some(RemoteState {
                    backend,
                    config: block.config,
                })
            }
            None => None,
        };

        Ok(Self {
            terraform: body.terraform.map(|block| TerraformConfig {
                source: block.source,
                extra_args: block
                    .extra_arguments
                    .into_iter()
                    .map(|(name, block)| extra_arguments_from_block(name, block))
                    .collect(),
            }),
            remote_state,
            dependencies: body
                .dependencies
                .map(|block| ModuleDependencies { paths: block.paths }),
            pre_hooks: hooks_from_blocks(body.pre_hook),
            post_hooks: hooks_from_blocks(body.post_hook),
            extra_commands: body
                .extra_command
                .into_iter()
                .map(|(name, block)| extra_command_from_block(name, block))
                .collect(),
        })
    }

    /// The raw form of this configuration. `include` is gone once merged.
    pub fn to_body(&self) -> ConfigBody {
        ConfigBody {
            include: None,
            terraform: self.terraform.as_ref().map(|terraform| TerraformBlock {
                source: terraform.source.clone(),
                extra_arguments: terraform
                    .extra_args
                    .iter()
                    .map(|item| (item.name().to_string(), extra_arguments_to_block(item)))
                    .collect(),
            }),
            remote_state: self.remote_state.as_ref().map(|state| RemoteStateBlock {
                backend: Some(state.backend.clone()),
                config: state.config.clone(),
            }),
            dependencies: self.dependencies.as_ref().map(|deps| DependenciesBlock {
                paths: deps.paths.clone(),
            }),
            pre_hook: hooks_to_blocks(&self.pre_hooks),
            post_hook: hooks_to_blocks(&self.post_hooks),
            extra_command: self
                .extra_commands
                .iter()
                .map(|item| (item.name().to_string(), extra_command_to_block(item)))
                .collect(),
        }
    }

    /// Serializes the configuration in the current file layout, every setting as a
    /// real block so the output decodes back to the same configuration.
    pub fn to_hcl(&self) -> Result<String, hcl::Error> {
        let body = self.to_body();
        let mut section = hcl::Block::builder(CONFIG_SECTION_KEY);

        if let Some(terraform) = &body.terraform {
            let mut block = hcl::Block::builder("terraform");
            if let Some(source) = &terraform.source {
                block = block.add_attribute(("source", source.as_str()));
            }
            for (name, item) in &terraform.extra_arguments {
                block = block.add_block(settings_block("extra_arguments", Some(name.as_str()), item)?);
            }
            section = section.add_block(block.build());
        }
        if let Some(remote_state) = &body.remote_state {
            section = section.add_block(settings_block("remote_state", None, remote_state)?);
        }
        if let Some(dependencies) = &body.dependencies {
            section = section.add_block(settings_block("dependencies", None, dependencies)?);
        }
        for (name, hook) in &body.pre_hook {
            section = section.add_block(settings_block("pre_hook", Some(name.as_str()), hook)?);
        }
        for (name, hook) in &body.post_hook {
            section = section.add_block(settings_block("post_hook", Some(name.as_str()), hook)?);
        }
        for (name, command) in &body.extra_command {
            section = section.add_block(settings_block("extra_command", Some(name.as_str()), command)?);
        }

        hcl::to_string(&hcl::Body::builder().add_block(section.build()).build())
    }

    /// Binds every extension item to `owner`.
    pub fn init(&mut self, owner: &Path) {
        if let Some(terraform) = &mut self.terraform {
            terraform.extra_args.init(owner);
        }
        self.pre_hooks.init(owner);
        self.post_hooks.init(owner);
        self.extra_commands.init(owner);
    }

    /// Merges the configuration of an included parent into this one.
    ///
    /// Blocks missing here are taken from the parent; blocks present here win. The
    /// `terraform` block is the exception: its extra arguments are merged item by
    /// item and its source falls back to the parent's. Extension lists are merged by id.
    pub fn merge_included(&mut self, parent: Self, logger: &Logger) {
        self.terraform = match (self.terraform.take(), parent.terraform) {
            (Some(mut child), Some(parent)) => {
                if child.source.is_none() {
                    child.source = parent.source;
                }
                child.extra_args.merge(parent.extra_args, logger);
                Some(child)
            }
            (child, parent) => child.or(parent),
        };
        if self.remote_state.is_none() {
            self.remote_state = parent.remote_state;
        }
        if self.dependencies.is_none() {
            self.dependencies = parent.dependencies;
        }
        self.pre_hooks.merge(parent.pre_hooks, logger);
        self.post_hooks.merge(parent.post_hooks, logger);
        self.extra_commands.merge(parent.extra_commands, logger);
    }
}

/// A block whose attributes are the serialized fields of `settings`.
fn settings_block<T: Serialize>(
    identifier: &str,
    label: Option<&str>,
    settings: &T,
) -> Result<hcl::Block, hcl::Error> {
    let mut block = hcl::Block::builder(identifier);
    if let Some(label) = label {
        block = block.add_label(label);
    }
    if let hcl::Value::Object(fields) = hcl::to_value(settings)? {
        for (key, value) in fields {
            block = block.add_attribute((key, value));
        }
    }
    Ok(block.build())
}

fn base_from_fields(name: String, fields: ExtensionFields) -> ExtensionBase {
    ExtensionBase {
        id: fields.id,
        description: fields.description,
        os: fields.os,
        disabled: fields.disabled,
        ..ExtensionBase::named(name)
    }
}

fn fields_from_base(base: &ExtensionBase) -> ExtensionFields {
    ExtensionFields {
        id: base.id.clone(),
        description: base.description.clone(),
        os: base.os.clone(),
        disabled: base.disabled,
    }
}

fn hooks_from_blocks(blocks: IndexMap<String, HookBlock>) -> ExtensionList<Hook> {
    blocks
        .into_iter()
        .map(|(name, block)| Hook {
            base: base_from_fields(name, block.common),
            command: block.command,
            arguments: block.arguments,
            on_commands: block.on_commands,
            expand_args: block.expand_args,
            ignore_error: block.ignore_error,
        })
        .collect()
}

fn hooks_to_blocks(hooks: &ExtensionList<Hook>) -> IndexMap<String, HookBlock> {
    hooks
        .iter()
        .map(|hook| {
            let block = HookBlock {
                common: fields_from_base(&hook.base),
                command: hook.command.clone(),
                arguments: hook.arguments.clone(),
                on_commands: hook.on_commands.clone(),
                expand_args: hook.expand_args,
                ignore_error: hook.ignore_error,
            };
            (hook.name().to_string(), block)
        })
        .collect()
}

fn extra_arguments_from_block(name: String, block: ExtraArgumentsBlock) -> ExtraArguments {
    ExtraArguments {
        base: base_from_fields(name, block.common),
        arguments: block.arguments,
        commands: block.commands,
        required_var_files: block.required_var_files,
        optional_var_files: block.optional_var_files,
    }
}

fn extra_arguments_to_block(item: &ExtraArguments) -> ExtraArgumentsBlock {
    ExtraArgumentsBlock {
        common: fields_from_base(&item.base),
        arguments: item.arguments.clone(),
        commands: item.commands.clone(),
        required_var_files: item.required_var_files.clone(),
        optional_var_files: item.optional_var_files.clone(),
    }
}

fn extra_command_from_block(name: String, block: ExtraCommandBlock) -> ExtraCommand {
    ExtraCommand {
        base: base_from_fields(name, block.common),
        commands: block.commands,
        aliases: block.aliases,
        arguments: block.arguments,
        expand_args: block.expand_args,
        use_state: block.use_state,
        act_as: block.act_as,
        version_arg: block.version_arg,
    }
}

fn extra_command_to_block(item: &ExtraCommand) -> ExtraCommandBlock {
    ExtraCommandBlock {
        common: fields_from_base(&item.base),
        commands: item.commands.clone(),
        aliases: item.aliases.clone(),
        arguments: item.arguments.clone(),
        expand_args: item.expand_args,
        use_state: item.use_state,
        act_as: item.act_as.clone(),
        version_arg: item.version_arg.clone(),
    }
}
