// src/core/config_loader.rs

//! # Config Loader
//!
//! Reads the configuration file of a working directory, evaluates its helper calls,
//! decodes it in either layout and follows its `include` chain, merging every parent
//! under it. Configurations listed in `TFGRUNT_BOOT_CONFIGS` are merged last.

use crate::constants::{BOOT_CONFIGS_ENV_VAR, CONFIG_SECTION_KEY, MAX_INCLUDE_DEPTH};
use crate::core::config_resolver::{self, EffectiveConfig, IncludeSpec};
use crate::core::interpolator::{InterpolationError, Interpolator};
use crate::core::options::{RuntimeOptions, VariableSource};
use crate::core::paths;
use crate::models::{ConfigBody, ConfigFile};
use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

lazy_static! {
    // `terragrunt = { ... }` is the historical spelling of the `terragrunt { ... }` block.
    static ref SECTION_ASSIGNMENT_RE: Regex =
        Regex::new(&format!(r"(?m)^([ \t]*){}\s*=\s*\{{", CONFIG_SECTION_KEY)).unwrap();
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Error parsing configuration in '{path}': {source}")]
    Decode {
        path: String,
        #[source]
        source: hcl::Error,
    },
    #[error("Could not find a terragrunt section in '{path}'.")]
    ConfigNotFoundInFile { path: String },
    #[error("The remote_state block in '{path}' does not define a backend.")]
    RemoteBackendMissing { path: String },
    #[error("The include block in '{path}' does not define a path.")]
    IncludedConfigMissingPath { path: String },
    #[error("Too many levels of include ({depth}) while loading '{path}'.")]
    IncludeDepthExceeded { path: String, depth: u32 },
    #[error("Error evaluating helpers in '{path}': {source}")]
    Interpolation {
        path: String,
        #[source]
        source: InterpolationError,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Loads the configuration of `options.config_path`.
///
/// A missing file, or a current-format file holding only variables, yields an
/// empty configuration.
pub fn read_config(options: &RuntimeOptions) -> ConfigResult<EffectiveConfig> {
    let path = &options.config_path;
    if !path.is_file() {
        options
            .logger
            .debug(format!("No configuration file at {}", path.display()));
        return Ok(EffectiveConfig::default());
    }

    match parse_config_file(path, options) {
        Err(ConfigError::ConfigNotFoundInFile { path: missing })
            if missing == path.display().to_string() =>
        {
            options
                .logger
                .debug(format!("{} holds no {} section", missing, CONFIG_SECTION_KEY));
            Ok(EffectiveConfig::default())
        }
        other => other,
    }
}

/// Reads and parses the configuration file at `path`.
pub fn parse_config_file(path: &Path, options: &RuntimeOptions) -> ConfigResult<EffectiveConfig> {
    let text = read_text(path)?;
    parse_config_string(&text, options, &IncludeSpec::new(path))
}

/// Parses `text` as the content of `include.path`, evaluated for `options`.
///
/// A current-format text without a `terragrunt` section is an error here.
pub fn parse_config_string(
    text: &str,
    options: &RuntimeOptions,
    include: &IncludeSpec,
) -> ConfigResult<EffectiveConfig> {
    let mut config = parse_with_includes(text, options, include, 0)?;
    merge_boot_configs(&mut config, options)?;
    config.init(&options.config_path);
    Ok(config)
}

fn parse_with_includes(
    text: &str,
    options: &RuntimeOptions,
    include: &IncludeSpec,
    depth: u32,
) -> ConfigResult<EffectiveConfig> {
    let body = decode_body(text, options, include)?;
    let include_block = body.include.clone();
    let mut config = EffectiveConfig::from_body(body, &include.path)?;

    if let Some(block) = include_block {
        let declaring = include.path.display().to_string();
        let raw_path = block
            .path
            .filter(|path| !path.trim().is_empty())
            .ok_or_else(|| ConfigError::IncludedConfigMissingPath {
                path: declaring.clone(),
            })?;
        if depth >= MAX_INCLUDE_DEPTH {
            return Err(ConfigError::IncludeDepthExceeded {
                path: declaring,
                depth,
            });
        }

        let parent_path = resolve_include_path(&include.path, &raw_path);
        options
            .logger
            .debug(format!("Including {} in {}", parent_path.display(), declaring));
        let parent_text = read_text(&parent_path)?;
        let parent = parse_with_includes(
            &parent_text,
            options,
            &IncludeSpec::new(parent_path),
            depth + 1,
        )?;
        config.merge_included(parent, &options.logger);
    }

    Ok(config)
}

/// Merges every configuration listed in the boot variable, in order.
fn merge_boot_configs(config: &mut EffectiveConfig, options: &RuntimeOptions) -> ConfigResult<()> {
    let Some(list) = options.env.get(BOOT_CONFIGS_ENV_VAR) else {
        return Ok(());
    };
    for path in std::env::split_paths(list) {
        if path.as_os_str().is_empty() {
            continue;
        }
        if !path.is_file() {
            options
                .logger
                .warn(format!("Boot configuration {} does not exist", path.display()));
            continue;
        }
        let text = read_text(&path)?;
        let boot = parse_with_includes(&text, options, &IncludeSpec::new(path), 1)?;
        config.merge_included(boot, &options.logger);
    }
    Ok(())
}

/// `raw` relative to the directory of the file declaring it.
/// Top-level variable assignments of a `.tfvars` file, wrapper section excluded.
/// Values are not interpolated.
pub fn load_tfvars(path: &Path) -> ConfigResult<IndexMap<String, hcl::Value>> {
    let text = read_text(path)?;
    let normalized = SECTION_ASSIGNMENT_RE.replace_all(&text, format!("${{1}}{} {{", CONFIG_SECTION_KEY));
    let mut values: IndexMap<String, hcl::Value> =
        hcl::from_str(&normalized).map_err(|source| ConfigError::Decode {
            path: path.display().to_string(),
            source,
        })?;
    values.shift_remove(CONFIG_SECTION_KEY);
    Ok(values)
}

/// Imports the variables of the configuration file, when it is a `.tfvars` file, and
/// of every `-var-file` of the command line. Files that cannot be loaded are skipped
/// with a warning.
pub fn import_var_files(options: &mut RuntimeOptions) {
    let mut files = Vec::new();
    if !paths::is_legacy_config(&options.config_path) && options.config_path.is_file() {
        files.push(options.config_path.clone());
    }
    files.extend(options.var_files_from_cli());

    for file in files {
        match load_tfvars(&file) {
            Ok(values) => {
                for (name, value) in values {
                    options.set_variable(name, config_resolver::render_value(&value), VariableSource::VarFile);
                }
            }
            Err(err) => options.logger.warn(format!("Skipping variables of {}: {}", file.display(), err)),
        }
    }
}

fn resolve_include_path(declaring_file: &Path, raw: &str) -> PathBuf {
    let raw = Path::new(raw);
    if raw.is_absolute() {
        paths::clean_path(raw)
    } else {
        paths::clean_path(&paths::parent_dir(declaring_file).join(raw))
    }
}

fn read_text(path: &Path) -> ConfigResult<String> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Evaluates the helpers of `text` and decodes the wrapper settings it holds.
fn decode_body(text: &str, options: &RuntimeOptions, include: &IncludeSpec) -> ConfigResult<ConfigBody> {
    let path = include.path.display().to_string();
    let resolved = Interpolator::new(options, include)
        .resolve(text)
        .map_err(|source| ConfigError::Interpolation {
            path: path.clone(),
            source,
        })?;
    let normalized = SECTION_ASSIGNMENT_RE.replace_all(&resolved, format!("${{1}}{} {{", CONFIG_SECTION_KEY));
    let file: ConfigFile = hcl::from_str(&normalized).map_err(|source| ConfigError::Decode {
        path: path.clone(),
        source,
    })?;

    let legacy = paths::is_legacy_config(&include.path);
    match file.terragrunt {
        Some(body) => Ok(body),
        None if legacy => Ok(file.into_legacy_body()),
        None => Err(ConfigError::ConfigNotFoundInFile { path }),
    }
}
