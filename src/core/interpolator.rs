// src/core/interpolator.rs

//! Expansion of `${helper(args)}` calls in raw configuration text, before decoding.

use crate::constants::{DEFAULT_CONFIG_FILENAME, TERRAFORM_COMMANDS_WITH_VAR_FILE};
use crate::core::config_resolver::IncludeSpec;
use crate::core::options::RuntimeOptions;
use crate::core::paths;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use thiserror::Error;

lazy_static! {
    // A helper call, with the quotes around it when it makes up a whole string.
    // A leading `$` marks the escaped form `$${...}`, which is left untouched.
    static ref HELPER_RE: Regex =
        Regex::new(r#"(")?(\$)?\$\{\s*(\w+)\s*\(([^)]*)\)\s*\}(")?"#).unwrap();
    static ref QUOTED_ARG_RE: Regex = Regex::new(r#""((?:[^"\\]|\\.)*)""#).unwrap();
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum InterpolationError {
    #[error("Unknown helper function: {name}")]
    UnknownHelperFunction { name: String },
    #[error("Invalid arguments for {name}: ({args})")]
    InvalidArguments { name: String, args: String },
    #[error("Environment variable '{name}' is not set and has no default")]
    EnvVarNotFound { name: String },
    #[error("Terraform variable '{name}' is not defined and has no default")]
    VariableNotFound { name: String },
    #[error("Could not find a {filename} in any of the parent folders of {path}")]
    ParentConfigNotFound { filename: String, path: String },
    #[error("{name}() returns a list and can only be used as a whole list element")]
    ListInString { name: String },
}

type InterpolationResult<T> = Result<T, InterpolationError>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum HelperValue {
    Text(String),
    List(Vec<String>),
}

/// Context in which the helpers of one file are evaluated.
#[derive(Debug, Clone, Copy)]
pub struct Interpolator<'a> {
    options: &'a RuntimeOptions,
    /// The file being parsed; the root configuration or an included parent.
    include: &'a IncludeSpec,
}

impl<'a> Interpolator<'a> {
    pub fn new(options: &'a RuntimeOptions, include: &'a IncludeSpec) -> Self {
        Self { options, include }
    }

    /// Replaces every helper call in `text`.
    ///
    /// A call forming a whole quoted string is replaced, quotes included, by a
    /// literal; list values become the comma separated items of the enclosing list.
    /// Calls embedded in longer strings are replaced by their escaped text.
    pub fn resolve(&self, text: &str) -> InterpolationResult<String> {
        try_replace_all(&HELPER_RE, text, |caps| {
            let whole = capture(caps, 0);
            if caps.get(2).is_some() {
                return Ok(whole.to_string());
            }
            let open = capture(caps, 1);
            let close = capture(caps, 5);

            match self.call(caps)? {
                HelperValue::Text(value) if !open.is_empty() && !close.is_empty() => Ok(quote(&value)),
                HelperValue::List(values) if !open.is_empty() && !close.is_empty() => Ok(values
                    .iter()
                    .map(|value| quote(value))
                    .collect::<Vec<_>>()
                    .join(", ")),
                HelperValue::Text(value) => Ok(format!("{}{}{}", open, escape(&value), close)),
                HelperValue::List(_) => Err(InterpolationError::ListInString {
                    name: capture(caps, 3).to_string(),
                }),
            }
        })
    }

    fn call(&self, caps: &Captures<'_>) -> InterpolationResult<HelperValue> {
        let name = capture(caps, 3);
        let raw_args = capture(caps, 4);
        let args = parse_arguments(name, raw_args)?;
        let invalid = || InterpolationError::InvalidArguments {
            name: name.to_string(),
            args: raw_args.to_string(),
        };

        match (name, args.as_slice()) {
            ("find_in_parent_folders", []) => self.find_in_parent_folders().map(HelperValue::Text),
            ("path_relative_to_include", []) => Ok(HelperValue::Text(self.path_relative_to_include())),
            ("path_relative_from_include", []) => {
                Ok(HelperValue::Text(self.path_relative_from_include()))
            }
            ("get_env", [var]) => self.get_env(var, None).map(HelperValue::Text),
            ("get_env", [var, default]) => self.get_env(var, Some(default)).map(HelperValue::Text),
            ("get_var", [var]) => self.get_var(var, None).map(HelperValue::Text),
            ("get_var", [var, default]) => self.get_var(var, Some(default)).map(HelperValue::Text),
            ("get_tfvars_dir", []) => Ok(HelperValue::Text(paths::to_slash(&paths::parent_dir(
                &self.options.config_path,
            )))),
            ("get_parent_tfvars_dir", []) => Ok(HelperValue::Text(paths::to_slash(
                &paths::parent_dir(&self.include.path),
            ))),
            ("get_terraform_commands_that_need_vars", []) => Ok(HelperValue::List(
                TERRAFORM_COMMANDS_WITH_VAR_FILE
                    .iter()
                    .map(|cmd| cmd.to_string())
                    .collect(),
            )),
            (
                "find_in_parent_folders"
                | "path_relative_to_include"
                | "path_relative_from_include"
                | "get_env"
                | "get_var"
                | "get_tfvars_dir"
                | "get_parent_tfvars_dir"
                | "get_terraform_commands_that_need_vars",
                _,
            ) => Err(invalid()),
            _ => Err(InterpolationError::UnknownHelperFunction {
                name: name.to_string(),
            }),
        }
    }

    /// Path of the nearest parent configuration, relative to the file being parsed.
    fn find_in_parent_folders(&self) -> InterpolationResult<String> {
        let found = paths::find_in_parent_folders(&self.include.path).ok_or_else(|| {
            InterpolationError::ParentConfigNotFound {
                filename: DEFAULT_CONFIG_FILENAME.to_string(),
                path: self.include.path.display().to_string(),
            }
        })?;
        let from = paths::parent_dir(&self.include.path);
        let dir = paths::parent_dir(&found);
        let relative = paths::relative_path(&from, &dir);
        let file_name = found
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(paths::to_slash(&paths::clean_path(&relative.join(file_name))))
    }

    fn path_relative_to_include(&self) -> String {
        let include_dir = paths::parent_dir(&self.include.path);
        let config_dir = paths::parent_dir(&self.options.config_path);
        paths::to_slash(&paths::relative_path(&include_dir, &config_dir))
    }

    fn path_relative_from_include(&self) -> String {
        let include_dir = paths::parent_dir(&self.include.path);
        let config_dir = paths::parent_dir(&self.options.config_path);
        paths::to_slash(&paths::relative_path(&config_dir, &include_dir))
    }

    fn get_env(&self, name: &str, default: Option<&str>) -> InterpolationResult<String> {
        self.options
            .env
            .get(name)
            .cloned()
            .or_else(|| default.map(str::to_string))
            .ok_or_else(|| InterpolationError::EnvVarNotFound {
                name: name.to_string(),
            })
    }

    fn get_var(&self, name: &str, default: Option<&str>) -> InterpolationResult<String> {
        self.options
            .variable(name)
            .or(default)
            .map(str::to_string)
            .ok_or_else(|| InterpolationError::VariableNotFound {
                name: name.to_string(),
            })
    }
}

fn capture<'t>(caps: &Captures<'t>, index: usize) -> &'t str {
    caps.get(index).map(|m| m.as_str()).unwrap_or_default()
}

/// Parses a comma separated list of double-quoted arguments.
fn parse_arguments(name: &str, raw: &str) -> InterpolationResult<Vec<String>> {
    let args: Vec<String> = QUOTED_ARG_RE
        .captures_iter(raw)
        .map(|caps| capture(&caps, 1).replace("\\\"", "\"").replace("\\\\", "\\"))
        .collect();
    let leftover = QUOTED_ARG_RE.replace_all(raw, "");
    if leftover.chars().any(|c| !c.is_whitespace() && c != ',') {
        return Err(InterpolationError::InvalidArguments {
            name: name.to_string(),
            args: raw.to_string(),
        });
    }
    Ok(args)
}

/// Escapes `value` for use inside an HCL string literal.
fn escape(value: &str) -> String {
    let quoted = quote(value);
    quoted
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(&quoted)
        .to_string()
}

/// Renders `value` as an HCL string literal.
fn quote(value: &str) -> String {
    let json = serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value));
    json.replace("${", "$${").replace("%{", "%%{")
}

fn try_replace_all<F>(re: &Regex, text: &str, mut replacement: F) -> InterpolationResult<String>
where
    F: FnMut(&Captures<'_>) -> InterpolationResult<String>,
{
    let mut result = String::with_capacity(text.len());
    let mut last = 0;
    for caps in re.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        result.push_str(text.get(last..whole.start()).unwrap_or_default());
        result.push_str(&replacement(&caps)?);
        last = whole.end();
    }
    result.push_str(text.get(last..).unwrap_or_default());
    Ok(result)
}
