// src/system/shell.rs

//! Helpers shared by everything that turns declared arguments into a process argv.

use crate::constants::{SCRIPT_SHELL, SHELL_METACHARACTERS};
use std::path::{Path, PathBuf};

const GLOB_CHARACTERS: &[char] = &['*', '?', '['];

/// True if `value` must be run through a shell rather than executed directly.
pub fn has_shell_metacharacters(value: &str) -> bool {
    value.contains(SHELL_METACHARACTERS)
}

/// Wraps `value` in double quotes when it contains whitespace.
pub fn quote_argument(value: &str) -> String {
    if value.contains(char::is_whitespace) {
        format!("\"{}\"", value.replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

/// Arguments making the script shell run `script`.
pub fn script_arguments(script: &str) -> Vec<String> {
    vec!["-c".to_string(), script.to_string()]
}

/// `(program, args)` running `script` through the script shell.
pub fn script_command(script: &str) -> (String, Vec<String>) {
    (SCRIPT_SHELL.to_string(), script_arguments(script))
}

/// Expands `~`, environment variables and glob patterns in each argument.
///
/// Variables that cannot be resolved leave the argument as written. Patterns are
/// matched relative to `working_dir`; a pattern matching nothing stays literal.
pub fn expand_arguments(args: &[String], working_dir: &Path) -> Vec<String> {
    let mut expanded_args = Vec::with_capacity(args.len());
    for arg in args {
        let expanded = match shellexpand::full(arg) {
            Ok(value) => value.into_owned(),
            Err(err) => {
                log::debug!("Leaving argument '{}' unexpanded: {}", arg, err);
                arg.clone()
            }
        };

        if expanded.contains(char::is_whitespace) || !expanded.contains(GLOB_CHARACTERS) {
            expanded_args.push(expanded);
            continue;
        }

        let matches = glob_relative(&expanded, working_dir);
        if matches.is_empty() {
            expanded_args.push(expanded);
        } else {
            expanded_args.extend(matches);
        }
    }
    expanded_args
}

fn glob_relative(pattern: &str, working_dir: &Path) -> Vec<String> {
    let is_absolute = Path::new(pattern).is_absolute();
    let full_pattern: PathBuf = if is_absolute {
        PathBuf::from(pattern)
    } else {
        working_dir.join(pattern)
    };

    let paths = match glob::glob(&full_pattern.to_string_lossy()) {
        Ok(paths) => paths,
        Err(err) => {
            log::debug!("Invalid glob pattern '{}': {}", pattern, err);
            return Vec::new();
        }
    };

    let mut matches: Vec<String> = paths
        .filter_map(Result::ok)
        .map(|path| {
            if is_absolute {
                path
            } else {
                path.strip_prefix(working_dir)
                    .map(Path::to_path_buf)
                    .unwrap_or(path)
            }
        })
        .map(|path| path.to_string_lossy().into_owned())
        .collect();
    matches.sort();
    matches
}
