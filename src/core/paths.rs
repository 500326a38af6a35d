// src/core/paths.rs

use crate::constants::{DEFAULT_CONFIG_FILENAME, MAX_PARENT_FOLDERS_TO_CHECK, OLD_CONFIG_FILENAME};
use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Resolves `.` and `..` components without touching the filesystem.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    cleaned.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    cleaned.pop();
                } else if !cleaned.has_root() {
                    cleaned.push("..");
                }
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    if cleaned.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        cleaned
    }
}

/// Makes `path` absolute against the current directory and cleans it.
pub fn absolute_path(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    dunce::simplified(&clean_path(&joined)).to_path_buf()
}

/// Directory containing `file`, as an absolute path.
pub fn parent_dir(file: &Path) -> PathBuf {
    let absolute = absolute_path(file);
    absolute
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or(absolute)
}

/// The path leading from directory `from` to directory `to`.
pub fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let from = absolute_path(from);
    let to = absolute_path(to);
    let from_components: Vec<Component<'_>> = from.components().collect();
    let to_components: Vec<Component<'_>> = to.components().collect();

    let common = from_components
        .iter()
        .zip(&to_components)
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..from_components.len() {
        relative.push("..");
    }
    for component in to_components.iter().skip(common) {
        relative.push(component.as_os_str());
    }
    if relative.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        relative
    }
}

/// Renders a path with `/` separators on every platform.
pub fn to_slash(path: &Path) -> String {
    path.to_string_lossy()
        .replace(std::path::MAIN_SEPARATOR, "/")
}

pub fn is_legacy_config(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name == OLD_CONFIG_FILENAME)
}

/// The configuration file governing `dir`: the current file name if present, the
/// legacy one otherwise, and the current name when neither exists.
pub fn default_config_path(dir: &Path) -> PathBuf {
    let current = dir.join(DEFAULT_CONFIG_FILENAME);
    if current.is_file() {
        return current;
    }
    let legacy = dir.join(OLD_CONFIG_FILENAME);
    if legacy.is_file() {
        return legacy;
    }
    current
}

fn existing_config_in(dir: &Path) -> Option<PathBuf> {
    [DEFAULT_CONFIG_FILENAME, OLD_CONFIG_FILENAME]
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Returns the nearest configuration file strictly above the directory of `file`.
pub fn find_in_parent_folders(file: &Path) -> Option<PathBuf> {
    let start = parent_dir(file);
    start
        .ancestors()
        .skip(1)
        .take(MAX_PARENT_FOLDERS_TO_CHECK)
        .find_map(existing_config_in)
}

/// Every configuration file under `root`, directories visited in lexical pre-order.
/// Within one directory the current file name comes before the legacy one.
pub fn find_config_files_in_path(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut config_files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }
        for name in [DEFAULT_CONFIG_FILENAME, OLD_CONFIG_FILENAME] {
            let candidate = entry.path().join(name);
            if candidate.is_file() {
                config_files.push(candidate);
            }
        }
    }
    Ok(config_files)
}
