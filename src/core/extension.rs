// src/core/extension.rs

//! The contract shared by every extension kind (hooks, extra arguments and extra
//! commands). `ExtensionList` only ever talks to items through [`Extension`].

use crate::core::options::{Logger, RuntimeOptions};
use colored::Colorize;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// Where items unique to the child land relative to the inherited ones on merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// `child-only items ++ inherited items`
    Append,
    /// `inherited items ++ child-only items`
    Prepend,
}

/// Attributes common to every extension block.
#[derive(Debug, Clone, Default)]
pub struct ExtensionBase {
    /// Declared label of the block.
    pub name: String,
    pub id: Option<String>,
    pub description: Option<String>,
    /// Operating systems on which the item is active. Absent means all.
    pub os: Option<Vec<String>>,
    pub disabled: bool,
    /// Configuration file that owns the item. A plain path, not a handle on the config.
    pub owner: Option<PathBuf>,
}

impl PartialEq for ExtensionBase {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.id == other.id
            && self.description == other.description
            && self.os == other.os
            && self.disabled == other.disabled
    }
}

impl ExtensionBase {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }

    pub fn enabled(&self) -> bool {
        if self.disabled {
            return false;
        }
        match &self.os {
            Some(systems) => systems.iter().any(|os| matches_current_os(os)),
            None => true,
        }
    }
}

/// Matches an `os` filter entry against the running platform.
/// `darwin` is accepted as a synonym for `macos`.
fn matches_current_os(os: &str) -> bool {
    let os = os.trim().to_lowercase();
    let current = std::env::consts::OS;
    os == current || (os == "darwin" && current == "macos")
}

/// Formats an item id as a section title for help output.
pub fn title_id(id: &str) -> String {
    id.yellow().bold().to_string()
}

/// Capability set used by the generic list engine.
pub trait Extension: Debug + Clone {
    /// Result produced by one successful `run`.
    type Output;

    /// Human label of the kind, used in logs, help and error messages.
    const ITEM_TYPE: &'static str;

    /// Placement of child-only items when merging with an inherited list.
    const MERGE_MODE: MergeMode;

    fn base(&self) -> &ExtensionBase;

    fn base_mut(&mut self) -> &mut ExtensionBase;

    fn id(&self) -> &str {
        self.base().id()
    }

    fn name(&self) -> &str {
        &self.base().name
    }

    fn item_type(&self) -> &'static str {
        Self::ITEM_TYPE
    }

    fn enabled(&self) -> bool {
        self.base().enabled()
    }

    /// Fills in computed defaults. Must be idempotent.
    fn normalize(&mut self) {}

    /// Items returning `true` still run after an earlier item of the same list failed.
    fn ignore_error(&self) -> bool {
        false
    }

    /// Binds the item to the configuration file that ultimately owns it.
    fn init(&mut self, owner: &Path) {
        self.base_mut().owner = Some(owner.to_path_buf());
    }

    fn logger<'a>(&self, options: &'a RuntimeOptions) -> &'a Logger {
        &options.logger
    }

    fn run(&mut self, options: &RuntimeOptions, args: &[String]) -> anyhow::Result<Self::Output>;

    fn extra_info(&self) -> String {
        String::new()
    }

    fn help(&self) -> String {
        self.base().description.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_defaults_to_name() {
        let mut base = ExtensionBase::named("fmt");
        assert_eq!(base.id(), "fmt");
        base.id = Some("format".to_string());
        assert_eq!(base.id(), "format");
    }

    #[test]
    fn test_enabled_respects_disabled_flag() {
        let mut base = ExtensionBase::named("fmt");
        assert!(base.enabled());
        base.disabled = true;
        assert!(!base.enabled());
    }

    #[test]
    fn test_enabled_respects_os_filter() {
        let mut base = ExtensionBase::named("fmt");
        base.os = Some(vec![std::env::consts::OS.to_string()]);
        assert!(base.enabled());
        base.os = Some(vec!["plan9".to_string()]);
        assert!(!base.enabled());
        base.os = Some(Vec::new());
        assert!(!base.enabled());
    }

    #[test]
    fn test_equality_ignores_owner() {
        let mut left = ExtensionBase::named("fmt");
        let right = ExtensionBase::named("fmt");
        left.owner = Some(PathBuf::from("/infra/terraform.tfvars"));
        assert_eq!(left, right);
    }
}
