// src/core/extension_list.rs

//! Generic merge, filtering and execution of an ordered list of extension items.

use crate::core::extension::{Extension, MergeMode, title_id};
use crate::core::options::{Logger, RuntimeOptions};
use crate::system::executor::ExecutionError;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtensionError {
    #[error("Error while executing {item_type}({id}): {source}")]
    Failed {
        item_type: &'static str,
        id: String,
        #[source]
        source: anyhow::Error,
    },
    /// A plan that reported changes. Informational, never stops the list.
    #[error("{0}")]
    PlanWithChanges(#[source] anyhow::Error),
    #[error("{}", format_multiple(.0))]
    Multiple(Vec<ExtensionError>),
}

fn format_multiple(errors: &[ExtensionError]) -> String {
    let mut message = format!("{} errors occurred:", errors.len());
    for error in errors {
        message.push_str("\n  * ");
        message.push_str(&error.to_string());
    }
    message
}

impl ExtensionError {
    /// Collapses collected errors: nothing, the single error, or a `Multiple`.
    pub fn aggregate(mut errors: Vec<Self>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Multiple(errors)),
        }
    }

    /// True when every error carried here only reports plan changes.
    pub fn is_plan_with_changes(&self) -> bool {
        match self {
            Self::PlanWithChanges(_) => true,
            Self::Failed { .. } => false,
            Self::Multiple(errors) => errors.iter().all(Self::is_plan_with_changes),
        }
    }

    /// Flattens nested aggregates.
    pub fn errors(&self) -> Vec<&Self> {
        match self {
            Self::Multiple(errors) => errors.iter().flat_map(Self::errors).collect(),
            other => vec![other],
        }
    }
}

/// Whether `error` (or anything it wraps) is the "plan produced changes" signal.
pub fn is_plan_with_changes(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<ExecutionError>(),
            Some(ExecutionError::PlanWithChanges { .. })
        )
    })
}

/// An ordered list of extension items of one kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionList<T: Extension> {
    items: Vec<T>,
}

impl<T: Extension> Default for ExtensionList<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Extension> FromIterator<T> for ExtensionList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<T: Extension> IntoIterator for ExtensionList<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<T: Extension> ExtensionList<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(Extension::id).collect()
    }

    /// Binds every item to the configuration file that owns the list.
    pub fn init(&mut self, owner: &Path) {
        for item in &mut self.items {
            item.init(owner);
        }
    }

    /// Merges the list inherited from a parent configuration into this one.
    ///
    /// A child item always wins over a parent item with the same id, but takes the
    /// parent's position among the inherited items. Items only declared by the child
    /// go before (`Append`) or after (`Prepend`) the inherited block.
    pub fn merge(&mut self, imported: Self, logger: &Logger) {
        if imported.is_empty() {
            return;
        }
        if self.is_empty() {
            self.items = imported.items;
            return;
        }

        let mut index: HashMap<String, usize> = self
            .items
            .iter()
            .enumerate()
            .map(|(pos, item)| (item.id().to_string(), pos))
            .collect();
        let mut current: Vec<Option<T>> = self.items.drain(..).map(Some).collect();
        let mut staging = Vec::with_capacity(imported.len() + current.len());

        for inherited in imported.items {
            let overriding = index
                .remove(inherited.id())
                .and_then(|pos| current.get_mut(pos))
                .and_then(Option::take);
            match overriding {
                Some(item) => {
                    logger.debug(format!(
                        "Skipping {} {} as it is overridden in the current config",
                        T::ITEM_TYPE,
                        item.id()
                    ));
                    staging.push(item);
                }
                None => staging.push(inherited),
            }
        }

        let survivors = current.into_iter().flatten();
        self.items = match T::MERGE_MODE {
            MergeMode::Append => survivors.chain(staging).collect(),
            MergeMode::Prepend => staging.into_iter().chain(survivors).collect(),
        };
    }

    /// Items active on this platform, normalized.
    pub fn enabled(&self) -> Vec<T> {
        self.items
            .iter()
            .filter(|item| item.enabled())
            .cloned()
            .map(|mut item| {
                item.normalize();
                item
            })
            .collect()
    }

    /// Runs every enabled item in name order. The list keeps its declaration order.
    ///
    /// Once an item fails (or if `status` already carries an error), the remaining
    /// items are skipped unless they ignore errors. Every error is collected; plan
    /// changes are collected without counting as a failure.
    pub fn run(
        &self,
        status: Option<&anyhow::Error>,
        options: &RuntimeOptions,
        args: &[String],
    ) -> (Vec<T::Output>, Option<ExtensionError>) {
        let mut items = self.enabled();
        items.sort_by(|a, b| a.name().cmp(b.name()));

        let mut results = Vec::new();
        let mut errors = Vec::new();
        let mut failed = status.is_some();

        for mut item in items {
            if failed && !item.ignore_error() {
                item.logger(options).debug(format!(
                    "Skipping {}({}) because of a previous error",
                    T::ITEM_TYPE,
                    item.id()
                ));
                continue;
            }

            match item.run(options, args) {
                Ok(output) => results.push(output),
                Err(err) if is_plan_with_changes(&err) => {
                    errors.push(ExtensionError::PlanWithChanges(err));
                }
                Err(err) => {
                    failed = true;
                    errors.push(ExtensionError::Failed {
                        item_type: T::ITEM_TYPE,
                        id: item.id().to_string(),
                        source: err,
                    });
                }
            }
        }

        (results, ExtensionError::aggregate(errors))
    }

    /// Renders help for the enabled items matching any of `lookups` (all if empty).
    pub fn help(&self, list_only: bool, lookups: &[String]) -> String {
        let mut items = self.enabled();
        items.sort_by(|a, b| a.name().cmp(b.name()));

        let selected: Vec<(T, String)> = items
            .into_iter()
            .map(|item| {
                let extra = item.extra_info();
                (item, extra)
            })
            .filter(|(item, extra)| {
                lookups.is_empty()
                    || lookups.iter().any(|lookup| {
                        item.name().contains(lookup.as_str())
                            || item.id().contains(lookup.as_str())
                            || extra.contains(lookup.as_str())
                    })
            })
            .collect();

        let display_name = |item: &T| {
            if item.name() == item.id() {
                String::new()
            } else {
                item.name().to_string()
            }
        };

        let mut result = String::new();
        if list_only {
            let id_width = selected
                .iter()
                .map(|(item, _)| item.id().len())
                .max()
                .unwrap_or_default()
                .max(30);
            let name_width = selected
                .iter()
                .map(|(item, _)| display_name(item).len())
                .max()
                .unwrap_or_default();
            for (item, extra) in &selected {
                let id = format!("{:<id_width$}", item.id());
                let line = format!(
                    "{} {:<name_width$} {}",
                    title_id(&id),
                    display_name(item),
                    extra
                );
                result.push_str(line.trim_end());
                result.push('\n');
            }
        } else {
            for (item, extra) in &selected {
                let name = display_name(item);
                let mut header = title_id(item.id());
                if !name.is_empty() {
                    header.push(' ');
                    header.push_str(&name);
                }
                if !extra.is_empty() {
                    header.push(' ');
                    header.push_str(extra);
                }
                result.push_str(&format!("\n{}\n{}\n", header, item.help()));
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::extension::ExtensionBase;
    use anyhow::anyhow;

    #[derive(Debug, Clone, PartialEq)]
    enum Behavior {
        Succeed,
        Fail,
        PlanChanges,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Item<const PREPEND: bool> {
        base: ExtensionBase,
        value: String,
        behavior: Behavior,
        ignore_error: bool,
        normalized: bool,
    }

    type AppendItem = Item<false>;
    type PrependItem = Item<true>;

    impl<const PREPEND: bool> Item<PREPEND> {
        fn new(name: &str, value: &str) -> Self {
            Self {
                base: ExtensionBase::named(name),
                value: value.to_string(),
                behavior: Behavior::Succeed,
                ignore_error: false,
                normalized: false,
            }
        }

        fn failing(mut self) -> Self {
            self.behavior = Behavior::Fail;
            self
        }

        fn ignoring_errors(mut self) -> Self {
            self.ignore_error = true;
            self
        }
    }

    impl<const PREPEND: bool> Extension for Item<PREPEND> {
        type Output = String;
        const ITEM_TYPE: &'static str = "item";
        const MERGE_MODE: MergeMode = if PREPEND {
            MergeMode::Prepend
        } else {
            MergeMode::Append
        };

        fn base(&self) -> &ExtensionBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut ExtensionBase {
            &mut self.base
        }

        fn normalize(&mut self) {
            self.normalized = true;
        }

        fn ignore_error(&self) -> bool {
            self.ignore_error
        }

        fn extra_info(&self) -> String {
            format!("[{}]", self.value)
        }

        fn run(&mut self, _options: &RuntimeOptions, _args: &[String]) -> anyhow::Result<String> {
            match self.behavior {
                Behavior::Succeed => Ok(self.name().to_string()),
                Behavior::Fail => Err(anyhow!("boom")),
                Behavior::PlanChanges => Err(ExecutionError::PlanWithChanges {
                    command: "terraform plan".to_string(),
                }
                .into()),
            }
        }
    }

    fn values<const P: bool>(list: &ExtensionList<Item<P>>) -> Vec<String> {
        list.iter()
            .map(|item| format!("{}={}", item.id(), item.value))
            .collect()
    }

    fn options() -> RuntimeOptions {
        RuntimeOptions::new("/infra/terraform.tfvars")
    }

    // --- merge ---

    #[test]
    fn test_merge_append_places_child_only_items_first() {
        // --- Setup ---
        let mut child = ExtensionList::new(vec![AppendItem::new("B", "child"), AppendItem::new("D", "child")]);
        let parent = ExtensionList::new(vec![
            AppendItem::new("A", "parent"),
            AppendItem::new("B", "parent"),
            AppendItem::new("C", "parent"),
        ]);

        // --- Execute ---
        child.merge(parent, &Logger::default());

        // --- Assert ---
        assert_eq!(values(&child), vec!["D=child", "A=parent", "B=child", "C=parent"]);
    }

    #[test]
    fn test_merge_prepend_places_child_only_items_last() {
        let mut child = ExtensionList::new(vec![PrependItem::new("B", "child"), PrependItem::new("D", "child")]);
        let parent = ExtensionList::new(vec![
            PrependItem::new("A", "parent"),
            PrependItem::new("B", "parent"),
            PrependItem::new("C", "parent"),
        ]);

        child.merge(parent, &Logger::default());

        assert_eq!(values(&child), vec!["A=parent", "B=child", "C=parent", "D=child"]);
    }

    #[test]
    fn test_merge_override_keeps_single_child_value() {
        let mut child = ExtensionList::new(vec![AppendItem::new("X", "v1")]);
        let parent = ExtensionList::new(vec![AppendItem::new("X", "v2")]);

        child.merge(parent, &Logger::default());

        assert_eq!(values(&child), vec!["X=v1"]);
    }

    #[test]
    fn test_merge_uses_id_not_name_as_key() {
        let mut renamed = AppendItem::new("local-fmt", "child");
        renamed.base.id = Some("fmt".to_string());
        let mut child = ExtensionList::new(vec![renamed]);
        let parent = ExtensionList::new(vec![AppendItem::new("fmt", "parent")]);

        child.merge(parent, &Logger::default());

        assert_eq!(values(&child), vec!["fmt=child"]);
        assert_eq!(child.items()[0].name(), "local-fmt");
    }

    #[test]
    fn test_merge_with_empty_sides() {
        let parent = ExtensionList::new(vec![AppendItem::new("A", "parent")]);

        let mut empty_child = ExtensionList::default();
        empty_child.merge(parent.clone(), &Logger::default());
        assert_eq!(empty_child, parent);

        let mut child = ExtensionList::new(vec![AppendItem::new("B", "child")]);
        let before = child.clone();
        child.merge(ExtensionList::default(), &Logger::default());
        assert_eq!(child, before);

        let mut nothing: ExtensionList<AppendItem> = ExtensionList::default();
        nothing.merge(ExtensionList::default(), &Logger::default());
        assert!(nothing.is_empty());
    }

    #[test]
    fn test_merge_disjoint_lists() {
        let mut child = ExtensionList::new(vec![PrependItem::new("childArgs", "c")]);
        let parent = ExtensionList::new(vec![PrependItem::new("parentArgs", "p")]);

        child.merge(parent, &Logger::default());

        assert_eq!(child.ids(), vec!["parentArgs", "childArgs"]);
    }

    // --- enabled ---

    #[test]
    fn test_enabled_filters_and_normalizes() {
        let mut foreign = AppendItem::new("foreign", "x");
        foreign.base.os = Some(vec!["plan9".to_string()]);
        let list = ExtensionList::new(vec![AppendItem::new("local", "x"), foreign]);

        let enabled = list.enabled();

        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].name(), "local");
        assert!(enabled[0].normalized);
        assert!(!list.items()[0].normalized);
    }

    // --- run ---

    #[test]
    fn test_run_sorts_by_name_and_collects_results() {
        let list = ExtensionList::new(vec![
            AppendItem::new("c", "x"),
            AppendItem::new("a", "x"),
            AppendItem::new("b", "x"),
        ]);

        let (results, error) = list.run(None, &options(), &[]);

        assert_eq!(results, vec!["a", "b", "c"]);
        assert!(error.is_none());
    }

    #[test]
    fn test_run_keeps_declaration_order_of_the_list() {
        let list = ExtensionList::new(vec![
            AppendItem::new("c", "x"),
            AppendItem::new("a", "x"),
            AppendItem::new("b", "x"),
        ]);

        let _ = list.run(None, &options(), &[]);
        let _ = list.run(None, &options(), &[]);

        assert_eq!(list.ids(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_run_skips_after_failure_unless_ignore_error() {
        // --- Setup ---
        let list = ExtensionList::new(vec![
            AppendItem::new("1", "x"),
            AppendItem::new("2", "x").failing(),
            AppendItem::new("3", "x").ignoring_errors(),
            AppendItem::new("4", "x"),
        ]);

        // --- Execute ---
        let (results, error) = list.run(None, &options(), &[]);

        // --- Assert ---
        assert_eq!(results, vec!["1", "3"]);
        match error {
            Some(ExtensionError::Failed { item_type, id, .. }) => {
                assert_eq!(item_type, "item");
                assert_eq!(id, "2");
            }
            other => panic!("expected a single wrapped error, got {:?}", other),
        }
    }

    #[test]
    fn test_run_error_message_names_the_item() {
        let list = ExtensionList::new(vec![AppendItem::new("broken", "x").failing()]);

        let (_, error) = list.run(None, &options(), &[]);

        assert_eq!(
            error.unwrap().to_string(),
            "Error while executing item(broken): boom"
        );
    }

    #[test]
    fn test_run_aggregates_multiple_errors() {
        let list = ExtensionList::new(vec![
            AppendItem::new("1", "x").failing(),
            AppendItem::new("2", "x").failing().ignoring_errors(),
        ]);

        let (results, error) = list.run(None, &options(), &[]);

        assert!(results.is_empty());
        let error = error.unwrap();
        assert!(matches!(error, ExtensionError::Multiple(ref errors) if errors.len() == 2));
        assert!(error.to_string().starts_with("2 errors occurred:"));
    }

    #[test]
    fn test_run_plan_changes_do_not_skip_following_items() {
        let mut changes = AppendItem::new("1", "x");
        changes.behavior = Behavior::PlanChanges;
        let list = ExtensionList::new(vec![changes, AppendItem::new("2", "x")]);

        let (results, error) = list.run(None, &options(), &[]);

        assert_eq!(results, vec!["2"]);
        let error = error.unwrap();
        assert!(error.is_plan_with_changes());
    }

    #[test]
    fn test_run_with_incoming_status_only_runs_ignore_error_items() {
        let list = ExtensionList::new(vec![
            AppendItem::new("cleanup", "x").ignoring_errors(),
            AppendItem::new("notify", "x"),
        ]);
        let status = anyhow!("terraform failed");

        let (results, error) = list.run(Some(&status), &options(), &[]);

        assert_eq!(results, vec!["cleanup"]);
        assert!(error.is_none());
    }

    #[test]
    fn test_run_skips_disabled_items() {
        let mut foreign = AppendItem::new("foreign", "x");
        foreign.base.os = Some(vec!["windows".to_string()]);
        let list = ExtensionList::new(vec![foreign, AppendItem::new("local", "x")]);

        let (results, _) = list.run(None, &options(), &[]);

        if cfg!(windows) {
            assert_eq!(results, vec!["foreign", "local"]);
        } else {
            assert_eq!(results, vec!["local"]);
        }
    }

    // --- help ---

    #[test]
    fn test_help_filters_by_lookup() {
        let list = ExtensionList::new(vec![
            AppendItem::new("fmt", "format"),
            AppendItem::new("lint", "check"),
        ]);

        let help = list.help(true, &["form".to_string()]);

        assert!(help.contains("fmt"));
        assert!(!help.contains("lint"));
        assert_eq!(help.lines().count(), 1);
    }

    #[test]
    fn test_help_detailed_includes_item_help() {
        let mut item = AppendItem::new("fmt", "format");
        item.base.description = Some("Formats the code".to_string());
        let list = ExtensionList::new(vec![item]);

        let help = list.help(false, &[]);

        assert!(help.contains("fmt"));
        assert!(help.contains("[format]"));
        assert!(help.contains("Formats the code"));
    }

    #[test]
    fn test_help_hides_items_for_other_platforms() {
        let mut foreign = AppendItem::new("foreign", "x");
        foreign.base.os = Some(vec!["plan9".to_string()]);
        let list = ExtensionList::new(vec![foreign]);

        assert!(list.help(true, &[]).is_empty());
        assert!(list.help(false, &[]).is_empty());
    }
}
