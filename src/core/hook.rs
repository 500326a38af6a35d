// src/core/hook.rs

use crate::core::extension::{Extension, ExtensionBase, MergeMode};
use crate::core::options::RuntimeOptions;
use crate::system::executor::{self, Invocation, OutputMode};
use crate::system::shell;

/// A command run before or after the main command.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Hook {
    pub base: ExtensionBase,
    pub command: String,
    pub arguments: Vec<String>,
    /// Commands that trigger the hook. Empty means every command.
    pub on_commands: Vec<String>,
    pub expand_args: Option<bool>,
    pub ignore_error: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    Ran,
    /// The current command is not one of `on_commands`.
    Skipped,
}

impl Hook {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            base: ExtensionBase::named(name),
            command: command.into(),
            ..Self::default()
        }
    }

    pub fn applies_to(&self, command: &str) -> bool {
        self.on_commands.is_empty() || self.on_commands.iter().any(|c| c == command)
    }

    /// The process this hook starts when run from `options` with `extra` arguments.
    pub fn invocation(&self, options: &RuntimeOptions, extra: &[String]) -> Invocation {
        let mut arguments: Vec<String> = self.arguments.iter().chain(extra).cloned().collect();
        if self.expand_args.unwrap_or(false) {
            arguments = shell::expand_arguments(&arguments, &options.working_dir);
        }

        let (program, args) = if shell::has_shell_metacharacters(&self.command) {
            let mut script = self.command.clone();
            for arg in &arguments {
                script.push(' ');
                script.push_str(&shell::quote_argument(arg));
            }
            shell::script_command(&script)
        } else {
            (self.command.clone(), arguments)
        };

        Invocation {
            program,
            args,
            working_dir: options.working_dir.clone(),
            env: options.env_for_command(options.command()),
        }
    }
}

impl Extension for Hook {
    type Output = HookOutcome;
    const ITEM_TYPE: &'static str = "hook";
    const MERGE_MODE: MergeMode = MergeMode::Append;

    fn base(&self) -> &ExtensionBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ExtensionBase {
        &mut self.base
    }

    fn normalize(&mut self) {
        if self.expand_args.is_none() {
            self.expand_args = Some(false);
        }
    }

    fn ignore_error(&self) -> bool {
        self.ignore_error
    }

    fn run(&mut self, options: &RuntimeOptions, args: &[String]) -> anyhow::Result<HookOutcome> {
        if !self.applies_to(options.command()) {
            self.logger(options)
                .trace(format!("Hook {} does not apply to {}", self.id(), options.command()));
            return Ok(HookOutcome::Skipped);
        }
        let invocation = self.invocation(options, args);
        executor::run_command(&invocation, self.logger(options), OutputMode::RedirectToStderr)?;
        Ok(HookOutcome::Ran)
    }

    fn extra_info(&self) -> String {
        if self.on_commands.is_empty() {
            String::new()
        } else {
            format!("[{}]", self.on_commands.join(", "))
        }
    }

    fn help(&self) -> String {
        let mut help = self.base.description.clone().unwrap_or_default();
        if !help.is_empty() {
            help.push('\n');
        }
        let command_line = std::iter::once(self.command.as_str())
            .chain(self.arguments.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        help.push_str(&format!("Command: {}", command_line));
        help
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::extension_list::{ExtensionError, ExtensionList};

    fn options(command: &str) -> RuntimeOptions {
        let mut options = RuntimeOptions::new("/tmp/terraform.tfvars");
        options.terraform_cli_args = vec![command.to_string()];
        options
    }

    #[test]
    fn test_invocation_runs_plain_command_directly() {
        let mut hook = Hook::new("fmt", "terraform");
        hook.arguments = vec!["fmt".to_string()];

        let invocation = hook.invocation(&options("plan"), &[]);

        assert_eq!(invocation.program, "terraform");
        assert_eq!(invocation.args, vec!["fmt"]);
        assert_eq!(invocation.env.get("TFGRUNT_COMMAND").map(String::as_str), Some("plan"));
    }

    #[test]
    fn test_invocation_wraps_pipelines_in_shell() {
        let mut hook = Hook::new("notify", "echo done | tee");
        hook.arguments = vec!["out file.log".to_string()];

        let invocation = hook.invocation(&options("apply"), &[]);

        assert_eq!(invocation.program, "bash");
        assert_eq!(invocation.args, vec!["-c", "echo done | tee \"out file.log\""]);
    }

    #[test]
    fn test_applies_to() {
        let mut hook = Hook::new("fmt", "terraform");
        assert!(hook.applies_to("plan"));
        hook.on_commands = vec!["apply".to_string()];
        assert!(hook.applies_to("apply"));
        assert!(!hook.applies_to("plan"));
    }

    #[test]
    fn test_run_skips_other_commands() {
        let mut hook = Hook::new("fmt", "tfgrunt-no-such-program");
        hook.on_commands = vec!["apply".to_string()];

        let outcome = hook.run(&options("plan"), &[]).unwrap();

        assert_eq!(outcome, HookOutcome::Skipped);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut hook = Hook::new("fmt", "terraform");
        hook.normalize();
        let once = hook.clone();
        hook.normalize();
        assert_eq!(hook, once);
        assert_eq!(hook.expand_args, Some(false));
    }

    #[cfg(unix)]
    #[test]
    fn test_hook_list_keeps_going_for_ignore_error_hooks() {
        // --- Setup ---
        let mut failing = Hook::new("2", "false");
        failing.base.description = Some("always fails".to_string());
        let mut cleanup = Hook::new("3", "true");
        cleanup.ignore_error = true;
        let hooks = ExtensionList::new(vec![cleanup, failing, Hook::new("1", "true")]);

        // --- Execute ---
        let (results, error) = hooks.run(None, &options("apply"), &[]);

        // --- Assert ---
        assert_eq!(results, vec![HookOutcome::Ran, HookOutcome::Ran]);
        let error = error.unwrap();
        assert_eq!(error.errors().len(), 1);
        match error {
            ExtensionError::Failed { item_type, id, .. } => {
                assert_eq!(item_type, "hook");
                assert_eq!(id, "2");
            }
            other => panic!("expected the failure of hook 2, got {:?}", other),
        }
    }
}
