// src/core/extra_command.rs

//! Extra commands intercept user commands, resolve their aliases (including inline
//! scripts) and decide whether the invocation should behave as another command.

use crate::constants::{PLAN_COMMAND, SCRIPT_SHELL};
use crate::core::extension::{Extension, ExtensionBase, MergeMode};
use crate::core::extension_list::ExtensionList;
use crate::core::options::RuntimeOptions;
use crate::system::executor::{self, Invocation, OutputMode};
use crate::system::shell;
use lazy_static::lazy_static;
use log::LevelFilter;
use regex::Regex;

lazy_static! {
    // Names that can double as an alias of the command they declare.
    static ref VALID_ALIAS_NAME: Regex = Regex::new(r"^[\w\.-]+$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtraCommand {
    pub base: ExtensionBase,
    /// Command names intercepted by this item.
    pub commands: Vec<String>,
    /// `alias` or `alias=target` entries.
    pub aliases: Vec<String>,
    /// Arguments placed before the user's own arguments.
    pub arguments: Vec<String>,
    pub expand_args: Option<bool>,
    /// Whether the state must be initialized as for `plan` before running.
    pub use_state: Option<bool>,
    /// Command impersonated for argument validation.
    pub act_as: Option<String>,
    /// Argument printing the version of the command.
    pub version_arg: Option<String>,
}

/// Outcome of resolving one user command against the extra commands.
#[derive(Debug, Clone, PartialEq)]
pub struct ActualCommand {
    /// Command that will actually be executed.
    pub command: String,
    /// Command whose preparation steps must run first, if any.
    pub behave_as: Option<String>,
    /// The matching item, already rewritten for this invocation.
    pub extra: Option<ExtraCommand>,
    /// The user's arguments after resolution.
    pub cli_args: Vec<String>,
}

impl ActualCommand {
    fn unmodified(cmd: &str, cli_args: &[String]) -> Self {
        Self {
            command: cmd.to_string(),
            behave_as: None,
            extra: None,
            cli_args: cli_args.to_vec(),
        }
    }

    /// The process running the matched extra command, if there is one.
    /// `extra_args` land between the item's arguments and the user's.
    pub fn invocation(&self, options: &RuntimeOptions, extra_args: &[String]) -> Option<Invocation> {
        let extra = self.extra.as_ref()?;
        let argv: Vec<String> = std::iter::once(self.command.clone())
            .chain(self.cli_args.iter().skip(1).cloned())
            .collect();
        Some(extra.invocation(options, &argv, extra_args))
    }
}

/// Intermediate result of alias resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasResolution {
    pub command: String,
    pub cli_args: Vec<String>,
    /// Replacement for the item's arguments when the alias is an inline script.
    pub arguments: Option<Vec<String>>,
}

impl ExtraCommand {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: ExtensionBase::named(name),
            ..Self::default()
        }
    }

    /// Every name this item answers to, alias targets stripped, sorted and unique.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .commands
            .iter()
            .chain(&self.aliases)
            .map(|entry| entry.split('=').next().unwrap_or(entry).to_string())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Rewrites `cmd` through the aliases, in declaration order.
    ///
    /// An inline-script alias turns the command into the script shell; the item's
    /// arguments and the user's arguments after the command token are substituted
    /// for ` $*`, or appended when the script has no placeholder and no pipe. The
    /// user's arguments are then reduced to their first element.
    pub fn resolve_alias(&self, cmd: &str, cli_args: &[String]) -> AliasResolution {
        let mut command = cmd.to_string();
        let mut cli_args = cli_args.to_vec();
        let mut arguments = None;

        for alias in &self.aliases {
            let (name, target) = match alias.split_once('=') {
                Some((name, target)) => (name, Some(target)),
                None => (alias.as_str(), None),
            };
            if name != command {
                continue;
            }
            let Some(target) = target else {
                command = self.commands.first().cloned().unwrap_or(command);
                break;
            };

            command = target.to_string();
            if shell::has_shell_metacharacters(target) {
                let joined: String = self
                    .arguments
                    .iter()
                    .chain(cli_args.iter().skip(1))
                    .map(|arg| format!(" {}", shell::quote_argument(arg)))
                    .collect();
                let mut script = target.to_string();
                if script.contains(" $*") {
                    script = script.replace(" $*", &joined);
                } else if !script.contains('|') {
                    script.push_str(&joined);
                }
                command = SCRIPT_SHELL.to_string();
                arguments = Some(shell::script_arguments(&script));
                cli_args.truncate(1);
            }
        }

        AliasResolution {
            command,
            cli_args,
            arguments,
        }
    }

    /// Resolves `cmd` against this item. `None` means the item does not claim it.
    pub fn resolve(&self, cmd: &str, cli_args: &[String]) -> Option<ActualCommand> {
        let AliasResolution {
            command,
            mut cli_args,
            arguments,
        } = self.resolve_alias(cmd, cli_args);
        if !self.commands.contains(&command) {
            return None;
        }

        let mut extra = self.clone();
        if let Some(arguments) = arguments {
            // The script is expanded by the script shell itself.
            extra.arguments = arguments;
            extra.expand_args = Some(false);
        }

        let mut behave_as = None;
        match self.act_as.as_deref().filter(|act_as| !act_as.is_empty()) {
            Some(act_as) => {
                if let Some(first) = cli_args.first_mut() {
                    *first = act_as.to_string();
                }
            }
            None => {
                extra.act_as = Some(command.clone());
                if self.use_state.unwrap_or(true) {
                    behave_as = Some(PLAN_COMMAND.to_string());
                }
            }
        }

        Some(ActualCommand {
            command,
            behave_as,
            extra: Some(extra),
            cli_args,
        })
    }

    /// The process for `argv`, whose first element is the command to execute.
    pub fn invocation(&self, options: &RuntimeOptions, argv: &[String], extra_args: &[String]) -> Invocation {
        let program = argv.first().cloned().unwrap_or_else(|| self.name().to_string());
        let mut arguments = self.arguments.clone();
        if self.expand_args.unwrap_or(true) {
            arguments = shell::expand_arguments(&arguments, &options.working_dir);
        }
        arguments.extend(extra_args.iter().cloned());
        arguments.extend(argv.iter().skip(1).cloned());

        Invocation {
            env: options.env_for_command(&program),
            program,
            args: arguments,
            working_dir: options.working_dir.clone(),
        }
    }
}

impl Extension for ExtraCommand {
    type Output = Invocation;
    const ITEM_TYPE: &'static str = "extra_command";
    const MERGE_MODE: MergeMode = MergeMode::Append;

    fn base(&self) -> &ExtensionBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ExtensionBase {
        &mut self.base
    }

    fn normalize(&mut self) {
        if self.commands.is_empty() {
            self.commands = vec![self.base.name.clone()];
        } else if VALID_ALIAS_NAME.is_match(&self.base.name)
            && !self.list().contains(&self.base.name)
        {
            self.aliases.push(self.base.name.clone());
        }
        if self.use_state.is_none() {
            self.use_state = Some(false);
        }
        if self.expand_args.is_none() {
            self.expand_args = Some(true);
        }
    }

    /// Produces the resolved invocation for `args` (command first).
    fn run(&mut self, options: &RuntimeOptions, args: &[String]) -> anyhow::Result<Invocation> {
        Ok(self.invocation(options, args, &[]))
    }

    fn extra_info(&self) -> String {
        let others: Vec<String> = self
            .list()
            .into_iter()
            .filter(|name| name != self.name())
            .collect();
        if others.is_empty() {
            String::new()
        } else {
            format!("[{}]", others.join(", "))
        }
    }

    fn help(&self) -> String {
        let mut lines = Vec::new();
        if let Some(description) = &self.base.description {
            lines.push(description.clone());
        }
        if let Some(act_as) = &self.act_as {
            lines.push(format!("Acts as: {}", act_as));
        }
        if !self.arguments.is_empty() {
            lines.push(format!("Arguments: {}", self.arguments.join(" ")));
        }
        let aliases: Vec<&String> = self.aliases.iter().filter(|a| a.contains('=')).collect();
        for alias in aliases {
            lines.push(format!("Alias: {}", alias));
        }
        lines.join("\n")
    }
}

impl ExtensionList<ExtraCommand> {
    /// The first enabled item claiming `cmd` wins; otherwise the command runs unmodified.
    pub fn actual_command(&self, cmd: &str, cli_args: &[String]) -> ActualCommand {
        self.enabled()
            .iter()
            .find_map(|item| item.resolve(cmd, cli_args))
            .unwrap_or_else(|| ActualCommand::unmodified(cmd, cli_args))
    }

    /// Version of every command whose item declares a `version_arg`, one per line.
    /// Items whose name holds a space are preceded by their name.
    ///
    /// Probes run with a logger capped at warnings; failures are reported at info
    /// level through the caller's logger.
    pub fn get_versions(&self, options: &RuntimeOptions) -> String {
        let probe_options = options.with_log_level(LevelFilter::Warn);
        let mut result = String::new();

        for item in self.enabled() {
            let Some(version_arg) = item.version_arg.as_deref().filter(|arg| !arg.is_empty()) else {
                continue;
            };
            if item.name().contains(' ') {
                result.push_str(&format!("\n{}\n", item.name()));
            }
            for command in &item.commands {
                let (program, args) = if shell::has_shell_metacharacters(version_arg) {
                    let args = shell::expand_arguments(
                        &shell::script_arguments(version_arg),
                        &options.working_dir,
                    );
                    (SCRIPT_SHELL.to_string(), args)
                } else {
                    (command.clone(), vec![version_arg.to_string()])
                };
                let invocation = Invocation {
                    program,
                    args,
                    working_dir: options.working_dir.clone(),
                    env: options.env_for_command(command),
                };

                match executor::run_command(&invocation, &probe_options.logger, OutputMode::Capture) {
                    Ok(output) => {
                        result.push_str(output.trim());
                        result.push('\n');
                    }
                    Err(err) => options.logger.info(format!(
                        "Got {} while getting version for {}",
                        err,
                        item.id()
                    )),
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn options() -> RuntimeOptions {
        RuntimeOptions::new(std::env::temp_dir().join("terraform.tfvars"))
    }

    // --- normalize / list ---

    #[test]
    fn test_normalize_defaults_commands_to_name() {
        let mut item = ExtraCommand::new("fmt");
        item.normalize();
        assert_eq!(item.commands, vec!["fmt"]);
        assert!(item.aliases.is_empty());
        assert_eq!(item.use_state, Some(false));
        assert_eq!(item.expand_args, Some(true));
    }

    #[test]
    fn test_normalize_adds_name_as_alias_once() {
        let mut item = ExtraCommand::new("lint");
        item.commands = strings(&["tflint"]);

        item.normalize();
        item.normalize();

        assert_eq!(item.aliases, vec!["lint"]);
    }

    #[test]
    fn test_normalize_ignores_names_that_are_not_command_like() {
        let mut item = ExtraCommand::new("static analysis");
        item.commands = strings(&["tflint"]);

        item.normalize();

        assert!(item.aliases.is_empty());
    }

    #[test]
    fn test_list_strips_targets_and_dedups() {
        let mut item = ExtraCommand::new("shell");
        item.commands = strings(&["bash", "sh"]);
        item.aliases = strings(&["ci=terraform $* -no-color", "sh", "b=bash"]);

        assert_eq!(item.list(), vec!["b", "bash", "ci", "sh"]);
        assert_eq!(item.extra_info(), "[b, bash, ci, sh]");
    }

    // --- alias resolution ---

    #[test]
    fn test_resolve_alias_inline_script_substitutes_trailing_args() {
        // --- Setup ---
        let mut item = ExtraCommand::new("shell");
        item.commands = strings(&["bash"]);
        item.aliases = strings(&["ci=terraform $* -no-color"]);
        let cli_args = strings(&["apply", "-auto-approve"]);

        // --- Execute ---
        let resolution = item.resolve_alias("ci", &cli_args);

        // --- Assert ---
        assert_eq!(resolution.command, "bash");
        assert_eq!(
            resolution.arguments,
            Some(strings(&["-c", "terraform -auto-approve -no-color"]))
        );
        assert_eq!(resolution.cli_args, vec!["apply"]);
    }

    #[test]
    fn test_resolve_alias_appends_quoted_args_without_placeholder() {
        let mut item = ExtraCommand::new("shell");
        item.commands = strings(&["bash"]);
        item.aliases = strings(&["say=echo hello"]);
        item.arguments = strings(&["dear"]);

        let resolution = item.resolve_alias("say", &strings(&["say", "big world"]));

        assert_eq!(
            resolution.arguments,
            Some(strings(&["-c", "echo hello dear \"big world\""]))
        );
    }

    #[test]
    fn test_resolve_alias_pipe_scripts_get_no_arguments() {
        let mut item = ExtraCommand::new("shell");
        item.commands = strings(&["bash"]);
        item.aliases = strings(&["ver=terraform version | head -1"]);

        let resolution = item.resolve_alias("ver", &strings(&["ver", "-json"]));

        assert_eq!(
            resolution.arguments,
            Some(strings(&["-c", "terraform version | head -1"]))
        );
        assert_eq!(resolution.cli_args, vec!["ver"]);
    }

    #[test]
    fn test_resolve_alias_bare_and_simple_targets() {
        let mut item = ExtraCommand::new("lint");
        item.commands = strings(&["tflint", "tfsec"]);
        item.aliases = strings(&["l", "sec=tfsec"]);

        assert_eq!(item.resolve_alias("l", &[]).command, "tflint");
        let resolution = item.resolve_alias("sec", &strings(&["sec", "."]));
        assert_eq!(resolution.command, "tfsec");
        assert_eq!(resolution.cli_args, vec!["sec", "."]);
        assert_eq!(resolution.arguments, None);
        assert_eq!(item.resolve_alias("other", &[]).command, "other");
    }

    // --- resolve ---

    #[test]
    fn test_resolve_requires_command_membership() {
        let mut item = ExtraCommand::new("lint");
        item.commands = strings(&["tflint"]);
        assert!(item.resolve("plan", &strings(&["plan"])).is_none());
    }

    #[test]
    fn test_resolve_act_as_rewrites_first_argument() {
        let mut item = ExtraCommand::new("lint");
        item.commands = strings(&["tflint"]);
        item.act_as = Some("validate".to_string());
        let cli_args = strings(&["tflint", "--deep"]);

        let actual = item.resolve("tflint", &cli_args).unwrap();

        assert_eq!(actual.command, "tflint");
        assert_eq!(actual.behave_as, None);
        assert_eq!(actual.cli_args, vec!["validate", "--deep"]);
        assert_eq!(cli_args, vec!["tflint", "--deep"]);
    }

    #[test]
    fn test_resolve_use_state_requests_plan_priming() {
        let mut item = ExtraCommand::new("graph");
        item.commands = strings(&["inframap"]);

        let unset = item.resolve("inframap", &strings(&["inframap"])).unwrap();
        assert_eq!(unset.behave_as.as_deref(), Some("plan"));
        assert_eq!(unset.extra.unwrap().act_as.as_deref(), Some("inframap"));

        item.use_state = Some(false);
        let disabled = item.resolve("inframap", &strings(&["inframap"])).unwrap();
        assert_eq!(disabled.behave_as, None);
    }

    #[test]
    fn test_resolve_script_alias_rewrites_arguments_of_the_match() {
        let mut item = ExtraCommand::new("shell");
        item.commands = strings(&["bash"]);
        item.aliases = strings(&["ci=terraform $* -no-color"]);
        item.use_state = Some(false);

        let actual = item
            .resolve("ci", &strings(&["apply", "-auto-approve"]))
            .unwrap();
        let invocation = actual.invocation(&options(), &[]).unwrap();

        assert_eq!(invocation.program, "bash");
        assert_eq!(invocation.args, vec!["-c", "terraform -auto-approve -no-color"]);
        assert!(item.arguments.is_empty());
    }

    #[test]
    fn test_resolve_script_alias_leaves_variables_to_the_shell() {
        let mut item = ExtraCommand::new("shell");
        item.commands = strings(&["bash"]);
        item.aliases = strings(&["home=echo $HOME ${TFGRUNT_UNSET_VARIABLE}"]);
        item.normalize();

        let actual = item.resolve("home", &strings(&["home"])).unwrap();
        let invocation = actual.invocation(&options(), &[]).unwrap();

        assert_eq!(invocation.args, vec!["-c", "echo $HOME ${TFGRUNT_UNSET_VARIABLE}"]);
    }

    // --- list-level resolution ---

    #[test]
    fn test_actual_command_first_enabled_match_wins() {
        let mut disabled = ExtraCommand::new("a-disabled");
        disabled.commands = strings(&["fmt"]);
        disabled.base.disabled = true;
        let mut first = ExtraCommand::new("b-first");
        first.commands = strings(&["fmt"]);
        first.arguments = strings(&["-recursive"]);
        let mut second = ExtraCommand::new("c-second");
        second.commands = strings(&["fmt"]);
        let list = ExtensionList::new(vec![disabled, first, second]);

        let actual = list.actual_command("fmt", &strings(&["fmt"]));

        assert_eq!(actual.extra.unwrap().name(), "b-first");
    }

    #[test]
    fn test_actual_command_without_match_is_identity() {
        let list = ExtensionList::new(vec![ExtraCommand::new("lint")]);
        let cli_args = strings(&["plan", "-out=plan.out"]);

        let actual = list.actual_command("plan", &cli_args);

        assert_eq!(
            actual,
            ActualCommand {
                command: "plan".to_string(),
                behave_as: None,
                extra: None,
                cli_args,
            }
        );
    }

    #[test]
    fn test_actual_command_uses_normalized_name_alias() {
        let mut item = ExtraCommand::new("lint");
        item.commands = strings(&["tflint"]);
        let list = ExtensionList::new(vec![item]);

        let actual = list.actual_command("lint", &strings(&["lint"]));

        assert_eq!(actual.command, "tflint");
        assert_eq!(actual.behave_as, None);
    }

    #[test]
    fn test_invocation_prepends_item_arguments() {
        let mut item = ExtraCommand::new("lint");
        item.arguments = strings(&["--format", "compact"]);

        let invocation = item.invocation(&options(), &strings(&["tflint", "--deep"]), &[]);

        assert_eq!(invocation.program, "tflint");
        assert_eq!(invocation.args, vec!["--format", "compact", "--deep"]);
        assert_eq!(
            invocation.env.get("TFGRUNT_COMMAND").map(String::as_str),
            Some("tflint")
        );
    }

    // --- versions ---

    #[cfg(unix)]
    #[test]
    fn test_get_versions_collects_trimmed_output() {
        let mut echo = ExtraCommand::new("echo");
        echo.version_arg = Some("v1.2.3".to_string());
        let mut broken = ExtraCommand::new("broken");
        broken.commands = strings(&["tfgrunt-no-such-program"]);
        broken.version_arg = Some("--version".to_string());
        let no_version = ExtraCommand::new("true");
        let list = ExtensionList::new(vec![echo, broken, no_version]);

        let versions = list.get_versions(&options());

        assert_eq!(versions, "v1.2.3\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_get_versions_names_grouped_items() {
        let mut tools = ExtraCommand::new("cloud tools");
        tools.commands = strings(&["echo", "printf"]);
        tools.version_arg = Some("v2".to_string());
        let list = ExtensionList::new(vec![tools]);

        let versions = list.get_versions(&options());

        assert_eq!(versions, "\ncloud tools\nv2\nv2\n");
    }
}
