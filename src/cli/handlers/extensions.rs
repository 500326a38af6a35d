// src/cli/handlers/extensions.rs

use crate::core::config_loader;
use crate::core::config_resolver::EffectiveConfig;
use crate::core::options::RuntimeOptions;
use anyhow::{Context, Result};
use clap::Parser;
use colored::*;

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Displays the hooks, extra commands and extra arguments in effect."
)]
struct ExtensionsArgs {
    /// One line per extension instead of the detailed help.
    #[arg(long, short)]
    list_only: bool,

    /// Only show extensions whose name, id or details contain one of these.
    lookups: Vec<String>,
}

/// Handler for `list-extensions`.
pub fn handle_list(options: &RuntimeOptions, args: Vec<String>) -> Result<()> {
    let mut parsed = ExtensionsArgs::try_parse_from(&args)?;
    parsed.list_only = true;
    print_extensions(options, &parsed)
}

/// Handler for `help-extensions`.
pub fn handle_help(options: &RuntimeOptions, args: Vec<String>) -> Result<()> {
    let parsed = ExtensionsArgs::try_parse_from(&args)?;
    print_extensions(options, &parsed)
}

fn print_extensions(options: &RuntimeOptions, args: &ExtensionsArgs) -> Result<()> {
    let config = config_loader::read_config(options)
        .with_context(|| format!("Could not load {}", options.config_path.display()))?;

    let sections = render_sections(&config, args.list_only, &args.lookups);
    if sections.is_empty() {
        println!("{}", "No extension defined.".yellow());
        return Ok(());
    }
    for (title, body) in sections {
        println!("\n{}\n{}", title.green().bold(), body);
    }
    Ok(())
}

/// Non-empty help sections, in display order.
fn render_sections(
    config: &EffectiveConfig,
    list_only: bool,
    lookups: &[String],
) -> Vec<(&'static str, String)> {
    let extra_args = config
        .terraform
        .as_ref()
        .map(|terraform| terraform.extra_args.help(list_only, lookups))
        .unwrap_or_default();

    [
        ("Pre hooks", config.pre_hooks.help(list_only, lookups)),
        ("Post hooks", config.post_hooks.help(list_only, lookups)),
        ("Extra commands", config.extra_commands.help(list_only, lookups)),
        ("Extra arguments", extra_args),
    ]
    .into_iter()
    .filter(|(_, body)| !body.trim().is_empty())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::extension_list::ExtensionList;
    use crate::core::extra_command::ExtraCommand;
    use crate::core::hook::Hook;

    #[test]
    fn test_empty_sections_are_skipped() {
        let config = EffectiveConfig {
            pre_hooks: ExtensionList::new(vec![Hook::new("fmt", "terraform fmt")]),
            extra_commands: ExtensionList::new(vec![ExtraCommand::new("ls")]),
            ..EffectiveConfig::default()
        };

        let sections = render_sections(&config, true, &[]);

        let titles: Vec<&str> = sections.iter().map(|(title, _)| *title).collect();
        assert_eq!(titles, vec!["Pre hooks", "Extra commands"]);
    }

    #[test]
    fn test_lookups_filter_every_section() {
        let config = EffectiveConfig {
            pre_hooks: ExtensionList::new(vec![Hook::new("fmt", "terraform fmt")]),
            post_hooks: ExtensionList::new(vec![Hook::new("notify", "echo done")]),
            ..EffectiveConfig::default()
        };

        let sections = render_sections(&config, true, &["notify".to_string()]);

        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].0, "Post hooks");
    }

    #[test]
    fn test_arguments_parse() {
        let args = ExtensionsArgs::try_parse_from(["--list-only", "fmt", "ls"]).unwrap();

        assert!(args.list_only);
        assert_eq!(args.lookups, vec!["fmt", "ls"]);
    }
}
