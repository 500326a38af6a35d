// src/bin/tfgrunt.rs

use anyhow::Result;
use clap::Parser;
use colored::*;
use tfgrunt::{
    cli::{Cli, handlers},
    core::options::RuntimeOptions,
    system::executor::ExecutionError,
};

// --- Command Definition and Registry ---

/// A built-in command, its aliases and its handler.
struct CommandDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    handler: fn(&RuntimeOptions, Vec<String>) -> Result<()>,
}

/// Every built-in command. Anything else is handed to Terraform.
static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "get-versions",
        aliases: &[],
        handler: handlers::versions::handle,
    },
    CommandDefinition {
        name: "help-extensions",
        aliases: &[],
        handler: handlers::extensions::handle_help,
    },
    CommandDefinition {
        name: "list-extensions",
        aliases: &["list-ext"],
        handler: handlers::extensions::handle_list,
    },
    CommandDefinition {
        name: "print-config",
        aliases: &[],
        handler: handlers::print_config::handle,
    },
];

/// Finds a command definition in the registry by its name or alias.
fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

/// The main entry point of the `tfgrunt` application.
fn main() {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level.as_str()))
        .init();

    if let Err(e) = run_cli(cli) {
        // --- Centralized Error Handling ---
        let execution_error = e
            .chain()
            .find_map(|cause| cause.downcast_ref::<ExecutionError>());
        match execution_error {
            // Interruptions and plans with changes are not failures worth a message.
            Some(err @ (ExecutionError::Interrupted { .. } | ExecutionError::PlanWithChanges { .. })) => {
                std::process::exit(err.exit_code());
            }
            Some(err) => {
                eprintln!("\n{}: {:#}", "Error".red().bold(), e);
                std::process::exit(err.exit_code());
            }
            None => {
                eprintln!("\n{}: {:#}", "Error".red().bold(), e);
                std::process::exit(1);
            }
        }
    }
}

/// Routes the arguments to a built-in command or to the run flow.
fn run_cli(cli: Cli) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);
    let options = cli.runtime_options()?;

    let mut args = cli.args.into_iter();
    let Some(first) = args.next() else {
        return handlers::run::handle(&options, Vec::new());
    };

    match find_command(&first) {
        Some(command) => (command.handler)(&options, args.collect()),
        None => {
            let run_args = std::iter::once(first).chain(args).collect();
            handlers::run::handle(&options, run_args)
        }
    }
}
