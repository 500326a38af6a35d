// src/cli/handlers/run.rs

use crate::constants::PLAN_COMMAND;
use crate::core::config_loader;
use crate::core::config_resolver::EffectiveConfig;
use crate::core::extension_list::ExtensionError;
use crate::core::extra_command::ActualCommand;
use crate::core::options::RuntimeOptions;
use crate::system::executor::{self, OutputMode};
use anyhow::{Context, Result, anyhow, bail};

/// Main entry point for every command that is not a built-in one.
///
/// Resolves the command against the extra commands, primes the state when the
/// resolved command asks for it, runs the pre hooks, the command itself and the
/// post hooks, then reports every error collected along the way.
pub fn handle(options: &RuntimeOptions, args: Vec<String>) -> Result<()> {
    let Some(command) = args.first().cloned() else {
        bail!("No command given. Run `tfgrunt --help` for usage.");
    };

    let mut options = options.clone();
    options.terraform_cli_args = args;
    options.import_variables_from_cli();
    config_loader::import_var_files(&mut options);

    let mut config = config_loader::read_config(&options)
        .with_context(|| format!("Could not load {}", options.config_path.display()))?;
    if let (Some(source), Some(terraform)) = (&options.source, &mut config.terraform) {
        terraform.source = Some(source.clone());
    }

    let actual = config
        .extra_commands
        .actual_command(&command, &options.terraform_cli_args);
    options.terraform_cli_args = actual.cli_args.clone();

    if actual.behave_as.as_deref() == Some(PLAN_COMMAND) {
        prime_state(&options, &config)?;
    }

    let (_, pre_error) = config.pre_hooks.run(None, &options, &[]);
    let pre_failure = pre_error.and_then(|err| report_non_fatal(&options, err));

    let main_result = match pre_failure {
        Some(err) => Err(err),
        None => run_main_command(&config, &options, &actual),
    };

    let (_, post_error) = config
        .post_hooks
        .run(main_result.as_ref().err(), &options, &[]);
    let post_failure = post_error.and_then(|err| report_non_fatal(&options, err));

    match (main_result, post_failure) {
        (Err(main), Some(post)) => {
            options.logger.error(format!("{:#}", post));
            Err(main)
        }
        (Err(main), None) => Err(main),
        (Ok(()), Some(post)) => Err(post),
        (Ok(()), None) => Ok(()),
    }
}

/// Logs plan-with-changes outcomes and keeps the real failures.
fn report_non_fatal(options: &RuntimeOptions, error: ExtensionError) -> Option<anyhow::Error> {
    if error.is_plan_with_changes() {
        options.logger.info(error.to_string());
        None
    } else {
        Some(anyhow!(error))
    }
}

/// Initializes the working directory and its remote state before an extra command
/// that relies on it.
fn prime_state(options: &RuntimeOptions, config: &EffectiveConfig) -> Result<()> {
    let mut args = vec!["init".to_string(), "-input=false".to_string()];
    if let Some(remote_state) = &config.remote_state {
        args.extend(remote_state.to_init_args());
    }
    options
        .logger
        .debug(format!("Preparing the state of {}", options.working_dir.display()));
    executor::run_terraform_command(options, &args).context("Could not initialize the state")?;
    Ok(())
}

fn run_main_command(
    config: &EffectiveConfig,
    options: &RuntimeOptions,
    actual: &ActualCommand,
) -> Result<()> {
    let extra_args = match &config.terraform {
        Some(terraform) => terraform.extra_args.filter(options)?,
        None => Vec::new(),
    };

    if let Some(invocation) = actual.invocation(options, &extra_args) {
        let argv: Vec<String> = std::iter::once(invocation.program.clone())
            .chain(invocation.args.iter().cloned())
            .collect();
        executor::run_command(&invocation, &options.logger, OutputMode::Inherit)
            .map_err(|err| executor::filter_plan_error(err, &argv))?;
        return Ok(());
    }

    let args = terraform_arguments(&options.terraform_cli_args, extra_args);
    let mut options = options.clone();
    options.terraform_cli_args = args.clone();
    executor::run_terraform_command(&options, &args)?;
    Ok(())
}

/// The user's arguments with `extra_args` spliced in right after the command name.
fn terraform_arguments(cli_args: &[String], extra_args: Vec<String>) -> Vec<String> {
    let mut cli_args = cli_args.iter().cloned();
    let mut args: Vec<String> = cli_args.next().into_iter().collect();
    args.extend(extra_args);
    args.extend(cli_args);
    args
}
