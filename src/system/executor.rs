// src/system/executor.rs

use crate::core::options::{Logger, RuntimeOptions};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("No command specified to run.")]
    EmptyCommand,
    #[error("Command '{0}' could not be executed: {1}")]
    CommandFailed(String, std::io::Error),
    #[error("Command '{command}' exited with {}.", describe_exit(*.code))]
    NonZeroExitStatus { command: String, code: Option<i32> },
    #[error("Command '{command}' succeeded and reported pending changes.")]
    PlanWithChanges { command: String },
    #[error("Command '{command}' produced output that was not valid UTF-8")]
    InvalidUtf8Output {
        command: String,
        #[source]
        source: std::string::FromUtf8Error,
    },
    #[error("Could not set up process supervision: {0}")]
    Runtime(#[source] std::io::Error),
    #[error("Command '{command}' was interrupted.")]
    Interrupted { command: String },
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by a signal)".to_string(),
    }
}

impl ExecutionError {
    /// Exit code the wrapper itself should terminate with.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NonZeroExitStatus {
                code: Some(code), ..
            } => *code,
            Self::PlanWithChanges { .. } => 2,
            Self::Interrupted { .. } => 130,
            _ => 1,
        }
    }
}

/// Where the child's standard output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Inherit,
    /// Keeps stdout clean for the command the user actually asked for.
    RedirectToStderr,
    Capture,
}

/// A fully resolved process invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    /// Variables set on top of the inherited environment.
    pub env: HashMap<String, String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: PathBuf::from("."),
            env: HashMap::new(),
        }
    }

    /// Shell-quoted rendering of the command line, for logs and errors.
    pub fn display(&self) -> String {
        let words = std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str));
        shlex::try_join(words).unwrap_or_else(|_| {
            std::iter::once(self.program.clone())
                .chain(self.args.iter().cloned())
                .collect::<Vec<_>>()
                .join(" ")
        })
    }
}

// --- PUBLIC API ---

/// Runs `invocation` to completion, relaying interrupt and terminate signals to it.
///
/// Returns the captured standard output for [`OutputMode::Capture`], an empty string
/// otherwise.
pub fn run_command(
    invocation: &Invocation,
    logger: &Logger,
    mode: OutputMode,
) -> Result<String, ExecutionError> {
    if invocation.program.trim().is_empty() {
        return Err(ExecutionError::EmptyCommand);
    }
    let display = invocation.display();
    logger.info(format!("Running command: {}", display));

    let stdout = match mode {
        OutputMode::Inherit => Stdio::inherit(),
        OutputMode::RedirectToStderr => Stdio::from(std::io::stderr()),
        OutputMode::Capture => Stdio::piped(),
    };

    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .current_dir(dunce::simplified(&invocation.working_dir))
        .envs(&invocation.env)
        .stdin(Stdio::inherit())
        .stdout(stdout)
        .stderr(Stdio::inherit());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(ExecutionError::Runtime)?;
    let (output, interrupted) = runtime.block_on(wait_forwarding_signals(command, &display, logger))?;

    if interrupted {
        return Err(ExecutionError::Interrupted { command: display });
    }
    if !output.status.success() {
        return Err(ExecutionError::NonZeroExitStatus {
            command: display,
            code: output.status.code(),
        });
    }

    match mode {
        OutputMode::Capture => {
            String::from_utf8(output.stdout).map_err(|e| ExecutionError::InvalidUtf8Output {
                command: display,
                source: e,
            })
        }
        _ => Ok(String::new()),
    }
}

/// Runs `args` through the configured terraform executable.
///
/// Output goes to stderr when `args` is not what the user typed, so that only the
/// user's own command writes to stdout.
pub fn run_terraform_command(options: &RuntimeOptions, args: &[String]) -> Result<(), ExecutionError> {
    let mode = if args == options.terraform_cli_args.as_slice() {
        OutputMode::Inherit
    } else {
        OutputMode::RedirectToStderr
    };
    run_command(&terraform_invocation(options, args.to_vec()), &options.logger, mode)
        .map(|_| ())
        .map_err(|e| filter_plan_error(e, args))
}

/// Runs `args` through terraform and returns its standard output.
pub fn run_terraform_command_and_capture_output(
    options: &RuntimeOptions,
    args: &[String],
) -> Result<String, ExecutionError> {
    let mut args = args.to_vec();
    let user_disabled_color = options.terraform_cli_args.iter().any(|a| a == "-no-color");
    if user_disabled_color && !args.iter().any(|a| a == "-no-color") {
        args.push("-no-color".to_string());
    }
    run_command(&terraform_invocation(options, args), &options.logger, OutputMode::Capture)
}

/// Turns the exit code 2 of `plan -detailed-exitcode` into [`ExecutionError::PlanWithChanges`].
pub fn filter_plan_error(error: ExecutionError, args: &[String]) -> ExecutionError {
    let is_detailed_plan = args.first().is_some_and(|cmd| cmd == "plan")
        && args.iter().any(|a| a == "-detailed-exitcode");
    match error {
        ExecutionError::NonZeroExitStatus {
            command,
            code: Some(2),
        } if is_detailed_plan => ExecutionError::PlanWithChanges { command },
        other => other,
    }
}

fn terraform_invocation(options: &RuntimeOptions, args: Vec<String>) -> Invocation {
    let command = args.first().cloned().unwrap_or_default();
    Invocation {
        program: options.terraform_path.clone(),
        args,
        working_dir: options.working_dir.clone(),
        env: options.env_for_command(&command),
    }
}

// --- SIGNAL FORWARDING ---

async fn wait_forwarding_signals(
    mut command: Command,
    display: &str,
    logger: &Logger,
) -> Result<(Output, bool), ExecutionError> {
    let child = command
        .spawn()
        .map_err(|e| ExecutionError::CommandFailed(display.to_string(), e))?;

    let forwarder = SignalForwarder::listen(child.id(), logger.clone()).map_err(ExecutionError::Runtime)?;
    // Released on every exit path, including unwinding.
    let mut forwarder = scopeguard::guard(forwarder, SignalForwarder::release);

    let output = child.wait_with_output();
    tokio::pin!(output);

    let output = loop {
        tokio::select! {
            result = &mut output => {
                break result.map_err(|e| ExecutionError::CommandFailed(display.to_string(), e))?;
            }
            Some(signal) = forwarder.recv() => forwarder.forward(signal),
        }
    };

    Ok((output, forwarder.received()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ForwardedSignal {
    Interrupt,
    Terminate,
}

/// Relays the signals received by this process to one child for as long as it lives.
struct SignalForwarder {
    pid: Option<u32>,
    logger: Logger,
    received: bool,
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl SignalForwarder {
    #[cfg(unix)]
    fn listen(pid: Option<u32>, logger: Logger) -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};
        Ok(Self {
            pid,
            logger,
            received: false,
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    fn listen(pid: Option<u32>, logger: Logger) -> std::io::Result<Self> {
        Ok(Self {
            pid,
            logger,
            received: false,
        })
    }

    #[cfg(unix)]
    async fn recv(&mut self) -> Option<ForwardedSignal> {
        tokio::select! {
            Some(()) = self.interrupt.recv() => Some(ForwardedSignal::Interrupt),
            Some(()) = self.terminate.recv() => Some(ForwardedSignal::Terminate),
            else => None,
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> Option<ForwardedSignal> {
        tokio::signal::ctrl_c().await.ok().map(|()| ForwardedSignal::Interrupt)
    }

    fn received(&self) -> bool {
        self.received
    }

    #[cfg(unix)]
    fn forward(&mut self, signal: ForwardedSignal) {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        self.received = true;
        let Some(pid) = self.pid.and_then(|pid| i32::try_from(pid).ok()) else {
            return;
        };
        let nix_signal = match signal {
            ForwardedSignal::Interrupt => Signal::SIGINT,
            ForwardedSignal::Terminate => Signal::SIGTERM,
        };
        self.logger
            .debug(format!("Forward signal {:?} to process {}", nix_signal, pid));
        if let Err(err) = kill(Pid::from_raw(pid), nix_signal) {
            self.logger
                .warn(format!("Error forwarding signal {:?}: {}", nix_signal, err));
        }
    }

    #[cfg(not(unix))]
    fn forward(&mut self, signal: ForwardedSignal) {
        // Console control events reach every process attached to the console.
        self.received = true;
        self.logger.debug(format!(
            "Received {:?}, waiting for process {:?} to exit",
            signal, self.pid
        ));
    }

    fn release(self) {
        self.logger.trace("Signal forwarder released");
    }
}
