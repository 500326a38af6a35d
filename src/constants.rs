// src/constants.rs

/// The name of the configuration file looked up in every working directory.
pub const DEFAULT_CONFIG_FILENAME: &str = "terraform.tfvars";

/// The historical configuration file name, still honoured after the current one.
pub const OLD_CONFIG_FILENAME: &str = ".terragrunt";

/// The top-level key wrapping the wrapper settings in a current-format file.
pub const CONFIG_SECTION_KEY: &str = "terragrunt";

/// Environment variable exposing the currently executing command to child processes.
pub const COMMAND_ENV_VAR: &str = "TFGRUNT_COMMAND";

/// Terraform's own switch for interactive input, set to `0` in non-interactive runs.
pub const TERRAFORM_INPUT_ENV_VAR: &str = "TF_INPUT";

/// Environment variable listing configuration files merged under every configuration.
pub const BOOT_CONFIGS_ENV_VAR: &str = "TFGRUNT_BOOT_CONFIGS";

/// Default executable used for every provisioning invocation.
pub const DEFAULT_TERRAFORM_PATH: &str = "terraform";

/// How many ancestor directories `find_in_parent_folders` inspects.
pub const MAX_PARENT_FOLDERS_TO_CHECK: usize = 100;

/// How many `include` hops a configuration chain may have.
pub const MAX_INCLUDE_DEPTH: u32 = 32;

/// Characters that turn an alias target or version probe into an inline shell script.
pub const SHELL_METACHARACTERS: &[char] = &[' ', '|', ',', '&', '$'];

/// Shell used to run inline scripts.
pub const SCRIPT_SHELL: &str = "bash";

/// Command used to prime the state before an extra command that behaves as `plan`.
pub const PLAN_COMMAND: &str = "plan";

/// Terraform commands that accept `-var` and `-var-file` arguments.
pub const TERRAFORM_COMMANDS_WITH_VAR_FILE: &[&str] = &[
    "apply", "console", "destroy", "import", "plan", "push", "refresh",
];
