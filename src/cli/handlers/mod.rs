// src/cli/handlers/mod.rs

// One module per built-in command; `run` handles everything else.

pub mod extensions;
pub mod print_config;
pub mod run;
pub mod versions;
