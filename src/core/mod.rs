// src/core/mod.rs

pub mod config_loader;
pub mod config_resolver;
pub mod extension;
pub mod extension_list;
pub mod extra_args;
pub mod extra_command;
pub mod hook;
pub mod interpolator;
pub mod options;
pub mod paths;
