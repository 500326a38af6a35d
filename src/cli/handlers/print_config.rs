// src/cli/handlers/print_config.rs

use crate::core::config_loader;
use crate::core::options::RuntimeOptions;
use anyhow::{Context, Result, bail};

/// Handler for `print-config`: the resolved configuration, includes merged, as HCL.
pub fn handle(options: &RuntimeOptions, args: Vec<String>) -> Result<()> {
    if let Some(unexpected) = args.first() {
        bail!("print-config takes no argument, got '{}'", unexpected);
    }
    let config = config_loader::read_config(options)
        .with_context(|| format!("Could not load {}", options.config_path.display()))?;
    let rendered = config
        .to_hcl()
        .context("Could not serialize the resolved configuration")?;
    println!("{}", rendered.trim_end());
    Ok(())
}
