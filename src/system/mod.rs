//! # System Interaction Layer
//!
//! Abstractions over the operating system used by the extension engine.
//!
//! ## Modules
//!
//! - **`executor`**: Spawns external processes, relays `Ctrl+C` and terminate signals to
//!   them and captures their output when asked to.
//! - **`shell`**: Turns declared arguments into an argv: inline scripts, quoting, and
//!   tilde, variable and glob expansion.

pub mod executor;
pub mod shell;
