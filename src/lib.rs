//! Provision hardware-backed SSH and GPG credentials on a YubiKey and wire
//! them into the local SSH client and Git.

#[doc(hidden)]
pub use termcolor as __termcolor;

pub mod artifact;
pub mod config;
pub mod context;
pub mod deps;
pub mod error;
pub mod gpg;
pub mod integrate;
pub mod mutation;
pub mod platform;
pub mod prompts;
pub mod runner;
pub mod ssh;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

// Re-export common types
pub use artifact::KeyArtifact;
pub use config::Settings;
pub use context::Context;
pub use error::{ProvisionError, Result};
pub use platform::Platform;
pub use prompts::{Prompter, TerminalPrompter};
pub use runner::{CommandRunner, SystemRunner};
pub use workflow::{Workflow, resolve_identity};
