//! Error types for credential provisioning.
//!
//! Every variant is fatal: the run stops and the user re-invokes the tool
//! after fixing the reported condition.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProvisionError>;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("No package manager available to install {packages}: '{manager}' not found in PATH")]
    MissingPackageManager { manager: String, packages: String },

    #[error("'{tool}' is still missing after installing {package}")]
    InstallVerification { tool: String, package: String },

    #[error("Aborted: {0}")]
    UserAborted(String),

    #[error("No hardware token detected. Insert your YubiKey and try again.\n{0}")]
    NoTokenDetected(String),

    #[error("No secret key found for <{0}> in the GPG keyring")]
    KeyIdNotFound(String),

    #[error("{tool} failed (exit code {code}): {detail}")]
    ExternalToolFailure {
        tool: String,
        code: String,
        detail: String,
    },

    #[error("Unexpected prompt from {tool}: expected '{expected}', got '{actual}'")]
    DialogueMismatch {
        tool: String,
        expected: String,
        actual: String,
    },

    #[error("Malformed public key in {path}: {reason}")]
    MalformedPublicKey { path: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ProvisionError {
    /// Build an `ExternalToolFailure` from an exit code and captured stderr.
    pub fn tool_failure(tool: &str, code: Option<i32>, stderr: &str) -> Self {
        let detail = stderr.trim();
        Self::ExternalToolFailure {
            tool: tool.to_string(),
            code: code.map_or_else(|| "signal".to_string(), |c| c.to_string()),
            detail: if detail.is_empty() {
                "(no output)".to_string()
            } else {
                detail.to_string()
            },
        }
    }
}
