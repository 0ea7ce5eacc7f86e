//! Run-wide state shared by every workflow stage.

use crate::config::Settings;
use crate::error::{ProvisionError, Result};
use crate::platform::{self, Platform};
use crate::runner::CommandRunner;
use std::path::PathBuf;

/// File name of the resident SSH key under `~/.ssh`. Not configurable.
pub const SSH_KEY_FILE_NAME: &str = "id_ed25519_sk_rk_github";

/// Immutable facts about this run, computed once before any stage executes.
#[derive(Debug, Clone)]
pub struct Context {
    pub platform: Platform,
    pub home: PathBuf,
    /// `$GNUPGHOME`, or `~/.gnupg`
    pub gnupg_home: PathBuf,
    pub settings: Settings,
    /// `user@host`, used as the SSH key comment
    pub comment: String,
}

impl Context {
    pub fn new(platform: Platform, home: impl Into<PathBuf>, settings: Settings) -> Self {
        let home = home.into();
        Self {
            platform,
            gnupg_home: home.join(".gnupg"),
            home,
            settings,
            comment: "user@localhost".to_string(),
        }
    }

    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    #[must_use]
    pub fn with_gnupg_home(mut self, gnupg_home: impl Into<PathBuf>) -> Self {
        self.gnupg_home = gnupg_home.into();
        self
    }

    /// Detect the platform and read the user's environment.
    pub async fn from_environment(runner: &dyn CommandRunner, settings: Settings) -> Result<Self> {
        let platform = platform::detect(runner).await?;
        let home = dirs::home_dir().ok_or_else(|| {
            ProvisionError::InvalidConfig("could not determine home directory".to_string())
        })?;

        let mut context = Self::new(platform, home, settings).with_comment(user_at_host());
        if let Some(gnupg_home) = std::env::var_os("GNUPGHOME").filter(|v| !v.is_empty()) {
            context = context.with_gnupg_home(gnupg_home);
        }
        Ok(context)
    }

    #[must_use]
    pub fn ssh_dir(&self) -> PathBuf {
        self.home.join(".ssh")
    }

    #[must_use]
    pub fn ssh_key_path(&self) -> PathBuf {
        self.ssh_dir().join(SSH_KEY_FILE_NAME)
    }

    #[must_use]
    pub fn ssh_config_path(&self) -> PathBuf {
        self.ssh_dir().join("config")
    }

    #[must_use]
    pub fn gpg_agent_conf_path(&self) -> PathBuf {
        self.gnupg_home.join("gpg-agent.conf")
    }
}

fn user_at_host() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "user".to_string());
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string());
    format!("{user}@{host}")
}
