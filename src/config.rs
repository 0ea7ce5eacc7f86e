//! Configuration for the provisioning workflows.
//!
//! Settings come from an optional TOML file. Every field has a default, so a
//! missing file is equivalent to an empty one.

use crate::error::{ProvisionError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Remote host the SSH key is dedicated to
pub const DEFAULT_REMOTE_HOST: &str = "github.com";

/// FIDO application identifier the resident key is bound to
pub const DEFAULT_APPLICATION: &str = "ssh:github";

/// Algorithm for the GPG primary key and its sub-keys
pub const DEFAULT_GPG_ALGORITHM: &str = "rsa4096";

/// Expiry passed to `gpg --quick-generate-key`
pub const DEFAULT_GPG_EXPIRY: &str = "2y";

/// Config file name under `<config dir>/kodegen/`
pub const CONFIG_FILE_NAME: &str = "keysetup.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub ssh: SshSettings,

    #[serde(default)]
    pub gpg: GpgSettings,

    #[serde(default)]
    pub git: GitSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SshSettings {
    #[serde(default = "default_remote_host")]
    pub remote_host: String,

    /// Must start with `ssh:`; ssh-keygen rejects anything else
    #[serde(default = "default_application")]
    pub application: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GpgSettings {
    #[serde(default = "default_gpg_algorithm")]
    pub key_algorithm: String,

    #[serde(default = "default_gpg_expiry")]
    pub expiry: String,

    /// Reset the token's OpenPGP applet before moving keys onto it
    #[serde(default = "default_true")]
    pub reset_token: bool,

    /// Touch policy applied to all three OpenPGP slots after key transfer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub touch_policy: Option<TouchPolicy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitSettings {
    #[serde(default = "default_true")]
    pub sign_commits: bool,

    #[serde(default)]
    pub sign_tags: bool,
}

/// OpenPGP touch policies understood by `ykman openpgp keys set-touch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TouchPolicy {
    On,
    Off,
    Fixed,
    Cached,
    CachedFixed,
}

impl TouchPolicy {
    #[must_use]
    pub fn as_ykman_arg(&self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Fixed => "fixed",
            Self::Cached => "cached",
            Self::CachedFixed => "cached-fixed",
        }
    }
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            remote_host: default_remote_host(),
            application: default_application(),
        }
    }
}

impl Default for GpgSettings {
    fn default() -> Self {
        Self {
            key_algorithm: default_gpg_algorithm(),
            expiry: default_gpg_expiry(),
            reset_token: true,
            touch_policy: None,
        }
    }
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            sign_commits: true,
            sign_tags: false,
        }
    }
}

impl Settings {
    /// Parse and validate settings from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let settings: Self = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from `path`, or from the default location when `None`.
    ///
    /// An explicit path must exist. A missing default file yields defaults.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let expanded = expand_tilde_path(&path.to_string_lossy())?;
                let text = tokio::fs::read_to_string(&expanded).await.map_err(|e| {
                    ProvisionError::InvalidConfig(format!("cannot read {expanded}: {e}"))
                })?;
                Self::from_toml(&text)
            }
            None => {
                let Some(default_path) = default_config_path() else {
                    return Ok(Self::default());
                };
                match tokio::fs::read_to_string(&default_path).await {
                    Ok(text) => Self::from_toml(&text),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
                    Err(e) => Err(e.into()),
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.ssh.remote_host.trim().is_empty()
            || self.ssh.remote_host.contains(char::is_whitespace)
        {
            return Err(ProvisionError::InvalidConfig(format!(
                "ssh.remote_host must be a single host name, got '{}'",
                self.ssh.remote_host
            )));
        }
        if !self.ssh.application.starts_with("ssh:") {
            return Err(ProvisionError::InvalidConfig(format!(
                "ssh.application must start with 'ssh:', got '{}'",
                self.ssh.application
            )));
        }
        if self.gpg.key_algorithm.trim().is_empty() {
            return Err(ProvisionError::InvalidConfig(
                "gpg.key_algorithm cannot be empty".to_string(),
            ));
        }
        if self.gpg.expiry.trim().is_empty() {
            return Err(ProvisionError::InvalidConfig(
                "gpg.expiry cannot be empty (use \"never\" for no expiry)".to_string(),
            ));
        }
        Ok(())
    }

    /// Render as TOML for `show`.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ProvisionError::InvalidConfig(e.to_string()))
    }
}

/// `<config dir>/kodegen/keysetup.toml`
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("kodegen").join(CONFIG_FILE_NAME))
}

/// Expand a leading `~`, failing when `HOME` is not set.
pub fn expand_tilde_path(path: &str) -> Result<String> {
    let expanded = shellexpand::tilde(path).to_string();

    // shellexpand leaves ~ untouched when HOME is unset
    if path.starts_with('~') && expanded.starts_with('~') {
        return Err(ProvisionError::InvalidConfig(format!(
            "could not expand ~ in '{path}' (HOME is not set); use an absolute path"
        )));
    }

    Ok(expanded)
}

fn default_remote_host() -> String {
    DEFAULT_REMOTE_HOST.to_string()
}

fn default_application() -> String {
    DEFAULT_APPLICATION.to_string()
}

fn default_gpg_algorithm() -> String {
    DEFAULT_GPG_ALGORITHM.to_string()
}

fn default_gpg_expiry() -> String {
    DEFAULT_GPG_EXPIRY.to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.ssh.remote_host, "github.com");
        assert!(settings.gpg.reset_token);
        assert!(settings.git.sign_commits);
        assert!(!settings.git.sign_tags);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let settings = Settings::from_toml(
            r#"
            [ssh]
            remote_host = "gitlab.com"
            application = "ssh:gitlab"

            [gpg]
            touch_policy = "cached-fixed"
            reset_token = false
            "#,
        )
        .unwrap();
        assert_eq!(settings.ssh.remote_host, "gitlab.com");
        assert_eq!(settings.gpg.key_algorithm, DEFAULT_GPG_ALGORITHM);
        assert_eq!(settings.gpg.touch_policy, Some(TouchPolicy::CachedFixed));
        assert!(!settings.gpg.reset_token);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = Settings::from_toml("[ssh]\nkey_path = \"/tmp/x\"\n").unwrap_err();
        assert!(matches!(err, ProvisionError::Toml(_)));
    }

    #[test]
    fn application_must_be_ssh_namespaced() {
        let err = Settings::from_toml("[ssh]\napplication = \"github\"\n").unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidConfig(_)));
    }

    #[test]
    fn renders_back_to_toml() {
        let text = Settings::default().to_toml().unwrap();
        assert_eq!(Settings::from_toml(&text).unwrap(), Settings::default());
    }

    #[tokio::test]
    async fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(Some(&dir.path().join("absent.toml")))
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn explicit_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keysetup.toml");
        tokio::fs::write(&path, "[git]\nsign_tags = true\n")
            .await
            .unwrap();
        let settings = Settings::load(Some(&path)).await.unwrap();
        assert!(settings.git.sign_tags);
    }
}
