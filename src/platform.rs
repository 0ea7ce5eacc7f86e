//! Host platform detection.

use crate::error::{ProvisionError, Result};
use crate::runner::{CommandRunner, ToolCommand};
use std::fmt;

const OS_RELEASE_PATH: &str = "/etc/os-release";

/// Supported host OS families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    LinuxDebian,
    LinuxFedora,
}

impl Platform {
    /// Binary used to install packages on this platform.
    #[must_use]
    pub fn package_manager(&self) -> &'static str {
        match self {
            Self::MacOs => "brew",
            Self::LinuxDebian => "apt-get",
            Self::LinuxFedora => "dnf",
        }
    }

    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MacOs => "macOS",
            Self::LinuxDebian => "Linux (Debian family)",
            Self::LinuxFedora => "Linux (Fedora family)",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Map a kernel name (`uname -s`) and the contents of `/etc/os-release` to a platform.
pub fn classify(kernel: &str, os_release: Option<&str>) -> Result<Platform> {
    let kernel = kernel.trim();

    if kernel.starts_with("Darwin") {
        return Ok(Platform::MacOs);
    }

    if kernel.starts_with("Linux") {
        let ids = os_release.map(distribution_ids).unwrap_or_default();
        if ids.iter().any(|id| matches!(id.as_str(), "debian" | "ubuntu")) {
            return Ok(Platform::LinuxDebian);
        }
        if ids
            .iter()
            .any(|id| matches!(id.as_str(), "fedora" | "rhel" | "centos"))
        {
            return Ok(Platform::LinuxFedora);
        }
        let distro = if ids.is_empty() {
            "unknown".to_string()
        } else {
            ids.join(", ")
        };
        return Err(ProvisionError::UnsupportedPlatform(format!(
            "Linux distribution '{distro}' (only Debian and Fedora families are supported)"
        )));
    }

    Err(ProvisionError::UnsupportedPlatform(if kernel.is_empty() {
        "unknown kernel".to_string()
    } else {
        kernel.to_string()
    }))
}

/// `ID` followed by the entries of `ID_LIKE`, lowercased and unquoted.
fn distribution_ids(os_release: &str) -> Vec<String> {
    let mut id = Vec::new();
    let mut like = Vec::new();

    for line in os_release.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
        match key {
            "ID" => id.push(value.to_ascii_lowercase()),
            "ID_LIKE" => like.extend(value.split_whitespace().map(str::to_ascii_lowercase)),
            _ => {}
        }
    }

    id.extend(like);
    id
}

/// Detect the host platform.
pub async fn detect(runner: &dyn CommandRunner) -> Result<Platform> {
    let output = runner
        .capture(&ToolCommand::new("uname").arg("-s"))
        .await?
        .into_checked("uname")?;
    let kernel = output.stdout.trim().to_string();

    let os_release = if kernel.starts_with("Linux") {
        match tokio::fs::read_to_string(OS_RELEASE_PATH).await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::debug!(error = %e, "could not read {OS_RELEASE_PATH}");
                None
            }
        }
    } else {
        None
    };

    let platform = classify(&kernel, os_release.as_deref())?;
    tracing::info!(%platform, kernel = %kernel, "detected platform");
    Ok(platform)
}
