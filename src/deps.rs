//! Dependency resolution: make sure the external tools a workflow needs exist.

use crate::context::Context;
use crate::error::{ProvisionError, Result};
use crate::mutation::{Applied, ConfigMutation};
use crate::platform::Platform;
use crate::runner::{CommandRunner, ToolCommand};
use crate::{success, warn};
use std::path::PathBuf;

/// A binary and the packages that provide it on each platform.
#[derive(Debug, Clone, Copy)]
pub struct Requirement {
    pub tool: &'static str,
    pub brew: &'static [&'static str],
    pub apt: &'static [&'static str],
    pub dnf: &'static [&'static str],
    /// Only required on macOS
    pub macos_only: bool,
}

impl Requirement {
    #[must_use]
    pub fn packages(&self, platform: Platform) -> &'static [&'static str] {
        match platform {
            Platform::MacOs => self.brew,
            Platform::LinuxDebian => self.apt,
            Platform::LinuxFedora => self.dnf,
        }
    }

    #[must_use]
    pub fn applies_to(&self, platform: Platform) -> bool {
        !self.macos_only || platform == Platform::MacOs
    }
}

const SSH_KEYGEN: Requirement = Requirement {
    tool: "ssh-keygen",
    brew: &["openssh"],
    apt: &["openssh-client"],
    dnf: &["openssh-clients"],
    macos_only: false,
};

const YKMAN: Requirement = Requirement {
    tool: "ykman",
    brew: &["ykman"],
    apt: &["yubikey-manager", "pcscd"],
    dnf: &["yubikey-manager", "pcsc-lite"],
    macos_only: false,
};

const GPG: Requirement = Requirement {
    tool: "gpg",
    brew: &["gnupg"],
    apt: &["gnupg", "scdaemon"],
    dnf: &["gnupg2"],
    macos_only: false,
};

const GIT: Requirement = Requirement {
    tool: "git",
    brew: &["git"],
    apt: &["git"],
    dnf: &["git"],
    macos_only: false,
};

const PINENTRY_MAC: Requirement = Requirement {
    tool: "pinentry-mac",
    brew: &["pinentry-mac"],
    apt: &[],
    dnf: &[],
    macos_only: true,
};

pub const SSH_REQUIREMENTS: &[Requirement] = &[SSH_KEYGEN, YKMAN];
pub const GPG_REQUIREMENTS: &[Requirement] = &[GPG, YKMAN, GIT, PINENTRY_MAC];

/// Whether a binary was found on PATH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolAvailability {
    pub tool: String,
    pub path: Option<PathBuf>,
}

impl ToolAvailability {
    #[must_use]
    pub fn found(&self) -> bool {
        self.path.is_some()
    }
}

#[must_use]
pub fn check(runner: &dyn CommandRunner, tool: &str) -> ToolAvailability {
    ToolAvailability {
        tool: tool.to_string(),
        path: runner.locate(tool),
    }
}

/// Install `packages` with the platform's package manager.
///
/// Linux installs go through `sudo` when it is available. Output and any
/// password prompt are attached to the terminal.
pub async fn install(
    runner: &dyn CommandRunner,
    platform: Platform,
    packages: &[&str],
) -> Result<()> {
    if packages.is_empty() {
        return Ok(());
    }

    let manager = platform.package_manager();
    if runner.locate(manager).is_none() {
        return Err(ProvisionError::MissingPackageManager {
            manager: manager.to_string(),
            packages: packages.join(" "),
        });
    }

    let command = match platform {
        Platform::MacOs => ToolCommand::new(manager).arg("install").args(packages.iter().copied()),
        Platform::LinuxDebian | Platform::LinuxFedora => {
            let base = if runner.locate("sudo").is_some() {
                ToolCommand::new("sudo").arg(manager)
            } else {
                ToolCommand::new(manager)
            };
            base.args(["install", "-y"]).args(packages.iter().copied())
        }
    };

    crate::info!("Installing {} with {manager}...", packages.join(" "));
    runner.interactive(&command).await?.into_checked(manager)?;
    Ok(())
}

/// Make sure `requirement`'s tool is on PATH, installing it if needed.
pub async fn ensure(
    ctx: &Context,
    runner: &dyn CommandRunner,
    requirement: &Requirement,
) -> Result<ToolAvailability> {
    let availability = check(runner, requirement.tool);
    if availability.found() {
        return Ok(availability);
    }

    let packages = requirement.packages(ctx.platform);
    warn!("{} not found", requirement.tool);
    install(runner, ctx.platform, packages).await?;
    verify_installed(runner, requirement, ctx.platform)
}

/// Ensure every applicable requirement, batching missing packages into one install.
pub async fn ensure_all(
    ctx: &Context,
    runner: &dyn CommandRunner,
    requirements: &[Requirement],
) -> Result<Vec<ToolAvailability>> {
    let applicable: Vec<&Requirement> = requirements
        .iter()
        .filter(|r| r.applies_to(ctx.platform))
        .collect();

    let missing: Vec<&Requirement> = applicable
        .iter()
        .copied()
        .filter(|r| !check(runner, r.tool).found())
        .collect();

    if missing.is_empty() {
        success!("All required tools are installed");
    } else {
        let tools: Vec<&str> = missing.iter().map(|r| r.tool).collect();
        warn!("Missing tools: {}", tools.join(", "));

        let mut packages: Vec<&str> = Vec::new();
        for requirement in &missing {
            for package in requirement.packages(ctx.platform) {
                if !packages.contains(package) {
                    packages.push(package);
                }
            }
        }
        install(runner, ctx.platform, &packages).await?;
    }

    applicable
        .into_iter()
        .map(|r| verify_installed(runner, r, ctx.platform))
        .collect()
}

fn verify_installed(
    runner: &dyn CommandRunner,
    requirement: &Requirement,
    platform: Platform,
) -> Result<ToolAvailability> {
    let availability = check(runner, requirement.tool);
    if !availability.found() {
        return Err(ProvisionError::InstallVerification {
            tool: requirement.tool.to_string(),
            package: requirement.packages(platform).join(" "),
        });
    }
    tracing::debug!(tool = requirement.tool, path = ?availability.path, "tool available");
    Ok(availability)
}

/// Point gpg-agent at `pinentry-mac` on macOS so PIN prompts reach the user.
///
/// The directive is written once: the file is created if missing, otherwise
/// the line is appended only when absent. Linux distributions ship a working
/// pinentry with gnupg, so this is a no-op there.
pub async fn ensure_pinentry(ctx: &Context, runner: &dyn CommandRunner) -> Result<Applied> {
    if ctx.platform != Platform::MacOs {
        return Ok(Applied::AlreadyPresent);
    }

    let pinentry = check(runner, PINENTRY_MAC.tool);
    let Some(path) = pinentry.path else {
        return Err(ProvisionError::InstallVerification {
            tool: PINENTRY_MAC.tool.to_string(),
            package: PINENTRY_MAC.brew.join(" "),
        });
    };

    let directive = format!("pinentry-program {}", path.display());
    let mutation = ConfigMutation::new(ctx.gpg_agent_conf_path(), directive.clone());
    let applied = mutation
        .apply_unless(|text| text.lines().any(|line| line.trim() == directive))
        .await?;

    if applied == Applied::AlreadyPresent {
        return Ok(applied);
    }

    success!("Configured {}", mutation.target.display());

    // The agent only reads its config on start.
    let restart = runner
        .capture(&ToolCommand::new("gpgconf").args(["--kill", "gpg-agent"]))
        .await?;
    if !restart.success() {
        warn!("Could not restart gpg-agent: {}", restart.stderr.trim());
        println!("   Run 'gpgconf --kill gpg-agent' before continuing");
    }

    Ok(applied)
}
