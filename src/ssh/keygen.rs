//! Resident FIDO2 SSH key generation with `ssh-keygen`.

use crate::artifact::SshKeyArtifact;
use crate::context::Context;
use crate::error::{ProvisionError, Result};
use crate::prompts::{Prompter, gate};
use crate::runner::{CommandRunner, ToolCommand};
use crate::ssh::PublicKeyLine;
use crate::{info, success, warn};
use std::path::{Path, PathBuf};

const KEY_TYPE: &str = "ed25519-sk";

/// Public key file next to a key handle: `<path>.pub`.
#[must_use]
pub fn public_key_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".pub");
    PathBuf::from(name)
}

/// Arguments for a discoverable, user-verification-required key.
#[must_use]
pub fn keygen_command(path: &Path, application: &str, comment: &str) -> ToolCommand {
    ToolCommand::new("ssh-keygen")
        .args(["-t", KEY_TYPE])
        .args(["-O", "resident"])
        .arg("-O")
        .arg(format!("application={application}"))
        .args(["-O", "verify-required"])
        .arg("-f")
        .arg(path.display().to_string())
        .arg("-C")
        .arg(comment)
}

/// Whether `ykman fido info` reports that no FIDO2 PIN has been set.
#[must_use]
pub fn fido_pin_unset(info: &str) -> bool {
    info.lines().any(|line| {
        let line = line.trim();
        line.to_ascii_lowercase().starts_with("pin")
            && line.to_ascii_lowercase().contains("not set")
    })
}

/// Verification-required keys need a FIDO2 PIN on the token.
async fn check_fido_pin(runner: &dyn CommandRunner, prompter: &mut dyn Prompter) -> Result<()> {
    if runner.locate("ykman").is_none() {
        return Ok(());
    }

    let output = runner
        .capture(&ToolCommand::new("ykman").args(["fido", "info"]))
        .await?;
    if !output.success() {
        warn!("Could not read FIDO2 status from the token: {}", output.stderr.trim());
        return Ok(());
    }

    if fido_pin_unset(&output.stdout) {
        warn!("Your YubiKey has no FIDO2 PIN set");
        println!("   Set one in another terminal with: ykman fido access change-pin");
        gate(prompter, "Has a FIDO2 PIN now been set on the YubiKey?")?;
    }
    Ok(())
}

/// Remove the key handle and its public key; missing files are fine.
async fn remove_key_pair(path: &Path, public_path: &Path) -> Result<()> {
    for file in [path, public_path] {
        match tokio::fs::remove_file(file).await {
            Ok(()) => tracing::debug!(path = %file.display(), "removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Generate a resident SSH key on the token at the fixed key path.
///
/// An existing key pair at that path is only replaced after confirmation.
/// Any non-zero exit from `ssh-keygen` (touch timeout, missing device, wrong
/// PIN) aborts the run.
pub async fn generate_ssh_key(
    ctx: &Context,
    runner: &dyn CommandRunner,
    prompter: &mut dyn Prompter,
) -> Result<SshKeyArtifact> {
    let path = ctx.ssh_key_path();
    let public_path = public_key_path(&path);

    check_fido_pin(runner, prompter).await?;

    let exists = tokio::fs::try_exists(&path).await.unwrap_or(false)
        || tokio::fs::try_exists(&public_path).await.unwrap_or(false);
    if exists {
        warn!("An SSH key already exists at {}", path.display());
        gate(prompter, "Overwrite the existing key?")?;
        remove_key_pair(&path, &public_path).await?;
    }

    crate::mutation::ensure_private_dir(&ctx.ssh_dir()).await?;

    info!("Touch your YubiKey when it blinks and enter its PIN when asked");
    let command = keygen_command(&path, &ctx.settings.ssh.application, &ctx.comment);
    let output = runner.interactive(&command).await?;
    if !output.success() {
        return Err(ProvisionError::tool_failure(
            "ssh-keygen",
            output.code,
            "key generation did not complete (touch timeout, missing device or wrong PIN)",
        ));
    }

    let text = tokio::fs::read_to_string(&public_path).await?;
    let malformed = |reason: String| ProvisionError::MalformedPublicKey {
        path: public_path.display().to_string(),
        reason,
    };
    let public_key = PublicKeyLine::parse(&text).map_err(malformed)?;
    if !public_key.is_security_key() {
        return Err(malformed(format!(
            "'{}' is not a hardware-backed key type",
            public_key.algorithm
        )));
    }

    success!("Created {}", path.display());
    Ok(SshKeyArtifact {
        path,
        public_path,
        public_key,
    })
}
