//! GPG key generation and transfer onto the token.

use super::card::{self, CardSlot};
use super::listing::find_key_for_email;
use super::Identity;
use crate::artifact::GpgKeyArtifact;
use crate::context::Context;
use crate::error::{ProvisionError, Result};
use crate::prompts::Prompter;
use crate::runner::{CommandRunner, ToolCommand};
use crate::{info, success};

/// `gpg --list-secret-keys` for one address, with long IDs and fingerprints.
pub async fn list_secret_keys(runner: &dyn CommandRunner, email: &str) -> Result<String> {
    let output = runner
        .capture(
            &ToolCommand::new("gpg")
                .args(["--list-secret-keys", "--keyid-format", "LONG", "--with-fingerprint"])
                .arg(email),
        )
        .await?;

    // gpg exits 2 when nothing matches; that is "not found", not a tool failure.
    if !output.success() && !output.stderr.contains("No secret key") {
        return Err(ProvisionError::tool_failure("gpg", output.code, &output.stderr));
    }
    Ok(output.stdout)
}

/// Algorithm for the sub-key in `slot`.
///
/// EdDSA curves can only sign, so the encryption sub-key uses the matching
/// ECDH curve instead.
#[must_use]
pub fn subkey_algorithm(algorithm: &str, slot: CardSlot) -> &str {
    match (slot, algorithm) {
        (CardSlot::Encryption, "ed25519") => "cv25519",
        (CardSlot::Encryption, "ed448") => "cv448",
        _ => algorithm,
    }
}

/// Generate a certify-only primary key with sign, encrypt and authenticate
/// sub-keys, then move the sub-keys onto the token.
///
/// gpg is run in batch mode without a passphrase argument, so gpg-agent asks
/// for the passphrase through pinentry and it never appears in argv or logs.
/// `--yes` lets a rerun create a new key next to an older one for the same
/// user ID; the newest key is the one picked up afterwards.
pub async fn generate_gpg_key(
    ctx: &Context,
    runner: &dyn CommandRunner,
    prompter: &mut dyn Prompter,
    identity: &Identity,
) -> Result<GpgKeyArtifact> {
    let settings = &ctx.settings.gpg;

    card::card_status(runner).await?;
    success!("YubiKey detected");

    if settings.reset_token {
        card::reset_openpgp(runner, prompter).await?;
    }

    info!("Generating GPG key for {}; choose a passphrase when asked", identity.user_id());
    runner
        .interactive(
            &ToolCommand::new("gpg")
                .args(["--batch", "--yes", "--quick-generate-key"])
                .arg(identity.user_id())
                .args([settings.key_algorithm.as_str(), "cert", settings.expiry.as_str()]),
        )
        .await?
        .into_checked("gpg")?;

    let listing = list_secret_keys(runner, &identity.email).await?;
    let key = find_key_for_email(&listing, &identity.email)?;
    success!("Created key {}", key.key_id);

    // quick-add-key only accepts a fingerprint
    let fingerprint = key.fingerprint.clone().ok_or_else(|| {
        ProvisionError::tool_failure("gpg", None, "secret key listing did not include a fingerprint")
    })?;

    for slot in CardSlot::ALL {
        runner
            .interactive(
                &ToolCommand::new("gpg")
                    .args(["--batch", "--quick-add-key"])
                    .arg(fingerprint.as_str())
                    .args([
                        subkey_algorithm(&settings.key_algorithm, slot),
                        slot.gpg_usage(),
                        settings.expiry.as_str(),
                    ]),
            )
            .await?
            .into_checked("gpg")?;
    }
    success!("Added signature, encryption and authentication sub-keys");

    card::move_subkeys_to_card(runner, prompter, &key.key_id).await?;

    if let Some(policy) = settings.touch_policy {
        card::apply_touch_policy(runner, policy).await?;
    }

    Ok(GpgKeyArtifact {
        key_id: key.key_id,
        fingerprint: Some(fingerprint),
        email: identity.email.clone(),
    })
}
