//! The provisioning orchestrator.
//!
//! Stages run strictly in order and the first failure ends the run. Side
//! effects of completed stages are not rolled back; every file edit is
//! idempotent so a rerun after remediation is safe.

use crate::artifact::KeyArtifact;
use crate::context::Context;
use crate::deps::{self, GPG_REQUIREMENTS, SSH_REQUIREMENTS};
use crate::error::{ProvisionError, Result};
use crate::gpg::{self, GitGlobalConfig, Identity};
use crate::integrate::configure_local_integration;
use crate::prompts::{Prompter, banner};
use crate::runner::CommandRunner;
use crate::ssh;
use crate::success;

/// Which credential to provision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Workflow {
    Ssh,
    Gpg(Identity),
}

/// Run `workflow` against an already-detected context.
pub async fn run(
    ctx: &Context,
    runner: &dyn CommandRunner,
    prompter: &mut dyn Prompter,
    workflow: &Workflow,
) -> Result<KeyArtifact> {
    tracing::info!(platform = %ctx.platform, ?workflow, "starting provisioning");

    banner("Step 1: Checking required tools");
    match workflow {
        Workflow::Ssh => {
            deps::ensure_all(ctx, runner, SSH_REQUIREMENTS).await?;
        }
        Workflow::Gpg(_) => {
            deps::ensure_all(ctx, runner, GPG_REQUIREMENTS).await?;
            deps::ensure_pinentry(ctx, runner).await?;
        }
    }

    banner("Step 2: Provisioning the key on your YubiKey");
    let artifact = match workflow {
        Workflow::Ssh => KeyArtifact::Ssh(ssh::generate_ssh_key(ctx, runner, prompter).await?),
        Workflow::Gpg(identity) => {
            KeyArtifact::Gpg(gpg::generate_gpg_key(ctx, runner, prompter, identity).await?)
        }
    };

    banner("Step 3: Configuring local tools");
    configure_local_integration(ctx, runner, &artifact).await?;

    println!();
    success!("Setup complete");
    Ok(artifact)
}

/// Resolve the GPG identity from flags, then Git's global config, then the user.
pub async fn resolve_identity(
    runner: &dyn CommandRunner,
    prompter: &mut dyn Prompter,
    name: Option<String>,
    email: Option<String>,
) -> Result<Identity> {
    // An empty GIT_AUTHOR_* counts as unset.
    let given = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

    let name = match given(name) {
        Some(name) => Some(name),
        None => git_value(runner, "user.name").await,
    };
    let email = match given(email) {
        Some(email) => Some(email),
        None => git_value(runner, "user.email").await,
    };

    let name = match name {
        Some(name) => name,
        None => prompter
            .ask("Full name for the GPG key")?
            .ok_or_else(|| ProvisionError::UserAborted("no name given".to_string()))?,
    };
    let email = match email {
        Some(email) => email,
        None => prompter
            .ask("Email address for the GPG key")?
            .ok_or_else(|| ProvisionError::UserAborted("no email given".to_string()))?,
    };

    Identity::new(name, email)
}

async fn git_value(runner: &dyn CommandRunner, key: &str) -> Option<String> {
    runner.locate("git")?;
    match GitGlobalConfig::new(runner).get(key).await {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(key, error = %e, "git config lookup failed");
            None
        }
    }
}
