//! Local integration: wire the new credential into SSH or Git and display
//! the public half for upload.

use crate::artifact::{GpgKeyArtifact, KeyArtifact, SshKeyArtifact};
use crate::context::Context;
use crate::error::Result;
use crate::gpg::GitGlobalConfig;
use crate::mutation::Applied;
use crate::runner::{CommandRunner, ToolCommand};
use crate::ssh::add_host_stanza;
use crate::{info, success};
use std::io::Write;
use termcolor::{BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

/// Apply the local configuration for `artifact` and display its public half.
pub async fn configure_local_integration(
    ctx: &Context,
    runner: &dyn CommandRunner,
    artifact: &KeyArtifact,
) -> Result<()> {
    match artifact {
        KeyArtifact::Ssh(ssh) => configure_ssh(ctx, ssh).await,
        KeyArtifact::Gpg(gpg) => configure_gpg(ctx, runner, gpg).await,
    }
}

async fn configure_ssh(ctx: &Context, artifact: &SshKeyArtifact) -> Result<()> {
    let remote_host = &ctx.settings.ssh.remote_host;
    match add_host_stanza(ctx, &artifact.path).await? {
        Applied::AlreadyPresent => info!(
            "{} already has a 'Host {remote_host}' entry; left unchanged",
            ctx.ssh_config_path().display()
        ),
        Applied::Created | Applied::Appended => success!(
            "Added 'Host {remote_host}' to {}",
            ctx.ssh_config_path().display()
        ),
    }

    print_public_artifact(
        &format!("Add this public key to your account on {remote_host}:"),
        &artifact.public_key.to_string(),
    );
    Ok(())
}

async fn configure_gpg(
    ctx: &Context,
    runner: &dyn CommandRunner,
    artifact: &GpgKeyArtifact,
) -> Result<()> {
    let git = GitGlobalConfig::new(runner);
    let sign = |enabled: bool| if enabled { "true" } else { "false" };

    git.set("user.signingkey", &artifact.key_id).await?;
    git.set("commit.gpgsign", sign(ctx.settings.git.sign_commits))
        .await?;
    if ctx.settings.git.sign_tags {
        git.set("tag.gpgSign", "true").await?;
    }
    success!("Git will sign commits with {}", artifact.key_id);

    let export = runner
        .capture(
            &ToolCommand::new("gpg")
                .args(["--armor", "--export"])
                .arg(artifact.key_id.as_str()),
        )
        .await?
        .into_checked("gpg")?;

    print_public_artifact(
        "Add this GPG public key to your Git hosting account:",
        export.stdout.trim_end(),
    );
    Ok(())
}

fn print_public_artifact(heading: &str, body: &str) {
    let bufwtr = BufferWriter::stdout(ColorChoice::Auto);
    let mut buffer = bufwtr.buffer();
    let _ = writeln!(&mut buffer, "\n{heading}\n");
    let _ = buffer.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)));
    let _ = writeln!(&mut buffer, "{body}");
    let _ = buffer.reset();
    let _ = bufwtr.print(&buffer);
}
