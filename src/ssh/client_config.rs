//! `~/.ssh/config` host stanza management.

use crate::context::Context;
use crate::error::Result;
use crate::mutation::{Applied, ConfigMutation};
use std::path::Path;

/// Stanza dedicating `identity_file` to `remote_host`.
#[must_use]
pub fn host_stanza(remote_host: &str, identity_file: &Path) -> String {
    let identity = identity_file.display().to_string();
    let identity = if identity.contains(char::is_whitespace) {
        format!("\"{identity}\"")
    } else {
        identity
    };
    format!("Host {remote_host}\n    IdentityFile {identity}\n    IdentitiesOnly yes\n")
}

/// Whether any `Host` line in `config` already names `remote_host`.
///
/// Matches `Host a b c` and `Host=a` forms, case-insensitively, ignoring
/// comments. Patterns are compared literally.
#[must_use]
pub fn has_host_stanza(config: &str, remote_host: &str) -> bool {
    config.lines().any(|line| {
        let line = line.trim();
        if line.starts_with('#') {
            return false;
        }
        let Some((keyword, rest)) = split_keyword(line) else {
            return false;
        };
        keyword.eq_ignore_ascii_case("host")
            && rest
                .split_whitespace()
                .map(|host| host.trim_matches('"'))
                .any(|host| host.eq_ignore_ascii_case(remote_host))
    })
}

fn split_keyword(line: &str) -> Option<(&str, &str)> {
    let end = line.find(|c: char| c.is_whitespace() || c == '=')?;
    let (keyword, rest) = line.split_at(end);
    let rest = rest.trim_start();
    let rest = rest.strip_prefix('=').unwrap_or(rest);
    Some((keyword, rest))
}

/// Add the host stanza for the configured remote host unless one already exists.
pub async fn add_host_stanza(ctx: &Context, identity_file: &Path) -> Result<Applied> {
    let remote_host = ctx.settings.ssh.remote_host.as_str();
    let mutation = ConfigMutation::new(
        ctx.ssh_config_path(),
        host_stanza(remote_host, identity_file),
    );
    mutation
        .apply_unless(|text| has_host_stanza(text, remote_host))
        .await
}
