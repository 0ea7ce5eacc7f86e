//! The credential produced by a provisioning run.
//!
//! Only public material and identifiers are held here; private keys stay in
//! the custody of the token, `ssh-keygen` or `gpg`.

use crate::ssh::PublicKeyLine;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyArtifact {
    Ssh(SshKeyArtifact),
    Gpg(GpgKeyArtifact),
}

/// A resident SSH key handle on disk plus its public key line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshKeyArtifact {
    /// Key handle file (the private part lives on the token)
    pub path: PathBuf,
    pub public_path: PathBuf,
    pub public_key: PublicKeyLine,
}

/// A GPG key whose sub-keys were moved onto the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpgKeyArtifact {
    /// Long-form key ID, e.g. `3AA5C34371567BD2`
    pub key_id: String,
    pub fingerprint: Option<String>,
    pub email: String,
}
