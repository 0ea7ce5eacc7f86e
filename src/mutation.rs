//! Idempotent append-only edits to user configuration files.

use crate::error::Result;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// A block of text to be added to a configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigMutation {
    pub target: PathBuf,
    pub block: String,
}

/// What [`ConfigMutation::apply_unless`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The file did not exist and was created with the block
    Created,
    Appended,
    /// The file already contained an equivalent entry; nothing was written
    AlreadyPresent,
}

impl ConfigMutation {
    pub fn new(target: impl Into<PathBuf>, block: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            block: block.into(),
        }
    }

    /// Write the block unless `present` reports an equivalent entry in the file.
    ///
    /// A missing file is created (parent directory `0700`, file `0600` on unix).
    /// An existing file is only ever appended to.
    pub async fn apply_unless<F>(&self, present: F) -> Result<Applied>
    where
        F: Fn(&str) -> bool,
    {
        let existing = match tokio::fs::read_to_string(&self.target).await {
            Ok(text) => Some(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        let mut block = self.block.clone();
        if !block.ends_with('\n') {
            block.push('\n');
        }

        let Some(existing) = existing else {
            if let Some(parent) = self.target.parent() {
                ensure_private_dir(parent).await?;
            }
            tokio::fs::write(&self.target, block.as_bytes()).await?;
            set_mode(&self.target, 0o600).await?;
            tracing::debug!(path = %self.target.display(), "created config file");
            return Ok(Applied::Created);
        };

        if present(&existing) {
            tracing::debug!(path = %self.target.display(), "entry already present");
            return Ok(Applied::AlreadyPresent);
        }

        let separator = if existing.is_empty() || existing.ends_with('\n') {
            ""
        } else {
            "\n"
        };

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&self.target)
            .await?;
        file.write_all(format!("{separator}{block}").as_bytes())
            .await?;
        file.flush().await?;
        tracing::debug!(path = %self.target.display(), "appended config entry");
        Ok(Applied::Appended)
    }
}

/// Create `dir` (and parents) if needed; a newly created leaf gets mode `0700`.
pub async fn ensure_private_dir(dir: &Path) -> Result<()> {
    if tokio::fs::try_exists(dir).await.unwrap_or(false) {
        return Ok(());
    }
    tokio::fs::create_dir_all(dir).await?;
    set_mode(dir, 0o700).await
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
