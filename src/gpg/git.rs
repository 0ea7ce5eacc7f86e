//! Git global configuration, accessed through `git config --global`.

use crate::error::{ProvisionError, Result};
use crate::runner::{CommandRunner, ToolCommand};

/// Key-value view of the user's global Git config. Writes overwrite.
pub struct GitGlobalConfig<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> GitGlobalConfig<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let output = self
            .runner
            .capture(&ToolCommand::new("git").args(["config", "--global", "--get", key]))
            .await?;
        match output.code {
            Some(0) => Ok(Some(output.stdout.trim().to_string()).filter(|v| !v.is_empty())),
            // 1: key not set
            Some(1) => Ok(None),
            code => Err(ProvisionError::tool_failure("git", code, &output.stderr)),
        }
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.runner
            .capture(&ToolCommand::new("git").args(["config", "--global", key, value]))
            .await?
            .into_checked("git")?;
        tracing::debug!(key, value, "git config updated");
        Ok(())
    }
}
