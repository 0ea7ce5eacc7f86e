//! External process execution.
//!
//! Every call into `ssh-keygen`, `gpg`, `ykman`, `git` and the package managers
//! goes through [`CommandRunner`]. Calls are awaited one at a time; nothing in
//! this crate runs two external processes concurrently.

use crate::error::{ProvisionError, Result};
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// A single external command: program, arguments and optional stdin payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " '{arg}'")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Captured result of an external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Convert a non-zero exit into `ExternalToolFailure`.
    pub fn into_checked(self, tool: &str) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(ProvisionError::tool_failure(tool, self.code, &self.stderr))
        }
    }
}

/// Reacts to status lines emitted by a conversing tool.
///
/// Returning `Some(line)` writes `line` plus a newline to the tool's stdin.
pub trait Responder {
    fn respond(&mut self, status_line: &str) -> Result<Option<String>>;
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// PATH lookup for a binary.
    fn locate(&self, program: &str) -> Option<PathBuf>;

    /// Run with piped stdout/stderr and collect both.
    async fn capture(&self, command: &ToolCommand) -> Result<ToolOutput>;

    /// Run attached to the user's terminal (touch, PIN and sudo prompts pass through).
    async fn interactive(&self, command: &ToolCommand) -> Result<ToolOutput>;

    /// Run with stdin and stdout piped, feeding every stdout line to `responder`.
    ///
    /// stderr stays attached to the terminal.
    async fn converse(
        &self,
        command: &ToolCommand,
        responder: &mut (dyn Responder + Send),
    ) -> Result<ToolOutput>;
}

/// Runs real processes through `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

fn spawn_failure(command: &ToolCommand, e: &std::io::Error) -> ProvisionError {
    ProvisionError::ExternalToolFailure {
        tool: command.program.clone(),
        code: "n/a".to_string(),
        detail: format!("failed to start: {e}"),
    }
}

async fn write_reply(pipe: &mut tokio::process::ChildStdin, reply: &str) -> std::io::Result<()> {
    pipe.write_all(reply.as_bytes()).await?;
    pipe.write_all(b"\n").await?;
    pipe.flush().await
}

#[async_trait]
impl CommandRunner for SystemRunner {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }

    async fn capture(&self, command: &ToolCommand) -> Result<ToolOutput> {
        tracing::debug!(command = %command, "capture");

        let mut child = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .stdin(if command.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_failure(command, &e))?;

        if let (Some(input), Some(mut stdin)) = (&command.stdin, child.stdin.take()) {
            stdin.write_all(input.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        let result = ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        tracing::debug!(command = %command.program, code = ?result.code, "finished");
        Ok(result)
    }

    async fn interactive(&self, command: &ToolCommand) -> Result<ToolOutput> {
        tracing::debug!(command = %command, "interactive");

        let status = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| spawn_failure(command, &e))?;

        tracing::debug!(command = %command.program, code = ?status.code(), "finished");
        Ok(ToolOutput {
            code: status.code(),
            ..ToolOutput::default()
        })
    }

    async fn converse(
        &self,
        command: &ToolCommand,
        responder: &mut (dyn Responder + Send),
    ) -> Result<ToolOutput> {
        tracing::debug!(command = %command, "converse");

        let mut child = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| spawn_failure(command, &e))?;

        let mut stdin = child.stdin.take();
        let stdout = child.stdout.take().ok_or_else(|| {
            ProvisionError::Io(std::io::Error::other("child stdout was not captured"))
        })?;
        let mut lines = BufReader::new(stdout).lines();
        let mut transcript = String::new();

        while let Some(line) = lines.next_line().await? {
            tracing::debug!(status = %line, "<-");
            transcript.push_str(&line);
            transcript.push('\n');

            let reply = match responder.respond(&line) {
                Ok(reply) => reply,
                Err(e) => {
                    // Best effort: the session is already being abandoned.
                    let _ = child.kill().await;
                    return Err(e);
                }
            };

            if let (Some(reply), Some(pipe)) = (reply, stdin.as_mut()) {
                tracing::debug!(reply = %reply, "->");
                if let Err(e) = write_reply(pipe, &reply).await {
                    // The tool stopped reading; do not leave it running.
                    let _ = child.kill().await;
                    return Err(e.into());
                }
            }
        }

        drop(stdin);
        let status = child.wait().await?;
        Ok(ToolOutput {
            code: status.code(),
            stdout: transcript,
            stderr: String::new(),
        })
    }
}
