//! Scripted conversations with `gpg --command-fd 0 --status-fd 1`.
//!
//! gpg announces every question on the status channel as
//! `[GNUPG:] GET_LINE <keyword>` (or `GET_BOOL` / `GET_HIDDEN`). A [`Dialogue`]
//! holds the ordered `(keyword, reply)` steps we expect to walk through; any
//! question that is not the next expected keyword aborts the session instead
//! of feeding the answer to the wrong prompt.
//!
//! PINs and passphrases never travel over this channel: gpg-agent asks for
//! them through pinentry. A `GET_HIDDEN` request therefore aborts too.

use crate::error::{ProvisionError, Result};
use crate::prompts::{Prompter, gate};
use crate::runner::Responder;
use std::collections::VecDeque;

const STATUS_PREFIX: &str = "[GNUPG:] ";

/// How to answer a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Send this line verbatim
    Line(String),
    /// Ask the user first; refusal aborts the run, consent answers `y`
    Confirm(String),
}

impl Reply {
    pub fn line(text: impl Into<String>) -> Self {
        Self::Line(text.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub expect: String,
    pub reply: Reply,
}

/// A parsed status-channel line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent<'a> {
    /// `GET_LINE` / `GET_BOOL`
    Question(&'a str),
    /// `GET_HIDDEN`: a secret requested on the command channel
    Secret(&'a str),
    /// `SC_OP_FAILURE`, optionally with a code
    CardFailure(Option<&'a str>),
    Other,
}

#[must_use]
pub fn parse_status_line(line: &str) -> StatusEvent<'_> {
    let Some(rest) = line.trim_end().strip_prefix(STATUS_PREFIX) else {
        return StatusEvent::Other;
    };
    let mut parts = rest.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("GET_LINE" | "GET_BOOL"), Some(keyword)) => StatusEvent::Question(keyword),
        (Some("GET_HIDDEN"), Some(keyword)) => StatusEvent::Secret(keyword),
        (Some("SC_OP_FAILURE"), code) => StatusEvent::CardFailure(code),
        _ => StatusEvent::Other,
    }
}

#[derive(Debug, Clone)]
pub struct Dialogue {
    tool: String,
    steps: VecDeque<Step>,
    /// Prompts that may appear at any point, answered without consuming a step
    interjections: Vec<Step>,
}

impl Dialogue {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            steps: VecDeque::new(),
            interjections: Vec::new(),
        }
    }

    #[must_use]
    pub fn step(mut self, expect: impl Into<String>, reply: Reply) -> Self {
        self.steps.push_back(Step {
            expect: expect.into(),
            reply,
        });
        self
    }

    #[must_use]
    pub fn interject(mut self, expect: impl Into<String>, reply: Reply) -> Self {
        self.interjections.push(Step {
            expect: expect.into(),
            reply,
        });
        self
    }

    fn mismatch(&self, expected: &str, actual: impl Into<String>) -> ProvisionError {
        ProvisionError::DialogueMismatch {
            tool: self.tool.clone(),
            expected: expected.to_string(),
            actual: actual.into(),
        }
    }

    /// React to one status line; `Some(reply)` must be written to the tool.
    pub fn respond(&mut self, line: &str, prompter: &mut dyn Prompter) -> Result<Option<String>> {
        let keyword = match parse_status_line(line) {
            StatusEvent::Other => return Ok(None),
            StatusEvent::CardFailure(code) => {
                return Err(ProvisionError::ExternalToolFailure {
                    tool: self.tool.clone(),
                    code: code.unwrap_or("card").to_string(),
                    detail: "smartcard operation failed (wrong PIN or card removed?)".to_string(),
                });
            }
            StatusEvent::Secret(keyword) => {
                return Err(self.mismatch("pinentry", format!("secret request '{keyword}'")));
            }
            StatusEvent::Question(keyword) => keyword,
        };

        let reply = if let Some(step) = self.interjections.iter().find(|s| s.expect == keyword) {
            step.reply.clone()
        } else {
            match self.steps.front() {
                Some(step) if step.expect == keyword => {
                    let reply = step.reply.clone();
                    self.steps.pop_front();
                    reply
                }
                Some(step) => return Err(self.mismatch(&step.expect, keyword)),
                None => return Err(self.mismatch("end of session", keyword)),
            }
        };

        match reply {
            Reply::Line(text) => Ok(Some(text)),
            Reply::Confirm(question) => {
                gate(prompter, &question)?;
                Ok(Some("y".to_string()))
            }
        }
    }

    /// Fail if the tool exited before the script was complete.
    pub fn finish(&self) -> Result<()> {
        match self.steps.front() {
            Some(step) => Err(self.mismatch(&step.expect, "end of session")),
            None => Ok(()),
        }
    }
}

/// A dialogue bound to the prompter that answers its confirmations.
pub struct Session<'a> {
    pub dialogue: &'a mut Dialogue,
    pub prompter: &'a mut dyn Prompter,
}

impl Responder for Session<'_> {
    fn respond(&mut self, status_line: &str) -> Result<Option<String>> {
        self.dialogue.respond(status_line, self.prompter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedPrompter;

    fn quiet() -> ScriptedPrompter {
        ScriptedPrompter::new(Vec::<String>::new())
    }

    #[test]
    fn parses_status_lines() {
        assert_eq!(
            parse_status_line("[GNUPG:] GET_LINE keyedit.prompt"),
            StatusEvent::Question("keyedit.prompt")
        );
        assert_eq!(
            parse_status_line("[GNUPG:] GET_BOOL cardedit.genkeys.replace_key\n"),
            StatusEvent::Question("cardedit.genkeys.replace_key")
        );
        assert_eq!(
            parse_status_line("[GNUPG:] GET_HIDDEN passphrase.enter"),
            StatusEvent::Secret("passphrase.enter")
        );
        assert_eq!(
            parse_status_line("[GNUPG:] SC_OP_FAILURE 2"),
            StatusEvent::CardFailure(Some("2"))
        );
        assert_eq!(
            parse_status_line("[GNUPG:] KEY_CONSIDERED ABC 0"),
            StatusEvent::Other
        );
        assert_eq!(parse_status_line("sec  rsa4096/ABC"), StatusEvent::Other);
    }

    #[test]
    fn walks_steps_in_order() {
        let mut dialogue = Dialogue::new("gpg")
            .step("keyedit.prompt", Reply::line("key 1"))
            .step("keyedit.prompt", Reply::line("save"));
        let mut prompter = quiet();

        assert_eq!(
            dialogue
                .respond("[GNUPG:] KEY_CONSIDERED X 0", &mut prompter)
                .unwrap(),
            None
        );
        assert_eq!(
            dialogue
                .respond("[GNUPG:] GET_LINE keyedit.prompt", &mut prompter)
                .unwrap()
                .as_deref(),
            Some("key 1")
        );
        assert!(dialogue.finish().is_err());
        assert_eq!(
            dialogue
                .respond("[GNUPG:] GET_LINE keyedit.prompt", &mut prompter)
                .unwrap()
                .as_deref(),
            Some("save")
        );
        dialogue.finish().unwrap();
    }

    #[test]
    fn unexpected_prompt_fails_loudly() {
        let mut dialogue =
            Dialogue::new("gpg").step("cardedit.genkeys.storekeytype", Reply::line("1"));

        let err = dialogue
            .respond("[GNUPG:] GET_BOOL keyedit.keytocard.use_primary", &mut quiet())
            .unwrap_err();

        match err {
            ProvisionError::DialogueMismatch {
                expected, actual, ..
            } => {
                assert_eq!(expected, "cardedit.genkeys.storekeytype");
                assert_eq!(actual, "keyedit.keytocard.use_primary");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn prompt_after_script_end_fails() {
        let mut dialogue = Dialogue::new("gpg");
        let err = dialogue
            .respond("[GNUPG:] GET_LINE keyedit.prompt", &mut quiet())
            .unwrap_err();
        assert!(matches!(err, ProvisionError::DialogueMismatch { expected, .. } if expected == "end of session"));
    }

    #[test]
    fn secrets_are_never_supplied() {
        let mut dialogue = Dialogue::new("gpg").step("keyedit.prompt", Reply::line("save"));
        let err = dialogue
            .respond("[GNUPG:] GET_HIDDEN passphrase.enter", &mut quiet())
            .unwrap_err();
        assert!(matches!(err, ProvisionError::DialogueMismatch { .. }));
    }

    #[test]
    fn card_failure_is_a_tool_failure() {
        let mut dialogue = Dialogue::new("gpg");
        let err = dialogue
            .respond("[GNUPG:] SC_OP_FAILURE 2", &mut quiet())
            .unwrap_err();
        assert!(matches!(err, ProvisionError::ExternalToolFailure { code, .. } if code == "2"));
    }

    #[test]
    fn interjection_confirms_without_consuming_steps() {
        let mut dialogue = Dialogue::new("gpg")
            .step("keyedit.prompt", Reply::line("save"))
            .interject(
                "cardedit.genkeys.replace_key",
                Reply::Confirm("Replace?".to_string()),
            );
        let mut prompter = ScriptedPrompter::new(["y"]);

        let reply = dialogue
            .respond(
                "[GNUPG:] GET_BOOL cardedit.genkeys.replace_key",
                &mut prompter,
            )
            .unwrap();

        assert_eq!(reply.as_deref(), Some("y"));
        assert!(dialogue.finish().is_err());
        let next = dialogue
            .respond("[GNUPG:] GET_LINE keyedit.prompt", &mut prompter)
            .unwrap();
        assert_eq!(next.as_deref(), Some("save"));
        dialogue.finish().unwrap();
    }

    #[test]
    fn refused_interjection_aborts() {
        let mut dialogue = Dialogue::new("gpg").interject(
            "cardedit.genkeys.replace_key",
            Reply::Confirm("Replace?".to_string()),
        );
        let mut prompter = ScriptedPrompter::new(["n"]);

        let err = dialogue
            .respond(
                "[GNUPG:] GET_BOOL cardedit.genkeys.replace_key",
                &mut prompter,
            )
            .unwrap_err();

        assert!(matches!(err, ProvisionError::UserAborted(_)));
    }
}
