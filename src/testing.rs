//! Test doubles for the process and prompt seams.

use crate::error::{ProvisionError, Result};
use crate::prompts::{Prompter, is_affirmative};
use crate::runner::{CommandRunner, Responder, ToolCommand, ToolOutput};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

type Effect = Arc<dyn Fn(&FakeRunner, &ToolCommand) + Send + Sync>;

struct Rule {
    pattern: String,
    outputs: VecDeque<ToolOutput>,
    status_lines: Vec<String>,
    effect: Option<Effect>,
}

/// Scripted [`CommandRunner`].
///
/// Rules match when their pattern is a substring of the rendered command line;
/// the first matching rule wins. A rule's last output repeats once its queue
/// drains. Unmatched commands succeed with empty output.
#[derive(Default)]
pub struct FakeRunner {
    tools: Mutex<HashMap<String, PathBuf>>,
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<String>>,
    replies: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_tools(self, tools: &[&str]) -> Self {
        for tool in tools {
            self.install_tool(tool);
        }
        self
    }

    pub fn install_tool(&self, tool: &str) {
        self.tools
            .lock()
            .unwrap()
            .insert(tool.to_string(), PathBuf::from(format!("/usr/bin/{tool}")));
    }

    #[must_use]
    pub fn on(self, pattern: &str, output: ToolOutput) -> Self {
        self.push_rule(pattern, vec![output], Vec::new(), None)
    }

    #[must_use]
    pub fn on_with<F>(self, pattern: &str, output: ToolOutput, effect: F) -> Self
    where
        F: Fn(&FakeRunner, &ToolCommand) + Send + Sync + 'static,
    {
        self.push_rule(pattern, vec![output], Vec::new(), Some(Arc::new(effect)))
    }

    /// Script the status lines a conversing tool emits.
    #[must_use]
    pub fn converse_with(self, pattern: &str, status_lines: &[&str], exit: ToolOutput) -> Self {
        let lines = status_lines.iter().map(ToString::to_string).collect();
        self.push_rule(pattern, vec![exit], lines, None)
    }

    fn push_rule(
        self,
        pattern: &str,
        outputs: Vec<ToolOutput>,
        status_lines: Vec<String>,
        effect: Option<Effect>,
    ) -> Self {
        self.rules.lock().unwrap().push(Rule {
            pattern: pattern.to_string(),
            outputs: outputs.into(),
            status_lines,
            effect,
        });
        self
    }

    /// Every command line run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, pattern: &str) -> bool {
        self.calls().iter().any(|c| c.contains(pattern))
    }

    /// Lines written to conversing tools' stdin.
    pub fn replies(&self) -> Vec<String> {
        self.replies.lock().unwrap().clone()
    }

    fn dispatch(&self, command: &ToolCommand) -> (ToolOutput, Vec<String>) {
        let line = command.to_string();
        self.calls.lock().unwrap().push(line.clone());

        let (output, lines, effect) = {
            let mut rules = self.rules.lock().unwrap();
            match rules.iter_mut().find(|r| line.contains(&r.pattern)) {
                Some(rule) => {
                    let output = if rule.outputs.len() > 1 {
                        rule.outputs.pop_front().unwrap_or_default()
                    } else {
                        rule.outputs.front().cloned().unwrap_or_default()
                    };
                    (output, rule.status_lines.clone(), rule.effect.clone())
                }
                None => (ToolOutput::ok(""), Vec::new(), None),
            }
        };

        if let Some(effect) = effect {
            effect(self, command);
        }
        (output, lines)
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        self.tools.lock().unwrap().get(program).cloned()
    }

    async fn capture(&self, command: &ToolCommand) -> Result<ToolOutput> {
        Ok(self.dispatch(command).0)
    }

    async fn interactive(&self, command: &ToolCommand) -> Result<ToolOutput> {
        Ok(self.dispatch(command).0)
    }

    async fn converse(
        &self,
        command: &ToolCommand,
        responder: &mut (dyn Responder + Send),
    ) -> Result<ToolOutput> {
        let (output, lines) = self.dispatch(command);
        for line in lines {
            if let Some(reply) = responder.respond(&line)? {
                self.replies.lock().unwrap().push(reply);
            }
        }
        Ok(output)
    }
}

/// Answers prompts from a fixed script; an exhausted script answers EOF.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    questions: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            questions: Vec::new(),
        }
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&mut self, question: &str) -> Result<bool> {
        Ok(self.ask(question)?.as_deref().is_some_and(is_affirmative))
    }

    fn ask(&mut self, question: &str) -> Result<Option<String>> {
        self.questions.push(question.to_string());
        Ok(self.answers.pop_front())
    }
}

/// Convenience for asserting on the error variant of a result.
pub fn expect_err<T: std::fmt::Debug>(result: Result<T>) -> ProvisionError {
    match result {
        Ok(value) => panic!("expected an error, got Ok({value:?})"),
        Err(e) => e,
    }
}
