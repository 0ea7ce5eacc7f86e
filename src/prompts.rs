//! User interaction: coloured status macros and the yes/no precondition gate.
//!
//! All termcolor operations use `let _ =` to deliberately ignore errors.
//! Colored output is decorative; if stdout/stderr is unavailable (broken pipe,
//! no TTY) the run continues without it. Reading the user's answer is critical
//! and propagates errors.

use crate::error::{ProvisionError, Result};
use std::io::{self, BufRead, Write};

/// Print an informational line in blue.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {{
        use ::std::io::Write as _;
        use $crate::__termcolor::WriteColor as _;
        let bufwtr = $crate::__termcolor::BufferWriter::stdout($crate::__termcolor::ColorChoice::Auto);
        let mut buffer = bufwtr.buffer();
        let _ = buffer.set_color($crate::__termcolor::ColorSpec::new().set_fg(Some($crate::__termcolor::Color::Blue)));
        let _ = write!(&mut buffer, "ℹ️  ");
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer, $($arg)*);
        let _ = bufwtr.print(&buffer);
    }};
}

/// Print a success line with a green check mark.
#[macro_export]
macro_rules! success {
    ($($arg:tt)*) => {{
        use ::std::io::Write as _;
        use $crate::__termcolor::WriteColor as _;
        let bufwtr = $crate::__termcolor::BufferWriter::stdout($crate::__termcolor::ColorChoice::Auto);
        let mut buffer = bufwtr.buffer();
        let _ = buffer.set_color($crate::__termcolor::ColorSpec::new().set_fg(Some($crate::__termcolor::Color::Green)));
        let _ = write!(&mut buffer, "✓ ");
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer, $($arg)*);
        let _ = bufwtr.print(&buffer);
    }};
}

/// Print a warning to stderr in yellow.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {{
        use ::std::io::Write as _;
        use $crate::__termcolor::WriteColor as _;
        let bufwtr = $crate::__termcolor::BufferWriter::stderr($crate::__termcolor::ColorChoice::Auto);
        let mut buffer = bufwtr.buffer();
        let _ = buffer.set_color($crate::__termcolor::ColorSpec::new().set_fg(Some($crate::__termcolor::Color::Yellow)));
        let _ = write!(&mut buffer, "⚠️  ");
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer, $($arg)*);
        let _ = bufwtr.print(&buffer);
    }};
}

/// Print a fatal error to stderr in red.
#[macro_export]
macro_rules! fail {
    ($($arg:tt)*) => {{
        use ::std::io::Write as _;
        use $crate::__termcolor::WriteColor as _;
        let bufwtr = $crate::__termcolor::BufferWriter::stderr($crate::__termcolor::ColorChoice::Auto);
        let mut buffer = bufwtr.buffer();
        let _ = buffer.set_color($crate::__termcolor::ColorSpec::new().set_fg(Some($crate::__termcolor::Color::Red)));
        let _ = write!(&mut buffer, "❌ ");
        let _ = buffer.reset();
        let _ = writeln!(&mut buffer, $($arg)*);
        let _ = bufwtr.print(&buffer);
    }};
}

/// Print a step banner between workflow stages.
pub fn banner(title: &str) {
    let bufwtr = termcolor::BufferWriter::stdout(termcolor::ColorChoice::Auto);
    let mut buffer = bufwtr.buffer();
    let _ = writeln!(&mut buffer, "\n{}", "━".repeat(60));
    let _ = writeln!(&mut buffer, "{title}\n");
    let _ = bufwtr.print(&buffer);
}

/// Source of interactive answers.
pub trait Prompter: Send {
    /// Ask a yes/no question. Only an affirmative answer returns `true`.
    fn confirm(&mut self, question: &str) -> Result<bool>;

    /// Ask for a line of free text. `None` on EOF.
    fn ask(&mut self, question: &str) -> Result<Option<String>>;
}

/// Tolerant yes-pattern: `y` or `yes` in any case, surrounding whitespace ignored.
#[must_use]
pub fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim();
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}

/// Require confirmation before a destructive step; refusal aborts the run.
pub fn gate(prompter: &mut dyn Prompter, question: &str) -> Result<()> {
    if prompter.confirm(question)? {
        Ok(())
    } else {
        Err(ProvisionError::UserAborted(question.to_string()))
    }
}

/// Reads answers from the controlling terminal's stdin.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    fn read_line(prompt: &str) -> Result<Option<String>> {
        print!("{prompt}");
        io::stdout().flush()?;

        let mut input = String::new();
        let bytes_read = io::stdin().lock().read_line(&mut input)?;
        if bytes_read == 0 {
            println!();
            return Ok(None);
        }
        Ok(Some(input.trim().to_string()))
    }
}

impl Prompter for TerminalPrompter {
    fn confirm(&mut self, question: &str) -> Result<bool> {
        let answer = Self::read_line(&format!("{question} (y/N): "))?;
        Ok(answer.as_deref().is_some_and(is_affirmative))
    }

    fn ask(&mut self, question: &str) -> Result<Option<String>> {
        Self::read_line(&format!("{question}: "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedPrompter;

    #[test]
    fn yes_pattern_is_tolerant() {
        for answer in ["y", "Y", "yes", "YES", "Yes", "  y \n"] {
            assert!(is_affirmative(answer), "{answer:?} should be accepted");
        }
    }

    #[test]
    fn everything_else_is_refusal() {
        for answer in ["", "n", "no", "yep", "sure", "ye", "y es", "1"] {
            assert!(!is_affirmative(answer), "{answer:?} should be refused");
        }
    }

    #[test]
    fn refused_gate_aborts() {
        let mut prompter = ScriptedPrompter::new(["no"]);
        let err = gate(&mut prompter, "Overwrite?").unwrap_err();
        assert!(matches!(err, ProvisionError::UserAborted(q) if q == "Overwrite?"));
    }

    #[test]
    fn accepted_gate_passes() {
        let mut prompter = ScriptedPrompter::new(["yes"]);
        gate(&mut prompter, "Overwrite?").unwrap();
        assert_eq!(prompter.questions(), ["Overwrite?"]);
    }
}
