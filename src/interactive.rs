//! Interactive terminal prompts.
//!
//! - [`Confirm`] / [`LinePrompt`]: a blocking one-question-per-grant y/N
//!   prompt. Only "y" (any case) accepts; EOF, read errors and anything
//!   else reject.
//! - [`pick_one`]: a fuzzy single-select picker built on dialoguer, used to
//!   choose a codespace when several are available.

use std::fmt;
use std::io::{self, BufRead, Write};

use dialoguer::{FuzzySelect, theme::ColorfulTheme};

/// Asks the operator a yes/no question.
pub trait Confirm {
    /// Blocks until an answer is available. Never fails: anything that is
    /// not an explicit yes is a no.
    fn confirm(&mut self, question: &str) -> bool;
}

/// Line-oriented y/N prompt over any reader/writer pair.
pub struct LinePrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Consume the prompt and return what was written to the output.
    pub fn into_output(self) -> W {
        self.output
    }
}

impl LinePrompt<io::StdinLock<'static>, io::Stdout> {
    /// Prompt on the process's stdin/stdout.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Confirm for LinePrompt<R, W> {
    fn confirm(&mut self, question: &str) -> bool {
        let asked = write!(self.output, "    {question} [y/N] ").and_then(|_| self.output.flush());
        if let Err(e) = asked {
            tracing::debug!(error = %e, "could not write prompt");
            return false;
        }

        let mut answer = String::new();
        match self.input.read_line(&mut answer) {
            Ok(0) => false,
            Ok(_) => answer.trim().eq_ignore_ascii_case("y"),
            Err(e) => {
                tracing::debug!(error = %e, "could not read answer");
                false
            }
        }
    }
}

/// Show a fuzzy picker and return the chosen index.
///
/// `Ok(None)` means the operator dismissed the picker.
pub fn pick_one(
    prompt: &str,
    header: &str,
    items: &[String],
) -> Result<Option<usize>, InteractiveError> {
    if items.is_empty() {
        return Err(InteractiveError::NoChoices);
    }

    println!();
    println!("  {header}");

    FuzzySelect::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(items)
        .default(0)
        .interact_opt()
        .map_err(|e| InteractiveError::IoError(e.to_string()))
}

/// Errors from interactive prompts.
#[derive(Debug)]
pub enum InteractiveError {
    /// Nothing to choose from
    NoChoices,
    /// IO error during prompt
    IoError(String),
}

impl fmt::Display for InteractiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InteractiveError::NoChoices => write!(f, "Nothing available to select"),
            InteractiveError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for InteractiveError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn ask(input: &str) -> (bool, String) {
        let mut prompt = LinePrompt::new(Cursor::new(input.as_bytes().to_vec()), Vec::new());
        let answer = prompt.confirm("Add 'Bash(ls)'?");
        (answer, String::from_utf8(prompt.into_output()).unwrap())
    }

    #[test]
    fn test_yes_is_case_insensitive() {
        assert!(ask("y\n").0);
        assert!(ask("Y\n").0);
        assert!(ask("  y  \n").0);
    }

    #[test]
    fn test_everything_else_rejects() {
        assert!(!ask("yes\n").0);
        assert!(!ask("n\n").0);
        assert!(!ask("\n").0);
        assert!(!ask("").0);
    }

    #[test]
    fn test_prompt_text() {
        let (_, shown) = ask("n\n");
        assert_eq!(shown, "    Add 'Bash(ls)'? [y/N] ");
    }

    #[test]
    fn test_sequential_answers() {
        let mut prompt = LinePrompt::new(Cursor::new(b"y\nn\ny\n".to_vec()), io::sink());
        let answers: Vec<bool> = (0..4).map(|i| prompt.confirm(&format!("q{i}"))).collect();
        assert_eq!(answers, vec![true, false, true, false]);
    }

    #[test]
    fn test_pick_one_requires_items() {
        let err = pick_one("Select", "NAME", &[]).unwrap_err();
        assert!(matches!(err, InteractiveError::NoChoices));
    }

    #[test]
    fn test_interactive_error_display() {
        assert!(InteractiveError::NoChoices.to_string().contains("Nothing"));
        assert!(
            InteractiveError::IoError("test error".into())
                .to_string()
                .contains("test error")
        );
    }
}
