//! Interactive value prompting.

use std::io::{self, BufRead, IsTerminal, Write};

use crate::error::{DeployError, DeployResult};

/// A question asked when a configuration value is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub component: String,
    pub key: String,
    pub description: String,
}

/// Source of interactively supplied values.
///
/// Asking blocks the whole run until an answer is available.
pub trait Prompter: Send + Sync {
    fn ask(&self, question: &Question) -> DeployResult<String>;
}

/// Prompts on stderr and reads one line from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn ask(&self, question: &Question) -> DeployResult<String> {
        if !io::stdin().is_terminal() {
            return Err(DeployError::Prompt(format!(
                "cannot ask for '{}' of component '{}' without a terminal",
                question.key, question.component
            )));
        }

        let mut stderr = io::stderr();
        writeln!(stderr, "{}", question.description)?;
        write!(stderr, "{} ({}): ", question.key, question.component)?;
        stderr.flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Refuses every question.
#[derive(Debug, Default, Clone, Copy)]
pub struct NonInteractive;

impl Prompter for NonInteractive {
    fn ask(&self, question: &Question) -> DeployResult<String> {
        Err(DeployError::MissingValue {
            component: question.component.clone(),
            key: question.key.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_interactive_refuses() {
        let question = Question {
            component: "web".into(),
            key: "port".into(),
            description: "Port".into(),
        };
        let err = NonInteractive.ask(&question).unwrap_err();
        assert!(matches!(err, DeployError::MissingValue { ref key, .. } if key == "port"));
    }
}
