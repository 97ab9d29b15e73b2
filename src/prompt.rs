//! Confirmation prompts
//!
//! Destructive commands ask before acting through the [`Confirm`] port. The
//! terminal implementation reads a line from stdin; tests script the answers.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Write};

use crate::styling::{AnstyleStyle, PROMPT_SYMBOL, eprint, eprintln};

/// How many of a set of candidates to act on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    All,
    /// Ask about each candidate in turn
    Each,
    None,
}

pub trait Confirm {
    /// Ask `question` and return the trimmed answer (empty on EOF).
    fn ask(&self, question: &str, choices: &str) -> anyhow::Result<String>;

    /// Yes/no question; anything but `y`/`yes` is a no.
    fn confirm(&self, question: &str) -> anyhow::Result<bool> {
        let answer = self.ask(question, "[y/N]")?.to_lowercase();
        Ok(answer == "y" || answer == "yes")
    }

    /// All / select individually / none; anything unrecognised is none.
    fn select(&self, question: &str) -> anyhow::Result<Selection> {
        let answer = self.ask(question, "[a]ll / [s]elect / [N]one")?.to_lowercase();
        Ok(match answer.as_str() {
            "a" | "all" | "y" | "yes" => Selection::All,
            "s" | "select" => Selection::Each,
            _ => Selection::None,
        })
    }
}

/// Prompts on stderr and reads the answer from stdin
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn ask(&self, question: &str, choices: &str) -> anyhow::Result<String> {
        let bold = AnstyleStyle::new().bold();
        eprint!("{PROMPT_SYMBOL} {question} {bold}{choices}{bold:#} ");
        io::stderr().flush()?;

        let mut input = String::new();
        let read = io::stdin().read_line(&mut input)?;
        if read == 0 {
            // EOF: keep the transcript tidy
            eprintln!();
        }
        Ok(input.trim().to_string())
    }
}

/// Answers from a fixed script, recording every question asked
#[derive(Debug, Default)]
pub struct ScriptedConfirm {
    answers: RefCell<VecDeque<String>>,
    asked: RefCell<Vec<String>>,
}

impl ScriptedConfirm {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: RefCell::new(answers.into_iter().map(Into::into).collect()),
            asked: RefCell::new(Vec::new()),
        }
    }

    /// Questions asked so far, in order.
    pub fn asked(&self) -> Vec<String> {
        self.asked.borrow().clone()
    }
}

impl Confirm for ScriptedConfirm {
    fn ask(&self, question: &str, _choices: &str) -> anyhow::Result<String> {
        self.asked.borrow_mut().push(question.to_string());
        // Running out of answers behaves like EOF
        Ok(self.answers.borrow_mut().pop_front().unwrap_or_default())
    }
}
