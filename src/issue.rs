//! Issue tracker and pull requests via the GitHub CLI

use std::path::Path;
use std::process::Command;

use serde::Deserialize;

use crate::error::{StackError, format_error_block};
use crate::shell_exec::{failure_text, run};
use crate::styling::error_message;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Label {
    pub name: String,
}

/// An issue as returned by `gh issue view --json number,title,body,labels`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub labels: Vec<Label>,
}

impl Issue {
    pub fn label_names(&self) -> Vec<String> {
        self.labels.iter().map(|l| l.name.clone()).collect()
    }

    /// Task description written to the worktree's context record.
    pub fn to_markdown(&self) -> String {
        let mut out = format!("# Issue #{}: {}\n\n", self.number, self.title);
        if !self.labels.is_empty() {
            out.push_str(&format!("Labels: {}\n\n", self.label_names().join(", ")));
        }
        let body = self.body.trim();
        if body.is_empty() {
            out.push_str("_No description provided._\n");
        } else {
            out.push_str(body);
            out.push('\n');
        }
        out
    }
}

/// Pull request to open for a finished branch
#[derive(Debug, Clone)]
pub struct PullRequest<'a> {
    pub base: &'a str,
    pub head: &'a str,
    pub title: &'a str,
    pub body: &'a str,
}

pub trait IssueTracker {
    fn issue(&self, number: u64) -> anyhow::Result<Issue>;

    /// Open a pull request; returns its URL.
    fn create_pull_request(&self, worktree: &Path, pr: &PullRequest<'_>) -> anyhow::Result<String>;
}

/// `gh`, run from the repository
pub struct GhCli;

impl GhCli {
    pub fn require() -> anyhow::Result<()> {
        if which::which("gh").is_err() {
            return Err(StackError::PrerequisiteMissing {
                tool: "gh".into(),
                install_hint: "Install the GitHub CLI (https://cli.github.com) and run gh auth login"
                    .into(),
            }
            .into());
        }
        Ok(())
    }

    fn run(dir: Option<&Path>, args: &[&str]) -> anyhow::Result<String> {
        let mut cmd = Command::new("gh");
        cmd.args(args);
        // Plain JSON and URLs, no pager
        cmd.env("GH_PAGER", "").env("NO_COLOR", "1");
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        let output = run(&mut cmd, None)?;
        if !output.status.success() {
            let command = format!("gh {}", args.first().copied().unwrap_or_default());
            return Err(StackError::CommandFailed {
                command,
                error: failure_text(&output),
            }
            .into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl IssueTracker for GhCli {
    fn issue(&self, number: u64) -> anyhow::Result<Issue> {
        let number = number.to_string();
        let json = Self::run(
            None,
            &["issue", "view", &number, "--json", "number,title,body,labels"],
        )?;
        parse_issue(&json)
    }

    fn create_pull_request(&self, worktree: &Path, pr: &PullRequest<'_>) -> anyhow::Result<String> {
        Self::run(
            Some(worktree),
            &[
                "pr", "create", "--base", pr.base, "--head", pr.head, "--title", pr.title,
                "--body", pr.body,
            ],
        )
    }
}

fn parse_issue(json: &str) -> anyhow::Result<Issue> {
    serde_json::from_str(json).map_err(|e| {
        anyhow::anyhow!(format_error_block(
            error_message("Unexpected output from gh issue view"),
            &e.to_string()
        ))
    })
}
