//! Launching the AI coding assistant in a worktree

use std::path::Path;
use std::process::Command;

use crate::config::AssistantSettings;
use crate::context::CONTEXT_DIR;
use crate::error::StackError;
use crate::shell_exec::run_interactive;

pub trait Assistant {
    /// Run the assistant attached to the terminal in `worktree` until it
    /// exits; returns whether it exited successfully.
    fn launch(
        &self,
        worktree: &Path,
        prompt: Option<&str>,
        env: &[(String, String)],
    ) -> anyhow::Result<bool>;
}

/// The configured assistant command (default `claude`)
pub struct CommandAssistant<'a> {
    settings: &'a AssistantSettings,
}

impl<'a> CommandAssistant<'a> {
    pub fn new(settings: &'a AssistantSettings) -> Self {
        Self { settings }
    }

    pub fn require(&self) -> anyhow::Result<()> {
        if which::which(&self.settings.command).is_err() {
            return Err(StackError::PrerequisiteMissing {
                tool: self.settings.command.clone(),
                install_hint: "Install it, or set assistant.command in the stacktrunk config"
                    .into(),
            }
            .into());
        }
        Ok(())
    }

    fn command(&self, worktree: &Path, prompt: Option<&str>) -> Command {
        let mut cmd = Command::new(&self.settings.command);
        cmd.args(&self.settings.args);
        if let Some(prompt) = prompt {
            cmd.arg(prompt);
        }
        cmd.current_dir(worktree);
        cmd
    }
}

impl Assistant for CommandAssistant<'_> {
    fn launch(
        &self,
        worktree: &Path,
        prompt: Option<&str>,
        env: &[(String, String)],
    ) -> anyhow::Result<bool> {
        let mut cmd = self.command(worktree, prompt);
        for (name, value) in env {
            cmd.env(name, value);
        }
        let status = run_interactive(&mut cmd, None).map_err(|e| StackError::CommandFailed {
            command: self.settings.command.clone(),
            error: e.to_string(),
        })?;
        Ok(status.success())
    }
}

/// Opening instruction pointing the assistant at a task file in the
/// context record.
pub fn task_prompt(task_file: &str) -> String {
    format!(
        "Read {CONTEXT_DIR}/{task_file} and {CONTEXT_DIR}/README.md, then implement the task. \
         Commit your work on this branch when done."
    )
}
