//! Terminal multiplexer tabs for new worktrees
//!
//! Inside tmux (`TMUX` set) or zellij (`ZELLIJ` set), `st new` opens a tab in
//! the new worktree. Anywhere else nothing happens.

use std::path::Path;
use std::process::Command;

use crate::error::StackError;
use crate::shell_exec::{failure_text, run};

pub trait Multiplexer {
    fn name(&self) -> &'static str;

    /// Open a tab called `title` whose shell starts in `dir`.
    fn open_tab(&self, title: &str, dir: &Path) -> anyhow::Result<()>;
}

pub struct Tmux;

pub struct Zellij;

impl Tmux {
    fn command(title: &str, dir: &Path) -> Command {
        let mut cmd = Command::new("tmux");
        cmd.args(["new-window", "-n", title, "-c"]).arg(dir);
        cmd
    }
}

impl Zellij {
    fn command(title: &str, dir: &Path) -> Command {
        let mut cmd = Command::new("zellij");
        cmd.args(["action", "new-tab", "--name", title, "--cwd"])
            .arg(dir);
        cmd
    }
}

fn run_tab_command(mut cmd: Command, title: &str) -> anyhow::Result<()> {
    let output = run(&mut cmd, Some(title))?;
    if !output.status.success() {
        return Err(StackError::CommandFailed {
            command: cmd.get_program().to_string_lossy().into_owned(),
            error: failure_text(&output),
        }
        .into());
    }
    Ok(())
}

impl Multiplexer for Tmux {
    fn name(&self) -> &'static str {
        "tmux"
    }

    fn open_tab(&self, title: &str, dir: &Path) -> anyhow::Result<()> {
        run_tab_command(Self::command(title, dir), title)
    }
}

impl Multiplexer for Zellij {
    fn name(&self) -> &'static str {
        "zellij"
    }

    fn open_tab(&self, title: &str, dir: &Path) -> anyhow::Result<()> {
        run_tab_command(Self::command(title, dir), title)
    }
}

/// The multiplexer this process runs inside, judged by its environment.
pub fn detect(lookup: impl Fn(&str) -> Option<String>) -> Option<Box<dyn Multiplexer>> {
    let set = |var: &str| lookup(var).is_some_and(|v| !v.is_empty());
    if set("TMUX") {
        Some(Box::new(Tmux))
    } else if set("ZELLIJ") {
        Some(Box::new(Zellij))
    } else {
        None
    }
}
