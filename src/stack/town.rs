//! The branch tool: `git town`
//!
//! Sync, ship and lifecycle changes are delegated to git-town, which keeps
//! its own state in git config:
//!
//! | key | contents |
//! |---|---|
//! | `git-town.main-branch` | trunk |
//! | `git-town.perennial-branches` | space-separated names |
//! | `git-town.parked-branches` | space-separated names |
//! | `git-town.observed-branches` | space-separated names |
//! | `git-town.contribution-branches` | space-separated names |
//! | `git-town.prototype-branches` | space-separated names |

use std::path::Path;
use std::process::Command;

use crate::error::StackError;
use crate::git::VersionControl;
use crate::shell_exec;

pub(crate) const MAIN_BRANCH_KEY: &str = "git-town.main-branch";
pub(crate) const PERENNIAL_KEY: &str = "git-town.perennial-branches";

/// Lifecycle state of a branch, as the branch tool tracks it
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Lifecycle {
    Active,
    Parked,
    Observed,
    Contributing,
    Prototype,
}

impl Lifecycle {
    /// Config list holding branches in this state (`Active` has none).
    fn config_key(self) -> Option<&'static str> {
        match self {
            Lifecycle::Active => None,
            Lifecycle::Parked => Some("git-town.parked-branches"),
            Lifecycle::Observed => Some("git-town.observed-branches"),
            Lifecycle::Contributing => Some("git-town.contribution-branches"),
            Lifecycle::Prototype => Some("git-town.prototype-branches"),
        }
    }

    /// `git town` subcommand that moves a branch into this state.
    fn subcommand(self) -> Option<&'static str> {
        match self {
            Lifecycle::Active => None,
            Lifecycle::Parked => Some("park"),
            Lifecycle::Observed => Some("observe"),
            Lifecycle::Contributing => Some("contribute"),
            Lifecycle::Prototype => Some("prototype"),
        }
    }
}

/// Branch-relationship tool: sync, ship and lifecycle primitives.
pub trait BranchStacker {
    /// Sync the branch checked out in `worktree` with its parent and remote.
    fn sync(&self, worktree: &Path) -> anyhow::Result<()>;

    /// Merge `branch` into its parent, push, and delete it.
    fn ship(&self, worktree: &Path, branch: &str) -> anyhow::Result<()>;

    fn set_lifecycle(&self, worktree: &Path, branch: &str, lifecycle: Lifecycle)
    -> anyhow::Result<()>;

    fn lifecycle(&self, branch: &str) -> anyhow::Result<Lifecycle>;

    /// Add `branch` to the perennial list.
    fn mark_perennial(&self, branch: &str) -> anyhow::Result<()>;

    /// Record trunk and the perennial branches that exist.
    fn configure(&self, trunk: &str, perennials: &[String]) -> anyhow::Result<()>;
}

/// Fail with install instructions when `git-town` is not on PATH.
pub fn require_git_town() -> anyhow::Result<()> {
    if which::which("git-town").is_err() {
        return Err(StackError::PrerequisiteMissing {
            tool: "git-town".into(),
            install_hint: "Install it from https://www.git-town.com/install".into(),
        }
        .into());
    }
    Ok(())
}

pub(crate) fn config_list(vcs: &dyn VersionControl, key: &str) -> anyhow::Result<Vec<String>> {
    Ok(vcs
        .config_get(key)?
        .map(|v| v.split_whitespace().map(String::from).collect())
        .unwrap_or_default())
}

fn config_list_set(vcs: &dyn VersionControl, key: &str, values: &[String]) -> anyhow::Result<()> {
    if values.is_empty() {
        vcs.config_unset(key)
    } else {
        vcs.config_set(key, &values.join(" "))
    }
}

/// [`BranchStacker`] backed by the `git town` CLI
pub struct GitTown<'a> {
    vcs: &'a dyn VersionControl,
}

impl<'a> GitTown<'a> {
    pub fn new(vcs: &'a dyn VersionControl) -> Self {
        Self { vcs }
    }

    fn run(&self, worktree: &Path, args: &[&str]) -> anyhow::Result<()> {
        let mut cmd = Command::new("git");
        cmd.arg("town").args(args).current_dir(worktree);
        let command = format!("git town {}", args.join(" "));
        let output = shell_exec::run(&mut cmd, args.last().copied()).map_err(|e| {
            StackError::CommandFailed {
                command: command.clone(),
                error: e.to_string(),
            }
        })?;
        if !output.status.success() {
            return Err(StackError::CommandFailed {
                command,
                error: shell_exec::failure_text(&output),
            }
            .into());
        }
        Ok(())
    }

    fn run_interactive(&self, worktree: &Path, args: &[&str]) -> anyhow::Result<()> {
        let mut cmd = Command::new("git");
        cmd.arg("town").args(args).current_dir(worktree);
        let command = format!("git town {}", args.join(" "));
        let status = shell_exec::run_interactive(&mut cmd, args.last().copied()).map_err(|e| {
            StackError::CommandFailed {
                command: command.clone(),
                error: e.to_string(),
            }
        })?;
        if !status.success() {
            return Err(StackError::CommandFailed {
                command,
                error: String::new(),
            }
            .into());
        }
        Ok(())
    }
}

impl BranchStacker for GitTown<'_> {
    fn sync(&self, worktree: &Path) -> anyhow::Result<()> {
        self.run(worktree, &["sync"])
    }

    fn ship(&self, worktree: &Path, branch: &str) -> anyhow::Result<()> {
        // ship may open an editor for the squash message
        self.run_interactive(worktree, &["ship", branch])
    }

    fn set_lifecycle(
        &self,
        worktree: &Path,
        branch: &str,
        lifecycle: Lifecycle,
    ) -> anyhow::Result<()> {
        match lifecycle.subcommand() {
            Some(subcommand) => self.run(worktree, &[subcommand, branch]),
            None => {
                // Back to active: drop the branch from every lifecycle list
                for key in [
                    Lifecycle::Parked,
                    Lifecycle::Observed,
                    Lifecycle::Contributing,
                    Lifecycle::Prototype,
                ]
                .into_iter()
                .filter_map(Lifecycle::config_key)
                {
                    let mut list = config_list(self.vcs, key)?;
                    let before = list.len();
                    list.retain(|b| b != branch);
                    if list.len() != before {
                        config_list_set(self.vcs, key, &list)?;
                    }
                }
                Ok(())
            }
        }
    }

    fn lifecycle(&self, branch: &str) -> anyhow::Result<Lifecycle> {
        for lifecycle in [
            Lifecycle::Parked,
            Lifecycle::Observed,
            Lifecycle::Contributing,
            Lifecycle::Prototype,
        ] {
            if let Some(key) = lifecycle.config_key()
                && config_list(self.vcs, key)?.iter().any(|b| b == branch)
            {
                return Ok(lifecycle);
            }
        }
        Ok(Lifecycle::Active)
    }

    fn mark_perennial(&self, branch: &str) -> anyhow::Result<()> {
        let mut list = config_list(self.vcs, PERENNIAL_KEY)?;
        if !list.iter().any(|b| b == branch) {
            list.push(branch.to_string());
            config_list_set(self.vcs, PERENNIAL_KEY, &list)?;
        }
        Ok(())
    }

    fn configure(&self, trunk: &str, perennials: &[String]) -> anyhow::Result<()> {
        self.vcs.config_set(MAIN_BRANCH_KEY, trunk)?;
        let mut list = config_list(self.vcs, PERENNIAL_KEY)?;
        for perennial in perennials {
            if perennial != trunk && !list.contains(perennial) {
                list.push(perennial.clone());
            }
        }
        config_list_set(self.vcs, PERENNIAL_KEY, &list)
    }
}
