//! Worktree management operations for Repository.

use std::path::Path;

use super::{Repository, path_arg};
use crate::git::Worktree;

impl Repository {
    /// List all worktrees for this repository, bare entries filtered out.
    ///
    /// Git lists the main worktree first, so `[0]` is the main worktree.
    pub(super) fn list_worktrees_porcelain(&self) -> anyhow::Result<Vec<Worktree>> {
        let stdout = self.run_command(&["worktree", "list", "--porcelain"])?;
        let raw_worktrees = Worktree::parse_porcelain_list(&stdout)?;
        Ok(raw_worktrees.into_iter().filter(|wt| !wt.bare).collect())
    }

    /// `git worktree add -b <branch> <path> [<start>]`
    pub(super) fn add_worktree_with_branch(
        &self,
        path: &Path,
        branch: &str,
        start: Option<&str>,
    ) -> anyhow::Result<()> {
        let mut args = vec!["worktree", "add", "-b", branch, path_arg(path)?];
        if let Some(start) = start {
            args.push(start);
        }
        self.run_command(&args)?;
        Ok(())
    }

    /// Remove a worktree at the specified path.
    ///
    /// With `force`, passes `--force` so untracked files (build artifacts,
    /// bootstrap copies) don't block the removal.
    pub(super) fn remove_worktree_at(&self, path: &Path, force: bool) -> anyhow::Result<()> {
        let mut args = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        args.push(path_arg(path)?);
        self.run_command(&args)?;
        Ok(())
    }
}
