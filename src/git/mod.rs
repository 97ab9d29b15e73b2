//! Git operations
//!
//! Everything stacktrunk asks of git goes through [`VersionControl`]. The
//! production implementation, [`Repository`], shells out to the `git` CLI;
//! unit tests substitute an in-memory fake.

use std::path::{Path, PathBuf};

mod parse;
mod repository;

pub use repository::{Repository, set_base_path};

/// Worktree information, as reported by `git worktree list --porcelain`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worktree {
    pub path: PathBuf,
    pub head: String,
    pub branch: Option<String>,
    pub bare: bool,
    pub detached: bool,
    pub locked: Option<String>,
    pub prunable: Option<String>,
}

impl Worktree {
    /// A worktree checked out on `branch`, for tests and fakes.
    pub fn on_branch(path: impl Into<PathBuf>, branch: &str) -> Self {
        Self {
            path: path.into(),
            head: String::new(),
            branch: Some(branch.to_string()),
            bare: false,
            detached: false,
            locked: None,
            prunable: None,
        }
    }
}

/// Result of `git merge --no-ff`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged,
    /// The merge stopped; the worktree is left mid-merge with these
    /// unmerged paths.
    Conflicted { files: Vec<String> },
}

/// The git operations stacktrunk needs.
///
/// Methods taking a `worktree` path run inside that worktree; the rest run
/// in the repository the implementation was opened at.
pub trait VersionControl {
    /// Root of the main worktree (where `worktrees/` lives).
    fn repo_root(&self) -> anyhow::Result<PathBuf>;

    /// Top-level directory of the worktree the command runs in.
    fn worktree_root(&self) -> anyhow::Result<PathBuf>;

    /// The shared `.git` directory.
    fn git_common_dir(&self) -> anyhow::Result<PathBuf>;

    /// Current branch, or `None` on a detached HEAD.
    fn current_branch(&self) -> anyhow::Result<Option<String>>;

    /// All worktrees with a working tree (bare entries filtered), main first.
    fn list_worktrees(&self) -> anyhow::Result<Vec<Worktree>>;

    fn local_branches(&self) -> anyhow::Result<Vec<String>>;

    fn local_branch_exists(&self, branch: &str) -> anyhow::Result<bool>;

    fn remote_branch_exists(&self, remote: &str, branch: &str) -> anyhow::Result<bool>;

    /// `git worktree add -b <branch> <path> [<start>]`
    fn add_worktree(&self, path: &Path, branch: &str, start: Option<&str>) -> anyhow::Result<()>;

    fn remove_worktree(&self, path: &Path, force: bool) -> anyhow::Result<()>;

    fn prune_worktrees(&self) -> anyhow::Result<()>;

    /// `git branch -d` (or `-D` with `force`)
    fn delete_branch(&self, branch: &str, force: bool) -> anyhow::Result<()>;

    /// Fetch `<remote>/<branch>` and fast-forward the worktree to it.
    fn fast_forward(&self, worktree: &Path, remote: &str, branch: &str) -> anyhow::Result<()>;

    /// `git merge --no-ff <branch> -m <message>` inside `worktree`.
    ///
    /// Conflicts are an outcome, not an error; errors are reserved for
    /// merges git refused to start.
    fn merge_no_ff(
        &self,
        worktree: &Path,
        branch: &str,
        message: &str,
    ) -> anyhow::Result<MergeOutcome>;

    fn push(&self, worktree: &Path, remote: &str, branch: &str) -> anyhow::Result<()>;

    /// Branches whose tips are reachable from `target`.
    fn merged_branches(&self, target: &str) -> anyhow::Result<Vec<String>>;

    /// Number of commits on `head` not on `base`.
    fn commits_ahead(&self, base: &str, head: &str) -> anyhow::Result<usize>;

    fn is_dirty(&self, worktree: &Path) -> anyhow::Result<bool>;

    /// Stage everything and commit.
    fn commit_all(&self, worktree: &Path, message: &str) -> anyhow::Result<()>;

    /// Run an arbitrary shell command in `worktree`, returning whether it
    /// exited successfully. Output is streamed to the terminal.
    fn run_in(&self, worktree: &Path, command: &str) -> anyhow::Result<bool>;

    fn config_get(&self, key: &str) -> anyhow::Result<Option<String>>;

    fn config_set(&self, key: &str, value: &str) -> anyhow::Result<()>;

    /// Remove a key; absent keys are not an error.
    fn config_unset(&self, key: &str) -> anyhow::Result<()>;
}

/// Find the worktree checked out on `branch` in a listing.
pub fn worktree_for_branch<'a>(worktrees: &'a [Worktree], branch: &str) -> Option<&'a Worktree> {
    worktrees
        .iter()
        .find(|wt| wt.branch.as_deref() == Some(branch))
}
