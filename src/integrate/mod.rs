//! Multi-branch integration: local merges, sync, ship, cleanup
//!
//! Every operation reads the stack through [`Tracker`] and acts on the
//! worktrees the [`Allocator`] laid out. Operations run sequentially with
//! no locking; two `st` processes acting on the same repository at once can
//! interfere.
//!
//! Single-branch operations return the first fatal error. Batch operations
//! isolate failures per branch and return a [`BatchReport`]. Steps that are
//! allowed to fail (refreshing a parent from its remote, post-ship cleanup)
//! are reported as [`Severity::Warning`] and do not stop the operation.

mod merge;
mod report;
mod ship;

use std::path::{Path, PathBuf};

use color_print::cformat;

pub use merge::{MergeSummary, local_merge_message};
pub use report::{BatchReport, BranchPhase, ItemOutcome, ItemResult, Severity, StepFailure};
pub use ship::{AUTO_COMMIT_MESSAGE, ShipOutcome};

use crate::config::Settings;
use crate::error::StackError;
use crate::git::{VersionControl, Worktree, worktree_for_branch};
use crate::prompt::Confirm;
use crate::stack::{BranchStacker, Lifecycle, Tracker, pushremote_key};
use crate::styling::{eprintln, progress_message, warning_message};
use crate::worktree::Allocator;

pub struct Engine<'a> {
    vcs: &'a dyn VersionControl,
    tracker: &'a Tracker<'a>,
    allocator: &'a Allocator<'a>,
    stacker: &'a dyn BranchStacker,
    confirm: &'a dyn Confirm,
    settings: &'a Settings,
}

impl<'a> Engine<'a> {
    pub fn new(
        vcs: &'a dyn VersionControl,
        tracker: &'a Tracker<'a>,
        allocator: &'a Allocator<'a>,
        stacker: &'a dyn BranchStacker,
        confirm: &'a dyn Confirm,
        settings: &'a Settings,
    ) -> Self {
        Self {
            vcs,
            tracker,
            allocator,
            stacker,
            confirm,
            settings,
        }
    }

    /// Run the branch tool's sync in every worktree, skipping parked branches.
    pub fn sync_all(&self) -> anyhow::Result<BatchReport> {
        let mut report = BatchReport::default();
        for wt in self.vcs.list_worktrees()? {
            let Some(branch) = wt.branch.as_deref() else {
                continue;
            };
            match self.stacker.lifecycle(branch) {
                Ok(Lifecycle::Parked) => {
                    report.skipped(branch, "parked");
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    report.failed(branch, BranchPhase::Untouched, &e);
                    continue;
                }
            }

            eprintln!(
                "{}",
                progress_message(cformat!("Syncing <bold>{branch}</>..."))
            );
            match self.stacker.sync(&wt.path) {
                Ok(()) => report.done(branch, BranchPhase::Syncing, "synced"),
                Err(e) => report.failed(branch, BranchPhase::Syncing, &e),
            }
        }
        Ok(report)
    }

    /// Run the configured test command in the current branch's worktree and
    /// every worktree stacked on it, deepest first.
    pub fn stack_test(&self) -> anyhow::Result<BatchReport> {
        let command = self
            .settings
            .test_command
            .as_deref()
            .ok_or(StackError::NoTestCommand)?;
        let current = self
            .vcs
            .current_branch()?
            .ok_or_else(|| StackError::NotOnBranch {
                action: "test the stack".into(),
            })?;

        let mut branches = vec![current.clone()];
        branches.extend(self.tracker.descendants(&current)?);
        let worktrees = self.vcs.list_worktrees()?;

        let mut report = BatchReport::default();
        for branch in self.tracker.stack_order(&branches)? {
            let Some(wt) = worktree_for_branch(&worktrees, &branch) else {
                report.skipped(&branch, "no worktree");
                continue;
            };
            eprintln!(
                "{}",
                progress_message(cformat!("Testing <bold>{branch}</>..."))
            );
            match self.vcs.run_in(&wt.path, command) {
                Ok(true) => report.done(&branch, BranchPhase::Untouched, "passed"),
                Ok(false) => report.failed(
                    &branch,
                    BranchPhase::Untouched,
                    &anyhow::anyhow!("{command} failed"),
                ),
                Err(e) => report.failed(&branch, BranchPhase::Untouched, &e),
            }
        }
        Ok(report)
    }

    /// Remote that `branch` pushes to: its `pushremote` override or the
    /// configured remote.
    fn push_remote(&self, branch: &str) -> anyhow::Result<String> {
        Ok(self
            .vcs
            .config_get(&pushremote_key(branch))?
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| self.settings.remote().to_string()))
    }

    /// Fast-forward `branch` in `worktree` from its remote-tracking branch.
    /// Best effort: a failure is returned as a warning.
    fn refresh(&self, worktree: &Path, branch: &str) -> Option<StepFailure> {
        let remote = self.settings.remote();
        match self.vcs.remote_branch_exists(remote, branch) {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => return Some(self.warn("fast-forward", &e)),
        }
        self.vcs
            .fast_forward(worktree, remote, branch)
            .err()
            .map(|e| self.warn("fast-forward", &e))
    }

    fn warn(&self, step: &str, error: &anyhow::Error) -> StepFailure {
        let failure = StepFailure::warning(step, error);
        eprintln!(
            "{}",
            warning_message(format!("{step} skipped: {}", failure.message))
        );
        failure
    }

    /// Path of the worktree holding `parent`, for merging `branch` into it.
    fn parent_worktree(
        &self,
        branch: &str,
        parent: &str,
        worktrees: &[Worktree],
    ) -> anyhow::Result<PathBuf> {
        worktree_for_branch(worktrees, parent)
            .map(|wt| wt.path.clone())
            .ok_or_else(|| {
                StackError::ParentWorktreeMissing {
                    branch: branch.to_string(),
                    parent: parent.to_string(),
                }
                .into()
            })
    }

    fn refuse_perennial(&self, branch: &str, action: &str) -> anyhow::Result<()> {
        if self.tracker.is_perennial(branch)? {
            return Err(StackError::PerennialBranch {
                branch: branch.to_string(),
                action: action.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn require_branch(&self, branch: &str) -> anyhow::Result<()> {
        if !self.vcs.local_branch_exists(branch)? {
            return Err(StackError::BranchNotFound {
                branch: branch.to_string(),
            }
            .into());
        }
        Ok(())
    }
}
