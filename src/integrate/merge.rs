use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use color_print::cformat;

use super::{BatchReport, BranchPhase, Engine, StepFailure};
use crate::error::StackError;
use crate::git::{MergeOutcome, worktree_for_branch};
use crate::stack::order_deepest_first;
use crate::styling::{eprintln, progress_message};
use crate::worktree::RemovedWorktree;

/// Commit message of a merge that stays local.
pub fn local_merge_message(branch: &str, parent: &str) -> String {
    format!("Local merge of {branch} into {parent} (not pushed)")
}

/// Outcome of merging one branch into its parent
#[derive(Debug)]
pub struct MergeSummary {
    pub branch: String,
    pub parent: String,
    pub parent_path: PathBuf,
    pub phase: BranchPhase,
    pub warnings: Vec<StepFailure>,
    /// Set when the merged branch was removed afterwards
    pub removed: Option<RemovedWorktree>,
}

impl Engine<'_> {
    /// Merge `branch` into its parent's worktree without pushing.
    ///
    /// The parent is fast-forwarded from its remote first when possible. A
    /// conflict leaves the parent worktree mid-merge and returns
    /// [`StackError::MergeConflict`].
    pub fn local_merge(&self, branch: &str) -> anyhow::Result<MergeSummary> {
        self.refuse_perennial(branch, "local-merge")?;
        self.require_branch(branch)?;

        let worktrees = self.vcs.list_worktrees()?;
        let parent = self.tracker.resolve_parent(branch, &worktrees)?;
        let parent_path = self.parent_worktree(branch, &parent, &worktrees)?;

        let warnings: Vec<_> = self.refresh(&parent_path, &parent).into_iter().collect();
        eprintln!(
            "{}",
            progress_message(cformat!(
                "Merging <bold>{branch}</> into <bold>{parent}</>..."
            ))
        );
        self.merge_into(
            branch,
            &parent,
            &parent_path,
            &local_merge_message(branch, &parent),
        )?;

        Ok(MergeSummary {
            branch: branch.to_string(),
            parent,
            parent_path,
            phase: BranchPhase::LocalOnly,
            warnings,
            removed: None,
        })
    }

    /// Merge every worktree branch into its parent, deepest first.
    ///
    /// A conflict is recorded for that branch and leaves its parent
    /// mid-merge; later merges into that parent are skipped.
    pub fn local_sync_all(&self) -> anyhow::Result<BatchReport> {
        let worktrees = self.vcs.list_worktrees()?;
        let mut paths: HashMap<String, PathBuf> = HashMap::new();
        let mut parents: HashMap<String, String> = HashMap::new();
        let mut branches = Vec::new();
        for wt in &worktrees {
            let Some(branch) = wt.branch.as_deref() else {
                continue;
            };
            paths.insert(branch.to_string(), wt.path.clone());
            if self.tracker.is_perennial(branch)? {
                continue;
            }
            parents.insert(
                branch.to_string(),
                self.tracker.resolve_parent(branch, &worktrees)?,
            );
            branches.push(branch.to_string());
        }

        let mut report = BatchReport::default();
        let mut conflicted: HashSet<String> = HashSet::new();
        for branch in order_deepest_first(&branches, &parents) {
            let Some(parent) = parents.get(&branch) else {
                continue;
            };
            if conflicted.contains(parent) {
                report.skipped(&branch, format!("{parent} is left mid-merge"));
                continue;
            }
            let Some(parent_path) = paths.get(parent) else {
                let err = StackError::ParentWorktreeMissing {
                    branch: branch.clone(),
                    parent: parent.clone(),
                };
                report.failed(&branch, BranchPhase::Untouched, &err.into());
                continue;
            };

            eprintln!(
                "{}",
                progress_message(cformat!(
                    "Merging <bold>{branch}</> into <bold>{parent}</>..."
                ))
            );
            let message = local_merge_message(&branch, parent);
            match self.vcs.merge_no_ff(parent_path, &branch, &message) {
                Ok(MergeOutcome::Merged) => report.done(
                    &branch,
                    BranchPhase::LocalOnly,
                    format!("merged into {parent} (not pushed)"),
                ),
                Ok(MergeOutcome::Conflicted { files }) => {
                    conflicted.insert(parent.clone());
                    report.conflicted(&branch, files);
                }
                Err(e) => report.failed(&branch, BranchPhase::Merging, &e),
            }
        }
        Ok(report)
    }

    /// Merge `branch` into its parent, push the parent, then remove
    /// `branch` and its worktree.
    ///
    /// Refused from inside `branch`'s own worktree, which is about to be
    /// deleted. On conflict nothing is pushed or removed.
    pub fn merge_branch(&self, branch: &str) -> anyhow::Result<MergeSummary> {
        self.refuse_perennial(branch, "merge")?;
        self.require_branch(branch)?;

        let worktrees = self.vcs.list_worktrees()?;
        let here = self.vcs.worktree_root()?;
        if let Some(wt) = worktree_for_branch(&worktrees, branch)
            && here.starts_with(&wt.path)
        {
            return Err(StackError::InsideTargetWorktree {
                branch: branch.to_string(),
                path: wt.path.clone(),
            }
            .into());
        }

        let parent = self.tracker.resolve_parent(branch, &worktrees)?;
        let parent_path = self.parent_worktree(branch, &parent, &worktrees)?;
        let warnings: Vec<_> = self.refresh(&parent_path, &parent).into_iter().collect();

        eprintln!(
            "{}",
            progress_message(cformat!(
                "Merging <bold>{branch}</> into <bold>{parent}</>..."
            ))
        );
        self.merge_into(
            branch,
            &parent,
            &parent_path,
            &format!("Merge {branch} into {parent}"),
        )?;

        let remote = self.push_remote(&parent)?;
        eprintln!(
            "{}",
            progress_message(cformat!("Pushing <bold>{parent}</> to {remote}..."))
        );
        self.vcs
            .push(&parent_path, &remote, &parent)
            .map_err(|e| StackError::RemoteOperationFailed {
                operation: "push".into(),
                branch: parent.clone(),
                error: format!("{e:#}"),
            })?;

        let removed = self.allocator.remove(branch, true)?;

        Ok(MergeSummary {
            branch: branch.to_string(),
            parent,
            parent_path,
            phase: BranchPhase::CleanedUp,
            warnings,
            removed: Some(removed),
        })
    }

    fn merge_into(
        &self,
        branch: &str,
        parent: &str,
        parent_path: &Path,
        message: &str,
    ) -> anyhow::Result<()> {
        match self.vcs.merge_no_ff(parent_path, branch, message)? {
            MergeOutcome::Merged => Ok(()),
            MergeOutcome::Conflicted { files } => Err(StackError::MergeConflict {
                branch: branch.to_string(),
                target: parent.to_string(),
                worktree: parent_path.to_path_buf(),
                files,
            }
            .into()),
        }
    }
}
