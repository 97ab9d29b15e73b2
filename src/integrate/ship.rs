use std::path::PathBuf;

use color_print::cformat;

use super::{BatchReport, BranchPhase, Engine, StepFailure};
use crate::error::StackError;
use crate::git::{Worktree, worktree_for_branch};
use crate::path::format_relative;
use crate::prompt::Selection;
use crate::styling::{eprintln, format_with_gutter, info_message, progress_message};

/// Commit message used to save uncommitted work before `ship-all`
pub const AUTO_COMMIT_MESSAGE: &str = "chore: auto-commit uncommitted changes before ship";

/// Outcome of shipping one branch
#[derive(Debug)]
pub struct ShipOutcome {
    pub branch: String,
    pub parent: String,
    pub phase: BranchPhase,
    /// Worktree removed after shipping
    pub cleaned: Option<PathBuf>,
    pub warnings: Vec<StepFailure>,
}

struct Candidate {
    branch: String,
    parent: String,
    ahead: usize,
    worktree: Worktree,
}

impl Engine<'_> {
    /// Ship `branch` into its parent with the branch tool, after asking.
    ///
    /// Declining runs nothing. A sync or ship failure stops the operation;
    /// there is no rollback of steps that already ran.
    pub fn ship(&self, branch: &str) -> anyhow::Result<ShipOutcome> {
        self.refuse_perennial(branch, "ship")?;
        self.require_branch(branch)?;

        let worktrees = self.vcs.list_worktrees()?;
        let parent = self.tracker.resolve_parent(branch, &worktrees)?;
        let question = cformat!(
            "Ship <bold>{branch}</> into <bold>{parent}</>? The branch is deleted afterwards"
        );
        if !self.confirm.confirm(&question)? {
            return Err(StackError::Declined {
                action: "Ship".into(),
                exit_code: 1,
            }
            .into());
        }

        let wt = worktree_for_branch(&worktrees, branch).cloned();
        self.ship_one(branch, &parent, wt.as_ref(), &worktrees)
            .map_err(|(_, e)| e)
    }

    /// Offer every branch with commits ahead of its parent for shipping, then
    /// ship the chosen ones deepest first.
    ///
    /// Uncommitted changes in a chosen worktree are committed first with
    /// [`AUTO_COMMIT_MESSAGE`].
    pub fn ship_all(&self) -> anyhow::Result<BatchReport> {
        let worktrees = self.vcs.list_worktrees()?;
        let mut candidates = Vec::new();
        for wt in &worktrees {
            let Some(branch) = wt.branch.as_deref() else {
                continue;
            };
            if self.tracker.is_perennial(branch)? {
                continue;
            }
            let parent = self.tracker.resolve_parent(branch, &worktrees)?;
            let ahead = self.vcs.commits_ahead(&parent, branch)?;
            if ahead > 0 {
                candidates.push(Candidate {
                    branch: branch.to_string(),
                    parent,
                    ahead,
                    worktree: wt.clone(),
                });
            }
        }

        if candidates.is_empty() {
            eprintln!(
                "{}",
                info_message("Nothing to ship: no branch is ahead of its parent")
            );
            return Ok(BatchReport::default());
        }

        let listing: Vec<String> = candidates
            .iter()
            .map(|c| {
                let commits = if c.ahead == 1 { "commit" } else { "commits" };
                format!("{}  {} {commits} ahead of {}", c.branch, c.ahead, c.parent)
            })
            .collect();
        eprintln!("{}", info_message("Branches with unshipped commits:"));
        eprintln!("{}", format_with_gutter(&listing.join("\n")));

        let selected: Vec<&Candidate> = match self
            .confirm
            .select(&format!("Ship {} branches?", candidates.len()))?
        {
            Selection::All => candidates.iter().collect(),
            Selection::Each => {
                let mut chosen = Vec::new();
                for c in &candidates {
                    if self
                        .confirm
                        .confirm(&cformat!("Ship <bold>{}</> into <bold>{}</>?", c.branch, c.parent))?
                    {
                        chosen.push(c);
                    }
                }
                chosen
            }
            Selection::None => {
                return Err(StackError::Declined {
                    action: "Ship-all".into(),
                    exit_code: 0,
                }
                .into());
            }
        };

        let names: Vec<String> = selected.iter().map(|c| c.branch.clone()).collect();
        let mut report = BatchReport::default();
        for branch in self.tracker.stack_order(&names)? {
            let Some(candidate) = selected.iter().find(|c| c.branch == branch) else {
                continue;
            };
            match self.ship_candidate(candidate, &worktrees) {
                Ok(outcome) => {
                    let detail = if outcome.cleaned.is_some() {
                        format!("shipped into {}", outcome.parent)
                    } else {
                        format!("shipped into {} (worktree left in place)", outcome.parent)
                    };
                    report.done(&branch, outcome.phase, detail);
                }
                Err((phase, e)) => report.failed(&branch, phase, &e),
            }
        }
        Ok(report)
    }

    fn ship_candidate(
        &self,
        candidate: &Candidate,
        worktrees: &[Worktree],
    ) -> Result<ShipOutcome, (BranchPhase, anyhow::Error)> {
        let path = &candidate.worktree.path;
        if self.vcs.is_dirty(path).map_err(at(BranchPhase::Untouched))? {
            eprintln!(
                "{}",
                progress_message(cformat!(
                    "Committing uncommitted changes in <bold>{}</>...",
                    candidate.branch
                ))
            );
            self.vcs
                .commit_all(path, AUTO_COMMIT_MESSAGE)
                .map_err(at(BranchPhase::Untouched))?;
        }
        self.ship_one(
            &candidate.branch,
            &candidate.parent,
            Some(&candidate.worktree),
            worktrees,
        )
    }

    /// Sync, ship, then remove the branch's worktree if it lives under
    /// `worktrees/`. Cleanup failures are warnings: the branch has already
    /// shipped by then.
    ///
    /// A failed required step comes back with the phase it stopped in.
    fn ship_one(
        &self,
        branch: &str,
        parent: &str,
        wt: Option<&Worktree>,
        worktrees: &[Worktree],
    ) -> Result<ShipOutcome, (BranchPhase, anyhow::Error)> {
        let root = self.vcs.repo_root().map_err(at(BranchPhase::Untouched))?;
        let sync_dir = wt.map_or_else(|| root.clone(), |wt| wt.path.clone());
        eprintln!(
            "{}",
            progress_message(cformat!("Syncing <bold>{branch}</>..."))
        );
        self.stacker
            .sync(&sync_dir)
            .map_err(at(BranchPhase::Syncing))?;

        // Ship from the parent's worktree: the branch's own worktree is
        // about to be removed
        let ship_dir = worktree_for_branch(worktrees, parent)
            .map_or_else(|| root.clone(), |p| p.path.clone());
        eprintln!(
            "{}",
            progress_message(cformat!(
                "Shipping <bold>{branch}</> into <bold>{parent}</>..."
            ))
        );
        self.stacker
            .ship(&ship_dir, branch)
            .map_err(at(BranchPhase::Merging))?;

        let mut outcome = ShipOutcome {
            branch: branch.to_string(),
            parent: parent.to_string(),
            phase: BranchPhase::LeftInPlace,
            cleaned: None,
            warnings: Vec::new(),
        };
        let worktrees_dir = self
            .tracker
            .worktrees_dir()
            .map_err(at(BranchPhase::Pushed))?;
        if let Some(wt) = wt
            && wt.path.starts_with(&worktrees_dir)
        {
            match self.allocator.remove(branch, true) {
                Ok(removed) => {
                    log::debug!(
                        "Removed shipped worktree {}",
                        format_relative(&wt.path, &root)
                    );
                    outcome.phase = BranchPhase::CleanedUp;
                    outcome.cleaned = removed.path;
                }
                Err(e) => outcome.warnings.push(self.warn("worktree cleanup", &e)),
            }
        }
        Ok(outcome)
    }

    /// Remove every branch merged into trunk (except perennials and the
    /// current branch), with its worktree, after one confirmation.
    pub fn auto_clean(&self) -> anyhow::Result<BatchReport> {
        let trunk = self.tracker.trunk()?;
        let current = self.vcs.current_branch()?;

        let mut candidates = Vec::new();
        for branch in self.vcs.merged_branches(&trunk)? {
            if branch == trunk
                || current.as_deref() == Some(branch.as_str())
                || self.tracker.is_perennial(&branch)?
            {
                continue;
            }
            candidates.push(branch);
        }

        if candidates.is_empty() {
            eprintln!(
                "{}",
                info_message(cformat!("No branches merged into <bold>{trunk}</>"))
            );
            return Ok(BatchReport::default());
        }

        eprintln!(
            "{}",
            info_message(cformat!("Branches merged into <bold>{trunk}</>:"))
        );
        eprintln!("{}", format_with_gutter(&candidates.join("\n")));
        let question = format!(
            "Remove {} merged branches and their worktrees?",
            candidates.len()
        );
        if !self.confirm.confirm(&question)? {
            return Err(StackError::Declined {
                action: "Auto-clean".into(),
                exit_code: 0,
            }
            .into());
        }

        let root = self.vcs.repo_root()?;
        let mut report = BatchReport::default();
        for branch in self.tracker.stack_order(&candidates)? {
            match self.allocator.remove(&branch, true) {
                Ok(removed) => {
                    let detail = match &removed.path {
                        Some(path) => format!("removed {}", format_relative(path, &root)),
                        None => "branch deleted".to_string(),
                    };
                    report.done(&branch, BranchPhase::CleanedUp, detail);
                }
                Err(e) => report.failed(&branch, BranchPhase::LeftInPlace, &e),
            }
        }
        Ok(report)
    }
}

/// Tag a step's error with the phase the branch stopped in.
fn at(phase: BranchPhase) -> impl FnOnce(anyhow::Error) -> (BranchPhase, anyhow::Error) {
    move |e| (phase, e)
}
