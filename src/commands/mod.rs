pub(crate) mod agent;
pub(crate) mod guide;
pub(crate) mod integrate;
pub(crate) mod mcp;
pub(crate) mod setup;
pub(crate) mod worktree;

pub(crate) use agent::{handle_agent_here, handle_agent_start, handle_agent_status, handle_issue_to_pr};
pub(crate) use guide::handle_guide;
pub(crate) use integrate::{
    handle_auto_clean, handle_local_merge, handle_local_sync_all, handle_merge_branch,
    handle_ship, handle_ship_all, handle_stack_test, handle_sync_all,
};
pub(crate) use mcp::handle_mcp;
pub(crate) use setup::{handle_dev_setup, handle_gt_setup};
pub(crate) use worktree::{
    handle_cd, handle_clean, handle_lifecycle, handle_list, handle_new, handle_stack,
    handle_stack_status,
};

use stacktrunk::config::Settings;
use stacktrunk::error::StackError;
use stacktrunk::git::{Repository, VersionControl};
use stacktrunk::integrate::{BatchReport, Engine};
use stacktrunk::prompt::TerminalConfirm;
use stacktrunk::stack::{GitConfigParents, GitTown, Tracker};
use stacktrunk::styling::eprintln;
use stacktrunk::worktree::Allocator;

/// Repository and settings shared by every command.
pub(crate) struct Session {
    pub repo: Repository,
    pub settings: Settings,
}

impl Session {
    pub fn load() -> anyhow::Result<Self> {
        Ok(Self {
            repo: Repository::current(),
            settings: Settings::load()?,
        })
    }

    /// Run `f` with a tracker and allocator over this repository.
    pub fn with_allocator<T>(
        &self,
        f: impl FnOnce(&Tracker<'_>, &Allocator<'_>) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let parents = GitConfigParents::new(&self.repo);
        let tracker = Tracker::new(&self.repo, &parents, &self.settings);
        let town = GitTown::new(&self.repo);
        let allocator = Allocator::new(&self.repo, &tracker, &town, &self.settings);
        f(&tracker, &allocator)
    }

    /// Run `f` with the integration engine, confirming on the terminal.
    pub fn with_engine<T>(&self, f: impl FnOnce(&Engine<'_>) -> anyhow::Result<T>) -> anyhow::Result<T> {
        let parents = GitConfigParents::new(&self.repo);
        let tracker = Tracker::new(&self.repo, &parents, &self.settings);
        let town = GitTown::new(&self.repo);
        let allocator = Allocator::new(&self.repo, &tracker, &town, &self.settings);
        let engine = Engine::new(
            &self.repo,
            &tracker,
            &allocator,
            &town,
            &TerminalConfirm,
            &self.settings,
        );
        f(&engine)
    }

    /// `branch`, or the current branch when none was given.
    pub fn branch_or_current(&self, branch: Option<String>, action: &str) -> anyhow::Result<String> {
        match branch {
            Some(branch) => Ok(branch),
            None => self.repo.current_branch()?.ok_or_else(|| {
                StackError::NotOnBranch {
                    action: action.into(),
                }
                .into()
            }),
        }
    }
}

/// Print a batch report; a batch with failures exits non-zero without
/// printing the error again.
pub(crate) fn finish_batch(report: BatchReport) -> anyhow::Result<()> {
    if report.is_empty() {
        return Ok(());
    }
    eprintln!("{}", report.render());
    if report.has_failures() {
        return Err(StackError::AlreadyDisplayed {
            exit_code: report.exit_code(),
        }
        .into());
    }
    Ok(())
}
