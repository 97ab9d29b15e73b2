//! Per-worktree context records
//!
//! Each worktree carries a `.context/` directory: a `README.md` saying which
//! branch it holds and what it was created from, plus task files such as
//! `issue-42.md` that an assistant reads when it starts work. The directory
//! is created with the worktree and removed only with it.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::path::format_path_for_display;

pub const CONTEXT_DIR: &str = ".context";

const README: &str = "README.md";
const ORIGIN_PREFIX: &str = "Created from: ";

/// Whether [`ContextStore::ensure`] wrote a new record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created,
    /// An existing record was kept as is (continuing earlier work)
    Existing,
}

/// What a context record says about its worktree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextSummary {
    /// The base branch recorded at creation
    pub origin: Option<String>,
    /// Task files (`*.md` other than the README), sorted
    pub task_files: Vec<String>,
    /// Number from the first `issue-<n>.md`
    pub issue: Option<u64>,
}

pub struct ContextStore;

impl ContextStore {
    pub fn dir(worktree: &Path) -> PathBuf {
        worktree.join(CONTEXT_DIR)
    }

    /// Create the record unless one already exists.
    pub fn ensure(worktree: &Path, branch: &str, origin: &str) -> anyhow::Result<EnsureOutcome> {
        Self::ensure_at(worktree, branch, origin, Utc::now())
    }

    fn ensure_at(
        worktree: &Path,
        branch: &str,
        origin: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<EnsureOutcome> {
        let dir = Self::dir(worktree);
        if dir.is_dir() {
            log::debug!("Keeping existing context in {}", dir.display());
            return Ok(EnsureOutcome::Existing);
        }

        fs::create_dir_all(&dir).with_context(|| {
            format!("Failed to create {}", format_path_for_display(&dir))
        })?;
        let readme = format!(
            "# {branch}\n\nBranch: {branch}\n{ORIGIN_PREFIX}{origin}\nCreated at: {}\n\n\
             Task descriptions and notes for this worktree live in this directory.\n",
            now.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        let path = dir.join(README);
        fs::write(&path, readme)
            .with_context(|| format!("Failed to write {}", format_path_for_display(&path)))?;
        Ok(EnsureOutcome::Created)
    }

    /// Write (or overwrite) `<stem>.md` in the record.
    pub fn record_task(worktree: &Path, stem: &str, markdown: &str) -> anyhow::Result<PathBuf> {
        let dir = Self::dir(worktree);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", format_path_for_display(&dir)))?;
        let path = dir.join(format!("{stem}.md"));
        fs::write(&path, markdown)
            .with_context(|| format!("Failed to write {}", format_path_for_display(&path)))?;
        Ok(path)
    }

    /// Summarise the record; a worktree without one yields `None`.
    pub fn read(worktree: &Path) -> anyhow::Result<Option<ContextSummary>> {
        let dir = Self::dir(worktree);
        if !dir.is_dir() {
            return Ok(None);
        }

        let mut summary = ContextSummary::default();
        for entry in fs::read_dir(&dir)
            .with_context(|| format!("Failed to read {}", format_path_for_display(&dir)))?
        {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if name == README || !name.ends_with(".md") {
                continue;
            }
            summary.task_files.push(name);
        }
        summary.task_files.sort();
        summary.issue = summary.task_files.iter().find_map(|f| issue_number(f));

        if let Ok(readme) = fs::read_to_string(dir.join(README)) {
            summary.origin = readme
                .lines()
                .find_map(|l| l.strip_prefix(ORIGIN_PREFIX))
                .map(|o| o.trim().to_string());
        }
        Ok(Some(summary))
    }
}

fn issue_number(file_name: &str) -> Option<u64> {
    file_name
        .strip_prefix("issue-")?
        .strip_suffix(".md")?
        .parse()
        .ok()
}
