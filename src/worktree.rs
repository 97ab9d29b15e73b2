//! Worktree allocation
//!
//! Every branch lives in its own worktree under `worktrees/`. A branch
//! stacked on another non-trunk branch is nested inside its parent's
//! directory, so the layout on disk mirrors the stack:
//!
//! ```text
//! repo/                     main
//! repo/worktrees/feat/x     feat/x (parent main)
//! repo/worktrees/feat/x/feat/y
//!                           feat/y (parent feat/x)
//! ```
//!
//! Creating a worktree for a branch that already has one *reclaims* the
//! slot: the previous worktree, its directory and the branch are destroyed
//! first. Uncommitted work there is lost.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use color_print::cformat;

use crate::branch::validate_branch_name;
use crate::config::Settings;
use crate::context::{CONTEXT_DIR, ContextStore, EnsureOutcome};
use crate::error::StackError;
use crate::git::{VersionControl, Worktree, worktree_for_branch};
use crate::path::{format_path_for_display, format_relative};
use crate::stack::{BranchStacker, Tracker};
use crate::styling::{eprintln, warning_message};

/// Directory for MCP server records, excluded alongside worktrees
pub const MCP_DIR: &str = ".mcp";

/// Outcome of [`Allocator::create`]
#[derive(Debug, Clone)]
pub struct CreatedWorktree {
    pub branch: String,
    /// Branch the new one was created from (and is stacked on)
    pub base: String,
    pub path: PathBuf,
    /// A previous worktree or branch of the same name was destroyed
    pub reclaimed: bool,
    pub context: EnsureOutcome,
    /// Bootstrap files copied from the current worktree
    pub copied: Vec<String>,
}

/// Outcome of [`Allocator::remove`]
#[derive(Debug, Clone)]
pub struct RemovedWorktree {
    pub branch: String,
    /// Worktree directory that was removed, if the branch had one
    pub path: Option<PathBuf>,
    /// Children re-pointed at the removed branch's parent
    pub reparented: Vec<String>,
    pub new_parent: String,
}

/// Where the base branch came from
struct Base {
    name: String,
    nests: bool,
}

pub struct Allocator<'a> {
    vcs: &'a dyn VersionControl,
    tracker: &'a Tracker<'a>,
    stacker: &'a dyn BranchStacker,
    settings: &'a Settings,
}

impl<'a> Allocator<'a> {
    pub fn new(
        vcs: &'a dyn VersionControl,
        tracker: &'a Tracker<'a>,
        stacker: &'a dyn BranchStacker,
        settings: &'a Settings,
    ) -> Self {
        Self {
            vcs,
            tracker,
            stacker,
            settings,
        }
    }

    /// Create a worktree for a new `branch` stacked on `parent` (or the
    /// current branch, or trunk).
    ///
    /// An existing worktree or branch named `branch` is reclaimed first; see
    /// [`Allocator::reclaim`].
    pub fn create(&self, branch: &str, parent: Option<&str>) -> anyhow::Result<CreatedWorktree> {
        let name = validate_branch_name(branch)?;
        if parent == Some(branch) {
            return Err(StackError::SelfParent {
                branch: branch.to_string(),
            }
            .into());
        }

        let base = self.resolve_base(branch, parent)?;
        let path = self.resolve_path(branch, &base)?;
        log::debug!("Allocating {branch} at {} from {}", path.display(), base.name);

        let reclaimed = self.reclaim(branch, &path)?;

        let start = self.start_point(&base.name)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", format_path_for_display(dir)))?;
        }
        self.vcs.add_worktree(&path, branch, start.as_deref())?;

        if name.is_perennial() {
            self.stacker.mark_perennial(branch)?;
        } else {
            self.tracker.parents().set_parent(branch, &base.name)?;
        }

        let context = ContextStore::ensure(&path, branch, &base.name)?;
        let copied = self.copy_bootstrap_files(&path)?;
        self.ensure_excludes(&path)?;

        Ok(CreatedWorktree {
            branch: branch.to_string(),
            base: base.name,
            path,
            reclaimed,
            context,
            copied,
        })
    }

    fn resolve_base(&self, branch: &str, parent: Option<&str>) -> anyhow::Result<Base> {
        let trunk = self.tracker.trunk()?;
        let base = |name: String| Base {
            nests: name != trunk,
            name,
        };

        if let Some(parent) = parent {
            if self.branch_is_known(parent)? {
                return Ok(base(parent.to_string()));
            }
            eprintln!(
                "{}",
                warning_message(cformat!(
                    "Parent <bold>{parent}</> not found; stacking on the current branch instead"
                ))
            );
        }

        match self.vcs.current_branch()? {
            // Recreating the branch we're on: stack on its parent instead
            Some(current) if current == branch => Ok(base(self.tracker.get_parent(branch)?)),
            Some(current) => Ok(base(current)),
            None => Ok(base(trunk.clone())),
        }
    }

    fn branch_is_known(&self, branch: &str) -> anyhow::Result<bool> {
        Ok(self.tracker.find_worktree_for_branch(branch)?.is_some()
            || self.vcs.local_branch_exists(branch)?
            || self
                .vcs
                .remote_branch_exists(self.settings.remote(), branch)?)
    }

    fn resolve_path(&self, branch: &str, base: &Base) -> anyhow::Result<PathBuf> {
        let worktrees_dir = self.tracker.worktrees_dir()?;
        if base.nests {
            let named = worktrees_dir.join(&base.name);
            if named.is_dir() {
                return Ok(named.join(branch));
            }
            if let Some(wt) = self.tracker.find_worktree_for_branch(&base.name)?
                && wt.path.starts_with(&worktrees_dir)
            {
                return Ok(wt.path.join(branch));
            }
        }
        Ok(worktrees_dir.join(branch))
    }

    fn start_point(&self, base: &str) -> anyhow::Result<Option<String>> {
        let remote = self.settings.remote();
        if self.vcs.remote_branch_exists(remote, base)? {
            Ok(Some(format!("{remote}/{base}")))
        } else if self.vcs.local_branch_exists(base)? {
            Ok(Some(base.to_string()))
        } else {
            Ok(None)
        }
    }

    /// Destroy whatever occupies the slot for `branch`: its registered
    /// worktree (wherever it lives), a worktree or directory at `path`, the
    /// branch ref, and its parent pointer. Returns whether anything existed.
    ///
    /// Uncommitted changes in the destroyed worktree are lost. Refuses with
    /// [`StackError::NestedWorktrees`] while other branches' worktrees live
    /// inside a directory it would delete.
    pub fn reclaim(&self, branch: &str, path: &Path) -> anyhow::Result<bool> {
        let worktrees = self.vcs.list_worktrees()?;
        let occupants: Vec<&Worktree> = worktrees
            .iter()
            .filter(|wt| wt.branch.as_deref() == Some(branch) || wt.path == path)
            .collect();
        let branch_exists = self.vcs.local_branch_exists(branch)?;
        if occupants.is_empty() && !branch_exists && !path.exists() {
            return Ok(false);
        }

        let root = self.vcs.repo_root()?;
        if occupants.iter().any(|wt| wt.path == root) {
            return Err(StackError::Other {
                message: format!("{branch} is checked out in the main worktree"),
            }
            .into());
        }

        let mut doomed: Vec<&Path> = occupants.iter().map(|wt| wt.path.as_path()).collect();
        if path.exists() && !doomed.contains(&path) {
            doomed.push(path);
        }
        let nested = nested_worktrees(&worktrees, &doomed, &root);
        if !nested.is_empty() {
            return Err(StackError::NestedWorktrees {
                branch: branch.to_string(),
                nested,
            }
            .into());
        }

        let destroyed = if doomed.is_empty() {
            "its branch".to_string()
        } else {
            let dirs: Vec<String> = doomed.iter().map(|d| format_relative(d, &root)).collect();
            format!("the existing worktree at {}", dirs.join(", "))
        };
        eprintln!(
            "{}",
            warning_message(cformat!(
                "Recreating <bold>{branch}</>: removing {destroyed} and any uncommitted work in it"
            ))
        );

        for wt in occupants {
            if let Err(e) = self.vcs.remove_worktree(&wt.path, true) {
                log::debug!("worktree remove failed for {}: {e:#}", wt.path.display());
            }
        }
        remove_leftover_dir(path)?;
        self.vcs.prune_worktrees()?;
        if branch_exists {
            self.vcs.delete_branch(branch, true)?;
        }
        self.tracker.parents().clear_parent(branch)?;
        Ok(true)
    }

    /// Remove the worktree and branch of `branch`, re-parenting its children.
    ///
    /// Refuses while other worktrees are nested inside its directory.
    pub fn remove(&self, branch: &str, force: bool) -> anyhow::Result<RemovedWorktree> {
        let worktrees = self.vcs.list_worktrees()?;
        let root = self.vcs.repo_root()?;
        let wt = worktree_for_branch(&worktrees, branch).cloned();

        if let Some(wt) = &wt {
            if wt.path == root {
                return Err(StackError::Other {
                    message: format!("{branch} is checked out in the main worktree"),
                }
                .into());
            }
            let nested = nested_worktrees(&worktrees, &[wt.path.as_path()], &root);
            if !nested.is_empty() {
                return Err(StackError::NestedWorktrees {
                    branch: branch.to_string(),
                    nested,
                }
                .into());
            }
        } else if !self.vcs.local_branch_exists(branch)? {
            return Err(StackError::BranchNotFound {
                branch: branch.to_string(),
            }
            .into());
        }

        let new_parent = self.tracker.get_parent(branch)?;
        let children = self.tracker.children(branch)?;
        for child in &children {
            self.tracker.parents().set_parent(child, &new_parent)?;
        }

        if let Some(wt) = &wt {
            if let Err(e) = self.vcs.remove_worktree(&wt.path, true) {
                log::debug!("worktree remove failed for {}: {e:#}", wt.path.display());
            }
            remove_leftover_dir(&wt.path)?;
            self.vcs.prune_worktrees()?;
        }
        if self.vcs.local_branch_exists(branch)? {
            self.vcs.delete_branch(branch, force)?;
        }
        self.tracker.parents().clear_parent(branch)?;

        Ok(RemovedWorktree {
            branch: branch.to_string(),
            path: wt.map(|wt| wt.path),
            reparented: children,
            new_parent,
        })
    }

    /// Copy configured bootstrap files from the current worktree, never
    /// overwriting what's already there.
    fn copy_bootstrap_files(&self, dest: &Path) -> anyhow::Result<Vec<String>> {
        let source = self.vcs.worktree_root()?;
        let mut copied = Vec::new();
        for name in &self.settings.bootstrap_files {
            let src = source.join(name);
            let dst = dest.join(name);
            if !src.is_file() || dst.exists() {
                continue;
            }
            if let Some(dir) = dst.parent() {
                fs::create_dir_all(dir)?;
            }
            match reflink_copy::reflink_or_copy(&src, &dst) {
                Ok(_) => copied.push(name.clone()),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => eprintln!(
                    "{}",
                    warning_message(cformat!("Failed to copy <bold>{name}</>: {e}"))
                ),
            }
        }
        Ok(copied)
    }

    /// Keep worktree directories and records out of `git status` in every
    /// worktree.
    fn ensure_excludes(&self, new_path: &Path) -> anyhow::Result<()> {
        let mut entries = vec![
            format!("{}/", self.settings.worktrees_dir.trim_end_matches('/')),
            format!("{CONTEXT_DIR}/"),
            format!("{MCP_DIR}/"),
        ];

        // A worktree nested in another linked worktree shows up there as an
        // untracked directory
        let root = self.vcs.repo_root()?;
        let worktrees = self.vcs.list_worktrees()?;
        if let Some(container) = worktrees
            .iter()
            .filter(|wt| wt.path != new_path && wt.path != root && new_path.starts_with(&wt.path))
            .max_by_key(|wt| wt.path.components().count())
            && let Ok(relative) = new_path.strip_prefix(&container.path)
        {
            entries.push(format!(
                "/{}/",
                relative.to_string_lossy().replace('\\', "/")
            ));
        }

        let exclude = self.vcs.git_common_dir()?.join("info").join("exclude");
        add_exclude_entries(&exclude, &entries)
    }
}

/// Worktrees inside any of `dirs` (other than the dirs themselves), as
/// `branch  relative/path` lines.
fn nested_worktrees(worktrees: &[Worktree], dirs: &[&Path], root: &Path) -> Vec<String> {
    worktrees
        .iter()
        .filter(|wt| {
            dirs.iter()
                .any(|dir| wt.path != *dir && wt.path.starts_with(dir))
        })
        .map(|wt| {
            let name = wt.branch.as_deref().unwrap_or("(detached)");
            format!("{name}  {}", format_relative(&wt.path, root))
        })
        .collect()
}

fn remove_leftover_dir(path: &Path) -> anyhow::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e)
            .with_context(|| format!("Failed to remove {}", format_path_for_display(path))),
    }
}

/// Append missing `entries` to an exclude file, creating it if needed.
pub fn add_exclude_entries(exclude: &Path, entries: &[String]) -> anyhow::Result<()> {
    let existing = match fs::read_to_string(exclude) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(e).with_context(|| {
                format!("Failed to read {}", format_path_for_display(exclude))
            });
        }
    };
    let missing: Vec<&String> = entries
        .iter()
        .filter(|entry| !existing.lines().any(|line| line.trim() == entry.as_str()))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }

    let mut contents = existing;
    if !contents.is_empty() && !contents.ends_with('\n') {
        contents.push('\n');
    }
    for entry in missing {
        contents.push_str(entry);
        contents.push('\n');
    }
    if let Some(dir) = exclude.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(exclude, contents)
        .with_context(|| format!("Failed to write {}", format_path_for_display(exclude)))
}
