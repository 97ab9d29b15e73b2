//! In-memory fakes for unit tests
//!
//! [`FakeVcs`] models just enough of a repository (branches, worktrees,
//! config, scripted merge outcomes) to drive the tracker, allocator and
//! integration engine without spawning git. Worktree directories are created
//! on disk under a temp dir so filesystem-level behaviour (bootstrap copies,
//! context records) is exercised for real.
//!
//! Every mutating call is appended to a log; tests assert on it to prove
//! that declined or refused operations mutated nothing.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::bail;

use crate::git::{MergeOutcome, VersionControl, Worktree};
use crate::stack::{BranchStacker, Lifecycle};

#[derive(Debug, Default)]
struct VcsState {
    current: Option<String>,
    branches: Vec<String>,
    remote_branches: HashSet<String>,
    worktrees: Vec<Worktree>,
    config: BTreeMap<String, String>,
    merges: HashMap<String, MergeOutcome>,
    ahead: HashMap<String, usize>,
    merged: Vec<String>,
    dirty: HashSet<PathBuf>,
    failing: HashSet<&'static str>,
    command_results: HashMap<PathBuf, bool>,
    calls: Vec<String>,
}

pub struct FakeVcs {
    root: PathBuf,
    state: RefCell<VcsState>,
}

impl FakeVcs {
    /// Repository at `root` with `main` checked out in the main worktree.
    pub fn new(root: &Path) -> Self {
        std::fs::create_dir_all(root).unwrap();
        let state = VcsState {
            current: Some("main".into()),
            branches: vec!["main".into()],
            worktrees: vec![Worktree::on_branch(root, "main")],
            ..Default::default()
        };
        Self {
            root: root.to_path_buf(),
            state: RefCell::new(state),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn add_branch(&self, branch: &str) {
        let mut state = self.state.borrow_mut();
        if !state.branches.iter().any(|b| b == branch) {
            state.branches.push(branch.to_string());
        }
    }

    /// Branch with a worktree at `root/<relative>` and a parent pointer.
    pub fn add_stacked(&self, branch: &str, parent: &str, relative: &str) -> PathBuf {
        let path = self.root.join(relative);
        std::fs::create_dir_all(&path).unwrap();
        self.add_branch(branch);
        let mut state = self.state.borrow_mut();
        state.worktrees.push(Worktree::on_branch(&path, branch));
        state
            .config
            .insert(format!("branch.{branch}.parent"), parent.to_string());
        path
    }

    pub fn add_remote_branch(&self, remote: &str, branch: &str) {
        self.state
            .borrow_mut()
            .remote_branches
            .insert(format!("{remote}/{branch}"));
    }

    pub fn set_current(&self, branch: Option<&str>) {
        self.state.borrow_mut().current = branch.map(String::from);
    }

    pub fn set_config(&self, key: &str, value: &str) {
        self.state
            .borrow_mut()
            .config
            .insert(key.to_string(), value.to_string());
    }

    pub fn config(&self, key: &str) -> Option<String> {
        self.state.borrow().config.get(key).cloned()
    }

    pub fn script_merge(&self, branch: &str, outcome: MergeOutcome) {
        self.state
            .borrow_mut()
            .merges
            .insert(branch.to_string(), outcome);
    }

    pub fn set_ahead(&self, branch: &str, count: usize) {
        self.state
            .borrow_mut()
            .ahead
            .insert(branch.to_string(), count);
    }

    pub fn set_merged(&self, branches: &[&str]) {
        self.state.borrow_mut().merged = branches.iter().map(|b| b.to_string()).collect();
    }

    pub fn set_dirty(&self, worktree: &Path) {
        self.state
            .borrow_mut()
            .dirty
            .insert(worktree.to_path_buf());
    }

    /// Make every call of `operation` (e.g. `"push"`) fail.
    pub fn fail(&self, operation: &'static str) {
        self.state.borrow_mut().failing.insert(operation);
    }

    pub fn set_command_result(&self, worktree: &Path, success: bool) {
        self.state
            .borrow_mut()
            .command_results
            .insert(worktree.to_path_buf(), success);
    }

    pub fn has_branch(&self, branch: &str) -> bool {
        self.state.borrow().branches.iter().any(|b| b == branch)
    }

    pub fn worktree_path(&self, branch: &str) -> Option<PathBuf> {
        self.state
            .borrow()
            .worktrees
            .iter()
            .find(|wt| wt.branch.as_deref() == Some(branch))
            .map(|wt| wt.path.clone())
    }

    /// Mutating calls made so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    fn record(&self, operation: &'static str, detail: String) -> anyhow::Result<()> {
        let mut state = self.state.borrow_mut();
        state.calls.push(format!("{operation} {detail}"));
        if state.failing.contains(operation) {
            bail!("{operation} failed");
        }
        Ok(())
    }

    fn display(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| path.display().to_string())
    }
}

impl VersionControl for FakeVcs {
    fn repo_root(&self) -> anyhow::Result<PathBuf> {
        Ok(self.root.clone())
    }

    fn worktree_root(&self) -> anyhow::Result<PathBuf> {
        let state = self.state.borrow();
        let current = state.current.as_deref();
        Ok(state
            .worktrees
            .iter()
            .find(|wt| current.is_some() && wt.branch.as_deref() == current)
            .map(|wt| wt.path.clone())
            .unwrap_or_else(|| self.root.clone()))
    }

    fn git_common_dir(&self) -> anyhow::Result<PathBuf> {
        Ok(self.root.join(".git"))
    }

    fn current_branch(&self) -> anyhow::Result<Option<String>> {
        Ok(self.state.borrow().current.clone())
    }

    fn list_worktrees(&self) -> anyhow::Result<Vec<Worktree>> {
        Ok(self.state.borrow().worktrees.clone())
    }

    fn local_branches(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.state.borrow().branches.clone())
    }

    fn local_branch_exists(&self, branch: &str) -> anyhow::Result<bool> {
        Ok(self.has_branch(branch))
    }

    fn remote_branch_exists(&self, remote: &str, branch: &str) -> anyhow::Result<bool> {
        Ok(self
            .state
            .borrow()
            .remote_branches
            .contains(&format!("{remote}/{branch}")))
    }

    fn add_worktree(&self, path: &Path, branch: &str, start: Option<&str>) -> anyhow::Result<()> {
        self.record(
            "add_worktree",
            format!("{branch} {} {}", self.display(path), start.unwrap_or("HEAD")),
        )?;
        if self.has_branch(branch) {
            bail!("a branch named '{branch}' already exists");
        }
        std::fs::create_dir_all(path)?;
        self.add_branch(branch);
        self.state
            .borrow_mut()
            .worktrees
            .push(Worktree::on_branch(path, branch));
        Ok(())
    }

    fn remove_worktree(&self, path: &Path, _force: bool) -> anyhow::Result<()> {
        self.record("remove_worktree", self.display(path))?;
        let _ = std::fs::remove_dir_all(path);
        self.state.borrow_mut().worktrees.retain(|wt| wt.path != path);
        Ok(())
    }

    fn prune_worktrees(&self) -> anyhow::Result<()> {
        self.record("prune", String::new())?;
        self.state
            .borrow_mut()
            .worktrees
            .retain(|wt| wt.path.exists());
        Ok(())
    }

    fn delete_branch(&self, branch: &str, _force: bool) -> anyhow::Result<()> {
        self.record("delete_branch", branch.to_string())?;
        self.state.borrow_mut().branches.retain(|b| b != branch);
        Ok(())
    }

    fn fast_forward(&self, worktree: &Path, remote: &str, branch: &str) -> anyhow::Result<()> {
        self.record(
            "fast_forward",
            format!("{remote}/{branch} in {}", self.display(worktree)),
        )
    }

    fn merge_no_ff(
        &self,
        worktree: &Path,
        branch: &str,
        message: &str,
    ) -> anyhow::Result<MergeOutcome> {
        self.record(
            "merge",
            format!("{branch} in {} ({message})", self.display(worktree)),
        )?;
        Ok(self
            .state
            .borrow()
            .merges
            .get(branch)
            .cloned()
            .unwrap_or(MergeOutcome::Merged))
    }

    fn push(&self, worktree: &Path, remote: &str, branch: &str) -> anyhow::Result<()> {
        self.record(
            "push",
            format!("{remote} {branch} from {}", self.display(worktree)),
        )
    }

    fn merged_branches(&self, _target: &str) -> anyhow::Result<Vec<String>> {
        Ok(self.state.borrow().merged.clone())
    }

    fn commits_ahead(&self, _base: &str, head: &str) -> anyhow::Result<usize> {
        Ok(self.state.borrow().ahead.get(head).copied().unwrap_or(0))
    }

    fn is_dirty(&self, worktree: &Path) -> anyhow::Result<bool> {
        Ok(self.state.borrow().dirty.contains(worktree))
    }

    fn commit_all(&self, worktree: &Path, message: &str) -> anyhow::Result<()> {
        self.record(
            "commit_all",
            format!("{} ({message})", self.display(worktree)),
        )?;
        self.state.borrow_mut().dirty.remove(worktree);
        Ok(())
    }

    fn run_in(&self, worktree: &Path, command: &str) -> anyhow::Result<bool> {
        self.record("run", format!("{command} in {}", self.display(worktree)))?;
        Ok(self
            .state
            .borrow()
            .command_results
            .get(worktree)
            .copied()
            .unwrap_or(true))
    }

    fn config_get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.config(key))
    }

    fn config_set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.record("config_set", format!("{key} {value}"))?;
        self.set_config(key, value);
        Ok(())
    }

    fn config_unset(&self, key: &str) -> anyhow::Result<()> {
        let removed = self.state.borrow_mut().config.remove(key).is_some();
        if removed {
            self.record("config_unset", key.to_string())?;
        }
        Ok(())
    }
}

/// Branch tool fake: records calls, optionally failing some of them.
#[derive(Debug, Default)]
pub struct FakeStacker {
    calls: RefCell<Vec<String>>,
    lifecycles: RefCell<HashMap<String, Lifecycle>>,
    failing: RefCell<HashSet<String>>,
}

impl FakeStacker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_lifecycle_of(&self, branch: &str, lifecycle: Lifecycle) {
        self.lifecycles
            .borrow_mut()
            .insert(branch.to_string(), lifecycle);
    }

    /// Make calls whose log line starts with `prefix` fail (e.g. `"ship feat/x"`).
    pub fn fail(&self, prefix: &str) {
        self.failing.borrow_mut().insert(prefix.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: String) -> anyhow::Result<()> {
        let failing = self
            .failing
            .borrow()
            .iter()
            .any(|prefix| call.starts_with(prefix.as_str()));
        self.calls.borrow_mut().push(call.clone());
        if failing {
            bail!("{call} failed");
        }
        Ok(())
    }
}

fn last_component(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl BranchStacker for FakeStacker {
    fn sync(&self, worktree: &Path) -> anyhow::Result<()> {
        self.record(format!("sync {}", last_component(worktree)))
    }

    fn ship(&self, _worktree: &Path, branch: &str) -> anyhow::Result<()> {
        self.record(format!("ship {branch}"))
    }

    fn set_lifecycle(
        &self,
        _worktree: &Path,
        branch: &str,
        lifecycle: Lifecycle,
    ) -> anyhow::Result<()> {
        self.record(format!("{lifecycle} {branch}"))?;
        self.set_lifecycle_of(branch, lifecycle);
        Ok(())
    }

    fn lifecycle(&self, branch: &str) -> anyhow::Result<Lifecycle> {
        Ok(self
            .lifecycles
            .borrow()
            .get(branch)
            .copied()
            .unwrap_or(Lifecycle::Active))
    }

    fn mark_perennial(&self, branch: &str) -> anyhow::Result<()> {
        self.record(format!("perennial {branch}"))
    }

    fn configure(&self, trunk: &str, perennials: &[String]) -> anyhow::Result<()> {
        self.record(format!("configure {trunk} {}", perennials.join(" ")))
    }
}
