//! Stack relationships
//!
//! A stacked branch records its parent in git config
//! (`branch.<name>.parent`). The [`Tracker`] answers "what is this branch
//! stacked on", "what is stacked on it", and "in which order do I visit a
//! set of branches so children come before parents".
//!
//! Parent pointers are hints, not law: a pointer naming a branch that no
//! longer exists falls back to trunk, and a branch without a pointer is
//! placed by where its worktree lives on disk.

use std::cell::OnceCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use color_print::cformat;

use crate::branch::{PERENNIAL_BRANCHES, is_perennial};
use crate::config::Settings;
use crate::context::ContextStore;
use crate::git::{VersionControl, Worktree, worktree_for_branch};
use crate::path::format_relative;

mod town;

pub use town::{BranchStacker, GitTown, Lifecycle, require_git_town};

/// Persistent storage for parent pointers.
pub trait ParentStore {
    fn parent(&self, branch: &str) -> anyhow::Result<Option<String>>;
    fn set_parent(&self, branch: &str, parent: &str) -> anyhow::Result<()>;
    /// Remove the parent pointer and any push-remote override.
    fn clear_parent(&self, branch: &str) -> anyhow::Result<()>;
}

/// Parent pointers in `branch.<name>.parent`
pub struct GitConfigParents<'a> {
    vcs: &'a dyn VersionControl,
}

impl<'a> GitConfigParents<'a> {
    pub fn new(vcs: &'a dyn VersionControl) -> Self {
        Self { vcs }
    }
}

fn parent_key(branch: &str) -> String {
    format!("branch.{branch}.parent")
}

pub(crate) fn pushremote_key(branch: &str) -> String {
    format!("branch.{branch}.pushremote")
}

impl ParentStore for GitConfigParents<'_> {
    fn parent(&self, branch: &str) -> anyhow::Result<Option<String>> {
        Ok(self
            .vcs
            .config_get(&parent_key(branch))?
            .filter(|p| !p.is_empty()))
    }

    fn set_parent(&self, branch: &str, parent: &str) -> anyhow::Result<()> {
        self.vcs.config_set(&parent_key(branch), parent)
    }

    fn clear_parent(&self, branch: &str) -> anyhow::Result<()> {
        self.vcs.config_unset(&parent_key(branch))?;
        self.vcs.config_unset(&pushremote_key(branch))
    }
}

/// Reads and maintains the parent/child relationships between branches.
pub struct Tracker<'a> {
    vcs: &'a dyn VersionControl,
    parents: &'a dyn ParentStore,
    settings: &'a Settings,
    trunk: OnceCell<String>,
}

impl<'a> Tracker<'a> {
    pub fn new(
        vcs: &'a dyn VersionControl,
        parents: &'a dyn ParentStore,
        settings: &'a Settings,
    ) -> Self {
        Self {
            vcs,
            parents,
            settings,
            trunk: OnceCell::new(),
        }
    }

    pub fn parents(&self) -> &'a dyn ParentStore {
        self.parents
    }

    /// The trunk branch.
    ///
    /// Resolution order: `STACKTRUNK_TRUNK` / config `trunk`, then the branch
    /// tool's `git-town.main-branch`, then whichever of `main`/`master`
    /// exists, then `main`.
    pub fn trunk(&self) -> anyhow::Result<String> {
        if let Some(trunk) = self.trunk.get() {
            return Ok(trunk.clone());
        }
        let trunk = self.detect_trunk()?;
        log::debug!("Trunk resolved to {trunk}");
        Ok(self.trunk.get_or_init(|| trunk).clone())
    }

    fn detect_trunk(&self) -> anyhow::Result<String> {
        if let Some(trunk) = &self.settings.trunk {
            return Ok(trunk.clone());
        }
        if let Some(trunk) = self
            .vcs
            .config_get(town::MAIN_BRANCH_KEY)?
            .filter(|t| !t.is_empty())
        {
            return Ok(trunk);
        }
        for candidate in ["main", "master"] {
            if self.vcs.local_branch_exists(candidate)? {
                return Ok(candidate.to_string());
            }
        }
        Ok("main".to_string())
    }

    /// Perennial: one of the fixed long-lived names, the trunk, or listed in
    /// the branch tool's `git-town.perennial-branches`.
    pub fn is_perennial(&self, branch: &str) -> anyhow::Result<bool> {
        if is_perennial(branch) || branch == self.trunk()? {
            return Ok(true);
        }
        Ok(town::config_list(self.vcs, town::PERENNIAL_KEY)?
            .iter()
            .any(|p| p == branch))
    }

    /// The recorded parent when it still exists locally, otherwise trunk.
    pub fn get_parent(&self, branch: &str) -> anyhow::Result<String> {
        if let Some(parent) = self.valid_pointer(branch)? {
            return Ok(parent);
        }
        self.trunk()
    }

    fn valid_pointer(&self, branch: &str) -> anyhow::Result<Option<String>> {
        match self.parents.parent(branch)? {
            Some(parent) if parent != branch && self.vcs.local_branch_exists(&parent)? => {
                Ok(Some(parent))
            }
            Some(parent) => {
                log::debug!("Ignoring dangling parent pointer {branch} -> {parent}");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Parent of `branch`, reconciling config with the on-disk layout.
    ///
    /// A valid pointer wins. Without one, a worktree nested under another
    /// worktree (inside `worktrees/`) is stacked on that worktree's branch.
    /// Otherwise trunk.
    pub fn resolve_parent(&self, branch: &str, worktrees: &[Worktree]) -> anyhow::Result<String> {
        if let Some(parent) = self.valid_pointer(branch)? {
            return Ok(parent);
        }
        if let Some(parent) = self.path_parent(branch, worktrees)? {
            return Ok(parent);
        }
        self.trunk()
    }

    fn path_parent(&self, branch: &str, worktrees: &[Worktree]) -> anyhow::Result<Option<String>> {
        let Some(wt) = worktree_for_branch(worktrees, branch) else {
            return Ok(None);
        };
        let worktrees_dir = self.worktrees_dir()?;
        if !wt.path.starts_with(&worktrees_dir) {
            return Ok(None);
        }

        // The closest enclosing worktree inside worktrees/
        let container = worktrees
            .iter()
            .filter(|other| {
                other.path != wt.path
                    && other.path.starts_with(&worktrees_dir)
                    && wt.path.starts_with(&other.path)
            })
            .max_by_key(|other| other.path.components().count());
        if let Some(branch) = container.and_then(|c| c.branch.clone()) {
            return Ok(Some(branch));
        }

        // worktrees/<parent>/<branch>, where worktrees/<parent> is a plain directory
        let Ok(relative) = wt.path.strip_prefix(&worktrees_dir) else {
            return Ok(None);
        };
        let relative = relative.to_string_lossy().replace('\\', "/");
        if let Some(parent) = relative
            .strip_suffix(branch)
            .and_then(|p| p.strip_suffix('/'))
            .filter(|p| !p.is_empty())
            && self.vcs.local_branch_exists(parent)?
        {
            return Ok(Some(parent.to_string()));
        }
        Ok(None)
    }

    /// Branches whose parent is `branch`.
    pub fn children(&self, branch: &str) -> anyhow::Result<Vec<String>> {
        let mut children = Vec::new();
        for candidate in self.vcs.local_branches()? {
            if candidate == branch || self.is_perennial(&candidate)? {
                continue;
            }
            if self.get_parent(&candidate)? == branch {
                children.push(candidate);
            }
        }
        Ok(children)
    }

    /// All branches stacked (transitively) on `branch`, nearest first.
    pub fn descendants(&self, branch: &str) -> anyhow::Result<Vec<String>> {
        let map = self.parent_map()?;
        let mut found = Vec::new();
        let mut frontier = vec![branch.to_string()];
        let mut seen: HashSet<String> = HashSet::from([branch.to_string()]);
        while let Some(current) = frontier.pop() {
            for (child, parent) in &map {
                if parent == &current && seen.insert(child.clone()) {
                    found.push(child.clone());
                    frontier.push(child.clone());
                }
            }
        }
        Ok(found)
    }

    /// The live worktree checked out on `branch`, if any.
    pub fn find_worktree_for_branch(&self, branch: &str) -> anyhow::Result<Option<Worktree>> {
        let worktrees = self.vcs.list_worktrees()?;
        Ok(worktree_for_branch(&worktrees, branch).cloned())
    }

    /// Absolute path of the directory holding all worktrees.
    pub fn worktrees_dir(&self) -> anyhow::Result<std::path::PathBuf> {
        Ok(self.vcs.repo_root()?.join(&self.settings.worktrees_dir))
    }

    /// Parent of every local non-perennial branch.
    pub fn parent_map(&self) -> anyhow::Result<BTreeMap<String, String>> {
        let mut map = BTreeMap::new();
        for branch in self.vcs.local_branches()? {
            if self.is_perennial(&branch)? {
                continue;
            }
            let parent = self.get_parent(&branch)?;
            map.insert(branch, parent);
        }
        Ok(map)
    }

    /// `branches` sorted deepest first (see [`order_deepest_first`]).
    pub fn stack_order(&self, branches: &[String]) -> anyhow::Result<Vec<String>> {
        let mut parents = HashMap::new();
        for branch in branches {
            self.collect_ancestry(branch, &mut parents)?;
        }
        Ok(order_deepest_first(branches, &parents))
    }

    fn collect_ancestry(
        &self,
        branch: &str,
        parents: &mut HashMap<String, String>,
    ) -> anyhow::Result<()> {
        let mut current = branch.to_string();
        while !parents.contains_key(&current) && !self.is_perennial(&current)? {
            let parent = self.get_parent(&current)?;
            if parent == current {
                break;
            }
            parents.insert(current, parent.clone());
            current = parent;
        }
        Ok(())
    }

    /// Text tree of all local branches rooted at trunk and the perennial
    /// branches, with worktree locations.
    pub fn render_tree(&self) -> anyhow::Result<String> {
        let trunk = self.trunk()?;
        let map = self.parent_map()?;
        let worktrees = self.vcs.list_worktrees()?;
        let root = self.vcs.repo_root()?;
        let current = self.vcs.current_branch()?;

        let mut children: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (branch, parent) in &map {
            children.entry(parent.as_str()).or_default().push(branch);
        }

        let mut roots = vec![trunk.clone()];
        for perennial in PERENNIAL_BRANCHES {
            if *perennial != trunk && self.vcs.local_branch_exists(perennial)? {
                roots.push(perennial.to_string());
            }
        }
        // Pointers to branches outside the map (e.g. a perennial we don't
        // know about) still get a root
        for parent in children.keys() {
            if !map.contains_key(*parent) && !roots.iter().any(|r| r == parent) {
                roots.push(parent.to_string());
            }
        }

        let renderer = TreeRenderer {
            children: &children,
            worktrees: &worktrees,
            root: &root,
            current: current.as_deref(),
        };
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        for r in &roots {
            out.push(renderer.label(r));
            seen.insert(r.clone());
            renderer.render_children(r, "", &mut seen, &mut out);
        }
        Ok(out.join("\n"))
    }
}

struct TreeRenderer<'a> {
    children: &'a BTreeMap<&'a str, Vec<&'a str>>,
    worktrees: &'a [Worktree],
    root: &'a Path,
    current: Option<&'a str>,
}

impl TreeRenderer<'_> {
    fn label(&self, branch: &str) -> String {
        let name = if self.current == Some(branch) {
            cformat!("<bold>{branch}</> <cyan>@</>")
        } else {
            branch.to_string()
        };
        let Some(wt) = worktree_for_branch(self.worktrees, branch) else {
            return name;
        };
        let issue = match ContextStore::read(&wt.path) {
            Ok(summary) => summary
                .and_then(|s| s.issue)
                .map(|n| cformat!("  <cyan>#{n}</>"))
                .unwrap_or_default(),
            Err(e) => {
                log::debug!("Skipping context for {branch}: {e:#}");
                String::new()
            }
        };
        cformat!(
            "{name}{issue}  <dim>{}</>",
            format_relative(&wt.path, self.root)
        )
    }

    fn render_children(
        &self,
        branch: &str,
        prefix: &str,
        seen: &mut HashSet<String>,
        out: &mut Vec<String>,
    ) {
        let Some(kids) = self.children.get(branch) else {
            return;
        };
        let kids: Vec<_> = kids.iter().filter(|k| !seen.contains(**k)).collect();
        for (i, kid) in kids.iter().enumerate() {
            if !seen.insert(kid.to_string()) {
                continue;
            }
            let last = i + 1 == kids.len();
            let (branch_glyph, next_prefix) = if last {
                ("└── ", format!("{prefix}    "))
            } else {
                ("├── ", format!("{prefix}│   "))
            };
            out.push(format!("{prefix}{branch_glyph}{}", self.label(kid)));
            self.render_children(kid, &next_prefix, seen, out);
        }
    }
}

/// Sort `branches` by depth in the parent graph, deepest first.
///
/// Depth counts parent hops until a branch with no recorded parent.
/// Branches of equal depth keep their input order, and a cycle ends the
/// walk at the first repeated branch.
pub fn order_deepest_first(branches: &[String], parents: &HashMap<String, String>) -> Vec<String> {
    let depth = |branch: &str| {
        let mut depth = 0usize;
        let mut seen = HashSet::from([branch]);
        let mut current = branch;
        while let Some(parent) = parents.get(current) {
            depth += 1;
            if !seen.insert(parent.as_str()) {
                break;
            }
            current = parent;
        }
        depth
    };

    let mut ordered: Vec<(usize, &String)> =
        branches.iter().map(|b| (depth(b.as_str()), b)).collect();
    // sort_by is stable
    ordered.sort_by(|a, b| b.0.cmp(&a.0));
    ordered.into_iter().map(|(_, b)| b.clone()).collect()
}
