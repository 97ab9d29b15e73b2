use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::OnceLock;

use anyhow::{Context, bail};
use dunce::canonicalize;

use super::parse::{parse_branch_list, parse_name_list};
use super::{MergeOutcome, VersionControl, Worktree};
use crate::shell_exec::{self, ShellConfig};

mod worktrees;

/// Global base path for repository operations, set by -C flag
static BASE_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Initialize the global base path for repository operations.
///
/// Called once at startup from main(). Defaults to "." when never called.
pub fn set_base_path(path: PathBuf) {
    BASE_PATH.set(path).ok();
}

fn base_path() -> &'static PathBuf {
    static DEFAULT: OnceLock<PathBuf> = OnceLock::new();
    BASE_PATH
        .get()
        .unwrap_or_else(|| DEFAULT.get_or_init(|| PathBuf::from(".")))
}

/// Repository context for git operations, backed by the `git` CLI.
///
/// ```no_run
/// use stacktrunk::git::{Repository, VersionControl};
///
/// let repo = Repository::current();
/// let branch = repo.current_branch()?;
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug)]
pub struct Repository {
    path: PathBuf,
    git_common_dir: OnceLock<PathBuf>,
}

impl Repository {
    /// Create a repository context at the specified path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            git_common_dir: OnceLock::new(),
        }
    }

    /// Repository context for the current directory (or the `-C` path).
    pub fn current() -> Self {
        Self::at(base_path().clone())
    }

    pub fn base_path(&self) -> &Path {
        &self.path
    }

    /// Short name for log lines: "." for the current directory, otherwise the
    /// directory name.
    fn logging_context(dir: &Path) -> String {
        if dir.to_str() == Some(".") {
            ".".to_string()
        } else {
            dir.file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("?")
                .to_string()
        }
    }

    fn git_output(&self, dir: &Path, args: &[&str]) -> anyhow::Result<Output> {
        let mut cmd = Command::new("git");
        cmd.args(args);
        cmd.current_dir(dir);

        shell_exec::run(&mut cmd, Some(&Self::logging_context(dir)))
            .with_context(|| format!("Failed to execute: git {}", args.join(" ")))
    }

    /// Run a git command in `dir`, returning stdout.
    fn run_command_in(&self, dir: &Path, args: &[&str]) -> anyhow::Result<String> {
        let output = self.git_output(dir, args)?;

        if !output.status.success() {
            // Git uses \r for progress updates
            let error_msg = shell_exec::failure_text(&output).replace('\r', "\n");
            for line in error_msg.lines() {
                log::debug!("  ! {}", line);
            }
            bail!("{}", error_msg);
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        for line in stdout.trim().lines() {
            log::debug!("  {}", line);
        }
        Ok(stdout)
    }

    /// Run a git command in this repository's context, returning stdout.
    pub fn run_command(&self, args: &[&str]) -> anyhow::Result<String> {
        self.run_command_in(&self.path, args)
    }

    /// Run a git command and return whether it succeeded (exit code 0).
    ///
    /// For commands that answer with their exit code, like
    /// `git rev-parse --verify --quiet`.
    pub fn run_command_check(&self, args: &[&str]) -> anyhow::Result<bool> {
        Ok(self.git_output(&self.path, args)?.status.success())
    }
}

fn path_arg(path: &Path) -> anyhow::Result<&str> {
    path.to_str()
        .with_context(|| format!("Path contains invalid UTF-8: {}", path.display()))
}

impl VersionControl for Repository {
    fn repo_root(&self) -> anyhow::Result<PathBuf> {
        // Git lists the main worktree first
        let main = self
            .list_worktrees()?
            .into_iter()
            .next()
            .context("No worktrees found")?;
        Ok(canonicalize(&main.path).unwrap_or(main.path))
    }

    fn worktree_root(&self) -> anyhow::Result<PathBuf> {
        let stdout = self.run_command(&["rev-parse", "--show-toplevel"])?;
        canonicalize(stdout.trim()).context("Failed to canonicalize worktree root")
    }

    fn git_common_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(dir) = self.git_common_dir.get() {
            return Ok(dir.clone());
        }
        let stdout = self.run_command(&["rev-parse", "--git-common-dir"])?;
        let path = PathBuf::from(stdout.trim());
        let path = if path.is_relative() {
            canonicalize(self.path.join(&path)).context("Failed to resolve git common directory")?
        } else {
            path
        };
        Ok(self.git_common_dir.get_or_init(|| path).clone())
    }

    fn current_branch(&self) -> anyhow::Result<Option<String>> {
        let stdout = self.run_command(&["branch", "--show-current"])?;
        let branch = stdout.trim();
        Ok((!branch.is_empty()).then(|| branch.to_string()))
    }

    fn list_worktrees(&self) -> anyhow::Result<Vec<Worktree>> {
        self.list_worktrees_porcelain()
    }

    fn local_branches(&self) -> anyhow::Result<Vec<String>> {
        // lstrip=2 rather than refname:short, which adds "heads/" when a
        // remote branch has the same name
        let stdout = self.run_command(&["branch", "--format=%(refname:lstrip=2)"])?;
        Ok(parse_name_list(&stdout))
    }

    fn local_branch_exists(&self, branch: &str) -> anyhow::Result<bool> {
        self.run_command_check(&[
            "rev-parse",
            "--verify",
            "--quiet",
            &format!("refs/heads/{branch}"),
        ])
    }

    fn remote_branch_exists(&self, remote: &str, branch: &str) -> anyhow::Result<bool> {
        self.run_command_check(&[
            "rev-parse",
            "--verify",
            "--quiet",
            &format!("refs/remotes/{remote}/{branch}"),
        ])
    }

    fn add_worktree(&self, path: &Path, branch: &str, start: Option<&str>) -> anyhow::Result<()> {
        self.add_worktree_with_branch(path, branch, start)
    }

    fn remove_worktree(&self, path: &Path, force: bool) -> anyhow::Result<()> {
        self.remove_worktree_at(path, force)
    }

    fn prune_worktrees(&self) -> anyhow::Result<()> {
        self.run_command(&["worktree", "prune"])?;
        Ok(())
    }

    fn delete_branch(&self, branch: &str, force: bool) -> anyhow::Result<()> {
        let flag = if force { "-D" } else { "-d" };
        self.run_command(&["branch", flag, branch])?;
        Ok(())
    }

    fn fast_forward(&self, worktree: &Path, remote: &str, branch: &str) -> anyhow::Result<()> {
        self.run_command_in(worktree, &["fetch", remote, branch])?;
        self.run_command_in(worktree, &["merge", "--ff-only", &format!("{remote}/{branch}")])?;
        Ok(())
    }

    fn merge_no_ff(
        &self,
        worktree: &Path,
        branch: &str,
        message: &str,
    ) -> anyhow::Result<MergeOutcome> {
        let output = self.git_output(worktree, &["merge", "--no-ff", branch, "-m", message])?;
        if output.status.success() {
            return Ok(MergeOutcome::Merged);
        }

        let unmerged =
            self.run_command_in(worktree, &["diff", "--name-only", "--diff-filter=U"])?;
        let files = parse_name_list(&unmerged);
        if files.is_empty() {
            // Git refused to start (unknown ref, dirty tree in the way, ...)
            bail!("{}", shell_exec::failure_text(&output));
        }
        Ok(MergeOutcome::Conflicted { files })
    }

    fn push(&self, worktree: &Path, remote: &str, branch: &str) -> anyhow::Result<()> {
        self.run_command_in(worktree, &["push", remote, branch])?;
        Ok(())
    }

    fn merged_branches(&self, target: &str) -> anyhow::Result<Vec<String>> {
        let stdout = self.run_command(&[
            "branch",
            "--merged",
            target,
            "--format=%(refname:lstrip=2)",
        ])?;
        Ok(parse_branch_list(&stdout))
    }

    fn commits_ahead(&self, base: &str, head: &str) -> anyhow::Result<usize> {
        let stdout = self.run_command(&["rev-list", "--count", &format!("{base}..{head}")])?;
        stdout
            .trim()
            .parse()
            .context("Failed to parse commit count")
    }

    fn is_dirty(&self, worktree: &Path) -> anyhow::Result<bool> {
        let stdout = self.run_command_in(worktree, &["status", "--porcelain"])?;
        Ok(!stdout.trim().is_empty())
    }

    fn commit_all(&self, worktree: &Path, message: &str) -> anyhow::Result<()> {
        self.run_command_in(worktree, &["add", "-A"])?;
        self.run_command_in(worktree, &["commit", "-m", message])?;
        Ok(())
    }

    fn run_in(&self, worktree: &Path, command: &str) -> anyhow::Result<bool> {
        let mut cmd = ShellConfig::get().command(command);
        cmd.current_dir(worktree);
        let status = shell_exec::run_interactive(&mut cmd, Some(&Self::logging_context(worktree)))
            .with_context(|| format!("Failed to execute: {command}"))?;
        Ok(status.success())
    }

    fn config_get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let output = self.git_output(&self.path, &["config", "--get", key])?;
        match output.status.code() {
            Some(0) => Ok(Some(
                String::from_utf8_lossy(&output.stdout).trim().to_string(),
            )),
            // Exit 1: key not set
            Some(1) => Ok(None),
            _ => bail!("{}", shell_exec::failure_text(&output)),
        }
    }

    fn config_set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.run_command(&["config", key, value])?;
        Ok(())
    }

    fn config_unset(&self, key: &str) -> anyhow::Result<()> {
        let output = self.git_output(&self.path, &["config", "--unset-all", key])?;
        match output.status.code() {
            // Exit 5: key not set
            Some(0 | 5) => Ok(()),
            _ => bail!("{}", shell_exec::failure_text(&output)),
        }
    }
}
