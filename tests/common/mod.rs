// Not every test file uses every helper.
#![allow(dead_code)]

//! # Test utilities for stacktrunk
//!
//! `TestRepo` creates an isolated git repository in a temporary directory
//! with deterministic timestamps and its own git config, then drives the real
//! `st` binary against it.
//!
//! ## Environment isolation
//!
//! Host `GIT_*` and `STACKTRUNK_*` variables are cleared for every command,
//! `HOME` points into the temp dir, and colors are off so assertions can
//! match plain text.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use rstest::fixture;
use tempfile::TempDir;

/// The epoch used for deterministic timestamps in tests (2025-01-01T00:00:00Z).
pub const TEST_EPOCH: u64 = 1735689600;

#[cfg(windows)]
const NULL_DEVICE: &str = "NUL";
#[cfg(not(windows))]
const NULL_DEVICE: &str = "/dev/null";

/// Canonicalize a path without the Windows verbatim prefix.
pub fn canonicalize(path: &Path) -> std::io::Result<PathBuf> {
    dunce::canonicalize(path)
}

/// Configure a git command with an isolated environment.
pub fn configure_git_cmd(cmd: &mut Command, git_config_path: &Path) {
    cmd.env("GIT_CONFIG_GLOBAL", git_config_path);
    cmd.env("GIT_CONFIG_SYSTEM", NULL_DEVICE);
    cmd.env("GIT_AUTHOR_DATE", "2025-01-01T00:00:00Z");
    cmd.env("GIT_COMMITTER_DATE", "2025-01-01T00:00:00Z");
    cmd.env("LC_ALL", "C");
    cmd.env("LANG", "C");
    cmd.env("SOURCE_DATE_EPOCH", TEST_EPOCH.to_string());
    cmd.env("GIT_TERMINAL_PROMPT", "0");
}

/// Configure an `st` command: no host state, no colors, no pager.
pub fn configure_cli_command(cmd: &mut Command) {
    for (key, _) in std::env::vars() {
        if key.starts_with("GIT_")
            || key.starts_with("STACKTRUNK_")
            || key == "TMUX"
            || key == "ZELLIJ"
            || key == "CLICOLOR_FORCE"
        {
            cmd.env_remove(&key);
        }
    }
    cmd.env("STACKTRUNK_CONFIG_PATH", "/nonexistent/test/config.toml");
    cmd.env("NO_COLOR", "1");
    cmd.env("COLUMNS", "150");
    cmd.env("RUST_LOG", "warn");
}

pub fn check_git_status(output: &Output, cmd_desc: &str) {
    if !output.status.success() {
        panic!(
            "git {} failed:\nstdout: {}\nstderr: {}",
            cmd_desc,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

pub struct TestRepo {
    temp_dir: TempDir, // Must keep to ensure cleanup on drop
    root: PathBuf,
    remote: Option<PathBuf>,
    test_config_path: PathBuf,
    git_config_path: PathBuf,
}

impl TestRepo {
    /// A repository on `main` with one commit.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("repo");
        std::fs::create_dir(&root).unwrap();
        let root = canonicalize(&root).unwrap();

        let test_config_path = temp_dir.path().join("test-config.toml");
        let git_config_path = temp_dir.path().join("test-gitconfig");
        std::fs::write(
            &git_config_path,
            "[user]\n\tname = Test User\n\temail = test@example.com\n\
             [advice]\n\tmergeConflict = false\n\tresolveConflict = false\n\
             \tdetachedHead = false\n\
             [init]\n\tdefaultBranch = main\n",
        )
        .unwrap();

        let repo = Self {
            temp_dir,
            root,
            remote: None,
            test_config_path,
            git_config_path,
        };
        repo.run_git(&["init", "-q"]);
        repo.commit_file(&repo.root, "README.md", "# repo\n", "Initial commit");
        repo
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    /// The temp dir holding the repository, its config files and the remote.
    pub fn home_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write the stacktrunk config file used by [`TestRepo::st_command`].
    pub fn write_config(&self, contents: &str) {
        std::fs::write(&self.test_config_path, contents).unwrap();
    }

    /// Add a bare `origin` and push `main` to it.
    pub fn with_remote(mut self) -> Self {
        let remote = self.home_path().join("origin.git");
        let output = self
            .git_command()
            .args(["init", "-q", "--bare"])
            .arg(&remote)
            .output()
            .unwrap();
        check_git_status(&output, "init --bare");
        let remote = canonicalize(&remote).unwrap();
        self.run_git(&["remote", "add", "origin", remote.to_str().unwrap()]);
        self.run_git(&["push", "-q", "-u", "origin", "main"]);
        self.remote = Some(remote);
        self
    }

    pub fn remote_path(&self) -> &Path {
        self.remote.as_deref().expect("repository has no remote")
    }

    #[must_use]
    pub fn git_command(&self) -> Command {
        let mut cmd = Command::new("git");
        configure_git_cmd(&mut cmd, &self.git_config_path);
        cmd.current_dir(&self.root);
        cmd
    }

    pub fn run_git(&self, args: &[&str]) {
        let output = self.git_command().args(args).output().unwrap();
        check_git_status(&output, &args.join(" "));
    }

    pub fn run_git_in(&self, dir: &Path, args: &[&str]) {
        let output = self
            .git_command()
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap();
        check_git_status(&output, &args.join(" "));
    }

    /// Stdout of a git command, trimmed.
    pub fn git_output(&self, args: &[&str]) -> String {
        self.git_output_in(&self.root, args)
    }

    pub fn git_output_in(&self, dir: &Path, args: &[&str]) -> String {
        let output = self
            .git_command()
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap();
        check_git_status(&output, &args.join(" "));
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    /// `git config --get`, `None` when unset.
    pub fn config(&self, key: &str) -> Option<String> {
        let output = self
            .git_command()
            .args(["config", "--get", key])
            .output()
            .unwrap();
        output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub fn branch_exists(&self, branch: &str) -> bool {
        self.git_command()
            .args(["rev-parse", "--verify", "--quiet", &format!("refs/heads/{branch}")])
            .output()
            .unwrap()
            .status
            .success()
    }

    /// Write `name` in `dir` and commit it there.
    pub fn commit_file(&self, dir: &Path, name: &str, contents: &str, message: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
        self.run_git_in(dir, &["add", name]);
        self.run_git_in(dir, &["commit", "-q", "-m", message]);
    }

    pub fn worktree_path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// An `st` command running in the repository root.
    #[must_use]
    pub fn st_command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_st"));
        configure_cli_command(&mut cmd);
        configure_git_cmd(&mut cmd, &self.git_config_path);
        cmd.env("STACKTRUNK_CONFIG_PATH", &self.test_config_path);
        cmd.env("HOME", self.home_path());
        cmd.env("XDG_CONFIG_HOME", self.home_path().join(".config"));
        cmd.current_dir(&self.root);
        cmd.stdin(Stdio::null());
        cmd
    }

    /// Run `st args...` in `dir`.
    pub fn st_in(&self, dir: &Path, args: &[&str]) -> StOutput {
        let output = self.st_command().args(args).current_dir(dir).output().unwrap();
        StOutput::from(output)
    }

    /// Run `st args...` in the repository root.
    pub fn st(&self, args: &[&str]) -> StOutput {
        self.st_in(&self.root.clone(), args)
    }

    /// Run `st args...` in the root, answering prompts with `input`.
    pub fn st_with_input(&self, args: &[&str], input: &str) -> StOutput {
        let mut child = self
            .st_command()
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        child
            .stdin
            .take()
            .unwrap()
            .write_all(input.as_bytes())
            .unwrap();
        StOutput::from(child.wait_with_output().unwrap())
    }

    /// Run `st new args...` and assert it succeeded.
    pub fn st_new(&self, args: &[&str]) -> PathBuf {
        self.st_new_in(&self.root.clone(), args)
    }

    pub fn st_new_in(&self, dir: &Path, args: &[&str]) -> PathBuf {
        let mut full = vec!["new"];
        full.extend_from_slice(args);
        let out = self.st_in(dir, &full);
        out.assert_success();
        PathBuf::from(out.stdout.trim())
    }

    /// Local branch names with their configured parent.
    pub fn parents(&self) -> HashMap<String, Option<String>> {
        self.git_output(&["branch", "--format=%(refname:lstrip=2)"])
            .lines()
            .map(|b| (b.to_string(), self.config(&format!("branch.{b}.parent"))))
            .collect()
    }
}

/// Captured output of an `st` run
#[derive(Debug)]
pub struct StOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl From<Output> for StOutput {
    fn from(output: Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

impl StOutput {
    pub fn assert_success(&self) {
        assert_eq!(
            self.code,
            Some(0),
            "st failed:\nstdout: {}\nstderr: {}",
            self.stdout,
            self.stderr
        );
    }

    pub fn assert_exit(&self, code: i32) {
        assert_eq!(
            self.code,
            Some(code),
            "unexpected exit code:\nstdout: {}\nstderr: {}",
            self.stdout,
            self.stderr
        );
    }
}

#[fixture]
pub fn repo() -> TestRepo {
    TestRepo::new()
}

/// `main` pushed to a bare `origin`.
#[fixture]
pub fn repo_with_remote(repo: TestRepo) -> TestRepo {
    repo.with_remote()
}

/// `feat/x` on main at `worktrees/feat/x`, `feat/y` on `feat/x` nested inside it.
#[fixture]
pub fn stacked_repo(repo: TestRepo) -> TestRepo {
    repo.st_new(&["feat/x"]);
    repo.st_new(&["feat/y", "feat/x"]);
    repo
}
