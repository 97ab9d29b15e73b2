//! MCP server processes
//!
//! Servers are configured shell commands started as detached background
//! processes. A started server leaves a PID record under `.mcp/pids/` and
//! appends its output to `.mcp/logs/<name>.log`; `.mcp/sockets/` is created
//! alongside for servers that talk over a socket.
//!
//! The PID record is the only state. Starting the same server from two
//! terminals at once can launch it twice.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::Context;
use indexmap::IndexMap;

use crate::config::McpServer;
use crate::error::StackError;
use crate::path::format_path_for_display;
use crate::shell_exec::ShellConfig;

const PIDS_DIR: &str = "pids";
const LOGS_DIR: &str = "logs";
const SOCKETS_DIR: &str = "sockets";

/// Storage for the PID of each started server
pub trait PidStore {
    fn read(&self, name: &str) -> anyhow::Result<Option<u32>>;

    fn write(&self, name: &str, pid: u32) -> anyhow::Result<()>;

    /// Removing a missing record is not an error.
    fn remove(&self, name: &str) -> anyhow::Result<()>;

    /// Names with a record, sorted.
    fn recorded(&self) -> anyhow::Result<Vec<String>>;
}

/// PID records as `<mcp-dir>/pids/<name>.pid`
pub struct FsPidStore {
    mcp_dir: PathBuf,
}

impl FsPidStore {
    pub fn new(mcp_dir: impl Into<PathBuf>) -> Self {
        Self {
            mcp_dir: mcp_dir.into(),
        }
    }

    /// Create `pids/`, `logs/` and `sockets/`.
    pub fn ensure_layout(&self) -> anyhow::Result<()> {
        for sub in [PIDS_DIR, LOGS_DIR, SOCKETS_DIR] {
            let dir = self.mcp_dir.join(sub);
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", format_path_for_display(&dir)))?;
        }
        Ok(())
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.mcp_dir.join(LOGS_DIR)
    }

    pub fn log_path(&self, name: &str) -> PathBuf {
        self.logs_dir().join(format!("{name}.log"))
    }

    fn pid_path(&self, name: &str) -> PathBuf {
        self.mcp_dir.join(PIDS_DIR).join(format!("{name}.pid"))
    }
}

impl PidStore for FsPidStore {
    fn read(&self, name: &str) -> anyhow::Result<Option<u32>> {
        let path = self.pid_path(name);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read {}", format_path_for_display(&path)));
            }
        };
        match contents.trim().parse() {
            Ok(pid) => Ok(Some(pid)),
            Err(_) => {
                log::debug!("Ignoring malformed PID record {}", path.display());
                Ok(None)
            }
        }
    }

    fn write(&self, name: &str, pid: u32) -> anyhow::Result<()> {
        let path = self.pid_path(name);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, format!("{pid}\n"))
            .with_context(|| format!("Failed to write {}", format_path_for_display(&path)))
    }

    fn remove(&self, name: &str) -> anyhow::Result<()> {
        let path = self.pid_path(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove {}", format_path_for_display(&path))),
        }
    }

    fn recorded(&self) -> anyhow::Result<Vec<String>> {
        let dir = self.mcp_dir.join(PIDS_DIR);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read {}", format_path_for_display(&dir)));
            }
        };
        let mut names = Vec::new();
        for entry in entries {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if let Some(stem) = name.strip_suffix(".pid") {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Starting, probing and stopping server processes
pub trait ProcessControl {
    /// Start `command` detached with output appended to `log`; returns its PID.
    fn spawn(&self, command: &str, log: &Path) -> anyhow::Result<u32>;

    fn is_alive(&self, pid: u32) -> bool;

    fn terminate(&self, pid: u32) -> anyhow::Result<()>;
}

/// Real processes: `sh -c "exec <command>"` in its own process group,
/// probed with signal 0 and stopped with SIGTERM.
pub struct SystemProcesses;

impl ProcessControl for SystemProcesses {
    fn spawn(&self, command: &str, log: &Path) -> anyhow::Result<u32> {
        if let Some(dir) = log.parent() {
            fs::create_dir_all(dir)?;
        }
        let log_file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log)
            .with_context(|| format!("Failed to open {}", format_path_for_display(log)))?;

        // exec so the recorded PID is the server itself, not the shell
        let mut cmd = ShellConfig::get().command(&format!("exec {command}"));
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(
                log_file
                    .try_clone()
                    .context("Failed to clone log file handle")?,
            ))
            .stderr(Stdio::from(log_file));
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Out of the terminal's foreground group, so closing it doesn't SIGHUP the server
            cmd.process_group(0);
        }

        log::debug!("$ {command} [mcp, background]");
        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to start {command}"))?;
        Ok(child.id())
    }

    #[cfg(unix)]
    fn is_alive(&self, pid: u32) -> bool {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        // EPERM: the process exists but belongs to someone else
        matches!(kill(Pid::from_raw(raw), None), Ok(()) | Err(Errno::EPERM))
    }

    #[cfg(not(unix))]
    fn is_alive(&self, _pid: u32) -> bool {
        false
    }

    #[cfg(unix)]
    fn terminate(&self, pid: u32) -> anyhow::Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        let raw = i32::try_from(pid).context("PID out of range")?;
        match kill(Pid::from_raw(raw), Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to stop process {pid}")),
        }
    }

    #[cfg(not(unix))]
    fn terminate(&self, pid: u32) -> anyhow::Result<()> {
        anyhow::bail!("Stopping process {pid} is only supported on Unix")
    }
}

/// State of one server
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum McpStatus {
    Running { pid: u32 },
    /// A record exists but its process has exited
    Stopped,
    NotStarted,
    /// Recorded but no longer in the configuration
    NotConfigured,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started { pid: u32 },
    AlreadyRunning { pid: u32 },
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped { pid: u32 },
    /// Its record pointed at an exited process and was removed
    StaleRecord,
    NotRunning,
}

pub struct McpManager<'a> {
    servers: &'a IndexMap<String, McpServer>,
    store: &'a dyn PidStore,
    processes: &'a dyn ProcessControl,
    logs_dir: PathBuf,
}

impl<'a> McpManager<'a> {
    pub fn new(
        servers: &'a IndexMap<String, McpServer>,
        store: &'a dyn PidStore,
        processes: &'a dyn ProcessControl,
        logs_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            servers,
            store,
            processes,
            logs_dir: logs_dir.into(),
        }
    }

    /// The named servers (all configured ones when `names` is empty).
    fn select(&self, names: &[String]) -> anyhow::Result<Vec<(&'a str, &'a McpServer)>> {
        if names.is_empty() {
            return Ok(self
                .servers
                .iter()
                .map(|(name, server)| (name.as_str(), server))
                .collect());
        }
        names
            .iter()
            .map(|name| {
                self.servers
                    .get_key_value(name.as_str())
                    .map(|(name, server)| (name.as_str(), server))
                    .ok_or_else(|| {
                        StackError::UnknownMcpServer {
                            name: name.clone(),
                            available: self.servers.keys().cloned().collect(),
                        }
                        .into()
                    })
            })
            .collect()
    }

    /// Start servers that are not already running. A stale record is
    /// replaced.
    pub fn start(&self, names: &[String]) -> anyhow::Result<Vec<(String, StartOutcome)>> {
        let mut results = Vec::new();
        for (name, server) in self.select(names)? {
            if let Some(pid) = self.store.read(name)? {
                if self.processes.is_alive(pid) {
                    results.push((name.to_string(), StartOutcome::AlreadyRunning { pid }));
                    continue;
                }
                self.store.remove(name)?;
            }

            let log = self.logs_dir.join(format!("{name}.log"));
            let outcome = match self.processes.spawn(&server.command, &log) {
                Ok(pid) => {
                    self.store.write(name, pid)?;
                    StartOutcome::Started { pid }
                }
                Err(e) => StartOutcome::Failed(format!("{e:#}")),
            };
            results.push((name.to_string(), outcome));
        }
        Ok(results)
    }

    /// Stop running servers and remove their records.
    pub fn stop(&self, names: &[String]) -> anyhow::Result<Vec<(String, StopOutcome)>> {
        let mut results = Vec::new();
        for (name, _) in self.select(names)? {
            let outcome = match self.store.read(name)? {
                Some(pid) if self.processes.is_alive(pid) => {
                    self.processes.terminate(pid)?;
                    StopOutcome::Stopped { pid }
                }
                Some(_) => StopOutcome::StaleRecord,
                None => StopOutcome::NotRunning,
            };
            self.store.remove(name)?;
            results.push((name.to_string(), outcome));
        }
        Ok(results)
    }

    /// Every configured server, then any recorded server that is no longer
    /// configured.
    pub fn status(&self) -> anyhow::Result<Vec<(String, McpStatus)>> {
        let mut results = Vec::new();
        for name in self.servers.keys() {
            let status = match self.store.read(name)? {
                Some(pid) if self.processes.is_alive(pid) => McpStatus::Running { pid },
                Some(_) => McpStatus::Stopped,
                None => McpStatus::NotStarted,
            };
            results.push((name.clone(), status));
        }
        for name in self.store.recorded()? {
            if !self.servers.contains_key(&name) {
                results.push((name, McpStatus::NotConfigured));
            }
        }
        Ok(results)
    }

    pub fn description(&self, name: &str) -> Option<&'a str> {
        self.servers.get(name)?.description.as_deref()
    }
}
