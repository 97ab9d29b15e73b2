//! External command execution
//!
//! Every process stacktrunk starts (git, git-town, gh, the assistant, test
//! commands) goes through this module so that invocations are logged the
//! same way:
//!
//! ```text
//! $ git worktree list --porcelain [feat/x]
//! [st-trace] context=feat/x cmd="git worktree list --porcelain" dur=4.1ms ok=true
//! ```
//!
//! Shell strings from config (`test-command`, MCP server commands) are run
//! through [`ShellConfig`], which is `sh -c` on Unix.

use std::path::PathBuf;
use std::process::{Command, ExitStatus, Output};
use std::sync::OnceLock;
use std::time::Instant;

static SHELL_CONFIG: OnceLock<ShellConfig> = OnceLock::new();

/// Shell used to interpret command strings from configuration
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Path to the shell executable
    pub executable: PathBuf,
    /// Arguments passed before the command string
    pub args: Vec<String>,
    /// Human-readable name for error messages
    pub name: String,
}

impl ShellConfig {
    pub fn get() -> &'static ShellConfig {
        SHELL_CONFIG.get_or_init(detect_shell)
    }

    /// Create a Command that hands `shell_command` to the shell for interpretation.
    pub fn command(&self, shell_command: &str) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.args(&self.args);
        cmd.arg(shell_command);
        cmd
    }
}

fn detect_shell() -> ShellConfig {
    #[cfg(unix)]
    {
        ShellConfig {
            executable: PathBuf::from("sh"),
            args: vec!["-c".to_string()],
            name: "sh".to_string(),
        }
    }

    #[cfg(windows)]
    {
        ShellConfig {
            executable: PathBuf::from("cmd.exe"),
            args: vec!["/C".to_string()],
            name: "cmd".to_string(),
        }
    }
}

fn describe(cmd: &Command) -> String {
    let program = cmd.get_program().to_string_lossy();
    let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy()).collect();
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

fn trace(cmd_str: &str, context: Option<&str>, started: Instant, outcome: Result<bool, &std::io::Error>) {
    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
    let context = context.map(|c| format!("context={c} ")).unwrap_or_default();
    match outcome {
        Ok(ok) => log::debug!("[st-trace] {context}cmd=\"{cmd_str}\" dur={duration_ms:.1}ms ok={ok}"),
        Err(e) => log::debug!("[st-trace] {context}cmd=\"{cmd_str}\" dur={duration_ms:.1}ms err=\"{e}\""),
    }
}

/// Execute a command, capturing its output, with timing and debug logging.
///
/// The `context` parameter is typically the branch whose worktree the command
/// runs in, or `None` for repository-wide and standalone commands.
pub fn run(cmd: &mut Command, context: Option<&str>) -> std::io::Result<Output> {
    let cmd_str = describe(cmd);
    match context {
        Some(ctx) => log::debug!("$ {} [{}]", cmd_str, ctx),
        None => log::debug!("$ {}", cmd_str),
    }

    let t0 = Instant::now();
    let result = cmd.output();
    trace(
        &cmd_str,
        context,
        t0,
        result.as_ref().map(|o| o.status.success()),
    );
    result
}

/// Execute a command attached to the terminal (stdin/stdout/stderr inherited).
///
/// Used for interactive tools like the assistant and for test commands whose
/// output the user should see as it happens.
pub fn run_interactive(cmd: &mut Command, context: Option<&str>) -> std::io::Result<ExitStatus> {
    let cmd_str = describe(cmd);
    match context {
        Some(ctx) => log::debug!("$ {} [{}] (interactive)", cmd_str, ctx),
        None => log::debug!("$ {} (interactive)", cmd_str),
    }

    let t0 = Instant::now();
    let result = cmd.status();
    trace(&cmd_str, context, t0, result.as_ref().map(|s| s.success()));
    result
}

/// Combine stderr and stdout of a failed command into one message.
///
/// Some tools (git among them) print errors to stdout, so both are kept.
pub fn failure_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).replace('\r', "\n");
    let stdout = String::from_utf8_lossy(&output.stdout);
    [stderr.trim(), stdout.trim()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
