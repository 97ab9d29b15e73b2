use color_print::cformat;
use stacktrunk::error::StackError;
use stacktrunk::git::VersionControl;
use stacktrunk::mcp::{FsPidStore, McpManager, McpStatus, StartOutcome, StopOutcome, SystemProcesses};
use stacktrunk::path::format_relative;
use stacktrunk::styling::{
    eprintln, error_message, hint_message, info_message, println, success_message,
};
use stacktrunk::worktree::MCP_DIR;

use super::Session;
use crate::cli::McpCommand;

pub(crate) fn handle_mcp(session: &Session, command: McpCommand) -> anyhow::Result<()> {
    let root = session.repo.repo_root()?;
    let store = FsPidStore::new(root.join(MCP_DIR));
    let manager = McpManager::new(
        &session.settings.mcp.servers,
        &store,
        &SystemProcesses,
        store.logs_dir(),
    );

    match command {
        McpCommand::Start { names } => {
            store.ensure_layout()?;
            let mut failed = false;
            for (name, outcome) in manager.start(&names)? {
                match outcome {
                    StartOutcome::Started { pid } => eprintln!(
                        "{}",
                        success_message(cformat!("Started <bold>{name}</> (pid {pid})"))
                    ),
                    StartOutcome::AlreadyRunning { pid } => eprintln!(
                        "{}",
                        info_message(cformat!("<bold>{name}</> is already running (pid {pid})"))
                    ),
                    StartOutcome::Failed(error) => {
                        failed = true;
                        eprintln!(
                            "{}",
                            error_message(cformat!("Failed to start <bold>{name}</>: {error}"))
                        );
                        eprintln!(
                            "{}",
                            hint_message(cformat!(
                                "Output goes to <bright-black>{}</>",
                                format_relative(&store.log_path(&name), &root)
                            ))
                        );
                    }
                }
            }
            if failed {
                return Err(StackError::AlreadyDisplayed { exit_code: 1 }.into());
            }
        }
        McpCommand::Stop { names } => {
            for (name, outcome) in manager.stop(&names)? {
                let message = match outcome {
                    StopOutcome::Stopped { pid } => {
                        success_message(cformat!("Stopped <bold>{name}</> (pid {pid})"))
                    }
                    StopOutcome::StaleRecord => info_message(cformat!(
                        "<bold>{name}</> had already exited; record removed"
                    )),
                    StopOutcome::NotRunning => {
                        info_message(cformat!("<bold>{name}</> is not running"))
                    }
                };
                eprintln!("{message}");
            }
        }
        McpCommand::Status => {
            let statuses = manager.status()?;
            let width = statuses
                .iter()
                .map(|(name, _)| name.chars().count())
                .max()
                .unwrap_or(0);
            for (name, status) in statuses {
                let state = match status {
                    McpStatus::Running { pid } => cformat!("<green>running</> <dim>pid {pid}</>"),
                    McpStatus::Stopped => cformat!("<yellow>stopped</>"),
                    McpStatus::NotStarted => cformat!("<dim>not started</>"),
                    McpStatus::NotConfigured => cformat!("<yellow>not configured</>"),
                };
                let description = manager
                    .description(&name)
                    .map(|d| cformat!("  <dim>{d}</>"))
                    .unwrap_or_default();
                let name = format!("{name:width$}");
                println!("{}", cformat!("<bold>{name}</>  {state}{description}"));
            }
        }
    }
    Ok(())
}
