//! One-time repository setup

use color_print::cformat;
use stacktrunk::assistant::CommandAssistant;
use stacktrunk::branch::PERENNIAL_BRANCHES;
use stacktrunk::context::CONTEXT_DIR;
use stacktrunk::error::StackError;
use stacktrunk::git::VersionControl;
use stacktrunk::issue::GhCli;
use stacktrunk::mcp::FsPidStore;
use stacktrunk::stack::{BranchStacker, GitTown, require_git_town};
use stacktrunk::styling::{
    eprintln, hint_message, info_message, success_message, warning_message,
};
use stacktrunk::worktree::{MCP_DIR, add_exclude_entries};

use super::Session;

pub(crate) fn handle_gt_setup(session: &Session) -> anyhow::Result<()> {
    require_git_town()?;
    let trunk = session.with_allocator(|tracker, _| tracker.trunk())?;
    let mut perennials = Vec::new();
    for name in PERENNIAL_BRANCHES {
        if *name != trunk && session.repo.local_branch_exists(name)? {
            perennials.push(name.to_string());
        }
    }

    GitTown::new(&session.repo).configure(&trunk, &perennials)?;
    eprintln!(
        "{}",
        success_message(cformat!("Configured git-town with trunk <bold>{trunk}</>"))
    );
    if !perennials.is_empty() {
        eprintln!(
            "{}",
            info_message(format!("Perennial branches: {}", perennials.join(", ")))
        );
    }
    Ok(())
}

pub(crate) fn handle_dev_setup(session: &Session) -> anyhow::Result<()> {
    let mut missing = 0;
    let mut check = |tool: &str, result: anyhow::Result<()>| match result {
        Ok(()) => eprintln!("{}", success_message(cformat!("<bold>{tool}</> found"))),
        Err(e) => {
            missing += 1;
            eprintln!("{e}");
        }
    };
    let git: anyhow::Result<()> = match which::which("git") {
        Ok(_) => Ok(()),
        Err(_) => Err(StackError::PrerequisiteMissing {
            tool: "git".into(),
            install_hint: "Install git 2.38 or newer".into(),
        }
        .into()),
    };
    check("git", git);
    check("git-town", require_git_town());
    check("gh", GhCli::require());
    check(
        &session.settings.assistant.command,
        CommandAssistant::new(&session.settings.assistant).require(),
    );

    let multiplexers: Vec<&str> = ["tmux", "zellij"]
        .into_iter()
        .filter(|tool| which::which(tool).is_ok())
        .collect();
    if multiplexers.is_empty() {
        eprintln!(
            "{}",
            info_message("Neither tmux nor zellij found; st new will not open tabs")
        );
    } else {
        eprintln!(
            "{}",
            success_message(format!("Multiplexer: {}", multiplexers.join(", ")))
        );
    }

    let root = session.repo.repo_root()?;
    let exclude = session.repo.git_common_dir()?.join("info").join("exclude");
    add_exclude_entries(
        &exclude,
        &[
            format!("{}/", session.settings.worktrees_dir.trim_end_matches('/')),
            format!("{CONTEXT_DIR}/"),
            format!("{MCP_DIR}/"),
        ],
    )?;
    FsPidStore::new(root.join(MCP_DIR)).ensure_layout()?;
    eprintln!(
        "{}",
        success_message(cformat!(
            "Prepared <bold>{MCP_DIR}/</> and ignore entries for worktrees and context records"
        ))
    );

    if missing > 0 {
        eprintln!(
            "{}",
            warning_message(format!("{missing} required tools missing"))
        );
        eprintln!("{}", hint_message("Install them, then run st dev-setup again"));
        return Err(StackError::AlreadyDisplayed { exit_code: 1 }.into());
    }
    Ok(())
}
