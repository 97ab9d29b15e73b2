//! Worktree and stack commands: new, list, cd, clean, stack, lifecycle

use color_print::cformat;
use stacktrunk::context::{ContextStore, ContextSummary, EnsureOutcome};
use stacktrunk::error::StackError;
use stacktrunk::git::VersionControl;
use stacktrunk::multiplexer;
use stacktrunk::path::format_relative;
use stacktrunk::prompt::{Confirm, TerminalConfirm};
use stacktrunk::stack::{BranchStacker, GitTown, Lifecycle, require_git_town};
use stacktrunk::styling::{
    eprintln, hint_message, info_message, println, success_message,
    suggest_command, warning_message,
};

use super::Session;

pub(crate) fn handle_new(session: &Session, branch: &str, parent: Option<&str>) -> anyhow::Result<()> {
    let created = session.with_allocator(|_, allocator| allocator.create(branch, parent))?;
    let root = session.repo.repo_root()?;
    let rel = format_relative(&created.path, &root);

    eprintln!(
        "{}",
        success_message(cformat!(
            "Created <bold>{}</> @ <bold>{rel}</> from <bold>{}</>",
            created.branch,
            created.base
        ))
    );
    if !created.copied.is_empty() {
        eprintln!(
            "{}",
            info_message(format!("Copied {}", created.copied.join(", ")))
        );
    }
    if created.context == EnsureOutcome::Existing {
        eprintln!("{}", info_message("Kept the existing context record"));
    }

    if session.settings.tabs
        && let Some(mux) = multiplexer::detect(|var| std::env::var(var).ok())
    {
        match mux.open_tab(&created.branch, &created.path) {
            Ok(()) => eprintln!(
                "{}",
                info_message(cformat!("Opened a {} tab for <bold>{}</>", mux.name(), created.branch))
            ),
            Err(e) => eprintln!(
                "{}",
                warning_message(format!("Could not open a {} tab: {e:#}", mux.name()))
            ),
        }
    }

    // Path on stdout for `cd "$(st new ...)"`
    println!("{}", created.path.display());
    Ok(())
}

fn context_marker(summary: Option<&ContextSummary>) -> String {
    match summary {
        Some(ContextSummary {
            issue: Some(issue), ..
        }) => cformat!("<cyan>issue #{issue}</>"),
        Some(summary) if !summary.task_files.is_empty() => {
            cformat!("<cyan>{} task files</>", summary.task_files.len())
        }
        Some(_) => cformat!("<dim>context</>"),
        None => String::new(),
    }
}

pub(crate) fn handle_list(session: &Session) -> anyhow::Result<()> {
    let worktrees = session.repo.list_worktrees()?;
    let root = session.repo.repo_root()?;
    let here = session.repo.worktree_root()?;

    let names: Vec<String> = worktrees
        .iter()
        .map(|wt| wt.branch.clone().unwrap_or_else(|| "(detached)".into()))
        .collect();
    let width = names.iter().map(|n| n.chars().count()).max().unwrap_or(0);

    for (wt, name) in worktrees.iter().zip(&names) {
        let current = if wt.path == here {
            cformat!("<cyan>@</>")
        } else {
            " ".to_string()
        };
        let summary = ContextStore::read(&wt.path)?;
        let marker = context_marker(summary.as_ref());
        let name = format!("{name:width$}");
        let line = cformat!(
            "{current} <bold>{name}</>  <dim>{}</>  {marker}",
            format_relative(&wt.path, &root)
        );
        println!("{}", line.trim_end());
    }
    Ok(())
}

pub(crate) fn handle_cd(session: &Session, branch: &str) -> anyhow::Result<()> {
    let wt = session.with_allocator(|tracker, _| tracker.find_worktree_for_branch(branch))?;
    match wt {
        Some(wt) => {
            println!("{}", wt.path.display());
            Ok(())
        }
        None => Err(StackError::WorktreeNotFound {
            branch: branch.to_string(),
        }
        .into()),
    }
}

pub(crate) fn handle_clean(session: &Session, branch: Option<String>, yes: bool) -> anyhow::Result<()> {
    let branch = session.branch_or_current(branch, "clean")?;
    let root = session.repo.repo_root()?;

    let removed = session.with_allocator(|tracker, allocator| {
        if tracker.is_perennial(&branch)? {
            return Err(StackError::Other {
                message: format!("{branch} is a perennial branch and is never cleaned"),
            }
            .into());
        }
        if let Some(wt) = tracker.find_worktree_for_branch(&branch)?
            && session.repo.worktree_root()?.starts_with(&wt.path)
        {
            return Err(StackError::InsideTargetWorktree {
                branch: branch.clone(),
                path: wt.path,
            }
            .into());
        }

        if !yes {
            let question = cformat!(
                "Remove <bold>{branch}</> and its worktree? Uncommitted work there is lost"
            );
            if !TerminalConfirm.confirm(&question)? {
                return Err(StackError::Declined {
                    action: "Clean".into(),
                    exit_code: 1,
                }
                .into());
            }
        }
        allocator.remove(&branch, true)
    })?;

    let location = match &removed.path {
        Some(path) => cformat!(" @ <bold>{}</>", format_relative(path, &root)),
        None => String::new(),
    };
    eprintln!(
        "{}",
        success_message(cformat!("Removed <bold>{branch}</>{location}"))
    );
    if !removed.reparented.is_empty() {
        eprintln!(
            "{}",
            info_message(cformat!(
                "Re-stacked on <bold>{}</>: {}",
                removed.new_parent,
                removed.reparented.join(", ")
            ))
        );
    }
    Ok(())
}

pub(crate) fn handle_stack(session: &Session) -> anyhow::Result<()> {
    let tree = session.with_allocator(|tracker, _| tracker.render_tree())?;
    println!("{tree}");
    Ok(())
}

pub(crate) fn handle_stack_status(session: &Session) -> anyhow::Result<()> {
    let town = GitTown::new(&session.repo);
    let (tree, rows) = session.with_allocator(|tracker, _| {
        let worktrees = session.repo.list_worktrees()?;
        let mut rows = Vec::new();
        for wt in &worktrees {
            let Some(branch) = wt.branch.as_deref() else {
                continue;
            };
            if tracker.is_perennial(branch)? {
                continue;
            }
            let parent = tracker.resolve_parent(branch, &worktrees)?;
            let ahead = session.repo.commits_ahead(&parent, branch)?;
            let dirty = session.repo.is_dirty(&wt.path)?;
            let lifecycle = town.lifecycle(branch)?;
            rows.push((branch.to_string(), parent, ahead, dirty, lifecycle));
        }
        Ok((tracker.render_tree()?, rows))
    })?;

    println!("{tree}");
    if rows.is_empty() {
        return Ok(());
    }
    println!();
    let width = rows.iter().map(|r| r.0.chars().count()).max().unwrap_or(0);
    for (branch, parent, ahead, dirty, lifecycle) in rows {
        let changes = if dirty {
            cformat!("<yellow>uncommitted changes</>")
        } else {
            cformat!("<dim>clean</>")
        };
        let lifecycle = match lifecycle {
            Lifecycle::Active => String::new(),
            other => cformat!("  <dim>[{other}]</>"),
        };
        let branch = format!("{branch:width$}");
        println!(
            "{}",
            cformat!("<bold>{branch}</>  ↑{ahead} vs {parent}  {changes}{lifecycle}")
        );
    }
    Ok(())
}

pub(crate) fn handle_lifecycle(
    session: &Session,
    branch: Option<String>,
    lifecycle: Lifecycle,
) -> anyhow::Result<()> {
    require_git_town()?;
    let branch = session.branch_or_current(branch, &format!("mark a branch {lifecycle}"))?;
    let town = GitTown::new(&session.repo);

    let worktree = session.with_allocator(|tracker, _| {
        if tracker.is_perennial(&branch)? {
            return Err(StackError::Other {
                message: format!("{branch} is a perennial branch; its lifecycle is fixed"),
            }
            .into());
        }
        match tracker.find_worktree_for_branch(&branch)? {
            Some(wt) => Ok(wt.path),
            None => session.repo.repo_root(),
        }
    })?;

    town.set_lifecycle(&worktree, &branch, lifecycle)?;
    eprintln!(
        "{}",
        success_message(cformat!("<bold>{branch}</> is now {lifecycle}"))
    );
    if lifecycle == Lifecycle::Parked {
        let sync = suggest_command("sync-all", &[], &[]);
        eprintln!(
            "{}",
            hint_message(cformat!("<bright-black>{sync}</> skips it until it is unparked"))
        );
    }
    Ok(())
}
