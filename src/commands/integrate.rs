//! Integration commands: local merges, sync, ship, cleanup, stack tests

use color_print::cformat;
use stacktrunk::git::VersionControl;
use stacktrunk::integrate::MergeSummary;
use stacktrunk::path::format_relative;
use stacktrunk::stack::require_git_town;
use stacktrunk::styling::{eprintln, hint_message, info_message, success_message, suggest_command};

use super::{Session, finish_batch};

pub(crate) fn handle_sync_all(session: &Session) -> anyhow::Result<()> {
    require_git_town()?;
    let report = session.with_engine(|engine| engine.sync_all())?;
    finish_batch(report)
}

pub(crate) fn handle_local_merge(session: &Session, branch: Option<String>) -> anyhow::Result<()> {
    let branch = session.branch_or_current(branch, "local-merge")?;
    let summary = session.with_engine(|engine| engine.local_merge(&branch))?;
    print_merge(session, &summary)?;
    let ship = suggest_command("ship", &[&summary.branch], &[]);
    eprintln!(
        "{}",
        hint_message(cformat!("Nothing was pushed; to publish, run <bright-black>{ship}</>"))
    );
    Ok(())
}

pub(crate) fn handle_local_sync_all(session: &Session) -> anyhow::Result<()> {
    let report = session.with_engine(|engine| engine.local_sync_all())?;
    if report.is_empty() {
        eprintln!("{}", info_message("No stacked worktrees to merge"));
    }
    finish_batch(report)
}

pub(crate) fn handle_ship(session: &Session, branch: Option<String>) -> anyhow::Result<()> {
    require_git_town()?;
    let branch = session.branch_or_current(branch, "ship")?;
    let outcome = session.with_engine(|engine| engine.ship(&branch))?;
    let root = session.repo.repo_root()?;

    eprintln!(
        "{}",
        success_message(cformat!(
            "Shipped <bold>{}</> into <bold>{}</>",
            outcome.branch,
            outcome.parent
        ))
    );
    if let Some(path) = &outcome.cleaned {
        eprintln!(
            "{}",
            info_message(cformat!("Removed <bold>{}</>", format_relative(path, &root)))
        );
    }
    Ok(())
}

pub(crate) fn handle_ship_all(session: &Session) -> anyhow::Result<()> {
    require_git_town()?;
    let report = session.with_engine(|engine| engine.ship_all())?;
    finish_batch(report)
}

pub(crate) fn handle_merge_branch(session: &Session, branch: &str) -> anyhow::Result<()> {
    let summary = session.with_engine(|engine| engine.merge_branch(branch))?;
    print_merge(session, &summary)?;
    if let Some(removed) = &summary.removed
        && !removed.reparented.is_empty()
    {
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

pub(crate) fn handle_auto_clean(session: &Session) -> anyhow::Result<()> {
    let report = session.with_engine(|engine| engine.auto_clean())?;
    finish_batch(report)
}

pub(crate) fn handle_stack_test(session: &Session) -> anyhow::Result<()> {
    let report = session.with_engine(|engine| engine.stack_test())?;
    finish_batch(report)
}

fn print_merge(session: &Session, summary: &MergeSummary) -> anyhow::Result<()> {
    let root = session.repo.repo_root()?;
    let verb = if summary.removed.is_some() {
        "Merged and pushed"
    } else {
        "Merged"
    };
    eprintln!(
        "{}",
        success_message(cformat!(
            "{verb} <bold>{}</> into <bold>{}</> @ <bold>{}</>",
            summary.branch,
            summary.parent,
            format_relative(&summary.parent_path, &root)
        ))
    );
    if let Some(removed) = &summary.removed {
        let location = removed
            .path
            .as_deref()
            .map(|p| format_relative(p, &root))
            .unwrap_or_else(|| "no worktree".into());
        eprintln!(
            "{}",
            info_message(cformat!("Removed <bold>{}</> ({location})", removed.branch))
        );
    }
    Ok(())
}
