//! Assistant hand-off: start work on an issue, resume in a worktree, open PRs

use std::path::PathBuf;

use color_print::cformat;
use stacktrunk::assistant::{Assistant, CommandAssistant, task_prompt};
use stacktrunk::branch::branch_for_issue;
use stacktrunk::context::ContextStore;
use stacktrunk::error::StackError;
use stacktrunk::git::VersionControl;
use stacktrunk::issue::{GhCli, Issue, IssueTracker, PullRequest};
use stacktrunk::path::format_relative;
use stacktrunk::secrets::{EnvOrCommand, resolve_all};
use stacktrunk::styling::{
    eprintln, format_with_gutter, info_message, println, progress_message, success_message,
    warning_message,
};

use super::Session;

/// A worktree prepared for an issue
struct IssueWorktree {
    issue: Issue,
    branch: String,
    base: String,
    path: PathBuf,
    task_file: String,
}

fn prepare_issue(session: &Session, number: u64) -> anyhow::Result<IssueWorktree> {
    eprintln!(
        "{}",
        progress_message(format!("Fetching issue #{number}..."))
    );
    let issue = GhCli.issue(number)?;
    let branch = branch_for_issue(number, &issue.title, &issue.label_names());
    let created = session.with_allocator(|_, allocator| allocator.create(&branch, None))?;

    let stem = format!("issue-{number}");
    ContextStore::record_task(&created.path, &stem, &issue.to_markdown())?;

    let root = session.repo.repo_root()?;
    eprintln!(
        "{}",
        success_message(cformat!(
            "Created <bold>{branch}</> @ <bold>{}</> for issue #{number}",
            format_relative(&created.path, &root)
        ))
    );
    Ok(IssueWorktree {
        issue,
        branch,
        base: created.base,
        path: created.path,
        task_file: format!("{stem}.md"),
    })
}

fn launch_assistant(
    session: &Session,
    assistant: &CommandAssistant<'_>,
    worktree: &std::path::Path,
    prompt: Option<&str>,
) -> anyhow::Result<()> {
    let secrets = EnvOrCommand::new(&session.settings.secrets);
    let env = resolve_all(&secrets, &session.settings.assistant.env)?;
    eprintln!(
        "{}",
        progress_message(cformat!(
            "Starting <bold>{}</>...",
            session.settings.assistant.command
        ))
    );
    if !assistant.launch(worktree, prompt, &env)? {
        eprintln!(
            "{}",
            warning_message(format!(
                "{} exited with an error",
                session.settings.assistant.command
            ))
        );
    }
    Ok(())
}

pub(crate) fn handle_agent_start(session: &Session, number: u64) -> anyhow::Result<()> {
    GhCli::require()?;
    let assistant = CommandAssistant::new(&session.settings.assistant);
    assistant.require()?;

    let prepared = prepare_issue(session, number)?;
    let prompt = task_prompt(&prepared.task_file);
    launch_assistant(session, &assistant, &prepared.path, Some(&prompt))
}

pub(crate) fn handle_issue_to_pr(session: &Session, number: u64) -> anyhow::Result<()> {
    GhCli::require()?;
    let assistant = CommandAssistant::new(&session.settings.assistant);
    assistant.require()?;

    let prepared = prepare_issue(session, number)?;
    let prompt = task_prompt(&prepared.task_file);
    launch_assistant(session, &assistant, &prepared.path, Some(&prompt))?;

    let branch = &prepared.branch;
    if session.repo.commits_ahead(&prepared.base, branch)? == 0 {
        return Err(StackError::Other {
            message: format!("No commits on {branch}; not opening a pull request"),
        }
        .into());
    }
    let dirty = session.repo.is_dirty(&prepared.path)?;
    if dirty {
        eprintln!(
            "{}",
            warning_message(cformat!(
                "<bold>{branch}</> has uncommitted changes; they are not part of the pull request"
            ))
        );
    }

    let remote = session.settings.remote();
    eprintln!(
        "{}",
        progress_message(cformat!("Pushing <bold>{branch}</> to {remote}..."))
    );
    session
        .repo
        .push(&prepared.path, remote, branch)
        .map_err(|e| StackError::RemoteOperationFailed {
            operation: "push".into(),
            branch: branch.clone(),
            error: format!("{e:#}"),
        })?;

    let body = format!("Closes #{number}");
    let url = GhCli.create_pull_request(
        &prepared.path,
        &PullRequest {
            base: &prepared.base,
            head: branch,
            title: &prepared.issue.title,
            body: &body,
        },
    )?;
    eprintln!(
        "{}",
        success_message(cformat!("Opened a pull request for <bold>{branch}</>"))
    );
    println!("{url}");
    Ok(())
}

pub(crate) fn handle_agent_here(session: &Session) -> anyhow::Result<()> {
    let assistant = CommandAssistant::new(&session.settings.assistant);
    assistant.require()?;

    let branch = session
        .repo
        .current_branch()?
        .ok_or_else(|| StackError::NotOnBranch {
            action: "start an assistant".into(),
        })?;
    let here = session.repo.worktree_root()?;
    let origin = session.with_allocator(|tracker, _| {
        if tracker.is_perennial(&branch)? {
            Ok(branch.clone())
        } else {
            tracker.get_parent(&branch)
        }
    })?;
    ContextStore::ensure(&here, &branch, &origin)?;

    let prompt = ContextStore::read(&here)?
        .and_then(|summary| summary.task_files.first().map(|f| task_prompt(f)));
    launch_assistant(session, &assistant, &here, prompt.as_deref())
}

pub(crate) fn handle_agent_status(session: &Session) -> anyhow::Result<()> {
    let root = session.repo.repo_root()?;
    let mut found = false;
    for wt in session.repo.list_worktrees()? {
        let Some(summary) = ContextStore::read(&wt.path)? else {
            continue;
        };
        found = true;
        let branch = wt.branch.as_deref().unwrap_or("(detached)");
        let issue = summary
            .issue
            .map(|n| cformat!("  <cyan>issue #{n}</>"))
            .unwrap_or_default();
        let origin = summary
            .origin
            .as_deref()
            .map(|o| cformat!("  <dim>from {o}</>"))
            .unwrap_or_default();
        println!(
            "{}",
            cformat!(
                "<bold>{branch}</>  <dim>{}</>{issue}{origin}",
                format_relative(&wt.path, &root)
            )
        );
        if !summary.task_files.is_empty() {
            println!("{}", format_with_gutter(&summary.task_files.join("\n")));
        }
    }
    if !found {
        eprintln!("{}", info_message("No worktrees carry agent context"));
    }
    Ok(())
}
