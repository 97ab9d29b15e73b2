//! `st guide [topic]`: workflow notes shown in the terminal

use color_print::cformat;
use stacktrunk::error::StackError;
use stacktrunk::styling::{eprintln, format_heading, hint_message, println};

struct Topic {
    name: &'static str,
    summary: &'static str,
    body: &'static str,
}

const TOPICS: &[Topic] = &[
    Topic {
        name: "workflow",
        summary: "From issue to shipped branch",
        body: "\
st agent-start 42        Create a worktree for issue #42 and start the assistant
st list                  See every worktree and the task it carries
st local-merge           Merge the finished branch into its parent, locally
st ship                  Ship it with git-town once the parent is ready
st auto-clean            Remove branches already merged into trunk",
    },
    Topic {
        name: "stacking",
        summary: "Branches built on other branches",
        body: "\
st new feat/api                 Stacked on the current branch
st new feat/ui feat/api         Stacked on feat/api, inside its worktree
st stack                        The tree of branches and worktrees

Each branch records its parent in git config (branch.<name>.parent).
Worktrees of stacked branches nest inside their parent's directory:

  worktrees/feat/api
  worktrees/feat/api/feat/ui

Running st new for a branch that already exists recreates it from
scratch. Uncommitted work in the old worktree is lost.",
    },
    Topic {
        name: "integrating",
        summary: "Local merges, sync and ship",
        body: "\
st local-merge [branch]     Merge into the parent worktree, never pushes
st local-sync-all           Do that for every stacked worktree, deepest first
st merge-branch <branch>    Merge, push the parent, remove the branch
st sync-all                 git town sync in every worktree (parked ones skipped)
st ship-all                 Ship every branch with commits ahead of its parent

A conflict leaves the parent worktree mid-merge. Resolve it there,
commit, and run the command again.",
    },
    Topic {
        name: "lifecycle",
        summary: "Parked, observed, contributing and prototype branches",
        body: "\
st park [branch]            sync-all leaves it alone
st observe [branch]         Someone else's branch: pull, never push
st contribute [branch]      Push to someone else's branch
st prototype [branch]       Local only, never pushed
st stack-status             Lifecycle, changes and commits ahead per branch",
    },
    Topic {
        name: "agents",
        summary: "Assistant hand-off and MCP servers",
        body: "\
st agent-start 42           Issue #42 -> branch, worktree, .context/issue-42.md
st agent-here               Start the assistant in the current worktree
st agent-status             Which worktrees carry a context record
st issue-to-pr 42           agent-start, then push and open a pull request
st mcp start|stop|status    Background MCP servers (.mcp/pids, .mcp/logs)

API keys listed under assistant.env are read from the environment, or
from secrets.command when it is configured.",
    },
];

pub(crate) fn handle_guide(topic: Option<&str>) -> anyhow::Result<()> {
    match topic {
        None => {
            println!("{}", format_heading("Guide topics", None));
            let width = TOPICS.iter().map(|t| t.name.len()).max().unwrap_or(0);
            for t in TOPICS {
                let name = format!("{:width$}", t.name);
                println!("{}", cformat!("  <bold>{name}</>  {}", t.summary));
            }
            eprintln!("{}", hint_message(cformat!("Run <bright-black>st guide <<topic></>")));
            Ok(())
        }
        Some(name) => {
            let Some(t) = TOPICS.iter().find(|t| t.name == name) else {
                let names: Vec<_> = TOPICS.iter().map(|t| t.name).collect();
                return Err(StackError::Other {
                    message: format!("No guide topic {name}; topics: {}", names.join(", ")),
                }
                .into());
            };
            println!("{}", format_heading(t.summary, None));
            println!("{}", t.body);
            Ok(())
        }
    }
}
