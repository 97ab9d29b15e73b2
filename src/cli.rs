use std::path::PathBuf;

use clap::builder::styling::{AnsiColor, Color, Styles};
use clap::{Command, CommandFactory, Parser, Subcommand};

/// Help styles shared by every subcommand
fn help_styles() -> Styles {
    Styles::styled()
        .header(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .usage(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .literal(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .placeholder(anstyle::Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
        .error(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .valid(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .invalid(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Yellow))),
        )
}

const COMMAND_NAME: &str = "st";

const HELP_TEMPLATE: &str = "\
{before-help}{name} - {about-with-newline}
Usage: {usage}

{all-args}{after-help}";

/// Build the clap Command with the shared help template applied recursively.
pub(crate) fn build_command() -> Command {
    apply_help_template_recursive(Cli::command(), COMMAND_NAME)
}

fn apply_help_template_recursive(mut cmd: Command, path: &str) -> Command {
    cmd = cmd.help_template(HELP_TEMPLATE).display_name(path);

    for sub in cmd.get_subcommands_mut() {
        let sub_cmd = std::mem::take(sub);
        let sub_path = format!("{} {}", path, sub_cmd.get_name());
        let sub_cmd = apply_help_template_recursive(sub_cmd, &sub_path);
        *sub = sub_cmd;
    }
    cmd
}

#[derive(Parser)]
#[command(name = "st")]
#[command(about = "Stacked git worktrees for parallel AI agent workflows", long_about = None)]
#[command(version)]
#[command(disable_help_subcommand = true)]
#[command(styles = help_styles())]
#[command(arg_required_else_help = true)]
#[command(after_long_help = "\
Getting started

  st new feat/login             # Worktree for a branch stacked on the current one
  st stack                      # Show the stack
  st local-merge                # Merge the current branch into its parent locally
  st ship                       # Ship the current branch with git-town

Run `st guide` for the workflow topics.")]
pub(crate) struct Cli {
    /// Working directory for this command
    #[arg(
        short = 'C',
        global = true,
        value_name = "path",
        display_order = 100,
        help_heading = "Global Options"
    )]
    pub directory: Option<PathBuf>,

    /// User config file path
    #[arg(
        long,
        global = true,
        value_name = "path",
        display_order = 101,
        help_heading = "Global Options"
    )]
    pub config: Option<PathBuf>,

    /// Show the debug log with every external command (-v), or trace output (-vv)
    #[arg(
        long,
        short = 'v',
        global = true,
        action = clap::ArgAction::Count,
        display_order = 102,
        help_heading = "Global Options"
    )]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Create a worktree for a new stacked branch
    #[command(after_long_help = r#"The worktree goes to `worktrees/<branch>`, or inside the parent's worktree when the parent is a stacked branch itself, so the directory layout mirrors the stack.

The parent defaults to the current branch, or trunk on a detached HEAD.

WARNING: if a worktree or branch named <branch> already exists, it is destroyed and recreated from the parent. Uncommitted work in that worktree is lost."#)]
    New {
        /// Branch name, `<type>/<description>` (e.g. feat/login)
        branch: String,

        /// Branch to stack on
        parent: Option<String>,
    },

    /// List worktrees with their context records
    List,

    /// Print the path of a branch's worktree
    #[command(after_long_help = "Use with command substitution: cd \"$(st cd feat/login)\"")]
    Cd { branch: String },

    /// Remove a branch and its worktree
    ///
    /// Branches stacked on it are re-pointed at its parent.
    Clean {
        /// Defaults to the current branch
        branch: Option<String>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the stack as a tree
    Stack,

    /// Run git-town sync in every worktree
    SyncAll,

    /// Merge a branch into its parent's worktree without pushing
    LocalMerge {
        /// Defaults to the current branch
        branch: Option<String>,
    },

    /// Merge every worktree branch into its parent, deepest first, without pushing
    LocalSyncAll,

    /// Ship a branch into its parent with git-town
    Ship {
        /// Defaults to the current branch
        branch: Option<String>,
    },

    /// Ship every branch with commits ahead of its parent
    #[command(after_long_help = "Uncommitted changes in a selected worktree are committed first.")]
    ShipAll,

    /// Park a branch (sync skips it)
    Park { branch: Option<String> },

    /// Observe a branch (sync pulls, never pushes)
    Observe { branch: Option<String> },

    /// Contribute to someone else's branch
    Contribute { branch: Option<String> },

    /// Mark a branch as a prototype (local only)
    Prototype { branch: Option<String> },

    /// Merge a branch into its parent, push the parent, remove the branch
    #[command(after_long_help = "Run from outside the branch's worktree, e.g. from the parent's.")]
    MergeBranch { branch: String },

    /// Remove branches already merged into trunk
    AutoClean,

    /// Start an assistant on a GitHub issue in a new worktree
    AgentStart {
        /// Issue number
        issue: u64,
    },

    /// Start an assistant in the current worktree
    AgentHere,

    /// Show which worktrees carry agent context
    AgentStatus,

    /// Start an assistant on an issue, then open a pull request
    IssueToPr {
        /// Issue number
        issue: u64,
    },

    /// Manage MCP servers
    #[command(subcommand)]
    Mcp(McpCommand),

    /// Stack tree with commits ahead, changes and lifecycle per branch
    StackStatus,

    /// Run the test command across the current stack
    StackTest,

    /// Configure git-town for this repository
    GtSetup,

    /// Check prerequisites and prepare the repository
    DevSetup,

    /// Workflow guide
    #[command(visible_alias = "?")]
    Guide {
        /// Topic (omit to list topics)
        topic: Option<String>,
    },
}

#[derive(Subcommand)]
pub(crate) enum McpCommand {
    /// Start servers (all configured when none named)
    Start { names: Vec<String> },

    /// Stop servers (all configured when none named)
    Stop { names: Vec<String> },

    /// Show each server's state
    Status,
}
