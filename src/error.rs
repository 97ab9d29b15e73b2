//! Error types and formatting
//!
//! - **`StackError`**: typed domain errors. Convert with `.into()` to
//!   `anyhow::Error` and recover with `downcast_ref` for pattern matching.
//!   `Display` produces styled output (symbol, colors, remediation hint).
//! - **`ErrorKind`**: the coarse taxonomy callers branch on (batch commands
//!   treat `MergeConflict` as a per-item failure, `UserDeclined` is a clean
//!   abort, and so on).

use std::path::PathBuf;

use color_print::cformat;

use crate::branch::{BranchType, PERENNIAL_BRANCHES};
use crate::path::format_path_for_display;
use crate::styling::{
    error_message, format_with_gutter, hint_message, info_message, shell_quote, suggest_command,
};

/// Coarse error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    /// Bad input: branch name, missing argument, wrong branch for the operation
    Validation,
    /// A required external tool is not installed
    PrerequisiteMissing,
    /// A merge stopped with conflicts; manual resolution required
    MergeConflict,
    /// fetch/push failure
    RemoteOperation,
    /// A confirmation prompt was answered "no"
    UserDeclined,
    /// Any other failure reported by an external tool
    External,
}

/// Domain errors for stack and worktree operations.
///
/// ```ignore
/// return Err(StackError::PerennialBranch { branch, action: "local-merge".into() }.into());
///
/// if let Some(StackError::MergeConflict { files, .. }) = err.downcast_ref() {
///     report_conflict(files);
/// }
/// ```
#[derive(Debug, Clone)]
pub enum StackError {
    InvalidBranchName {
        name: String,
    },
    PerennialBranch {
        branch: String,
        action: String,
    },
    NotOnBranch {
        action: String,
    },
    BranchNotFound {
        branch: String,
    },
    WorktreeNotFound {
        branch: String,
    },
    ParentWorktreeMissing {
        branch: String,
        parent: String,
    },
    NestedWorktrees {
        branch: String,
        nested: Vec<String>,
    },
    /// A branch named as its own parent
    SelfParent {
        branch: String,
    },
    InsideTargetWorktree {
        branch: String,
        path: PathBuf,
    },
    NoTestCommand,
    UnknownMcpServer {
        name: String,
        available: Vec<String>,
    },
    PrerequisiteMissing {
        tool: String,
        install_hint: String,
    },
    MergeConflict {
        branch: String,
        target: String,
        worktree: PathBuf,
        files: Vec<String>,
    },
    RemoteOperationFailed {
        operation: String,
        branch: String,
        error: String,
    },
    Declined {
        action: String,
        exit_code: i32,
    },
    CommandFailed {
        command: String,
        error: String,
    },
    /// A batch command already printed its per-item report; exit quietly.
    AlreadyDisplayed {
        exit_code: i32,
    },
    Other {
        message: String,
    },
}

impl StackError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StackError::InvalidBranchName { .. }
            | StackError::PerennialBranch { .. }
            | StackError::NotOnBranch { .. }
            | StackError::BranchNotFound { .. }
            | StackError::WorktreeNotFound { .. }
            | StackError::ParentWorktreeMissing { .. }
            | StackError::NestedWorktrees { .. }
            | StackError::SelfParent { .. }
            | StackError::InsideTargetWorktree { .. }
            | StackError::NoTestCommand
            | StackError::UnknownMcpServer { .. } => ErrorKind::Validation,
            StackError::PrerequisiteMissing { .. } => ErrorKind::PrerequisiteMissing,
            StackError::MergeConflict { .. } => ErrorKind::MergeConflict,
            StackError::RemoteOperationFailed { .. } => ErrorKind::RemoteOperation,
            StackError::Declined { .. } => ErrorKind::UserDeclined,
            StackError::CommandFailed { .. }
            | StackError::AlreadyDisplayed { .. }
            | StackError::Other { .. } => ErrorKind::External,
        }
    }
}

/// Header followed by tool output in a gutter (or the header alone when the
/// output is empty).
pub(crate) fn format_error_block(header: impl Into<String>, error: &str) -> String {
    let header = header.into();
    let trimmed = error.trim();
    if trimmed.is_empty() {
        header
    } else {
        format!("{header}\n{}", format_with_gutter(trimmed))
    }
}

impl std::error::Error for StackError {}

impl std::fmt::Display for StackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StackError::InvalidBranchName { name } => {
                let types = BranchType::all_prefixes().join(", ");
                let perennials = PERENNIAL_BRANCHES.join(", ");
                write!(
                    f,
                    "{}\n{}\n{}",
                    error_message(cformat!(
                        "Invalid branch name <bold>{name}</>; expected <bold><<type>/<<description></>"
                    )),
                    hint_message(cformat!("Valid types: <bright-black>{types}</>")),
                    hint_message(cformat!("Perennial branches: <bright-black>{perennials}</>"))
                )
            }

            StackError::PerennialBranch { branch, action } => write!(
                f,
                "{}\n{}",
                error_message(cformat!(
                    "Cannot {action} <bold>{branch}</>: perennial branches have no parent to merge into"
                )),
                hint_message("Run from a feature branch worktree, or name one")
            ),

            StackError::NotOnBranch { action } => write!(
                f,
                "{}\n{}",
                error_message(format!("Cannot {action}: not on a branch (detached HEAD)")),
                hint_message(cformat!(
                    "To switch to a branch, run <bright-black>git switch <<branch></>"
                ))
            ),

            StackError::BranchNotFound { branch } => write!(
                f,
                "{}",
                error_message(cformat!("No branch named <bold>{branch}</>"))
            ),

            StackError::WorktreeNotFound { branch } => {
                let new_cmd = suggest_command("new", &[branch], &[]);
                write!(
                    f,
                    "{}\n{}",
                    error_message(cformat!("No worktree for <bold>{branch}</>")),
                    hint_message(cformat!("To create one, run <bright-black>{new_cmd}</>"))
                )
            }

            StackError::ParentWorktreeMissing { branch, parent } => write!(
                f,
                "{}\n{}",
                error_message(cformat!(
                    "Parent <bold>{parent}</> of <bold>{branch}</> has no worktree to merge into"
                )),
                hint_message(cformat!(
                    "To check it out, run <bright-black>git worktree add worktrees/{parent} {parent}</>"
                ))
            ),

            StackError::NestedWorktrees { branch, nested } => write!(
                f,
                "{}\n{}\n{}",
                error_message(cformat!(
                    "Cannot remove <bold>{branch}</>: other worktrees are nested inside it"
                )),
                format_with_gutter(&nested.join("\n")),
                hint_message("Remove or ship the nested branches first")
            ),

            StackError::SelfParent { branch } => write!(
                f,
                "{}\n{}",
                error_message(cformat!("Cannot stack <bold>{branch}</> on itself")),
                hint_message("Name a different parent, or omit it to stack on the current branch")
            ),

            StackError::InsideTargetWorktree { branch, path } => {
                let path_display = format_path_for_display(path);
                write!(
                    f,
                    "{}\n{}",
                    error_message(cformat!(
                        "Cannot merge <bold>{branch}</> from inside its own worktree"
                    )),
                    hint_message(cformat!(
                        "Leave <bright-black>{path_display}</> first, e.g. <bright-black>cd ..</>"
                    ))
                )
            }

            StackError::NoTestCommand => write!(
                f,
                "{}\n{}",
                error_message("No test command configured"),
                hint_message(cformat!(
                    "Set <bright-black>test-command = \"...\"</> in the stacktrunk config"
                ))
            ),

            StackError::UnknownMcpServer { name, available } => write!(
                f,
                "{}\n{}",
                error_message(cformat!("Unknown MCP server <bold>{name}</>")),
                hint_message(format!("Configured servers: {}", available.join(", ")))
            ),

            StackError::PrerequisiteMissing { tool, install_hint } => write!(
                f,
                "{}\n{}",
                error_message(cformat!("Required tool <bold>{tool}</> not found in PATH")),
                hint_message(install_hint)
            ),

            StackError::MergeConflict {
                branch,
                target,
                worktree,
                files,
            } => {
                let path_display = format_path_for_display(worktree);
                let cd = format!("cd {}", shell_quote(&worktree.to_string_lossy()));
                write!(
                    f,
                    "{}",
                    error_message(cformat!(
                        "Merging <bold>{branch}</> into <bold>{target}</> stopped with conflicts"
                    ))
                )?;
                if !files.is_empty() {
                    write!(f, "\n{}", format_with_gutter(&files.join("\n")))?;
                }
                write!(
                    f,
                    "\n{}\n{}",
                    info_message(cformat!(
                        "<bold>{target}</> @ <bold>{path_display}</> is left in the conflicted state"
                    )),
                    hint_message(cformat!(
                        "Resolve manually: <bright-black>{cd}</>, fix the files, then <bright-black>git add</> and <bright-black>git commit</> (or <bright-black>git merge --abort</>)"
                    ))
                )
            }

            StackError::RemoteOperationFailed {
                operation,
                branch,
                error,
            } => write!(
                f,
                "{}",
                format_error_block(
                    error_message(cformat!("Failed to {operation} <bold>{branch}</>")),
                    error
                )
            ),

            StackError::Declined { action, .. } => {
                write!(f, "{}", info_message(format!("{action} cancelled")))
            }

            StackError::CommandFailed { command, error } => write!(
                f,
                "{}",
                format_error_block(
                    error_message(cformat!("<bold>{command}</> failed")),
                    error
                )
            ),

            StackError::AlreadyDisplayed { .. } => Ok(()),

            StackError::Other { message } => write!(f, "{}", error_message(message)),
        }
    }
}

/// Process exit code for an error returned from a command.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<StackError>() {
        Some(StackError::Declined { exit_code, .. })
        | Some(StackError::AlreadyDisplayed { exit_code }) => *exit_code,
        _ => 1,
    }
}
