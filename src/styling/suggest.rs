//! Command suggestion helpers for hint messages.
//!
//! ```
//! use stacktrunk::styling::suggest_command;
//!
//! let cmd = suggest_command("clean", &["feat/x"], &[]);
//! assert_eq!(cmd, "st clean feat/x");
//!
//! // Branch starting with dash gets -- separator
//! let cmd = suggest_command("clean", &["-bugfix"], &[]);
//! assert_eq!(cmd, "st clean -- -bugfix");
//! ```

use shell_escape::escape;
use std::borrow::Cow;

/// Build a copy-pasteable `st <subcommand> ...` string.
///
/// Positional arguments are shell-escaped; a `--` separator is inserted before
/// the first argument that starts with `-`.
pub fn suggest_command(subcommand: &str, args: &[&str], flags: &[&str]) -> String {
    let mut parts = vec!["st".to_string(), subcommand.to_string()];

    let mut separator_inserted = false;
    for arg in args {
        if arg.starts_with('-') && !separator_inserted {
            parts.push("--".to_string());
            separator_inserted = true;
        }
        parts.push(escape(Cow::Borrowed(*arg)).into_owned());
    }

    parts.extend(flags.iter().map(|s| s.to_string()));
    parts.join(" ")
}

/// Shell-escape a single argument for a suggested `git` or `cd` command.
pub fn shell_quote(arg: &str) -> String {
    escape(Cow::Borrowed(arg)).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_command() {
        assert_eq!(
            suggest_command("local-merge", &["feat/x"], &[]),
            "st local-merge feat/x"
        );
    }

    #[test]
    fn test_command_with_flag() {
        assert_eq!(suggest_command("list", &[], &["-v"]), "st list -v");
    }

    #[test]
    fn test_branch_with_special_chars() {
        assert_eq!(
            suggest_command("clean", &["feat/x$1"], &[]),
            "st clean 'feat/x$1'"
        );
    }

    #[test]
    fn test_branch_starting_with_dash() {
        assert_eq!(
            suggest_command("clean", &["-bugfix"], &[]),
            "st clean -- -bugfix"
        );
    }

    #[test]
    fn test_shell_quote_path_with_space() {
        assert_eq!(shell_quote("/tmp/my repo"), "'/tmp/my repo'");
        assert_eq!(shell_quote("/tmp/repo"), "/tmp/repo");
    }
}
