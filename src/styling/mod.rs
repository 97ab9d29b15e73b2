//! Terminal output styling.
//!
//! Uses the anstyle ecosystem:
//! - anstream for auto-detecting color support
//! - anstyle for composable styles
//! - color-print for semantic message markup
//!
//! ## stdout vs stderr
//!
//! - **stdout**: primary data (`st list`, `st cd`, `st stack`)
//! - **stderr**: status messages (progress, success, warnings, errors, hints)
//!
//! so that `cd "$(st cd feat/x)"` and `st list | grep` work without status
//! noise.

mod constants;
mod format;
mod suggest;

pub use anstream::{eprint, eprintln, print, println};
pub use anstyle::Style as AnstyleStyle;

pub use constants::*;
pub use format::format_with_gutter;
pub use suggest::{shell_quote, suggest_command};

/// Strip ANSI escape sequences (CSI only), for plain-text comparisons.
pub fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for c in chars.by_ref() {
                if c.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}
