//! Path helpers for display and worktree nesting checks

use std::path::{Path, PathBuf};

fn home_dir() -> Option<PathBuf> {
    home::home_dir()
}

/// Format a filesystem path for user-facing output, replacing the home
/// directory prefix with `~`.
pub fn format_path_for_display(path: &Path) -> String {
    if let Some(home) = home_dir()
        && let Ok(stripped) = path.strip_prefix(&home)
    {
        if stripped.as_os_str().is_empty() {
            return "~".to_string();
        }

        let mut display_path = PathBuf::from("~");
        display_path.push(stripped);
        return display_path.display().to_string();
    }

    path.display().to_string()
}

/// Path of `path` relative to `base` when it lives underneath it, otherwise
/// the `~`-shortened absolute path.
pub fn format_relative(path: &Path, base: &Path) -> String {
    match pathdiff::diff_paths(path, base) {
        Some(rel) if !rel.starts_with("..") => {
            if rel.as_os_str().is_empty() {
                ".".to_string()
            } else {
                rel.display().to_string()
            }
        }
        _ => format_path_for_display(path),
    }
}

/// Canonicalize when the path exists, otherwise return it unchanged.
///
/// Uses `dunce` so Windows paths stay in a form git accepts.
pub fn canonical_or_same(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// True when `path` is `base` itself or lies underneath it (after
/// canonicalization of whichever sides exist).
pub fn is_within(path: &Path, base: &Path) -> bool {
    canonical_or_same(path).starts_with(canonical_or_same(base))
}
