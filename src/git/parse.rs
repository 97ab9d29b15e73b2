//! Git output parsing functions

use std::path::PathBuf;

use anyhow::anyhow;

use super::Worktree;

impl Worktree {
    pub(crate) fn parse_porcelain_list(output: &str) -> anyhow::Result<Vec<Self>> {
        let mut worktrees = Vec::new();
        let mut current: Option<Worktree> = None;

        for line in output.lines() {
            if line.is_empty() {
                if let Some(wt) = current.take() {
                    worktrees.push(wt);
                }
                continue;
            }

            let (key, value) = match line.split_once(' ') {
                Some((k, v)) => (k, Some(v)),
                None => (line, None),
            };

            match (key, current.as_mut()) {
                ("worktree", _) => {
                    if let Some(wt) = current.take() {
                        worktrees.push(wt);
                    }
                    let path = value.ok_or_else(|| anyhow!("worktree line missing path"))?;
                    current = Some(Worktree {
                        path: PathBuf::from(path),
                        head: String::new(),
                        branch: None,
                        bare: false,
                        detached: false,
                        locked: None,
                        prunable: None,
                    });
                }
                ("HEAD", Some(wt)) => {
                    wt.head = value
                        .ok_or_else(|| anyhow!("HEAD line missing SHA"))?
                        .to_string();
                }
                ("branch", Some(wt)) => {
                    let branch_ref = value.ok_or_else(|| anyhow!("branch line missing ref"))?;
                    let branch = branch_ref.strip_prefix("refs/heads/").unwrap_or(branch_ref);
                    wt.branch = Some(branch.to_string());
                }
                ("bare", Some(wt)) => wt.bare = true,
                ("detached", Some(wt)) => wt.detached = true,
                ("locked", Some(wt)) => wt.locked = Some(value.unwrap_or_default().to_string()),
                ("prunable", Some(wt)) => {
                    wt.prunable = Some(value.unwrap_or_default().to_string());
                }
                // Unknown attributes, or attributes before the first worktree
                _ => {}
            }
        }

        if let Some(wt) = current {
            worktrees.push(wt);
        }

        Ok(worktrees)
    }
}

/// Paths listed by `git diff --name-only`, one per line.
pub(crate) fn parse_name_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// `git branch --merged` style listing, tolerant of `*`/`+` markers.
pub(crate) fn parse_branch_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(|line| line.trim_start_matches(['*', '+']).trim())
        .filter(|line| !line.is_empty() && !line.starts_with('('))
        .map(String::from)
        .collect()
}
