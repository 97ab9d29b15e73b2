//! Branch naming convention
//!
//! Every non-perennial branch is named `<type>/<description>`, where `type`
//! is one of [`BranchType`]. Perennial branches come from a fixed set and are
//! exempt.
//!
//! Issue-driven creation derives the type from the issue title and labels
//! with [`derive_branch_type`] and the description with [`slugify`].

use std::str::FromStr;

use strum::IntoEnumIterator;

use crate::error::StackError;

/// Long-lived branches that are never shipped or deleted.
pub const PERENNIAL_BRANCHES: &[&str] = &["main", "master", "develop", "staging", "production"];

/// Maximum length of a slug derived from free text.
pub const SLUG_MAX_LEN: usize = 40;

/// Type prefix of a `<type>/<description>` branch name
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum BranchType {
    Feat,
    Feature,
    Fix,
    Test,
    Docs,
    Chore,
    Hotfix,
    Refactor,
    Perf,
    Style,
    Build,
    Ci,
    Revert,
}

impl BranchType {
    /// All accepted prefixes, in declaration order.
    pub fn all_prefixes() -> Vec<&'static str> {
        BranchType::iter().map(<&'static str>::from).collect()
    }
}

/// A branch name that passed [`validate_branch_name`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchName {
    Perennial(String),
    Typed {
        branch_type: BranchType,
        description: String,
    },
}

impl BranchName {
    pub fn is_perennial(&self) -> bool {
        matches!(self, BranchName::Perennial(_))
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BranchName::Perennial(name) => write!(f, "{name}"),
            BranchName::Typed {
                branch_type,
                description,
            } => write!(f, "{branch_type}/{description}"),
        }
    }
}

pub fn is_perennial(name: &str) -> bool {
    PERENNIAL_BRANCHES.contains(&name)
}

/// Check a branch name against the naming convention.
///
/// Returns [`StackError::InvalidBranchName`], whose display lists the valid
/// types and perennial names, when the name is neither perennial nor
/// `<type>/<description>` with a known type and a description git accepts as
/// a ref.
pub fn validate_branch_name(name: &str) -> Result<BranchName, StackError> {
    if is_perennial(name) {
        return Ok(BranchName::Perennial(name.to_string()));
    }

    let invalid = || StackError::InvalidBranchName {
        name: name.to_string(),
    };

    let (prefix, description) = name.split_once('/').ok_or_else(invalid)?;
    let branch_type = BranchType::from_str(prefix).map_err(|_| invalid())?;
    if !is_valid_description(description) {
        return Err(invalid());
    }

    Ok(BranchName::Typed {
        branch_type,
        description: description.to_string(),
    })
}

/// The subset of `git check-ref-format` rules that apply to the part after
/// `<type>/`.
fn is_valid_description(description: &str) -> bool {
    const FORBIDDEN: &[char] = &['~', '^', ':', '?', '*', '[', '\\'];

    !description.is_empty()
        && !description
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || FORBIDDEN.contains(&c))
        && !description.contains("..")
        && !description.contains("@{")
        && !description.ends_with('.')
        && !description.ends_with(".lock")
        && description
            .split('/')
            .all(|component| !component.is_empty() && !component.starts_with('.'))
}

/// Keyword table for deriving a type from issue text. Order matters: the
/// first rule with a matching keyword wins.
const TYPE_RULES: &[(&[&str], BranchType)] = &[
    (&["bug", "fix", "error", "broken"], BranchType::Fix),
    (&["docs", "documentation", "readme"], BranchType::Docs),
    (&["test", "testing", "spec"], BranchType::Test),
    (&["chore", "maintenance", "dependency"], BranchType::Chore),
    (&["hotfix", "urgent", "critical"], BranchType::Hotfix),
];

/// Pick a branch type for free text (issue title plus labels).
///
/// Matching is a case-insensitive substring search; text matching no rule
/// gets [`BranchType::Feat`].
pub fn derive_branch_type(text: &str) -> BranchType {
    let text = text.to_lowercase();
    TYPE_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| text.contains(k)))
        .map(|(_, branch_type)| *branch_type)
        .unwrap_or(BranchType::Feat)
}

/// Lowercase, collapse runs of anything outside `[a-z0-9]` into one hyphen,
/// trim hyphens and truncate to [`SLUG_MAX_LEN`].
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;
    for c in text.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    // ASCII only at this point, so byte truncation is char-safe
    slug.truncate(SLUG_MAX_LEN);
    slug.trim_end_matches('-').to_string()
}

/// Branch name for an issue: `<type>/<number>-<slug>`.
pub fn branch_for_issue(number: u64, title: &str, labels: &[String]) -> String {
    let text = std::iter::once(title)
        .chain(labels.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ");
    let branch_type = derive_branch_type(&text);
    let slug = slugify(title);
    if slug.is_empty() {
        format!("{branch_type}/{number}")
    } else {
        format!("{branch_type}/{number}-{slug}")
    }
}
