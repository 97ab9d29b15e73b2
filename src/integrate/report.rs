//! Per-item results of batch operations

use color_print::cformat;

use crate::styling::{
    ERROR_SYMBOL, INFO_SYMBOL, SUCCESS_SYMBOL, WARNING_SYMBOL, format_with_gutter,
};

/// How far a branch got through an integration operation
///
/// `Untouched → Syncing → Merging → {Merged | Conflicted} → {Pushed | LocalOnly}
/// → {CleanedUp | LeftInPlace}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum BranchPhase {
    Untouched,
    Syncing,
    Merging,
    Merged,
    Conflicted,
    Pushed,
    LocalOnly,
    CleanedUp,
    LeftInPlace,
}

/// Whether a failed step stops the operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    /// Best-effort step; the operation carries on
    Warning,
    /// Required step; the operation stops here
    Fatal,
}

/// A step that did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub step: String,
    pub severity: Severity,
    pub message: String,
}

impl StepFailure {
    pub fn warning(step: impl Into<String>, error: &anyhow::Error) -> Self {
        Self {
            step: step.into(),
            severity: Severity::Warning,
            message: format!("{error:#}"),
        }
    }

    /// A required step failed in `phase`; the branch stops there.
    pub fn fatal(phase: BranchPhase, error: &anyhow::Error) -> Self {
        // StackError renders its own styling; keep the item line plain
        let message = crate::styling::strip_ansi(&format!("{error:#}"));
        let first = message.lines().next().unwrap_or_default();
        Self {
            step: phase.to_string(),
            severity: Severity::Fatal,
            message: first.trim_start_matches(['✗', '▲', '○', ' ']).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Done(String),
    Skipped(String),
    Failed(StepFailure),
    Conflicted(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemResult {
    pub branch: String,
    pub phase: BranchPhase,
    pub outcome: ItemOutcome,
}

/// Results of a batch command, one item per branch
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub items: Vec<ItemResult>,
}

impl BatchReport {
    pub fn done(&mut self, branch: &str, phase: BranchPhase, detail: impl Into<String>) {
        self.push(branch, phase, ItemOutcome::Done(detail.into()));
    }

    pub fn skipped(&mut self, branch: &str, reason: impl Into<String>) {
        self.push(branch, BranchPhase::Untouched, ItemOutcome::Skipped(reason.into()));
    }

    /// Record a fatal step failure for `branch`.
    pub fn failed(&mut self, branch: &str, phase: BranchPhase, error: &anyhow::Error) {
        let failure = StepFailure::fatal(phase, error);
        self.push(branch, phase, ItemOutcome::Failed(failure));
    }

    pub fn conflicted(&mut self, branch: &str, files: Vec<String>) {
        self.push(branch, BranchPhase::Conflicted, ItemOutcome::Conflicted(files));
    }

    fn push(&mut self, branch: &str, phase: BranchPhase, outcome: ItemOutcome) {
        self.items.push(ItemResult {
            branch: branch.to_string(),
            phase,
            outcome,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn count(&self, pred: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.items.iter().filter(|i| pred(&i.outcome)).count()
    }

    pub fn has_failures(&self) -> bool {
        self.count(|o| matches!(o, ItemOutcome::Failed(_) | ItemOutcome::Conflicted(_))) > 0
    }

    /// 1 when any item failed or conflicted.
    pub fn exit_code(&self) -> i32 {
        i32::from(self.has_failures())
    }

    /// One line per item, then a summary line.
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        for item in &self.items {
            let branch = &item.branch;
            match &item.outcome {
                ItemOutcome::Done(detail) => {
                    lines.push(cformat!("{SUCCESS_SYMBOL} <bold>{branch}</>  {detail}"));
                }
                ItemOutcome::Skipped(reason) => {
                    lines.push(cformat!("{INFO_SYMBOL} <bold>{branch}</>  <dim>skipped: {reason}</>"));
                }
                ItemOutcome::Failed(failure) => {
                    let message = &failure.message;
                    lines.push(cformat!("{ERROR_SYMBOL} <bold>{branch}</>  <red>{message}</>"));
                }
                ItemOutcome::Conflicted(files) => {
                    lines.push(cformat!("{WARNING_SYMBOL} <bold>{branch}</>  <yellow>conflicted</>"));
                    if !files.is_empty() {
                        lines.push(format_with_gutter(&files.join("\n")));
                    }
                }
            }
        }
        lines.push(self.summary());
        lines.join("\n")
    }

    pub fn summary(&self) -> String {
        let done = self.count(|o| matches!(o, ItemOutcome::Done(_)));
        let failed = self.count(|o| matches!(o, ItemOutcome::Failed(_)));
        let conflicted = self.count(|o| matches!(o, ItemOutcome::Conflicted(_)));
        let skipped = self.count(|o| matches!(o, ItemOutcome::Skipped(_)));

        let mut parts = vec![format!("{done} succeeded")];
        if failed > 0 {
            parts.push(format!("{failed} failed"));
        }
        if conflicted > 0 {
            parts.push(format!("{conflicted} conflicted"));
        }
        if skipped > 0 {
            parts.push(format!("{skipped} skipped"));
        }
        cformat!("<dim>{}</>", parts.join(", "))
    }
}
