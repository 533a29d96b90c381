use crate::error::GraftError;
use crate::fusion::FusionReport;
use crate::markers::NotATransplant;
use crate::matcher::FuseMismatch;
use anyhow::Context;
use graftt_classfile::ClassIdentity;
use serde::Serialize;

/// States of one grafting attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    Pending,
    Resolved,
    Matched,
    Fused,
    Encoded,
    Skipped,
    Failed,
}

impl AttemptState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Encoded | Self::Skipped | Self::Failed)
    }

    /// Allowed transitions of the attempt state machine
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Resolved | Self::Skipped | Self::Failed)
                | (Self::Resolved, Self::Matched | Self::Failed)
                | (Self::Matched, Self::Fused | Self::Failed)
                | (Self::Fused, Self::Encoded | Self::Failed)
        )
    }
}

/// Structured diagnostic emitted by an attempt; formatting is left to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum Diagnostic {
    Skipped { reason: NotATransplant },
    Failed { error: String },
    Unmatched { members: Vec<FuseMismatch> },
    Fused {
        fused_members: usize,
        added: Vec<String>,
        overwritten: Vec<String>,
    },
    Encoded { recipient: ClassIdentity, bytes: usize },
}

/// Terminal result of an attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The recipient was rewritten; `bytes` is ready for the output sink
    Encoded {
        recipient: ClassIdentity,
        bytes: Vec<u8>,
        fusion: FusionReport,
    },
    Skipped(NotATransplant),
    Failed(GraftError),
}

/// Full record of one donor's attempt: state path, diagnostics and outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptReport {
    /// Caller supplied label, usually the donor's path
    pub donor: String,
    /// Donor class name once decoded
    pub donor_class: Option<ClassIdentity>,
    pub recipient: Option<ClassIdentity>,
    pub states: Vec<AttemptState>,
    pub diagnostics: Vec<Diagnostic>,
    #[serde(skip)]
    pub outcome: Outcome,
}

impl AttemptReport {
    #[must_use]
    pub fn state(&self) -> AttemptState {
        self.states.last().copied().unwrap_or(AttemptState::Pending)
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed(_))
    }

    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, Outcome::Skipped(_))
    }

    /// Rewritten recipient, only for `Encoded` attempts
    #[must_use]
    pub fn encoded(&self) -> Option<(&ClassIdentity, &[u8])> {
        match &self.outcome {
            Outcome::Encoded {
                recipient, bytes, ..
            } => Some((recipient, bytes.as_slice())),
            _ => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&GraftError> {
        match &self.outcome {
            Outcome::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Output sink for rewritten recipients
pub trait ArtifactSink: Sync {
    fn accept(&self, recipient: &ClassIdentity, bytes: &[u8]) -> anyhow::Result<()>;
}

/// Counts per terminal state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub encoded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub overwritten: usize,
}

/// Ordered per-donor results of a batch run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub attempts: Vec<AttemptReport>,
}

impl BatchReport {
    #[must_use]
    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for attempt in &self.attempts {
            match &attempt.outcome {
                Outcome::Encoded { fusion, .. } => {
                    summary.encoded += 1;
                    summary.overwritten += fusion.overwritten.len();
                }
                Outcome::Skipped(_) => summary.skipped += 1,
                Outcome::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.attempts.iter().any(AttemptReport::is_failed)
    }

    pub fn encoded(&self) -> impl Iterator<Item = (&ClassIdentity, &[u8])> {
        self.attempts.iter().filter_map(AttemptReport::encoded)
    }

    pub fn failures(&self) -> impl Iterator<Item = &AttemptReport> {
        self.attempts.iter().filter(|a| a.is_failed())
    }

    /// Hand every rewritten recipient to `sink`; failed and skipped attempts emit nothing
    pub fn emit(&self, sink: &dyn ArtifactSink) -> anyhow::Result<usize> {
        let mut written = 0;
        for (recipient, bytes) in self.encoded() {
            sink.accept(recipient, bytes)
                .with_context(|| format!("Failed to store rewritten {recipient}"))?;
            written += 1;
        }
        Ok(written)
    }
}
