//! Per-step validation outcomes.
//!
//! The pipeline records one outcome per named step instead of folding
//! everything into a single boolean as it goes; that keeps *which* step had
//! to repair something visible. Fatal violations never reach the report —
//! they abort the pipeline as errors.

use serde::Serialize;

/// Outcome of a single validation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    /// The field was already fully valid.
    Valid,
    /// The step had to invent a default, coerce a value, disable an optional
    /// feature, or otherwise assume something. A lint signal, not an error.
    Defaulted,
}

/// One named step and its outcome.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    /// Stable step name.
    pub step: &'static str,
    /// Outcome of the step.
    pub outcome: StepOutcome,
    /// Human-readable detail for defaulted steps.
    pub note: Option<String>,
}

/// Ordered record of a full pipeline run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    records: Vec<StepRecord>,
}

impl ValidationReport {
    /// An empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an outcome.
    pub fn record(&mut self, step: &'static str, outcome: StepOutcome) {
        self.records.push(StepRecord {
            step,
            outcome,
            note: None,
        });
    }

    /// Append an outcome with a note.
    pub fn record_with(&mut self, step: &'static str, outcome: StepOutcome, note: impl Into<String>) {
        self.records.push(StepRecord {
            step,
            outcome,
            note: Some(note.into()),
        });
    }

    /// `true` only when every step was [`StepOutcome::Valid`] — the
    /// configuration was good as-is and nothing had to be repaired.
    #[must_use]
    pub fn clean(&self) -> bool {
        self.records
            .iter()
            .all(|r| r.outcome == StepOutcome::Valid)
    }

    /// All step records, in pipeline order.
    #[must_use]
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    /// Names of the steps that had to repair something.
    pub fn defaulted_steps(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.records
            .iter()
            .filter(|r| r.outcome == StepOutcome::Defaulted)
            .map(|r| r.step)
    }

    /// One line per step, for terminal display.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for record in &self.records {
            let mark = match record.outcome {
                StepOutcome::Valid => "ok",
                StepOutcome::Defaulted => "defaulted",
            };
            out.push_str(&format!("{:<32}{}", record.step, mark));
            if let Some(note) = &record.note {
                out.push_str(&format!("  ({note})"));
            }
            out.push('\n');
        }
        out
    }
}
