//! Reasoning log: the human-readable trail of a dialogue.
//!
//! Separate from `tracing` output: these events are part of the result
//! summary handed back to the caller.

use std::fmt;

use serde::Serialize;

use crate::memory::FactStatus;

/// A single answer or derivation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReasoningEvent {
    Started { goals: usize },
    Seeded { fact: String, value: FactStatus },
    Answered { fact: String, value: FactStatus },
    /// An answer token outside the closed vocabulary was read as `unknown`.
    AnswerNormalized { fact: String, token: String },
    /// A fired rule established its conclusion.
    Derived { fact: String, rule: String },
    /// A fired AND rule overrode an `unknown` answer for one of its premises.
    PremisePromoted { fact: String, rule: String },
    /// A failed AND rule, with no live alternative, refuted its conclusion.
    Refuted { fact: String, rule: String },
    RolledBack { fact: String, steps: usize },
    /// The evaluate/propagate loop stopped at its cap without settling.
    CapReached { passes: usize },
    Completed { applicable: usize, conditional: usize },
}

impl fmt::Display for ReasoningEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started { goals } => {
                write!(f, "Consultation started: evaluating {goals} goal(s) in parallel.")
            }
            Self::Seeded { fact, value } => write!(f, "Initial fact: \"{fact}\" -> {value}"),
            Self::Answered { fact, value } => write!(f, "Answer: \"{fact}\" -> {value}"),
            Self::AnswerNormalized { fact, token } => {
                write!(f, "Answer for \"{fact}\" was \"{token}\"; treated as unknown")
            }
            Self::Derived { fact, rule } => {
                write!(f, "Derived: \"{fact}\" (rule \"{rule}\" fired)")
            }
            Self::PremisePromoted { fact, rule } => write!(
                f,
                "Inferred: \"{fact}\" -> true (premise of fired rule \"{rule}\")"
            ),
            Self::Refuted { fact, rule } => {
                write!(f, "Refuted: \"{fact}\" (rule \"{rule}\" cannot fire)")
            }
            Self::RolledBack { fact, steps } => {
                write!(f, "Went back {steps} step(s) to \"{fact}\"")
            }
            Self::CapReached { passes } => write!(
                f,
                "Stopped after {passes} evaluation pass(es) without reaching a fixpoint"
            ),
            Self::Completed {
                applicable,
                conditional,
            } => write!(
                f,
                "Consultation complete: {applicable} applicable, {conditional} conditional"
            ),
        }
    }
}

/// Ordered list of reasoning events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ReasoningLog {
    events: Vec<ReasoningEvent>,
}

impl ReasoningLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: ReasoningEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[ReasoningEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Rendered lines, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.events.iter().map(ToString::to_string).collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
