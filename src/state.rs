//! Per-rule lifecycle state.
//!
//! ```text
//! PENDING → EVALUATING → { FIRED, BLOCKED, UNCERTAIN }
//! ```
//!
//! FIRED and BLOCKED are terminal until a rollback resets the whole table.
//! UNCERTAIN is resolved but may still be upgraded by later answers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::knowledge::{KnowledgeBase, RuleId};
use crate::memory::FactStatus;

/// Lifecycle status of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleStatus {
    /// Not yet looked at.
    #[default]
    Pending,
    /// One of its conditions has been asked. Display only.
    Evaluating,
    /// Conditions satisfied; the conclusion holds.
    Fired,
    /// A condition is false; the conclusion cannot be reached by this rule.
    Blocked,
    /// Every condition answered, but an `Unknown` prevents a decision.
    Uncertain,
}

impl RuleStatus {
    pub fn is_resolved(self) -> bool {
        match self {
            Self::Fired | Self::Blocked | Self::Uncertain => true,
            Self::Pending | Self::Evaluating => false,
        }
    }

    /// Resolved without firing.
    pub fn is_negative(self) -> bool {
        match self {
            Self::Blocked | Self::Uncertain => true,
            Self::Pending | Self::Evaluating | Self::Fired => false,
        }
    }

    /// FIRED or BLOCKED: never reclassified short of a rollback.
    pub fn is_terminal(self) -> bool {
        match self {
            Self::Fired | Self::Blocked => true,
            Self::Pending | Self::Evaluating | Self::Uncertain => false,
        }
    }
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Evaluating => "evaluating",
            Self::Fired => "fired",
            Self::Blocked => "blocked",
            Self::Uncertain => "uncertain",
        };
        f.write_str(s)
    }
}

/// Mutable state of one rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleState {
    pub status: RuleStatus,
    /// Each condition's effective value as of the last evaluation pass, in
    /// condition order. `None` means no value yet.
    pub checked_conditions: Vec<(String, Option<FactStatus>)>,
}

impl RuleState {
    /// Overwrite the snapshot entry for `fact`, if this rule mentions it.
    pub fn note_condition(&mut self, fact: &str, status: FactStatus) {
        for (cond, value) in &mut self.checked_conditions {
            if cond == fact {
                *value = Some(status);
            }
        }
    }

    pub fn checked(&self, fact: &str) -> Option<FactStatus> {
        self.checked_conditions
            .iter()
            .find(|(c, _)| c == fact)
            .and_then(|(_, v)| *v)
    }
}

/// One [`RuleState`] per rule, indexed like the knowledge base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleStateTable {
    states: Vec<RuleState>,
}

impl RuleStateTable {
    /// Every rule at PENDING with an empty snapshot.
    pub fn new(kb: &KnowledgeBase) -> Self {
        Self {
            states: vec![RuleState::default(); kb.len()],
        }
    }

    pub fn get(&self, id: RuleId) -> &RuleState {
        &self.states[id.index()]
    }

    pub fn get_mut(&mut self, id: RuleId) -> &mut RuleState {
        &mut self.states[id.index()]
    }

    pub fn status(&self, id: RuleId) -> RuleStatus {
        self.states[id.index()].status
    }

    pub fn set_status(&mut self, id: RuleId, status: RuleStatus) {
        self.states[id.index()].status = status;
    }

    /// Statuses in declaration order, for change detection.
    pub fn statuses(&self) -> Vec<RuleStatus> {
        self.states.iter().map(|s| s.status).collect()
    }

    /// Back to PENDING with empty snapshots.
    pub fn reset(&mut self) {
        for state in &mut self.states {
            *state = RuleState::default();
        }
    }

    /// Update the snapshot entry for `fact` in every rule that mentions it.
    pub fn note_condition(&mut self, kb: &KnowledgeBase, fact: &str, status: FactStatus) {
        for &id in kb.dependents(fact) {
            self.get_mut(id).note_condition(fact, status);
        }
    }

    /// Move every PENDING rule that mentions `fact` to EVALUATING.
    pub fn mark_evaluating(&mut self, kb: &KnowledgeBase, fact: &str) {
        for &id in kb.dependents(fact) {
            let state = self.get_mut(id);
            if state.status == RuleStatus::Pending {
                state.status = RuleStatus::Evaluating;
            }
        }
    }
}
