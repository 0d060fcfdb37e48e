//! Caller-facing views: rule display rows, outcomes, and the result summary.
//!
//! Everything here is a plain serializable snapshot built from engine state;
//! none of it holds references back into the engine.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::engine::DialoguePhase;
use crate::knowledge::{KnowledgeBase, RuleId};
use crate::memory::{FactStatus, WorkingMemory};
use crate::reasoning::ReasoningLog;
use crate::rule::Combinator;
use crate::state::{RuleStateTable, RuleStatus};

// ---------------------------------------------------------------------------
// Rule display
// ---------------------------------------------------------------------------

/// Display status of one condition, as of the last evaluation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
    /// No value yet.
    Unchecked,
}

impl From<Option<FactStatus>> for ConditionStatus {
    fn from(value: Option<FactStatus>) -> Self {
        match value {
            Some(FactStatus::True) => Self::True,
            Some(FactStatus::False) => Self::False,
            Some(FactStatus::Unknown) => Self::Unknown,
            None => Self::Unchecked,
        }
    }
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => write!(f, "true"),
            Self::False => write!(f, "false"),
            Self::Unknown => write!(f, "unknown"),
            Self::Unchecked => write!(f, "unchecked"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConditionDisplay {
    pub text: String,
    pub status: ConditionStatus,
    pub is_derived: bool,
}

/// One rule as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleDisplay {
    pub id: RuleId,
    pub conclusion: String,
    pub category: String,
    pub combinator: Combinator,
    pub is_goal: bool,
    pub conditions: Vec<ConditionDisplay>,
    pub status: RuleStatus,
}

/// Every rule, ordered by category rank then declaration order.
pub fn rules_display(kb: &KnowledgeBase, states: &RuleStateTable) -> Vec<RuleDisplay> {
    kb.display_order()
        .into_iter()
        .map(|id| {
            let rule = kb.rule(id);
            let state = states.get(id);
            let conditions = rule
                .conditions
                .iter()
                .map(|cond| ConditionDisplay {
                    text: cond.clone(),
                    status: state.checked(cond).into(),
                    is_derived: kb.is_derived(cond),
                })
                .collect();
            RuleDisplay {
                id,
                conclusion: rule.action.clone(),
                category: rule.category.clone(),
                combinator: rule.combinator,
                is_goal: rule.goal,
                conditions,
                status: state.status,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Result summary
// ---------------------------------------------------------------------------

/// A goal that holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub action: String,
    pub category: String,
}

/// A goal that might hold, pending the listed unknown conditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConditionalOutcome {
    pub action: String,
    pub category: String,
    pub unknown_conditions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsultationResult {
    pub applicable: Vec<Outcome>,
    pub conditional: Vec<ConditionalOutcome>,
    /// Facts the user answered `unknown`, in answer order.
    pub unknown_answers: Vec<String>,
    pub reasoning_log: Vec<String>,
}

impl ConsultationResult {
    pub fn is_applicable(&self, action: &str) -> bool {
        self.applicable.iter().any(|o| o.action == action)
    }

    pub fn conditional_on(&self, action: &str) -> Option<&[String]> {
        self.conditional
            .iter()
            .find(|o| o.action == action)
            .map(|o| o.unknown_conditions.as_slice())
    }
}

/// Summarize goal outcomes.
///
/// FIRED goals are applicable. Goals neither FIRED nor BLOCKED with at least
/// one condition effectively `unknown` are conditional. Everything else is
/// left out.
pub fn summarize(
    kb: &KnowledgeBase,
    memory: &WorkingMemory,
    states: &RuleStateTable,
    log: &ReasoningLog,
) -> ConsultationResult {
    let mut applicable = Vec::new();
    let mut conditional = Vec::new();

    for &goal in kb.goals() {
        let rule = kb.rule(goal);
        match states.status(goal) {
            RuleStatus::Fired => applicable.push(Outcome {
                action: rule.action.clone(),
                category: rule.category.clone(),
            }),
            RuleStatus::Blocked => {}
            RuleStatus::Pending | RuleStatus::Evaluating | RuleStatus::Uncertain => {
                let unknown_conditions: Vec<String> = rule
                    .conditions
                    .iter()
                    .filter(|c| {
                        memory.effective_value(c, kb.is_derived(c)) == Some(FactStatus::Unknown)
                    })
                    .cloned()
                    .collect();
                if !unknown_conditions.is_empty() {
                    conditional.push(ConditionalOutcome {
                        action: rule.action.clone(),
                        category: rule.category.clone(),
                        unknown_conditions,
                    });
                }
            }
        }
    }

    ConsultationResult {
        applicable,
        conditional,
        unknown_answers: memory.unknown_answers(),
        reasoning_log: log.lines(),
    }
}

// ---------------------------------------------------------------------------
// Operation outcomes
// ---------------------------------------------------------------------------

/// One entry of the answer history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnsweredFact {
    pub fact: String,
    pub answer: FactStatus,
}

pub fn answered_history(memory: &WorkingMemory) -> Vec<AnsweredFact> {
    memory
        .answer_history()
        .iter()
        .map(|(fact, answer)| AnsweredFact {
            fact: fact.clone(),
            answer: *answer,
        })
        .collect()
}

/// Returned by `Engine::answer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerOutcome {
    pub next_question: Option<String>,
    pub is_complete: bool,
    /// Every hypothesis currently held.
    pub derived_facts: BTreeMap<String, FactStatus>,
    pub rules_display: Vec<RuleDisplay>,
    /// Present once the dialogue is complete.
    pub result: Option<ConsultationResult>,
    /// The raw token, when it was outside the answer vocabulary.
    pub normalized_from: Option<String>,
}

/// Returned by `Engine::go_back`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackOutcome {
    pub current_question: Option<String>,
    pub answered_history: Vec<AnsweredFact>,
    pub rules_display: Vec<RuleDisplay>,
}

/// Read-only view of a dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateSnapshot {
    pub phase: DialoguePhase,
    pub current_question: Option<String>,
    pub answered_history: Vec<AnsweredFact>,
    pub derived_facts: BTreeMap<String, FactStatus>,
    pub rules_display: Vec<RuleDisplay>,
    pub is_complete: bool,
    pub result: Option<ConsultationResult>,
}
