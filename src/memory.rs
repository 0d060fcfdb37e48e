//! Working memory: user findings, derived hypotheses, and the answer log.
//!
//! Findings are written only by answers; hypotheses only by propagation.
//! A fact may live in both overlays at once, and [`WorkingMemory::effective_value`]
//! decides which one wins.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A recorded fact value. Absence (no value yet) is modelled as `Option::None`,
/// distinct from an explicit `Unknown` answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactStatus {
    True,
    False,
    Unknown,
}

impl FactStatus {
    /// `True` or `False`, i.e. not `Unknown`.
    pub fn is_definite(self) -> bool {
        matches!(self, Self::True | Self::False)
    }
}

impl From<bool> for FactStatus {
    fn from(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }
}

impl fmt::Display for FactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => write!(f, "true"),
            Self::False => write!(f, "false"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Two fact overlays plus the chronological answer log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingMemory {
    findings: BTreeMap<String, FactStatus>,
    hypotheses: BTreeMap<String, FactStatus>,
    answer_history: Vec<(String, FactStatus)>,
}

impl WorkingMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a user answer and append it to the history.
    pub fn put_finding(&mut self, fact: &str, status: FactStatus) {
        self.findings.insert(fact.to_string(), status);
        self.answer_history.push((fact.to_string(), status));
    }

    /// Record a derived value, overwriting any earlier hypothesis.
    ///
    /// Returns `true` when the stored value actually changed.
    pub fn put_hypothesis(&mut self, fact: &str, status: FactStatus) -> bool {
        self.hypotheses.insert(fact.to_string(), status) != Some(status)
    }

    pub fn finding(&self, fact: &str) -> Option<FactStatus> {
        self.findings.get(fact).copied()
    }

    pub fn hypothesis(&self, fact: &str) -> Option<FactStatus> {
        self.hypotheses.get(fact).copied()
    }

    /// Finding first, then hypothesis.
    pub fn raw_value(&self, fact: &str) -> Option<FactStatus> {
        self.finding(fact).or_else(|| self.hypothesis(fact))
    }

    /// The value rules see.
    ///
    /// For a derived fact a definite hypothesis overrides any finding: once
    /// sub-rules prove or disprove it, a shallower "unknown" (or stale) answer
    /// no longer counts. Otherwise this is [`raw_value`](Self::raw_value).
    pub fn effective_value(&self, fact: &str, is_derived: bool) -> Option<FactStatus> {
        if is_derived {
            if let Some(h) = self.hypothesis(fact).filter(|h| h.is_definite()) {
                return Some(h);
            }
        }
        self.raw_value(fact)
    }

    /// Truncate the history at the first occurrence of `fact` (inclusive),
    /// drop the truncated findings, and clear every hypothesis.
    ///
    /// Returns the removed history entries, oldest first. Nothing changes when
    /// `fact` was never answered.
    pub fn clear_after(&mut self, fact: &str) -> Vec<(String, FactStatus)> {
        let Some(idx) = self.answer_history.iter().position(|(f, _)| f == fact) else {
            return Vec::new();
        };
        let removed = self.answer_history.split_off(idx);
        for (f, _) in &removed {
            self.findings.remove(f);
        }
        self.hypotheses.clear();
        removed
    }

    pub fn answer_history(&self) -> &[(String, FactStatus)] {
        &self.answer_history
    }

    pub fn findings(&self) -> &BTreeMap<String, FactStatus> {
        &self.findings
    }

    pub fn hypotheses(&self) -> &BTreeMap<String, FactStatus> {
        &self.hypotheses
    }

    /// Facts answered `Unknown`, in answer order.
    pub fn unknown_answers(&self) -> Vec<String> {
        self.answer_history
            .iter()
            .filter(|(f, _)| self.finding(f) == Some(FactStatus::Unknown))
            .map(|(f, _)| f.clone())
            .collect()
    }
}
