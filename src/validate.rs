//! Read-only integrity diagnostics over a rule snapshot.
//!
//! The engine never requires these checks; callers run them before a
//! consultation to catch rule sets the engine would tolerate but that are
//! almost certainly authoring mistakes.

use std::collections::HashMap;
use std::fmt;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;

use crate::knowledge::KnowledgeBase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueKind {
    /// More than one rule concludes the same action.
    DuplicateAction { action: String, count: usize },
    /// Actions that (transitively) derive each other.
    Cycle { path: Vec<String> },
    /// A non-goal rule whose action no rule uses.
    Orphan { action: String },
    NoGoals,
}

impl IssueKind {
    pub fn severity(&self) -> Severity {
        match self {
            Self::DuplicateAction { .. } | Self::Cycle { .. } => Severity::Error,
            Self::Orphan { .. } | Self::NoGoals => Severity::Warning,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub severity: Severity,
    #[serde(flatten)]
    pub kind: IssueKind,
}

impl From<IssueKind> for Issue {
    fn from(kind: IssueKind) -> Self {
        Self {
            severity: kind.severity(),
            kind,
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        match &self.kind {
            IssueKind::DuplicateAction { action, count } => {
                write!(f, "{label}: action \"{action}\" is concluded by {count} rules")
            }
            IssueKind::Cycle { path } => {
                write!(f, "{label}: derivation cycle: {}", path.join(" -> "))
            }
            IssueKind::Orphan { action } => write!(
                f,
                "{label}: \"{action}\" is not a goal and no rule uses it as a condition"
            ),
            IssueKind::NoGoals => write!(f, "{label}: the rule set has no goal rules"),
        }
    }
}

/// Run every check. Issues come out grouped by check, in declaration order.
pub fn check(kb: &KnowledgeBase) -> Vec<Issue> {
    let mut issues: Vec<Issue> = Vec::new();
    issues.extend(duplicate_actions(kb).into_iter().map(Issue::from));
    issues.extend(derivation_cycles(kb).into_iter().map(Issue::from));
    issues.extend(orphans(kb).into_iter().map(Issue::from));
    if kb.goals().is_empty() && !kb.is_empty() {
        issues.push(IssueKind::NoGoals.into());
    }

    tracing::debug!(
        rules = kb.len(),
        errors = issues.iter().filter(|i| i.severity == Severity::Error).count(),
        warnings = issues.iter().filter(|i| i.severity == Severity::Warning).count(),
        "checked rule set"
    );
    issues
}

/// Whether any issue is an error.
pub fn has_errors(issues: &[Issue]) -> bool {
    issues.iter().any(|i| i.severity == Severity::Error)
}

fn duplicate_actions(kb: &KnowledgeBase) -> Vec<IssueKind> {
    let mut seen = Vec::new();
    for rule in kb.rules() {
        let count = kb.deriving_rules(&rule.action).len();
        if count > 1 && !seen.contains(&rule.action.as_str()) {
            seen.push(rule.action.as_str());
        }
    }
    seen.into_iter()
        .map(|action| IssueKind::DuplicateAction {
            action: action.to_string(),
            count: kb.deriving_rules(action).len(),
        })
        .collect()
}

/// Strongly connected components of the action → derived-condition graph.
fn derivation_cycles(kb: &KnowledgeBase) -> Vec<IssueKind> {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();
    let mut order: HashMap<NodeIndex, usize> = HashMap::new();

    for rule in kb.rules() {
        let action = rule.action.as_str();
        if !nodes.contains_key(action) {
            let idx = graph.add_node(action);
            order.insert(idx, order.len());
            nodes.insert(action, idx);
        }
    }
    for rule in kb.rules() {
        let from = nodes[rule.action.as_str()];
        for cond in &rule.conditions {
            if let Some(&to) = nodes.get(cond.as_str()) {
                graph.update_edge(from, to, ());
            }
        }
    }

    let mut cycles: Vec<(usize, Vec<String>)> = tarjan_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .map(|mut scc| {
            scc.sort_by_key(|idx| order[idx]);
            let first = order[&scc[0]];
            let path = scc.iter().map(|idx| graph[*idx].to_string()).collect();
            (first, path)
        })
        .collect();
    cycles.sort_by_key(|(first, _)| *first);
    cycles
        .into_iter()
        .map(|(_, path)| IssueKind::Cycle { path })
        .collect()
}

fn orphans(kb: &KnowledgeBase) -> Vec<IssueKind> {
    let mut seen = Vec::new();
    for rule in kb.rules() {
        if !rule.goal && !kb.is_condition(&rule.action) && !seen.contains(&rule.action.as_str()) {
            seen.push(rule.action.as_str());
        }
    }
    seen.into_iter()
        .map(|action| IssueKind::Orphan {
            action: action.to_string(),
        })
        .collect()
}
