//! Evaluator: recomputes rule statuses from working memory.
//!
//! One pass visits every rule in declaration order, refreshes its condition
//! snapshot, and classifies it under AND/OR semantics. Rules already FIRED or
//! BLOCKED keep their status; undecidable rules keep whatever they had.

use crate::knowledge::{KnowledgeBase, RuleId};
use crate::memory::{FactStatus, WorkingMemory};
use crate::rule::{Combinator, Rule};
use crate::state::{RuleStateTable, RuleStatus};

/// Run one evaluation pass over every rule. Returns how many statuses changed.
pub fn evaluate_all(kb: &KnowledgeBase, memory: &WorkingMemory, states: &mut RuleStateTable) -> usize {
    let mut changed = 0;
    for id in kb.ids() {
        if evaluate_rule(kb, memory, states, id) {
            changed += 1;
        }
    }
    changed
}

/// Evaluate a single rule. Returns `true` when its status changed.
pub fn evaluate_rule(
    kb: &KnowledgeBase,
    memory: &WorkingMemory,
    states: &mut RuleStateTable,
    id: RuleId,
) -> bool {
    let rule = kb.rule(id);
    let values: Vec<Option<FactStatus>> = rule
        .conditions
        .iter()
        .map(|c| memory.effective_value(c, kb.is_derived(c)))
        .collect();

    states.get_mut(id).checked_conditions = rule
        .conditions
        .iter()
        .cloned()
        .zip(values.iter().copied())
        .collect();

    let current = states.status(id);
    if current.is_terminal() {
        return false;
    }

    let next = match rule.combinator {
        Combinator::And => classify_and(&values),
        Combinator::Or => classify_or(kb, states, rule, &values),
    };

    match next {
        Some(next) if next != current => {
            tracing::debug!(rule = %rule.action, from = %current, to = %next, "rule status changed");
            states.set_status(id, next);
            true
        }
        _ => false,
    }
}

/// AND: all TRUE fires, any FALSE blocks, fully answered with an UNKNOWN is
/// uncertain. Anything else is undecided (`None`).
pub fn classify_and(values: &[Option<FactStatus>]) -> Option<RuleStatus> {
    if values.iter().all(|v| *v == Some(FactStatus::True)) {
        return Some(RuleStatus::Fired);
    }
    if values.contains(&Some(FactStatus::False)) {
        return Some(RuleStatus::Blocked);
    }
    let all_answered = values.iter().all(Option::is_some);
    if all_answered && values.contains(&Some(FactStatus::Unknown)) {
        return Some(RuleStatus::Uncertain);
    }
    None
}

/// OR: any TRUE fires. Otherwise the rule is decided only once every condition
/// is resolved negative; an UNKNOWN derived condition whose deriving rules are
/// still unresolved may yet become TRUE and keeps the rule undecided.
pub fn classify_or(
    kb: &KnowledgeBase,
    states: &RuleStateTable,
    rule: &Rule,
    values: &[Option<FactStatus>],
) -> Option<RuleStatus> {
    if values.contains(&Some(FactStatus::True)) {
        return Some(RuleStatus::Fired);
    }

    let mut has_unknown = false;
    for (condition, value) in rule.conditions.iter().zip(values) {
        match value {
            None => return None,
            Some(FactStatus::True) | Some(FactStatus::False) => {}
            Some(FactStatus::Unknown) => {
                has_unknown = true;
                let reachable = kb
                    .deriving_rules(condition)
                    .iter()
                    .any(|&d| !states.status(d).is_resolved());
                if reachable {
                    return None;
                }
            }
        }
    }

    Some(if has_unknown {
        RuleStatus::Uncertain
    } else {
        RuleStatus::Blocked
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Option<FactStatus> = Some(FactStatus::True);
    const F: Option<FactStatus> = Some(FactStatus::False);
    const U: Option<FactStatus> = Some(FactStatus::Unknown);
    const A: Option<FactStatus> = None;

    fn single(rule: Rule) -> (KnowledgeBase, RuleStateTable) {
        let kb = KnowledgeBase::new(vec![rule]).unwrap();
        let states = RuleStateTable::new(&kb);
        (kb, states)
    }

    #[test]
    fn and_truth_table() {
        assert_eq!(classify_and(&[T, T]), Some(RuleStatus::Fired));
        assert_eq!(classify_and(&[T, F]), Some(RuleStatus::Blocked));
        assert_eq!(classify_and(&[F, A]), Some(RuleStatus::Blocked));
        assert_eq!(classify_and(&[U, F]), Some(RuleStatus::Blocked));
        assert_eq!(classify_and(&[U, T]), Some(RuleStatus::Uncertain));
        assert_eq!(classify_and(&[U, A]), None);
        assert_eq!(classify_and(&[T, A]), None);
    }

    #[test]
    fn or_truth_table_on_base_conditions() {
        let (kb, states) = single(Rule::or(["a", "b"], "x"));
        let rule = kb.rule(RuleId(0));
        let or = |values: &[Option<FactStatus>]| classify_or(&kb, &states, rule, values);

        assert_eq!(or(&[F, T]), Some(RuleStatus::Fired));
        assert_eq!(or(&[T, A]), Some(RuleStatus::Fired));
        assert_eq!(or(&[F, F]), Some(RuleStatus::Blocked));
        assert_eq!(or(&[U, U]), Some(RuleStatus::Uncertain));
        assert_eq!(or(&[U, F]), Some(RuleStatus::Uncertain));
        assert_eq!(or(&[F, A]), None);
    }

    #[test]
    fn or_waits_on_unresolved_derivation() {
        let kb = KnowledgeBase::new(vec![
            Rule::or(["sub", "b"], "x"),
            Rule::and(["c", "d"], "sub"),
        ])
        .unwrap();
        let mut states = RuleStateTable::new(&kb);
        let rule = kb.rule(RuleId(0));

        assert_eq!(classify_or(&kb, &states, rule, &[U, F]), None);

        states.set_status(RuleId(1), RuleStatus::Uncertain);
        assert_eq!(
            classify_or(&kb, &states, rule, &[U, F]),
            Some(RuleStatus::Uncertain)
        );
    }

    #[test]
    fn evaluate_refreshes_snapshot_and_status() {
        let (kb, mut states) = single(Rule::and(["a", "b"], "x"));
        let mut wm = WorkingMemory::new();
        wm.put_finding("a", FactStatus::True);

        assert_eq!(evaluate_all(&kb, &wm, &mut states), 0);
        assert_eq!(states.status(RuleId(0)), RuleStatus::Pending);
        assert_eq!(states.get(RuleId(0)).checked("a"), Some(FactStatus::True));
        assert_eq!(states.get(RuleId(0)).checked("b"), None);

        wm.put_finding("b", FactStatus::True);
        assert_eq!(evaluate_all(&kb, &wm, &mut states), 1);
        assert_eq!(states.status(RuleId(0)), RuleStatus::Fired);
    }

    #[test]
    fn terminal_status_is_sticky() {
        let (kb, mut states) = single(Rule::and(["a"], "x"));
        let mut wm = WorkingMemory::new();
        wm.put_finding("a", FactStatus::False);
        evaluate_all(&kb, &wm, &mut states);
        assert_eq!(states.status(RuleId(0)), RuleStatus::Blocked);

        // Even if memory is tampered with, a blocked rule stays blocked.
        let mut other = WorkingMemory::new();
        other.put_finding("a", FactStatus::True);
        assert_eq!(evaluate_all(&kb, &other, &mut states), 0);
        assert_eq!(states.status(RuleId(0)), RuleStatus::Blocked);
        assert_eq!(states.get(RuleId(0)).checked("a"), Some(FactStatus::True));
    }

    #[test]
    fn uncertain_can_still_fire() {
        let (kb, mut states) = single(Rule::and(["a", "b"], "x"));
        let mut wm = WorkingMemory::new();
        wm.put_finding("a", FactStatus::Unknown);
        wm.put_finding("b", FactStatus::True);
        evaluate_all(&kb, &wm, &mut states);
        assert_eq!(states.status(RuleId(0)), RuleStatus::Uncertain);

        let mut upgraded = WorkingMemory::new();
        upgraded.put_finding("a", FactStatus::True);
        upgraded.put_finding("b", FactStatus::True);
        evaluate_all(&kb, &upgraded, &mut states);
        assert_eq!(states.status(RuleId(0)), RuleStatus::Fired);
    }
}
