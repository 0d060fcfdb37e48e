//! Propagator: turns resolved rule statuses into hypotheses.
//!
//! Runs to a fixpoint or an iteration cap, like a forward-chaining rule
//! engine. Writes are idempotent: an iteration counts as a change only when a
//! hypothesis value actually changed.

use crate::knowledge::{KnowledgeBase, RuleId};
use crate::memory::{FactStatus, WorkingMemory};
use crate::reasoning::{ReasoningEvent, ReasoningLog};
use crate::rule::Combinator;
use crate::state::{RuleStateTable, RuleStatus};

/// Outcome of one propagation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Propagation {
    pub iterations: usize,
    /// At least one hypothesis changed.
    pub changed: bool,
    /// The last iteration made no change.
    pub reached_fixpoint: bool,
}

/// Propagate resolved statuses into working memory, up to `max_iterations`.
///
/// - A FIRED rule asserts its action TRUE. A fired AND rule also promotes to
///   TRUE any of its premises the user answered `unknown`.
/// - A BLOCKED or UNCERTAIN AND rule asserts its action FALSE when no other
///   rule concluding the same action is still non-negative. Negative OR rules
///   assert nothing.
pub fn propagate(
    kb: &KnowledgeBase,
    memory: &mut WorkingMemory,
    states: &mut RuleStateTable,
    log: &mut ReasoningLog,
    max_iterations: usize,
) -> Propagation {
    let mut iterations = 0;
    let mut changed = false;
    let mut reached_fixpoint = false;

    for _ in 0..max_iterations {
        iterations += 1;
        let mut changed_this_round = false;

        for id in kb.ids() {
            let round = match states.status(id) {
                RuleStatus::Fired => assert_fired(kb, memory, states, log, id),
                RuleStatus::Blocked | RuleStatus::Uncertain => {
                    refute_failed(kb, memory, states, log, id)
                }
                RuleStatus::Pending | RuleStatus::Evaluating => false,
            };
            changed_this_round |= round;
        }

        if !changed_this_round {
            reached_fixpoint = true;
            break;
        }
        changed = true;
    }

    if !reached_fixpoint {
        tracing::warn!(max_iterations, "propagation stopped at its iteration cap");
    }

    Propagation {
        iterations,
        changed,
        reached_fixpoint,
    }
}

fn assert_fired(
    kb: &KnowledgeBase,
    memory: &mut WorkingMemory,
    states: &mut RuleStateTable,
    log: &mut ReasoningLog,
    id: RuleId,
) -> bool {
    let rule = kb.rule(id);
    let mut changed = false;

    if memory.raw_value(&rule.action) != Some(FactStatus::True)
        && memory.put_hypothesis(&rule.action, FactStatus::True)
    {
        tracing::debug!(fact = %rule.action, rule = %rule.action, "derived");
        log.push(ReasoningEvent::Derived {
            fact: rule.action.clone(),
            rule: rule.action.clone(),
        });
        states.note_condition(kb, &rule.action, FactStatus::True);
        changed = true;
    }

    // Firing counts as retroactive proof of premises answered "unknown".
    if rule.combinator == Combinator::And {
        for cond in &rule.conditions {
            if memory.finding(cond) == Some(FactStatus::Unknown)
                && memory.hypothesis(cond) != Some(FactStatus::True)
            {
                memory.put_hypothesis(cond, FactStatus::True);
                tracing::debug!(fact = %cond, rule = %rule.action, "premise promoted");
                log.push(ReasoningEvent::PremisePromoted {
                    fact: cond.clone(),
                    rule: rule.action.clone(),
                });
                states.note_condition(kb, cond, FactStatus::True);
                changed = true;
            }
        }
    }

    changed
}

fn refute_failed(
    kb: &KnowledgeBase,
    memory: &mut WorkingMemory,
    states: &mut RuleStateTable,
    log: &mut ReasoningLog,
    id: RuleId,
) -> bool {
    let rule = kb.rule(id);
    if rule.combinator != Combinator::And {
        return false;
    }

    let live_alternative = kb
        .deriving_rules(&rule.action)
        .iter()
        .any(|&other| !states.status(other).is_negative());
    if live_alternative || memory.raw_value(&rule.action) == Some(FactStatus::False) {
        return false;
    }

    if !memory.put_hypothesis(&rule.action, FactStatus::False) {
        return false;
    }
    tracing::debug!(fact = %rule.action, rule = %rule.action, "refuted");
    log.push(ReasoningEvent::Refuted {
        fact: rule.action.clone(),
        rule: rule.action.clone(),
    });
    states.note_condition(kb, &rule.action, FactStatus::False);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::evaluate_all;
    use crate::rule::Rule;

    struct Fixture {
        kb: KnowledgeBase,
        memory: WorkingMemory,
        states: RuleStateTable,
        log: ReasoningLog,
    }

    impl Fixture {
        fn new(rules: Vec<Rule>) -> Self {
            let kb = KnowledgeBase::new(rules).unwrap();
            let states = RuleStateTable::new(&kb);
            Self {
                kb,
                memory: WorkingMemory::new(),
                states,
                log: ReasoningLog::new(),
            }
        }

        fn answer(&mut self, fact: &str, status: FactStatus) {
            self.memory.put_finding(fact, status);
        }

        fn step(&mut self) -> Propagation {
            evaluate_all(&self.kb, &self.memory, &mut self.states);
            propagate(
                &self.kb,
                &mut self.memory,
                &mut self.states,
                &mut self.log,
                100,
            )
        }

        fn status(&self, action: &str) -> RuleStatus {
            self.states.status(self.kb.find(action).unwrap())
        }
    }

    #[test]
    fn fired_rule_asserts_action() {
        let mut fx = Fixture::new(vec![Rule::or(["inv_ok", "trade_ok"], "biz_ok")]);
        fx.answer("inv_ok", FactStatus::True);
        let outcome = fx.step();

        assert!(outcome.changed);
        assert!(outcome.reached_fixpoint);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(fx.memory.hypothesis("biz_ok"), Some(FactStatus::True));
        assert_eq!(
            fx.log.events(),
            &[ReasoningEvent::Derived {
                fact: "biz_ok".into(),
                rule: "biz_ok".into()
            }]
        );
    }

    #[test]
    fn blocked_and_rule_refutes_action_and_updates_dependents() {
        let mut fx = Fixture::new(vec![
            Rule::and(["x", "other"], "top"),
            Rule::and(["a", "b"], "x"),
        ]);
        fx.answer("a", FactStatus::False);
        fx.step();

        assert_eq!(fx.status("x"), RuleStatus::Blocked);
        assert_eq!(fx.memory.hypothesis("x"), Some(FactStatus::False));
        let top = fx.kb.find("top").unwrap();
        assert_eq!(fx.states.get(top).checked("x"), Some(FactStatus::False));
    }

    #[test]
    fn negative_or_rule_does_not_refute() {
        let mut fx = Fixture::new(vec![Rule::or(["a", "b"], "x")]);
        fx.answer("a", FactStatus::False);
        fx.answer("b", FactStatus::False);
        let outcome = fx.step();

        assert_eq!(fx.status("x"), RuleStatus::Blocked);
        assert_eq!(fx.memory.hypothesis("x"), None);
        assert!(!outcome.changed);
    }

    #[test]
    fn live_alternative_prevents_refutation() {
        let mut fx = Fixture::new(vec![
            Rule::and(["a"], "dup"),
            Rule::and(["b"], "dup"),
        ]);
        fx.answer("a", FactStatus::False);
        fx.step();
        assert_eq!(fx.memory.hypothesis("dup"), None);

        fx.answer("b", FactStatus::Unknown);
        fx.step();
        assert_eq!(fx.memory.hypothesis("dup"), Some(FactStatus::False));
    }

    #[test]
    fn proven_subgoal_overrides_unknown_answer() {
        let mut fx = Fixture::new(vec![
            Rule::and(["sub", "c"], "top"),
            Rule::and(["a"], "sub"),
        ]);
        // "sub" answered unknown directly, then proven via its own rule.
        fx.answer("sub", FactStatus::Unknown);
        fx.answer("a", FactStatus::True);
        fx.answer("c", FactStatus::True);
        fx.step();
        assert_eq!(fx.status("top"), RuleStatus::Uncertain);
        fx.step();

        assert_eq!(fx.status("top"), RuleStatus::Fired);
        assert_eq!(fx.memory.hypothesis("sub"), Some(FactStatus::True));
        assert_eq!(fx.memory.hypothesis("top"), Some(FactStatus::True));
    }

    #[test]
    fn fired_and_rule_promotes_unknown_premises() {
        let mut fx = Fixture::new(vec![Rule::and(["p", "q"], "x")]);
        fx.answer("p", FactStatus::Unknown);
        fx.answer("q", FactStatus::True);
        // A rule that is already FIRED while one of its premises is still
        // answered "unknown" treats the firing as proof of that premise.
        fx.states.set_status(fx.kb.find("x").unwrap(), RuleStatus::Fired);
        propagate(&fx.kb, &mut fx.memory, &mut fx.states, &mut fx.log, 100);

        assert_eq!(fx.memory.hypothesis("p"), Some(FactStatus::True));
        assert_eq!(fx.memory.hypothesis("q"), None);
        assert!(fx.log.events().contains(&ReasoningEvent::PremisePromoted {
            fact: "p".into(),
            rule: "x".into()
        }));
    }

    #[test]
    fn disagreeing_finding_does_not_spin() {
        let mut fx = Fixture::new(vec![Rule::and(["a"], "x"), Rule::and(["x"], "y")]);
        // The user claimed x is false, but a proves it.
        fx.answer("x", FactStatus::False);
        fx.answer("a", FactStatus::True);
        let outcome = fx.step();

        assert!(outcome.reached_fixpoint);
        assert!(outcome.iterations < 100);
        assert_eq!(fx.memory.raw_value("x"), Some(FactStatus::False));
        assert_eq!(fx.memory.effective_value("x", true), Some(FactStatus::True));
    }

    #[test]
    fn cap_is_respected() {
        let mut fx = Fixture::new(vec![Rule::and(["a"], "x")]);
        fx.answer("a", FactStatus::True);
        evaluate_all(&fx.kb, &fx.memory, &mut fx.states);
        let outcome = propagate(&fx.kb, &mut fx.memory, &mut fx.states, &mut fx.log, 1);
        assert_eq!(outcome.iterations, 1);
        assert!(outcome.changed);
        assert!(!outcome.reached_fixpoint);
    }
}
