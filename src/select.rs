//! Question selector: backward chaining from goals to the next question.
//!
//! Leftmost depth-first over the AND/OR goal forest: ask the earliest
//! unresolved premise of the earliest unresolved goal, descending into the
//! rules behind an `unknown` derived premise before moving to the next one.
//! The traversal carries the set of rules currently on the search path (a
//! rule already on the path is not re-entered) and is bounded in depth.

use std::collections::HashSet;

use crate::knowledge::{KnowledgeBase, RuleId};
use crate::memory::{FactStatus, WorkingMemory};
use crate::rule::Combinator;
use crate::state::RuleStateTable;

/// The next fact to ask about, or `None` when no goal needs more input.
///
/// FIRED and BLOCKED goals are skipped; UNCERTAIN goals are not, since a
/// proven sub-goal may still resolve them.
pub fn next_question(
    kb: &KnowledgeBase,
    memory: &WorkingMemory,
    states: &RuleStateTable,
    max_depth: usize,
) -> Option<String> {
    for &goal in kb.goals() {
        if states.status(goal).is_terminal() {
            continue;
        }
        let mut search = Search {
            kb,
            memory,
            states,
            max_depth,
            on_path: HashSet::new(),
        };
        if let Some(question) = search.find(goal, 0) {
            tracing::debug!(question, goal = %kb.rule(goal).action, "selected question");
            return Some(question.to_string());
        }
    }
    None
}

/// The question reachable from a single rule, ignoring goal order.
pub fn question_for_rule(
    kb: &KnowledgeBase,
    memory: &WorkingMemory,
    states: &RuleStateTable,
    rule: RuleId,
    max_depth: usize,
) -> Option<String> {
    let mut search = Search {
        kb,
        memory,
        states,
        max_depth,
        on_path: HashSet::new(),
    };
    search.find(rule, 0).map(str::to_string)
}

struct Search<'a> {
    kb: &'a KnowledgeBase,
    memory: &'a WorkingMemory,
    states: &'a RuleStateTable,
    max_depth: usize,
    on_path: HashSet<RuleId>,
}

impl<'a> Search<'a> {
    fn find(&mut self, id: RuleId, depth: usize) -> Option<&'a str> {
        if depth > self.max_depth {
            tracing::warn!(
                rule = %self.kb.rule(id).action,
                max_depth = self.max_depth,
                "question search exceeded its depth bound"
            );
            return None;
        }
        if self.states.status(id).is_terminal() || !self.on_path.insert(id) {
            return None;
        }
        let found = self.scan(id, depth);
        self.on_path.remove(&id);
        found
    }

    fn scan(&mut self, id: RuleId, depth: usize) -> Option<&'a str> {
        let kb = self.kb;
        let rule = kb.rule(id);

        for cond in &rule.conditions {
            let derived = kb.is_derived(cond);
            match self.memory.effective_value(cond, derived) {
                None => return Some(cond.as_str()),
                Some(FactStatus::Unknown) if derived => {
                    for &sub in kb.deriving_rules(cond) {
                        if self.states.status(sub).is_terminal() {
                            continue;
                        }
                        if let Some(question) = self.find(sub, depth + 1) {
                            return Some(question);
                        }
                    }
                }
                // Already answered "unknown"; nothing more to ask here.
                Some(FactStatus::Unknown) => {}
                Some(FactStatus::False) => {
                    if rule.combinator == Combinator::And {
                        return None;
                    }
                }
                Some(FactStatus::True) => {
                    if rule.combinator == Combinator::Or {
                        return None;
                    }
                }
            }
        }
        None
    }
}
