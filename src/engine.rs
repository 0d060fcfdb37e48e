//! Engine facade: one consultation dialogue over a shared rule snapshot.
//!
//! The `Engine` owns the working memory, the rule state table, and the
//! reasoning log for exactly one dialogue. It drives the
//! answer → evaluate/propagate → ask loop and implements rollback.
//!
//! ```text
//! Idle --start--> AwaitingAnswer <--answer/go_back--> Processing
//!                       |                                 |
//!                       +------------ Complete <----------+
//! ```

use std::sync::Arc;

use serde::Serialize;

use crate::answer::AnswerValue;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::evaluate::evaluate_all;
use crate::knowledge::KnowledgeBase;
use crate::memory::{FactStatus, WorkingMemory};
use crate::propagate::propagate;
use crate::reasoning::{ReasoningEvent, ReasoningLog};
use crate::report::{
    self, AnswerOutcome, ConsultationResult, RollbackOutcome, RuleDisplay, StateSnapshot,
};
use crate::select::next_question;
use crate::state::{RuleStateTable, RuleStatus};

/// Where a dialogue stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DialoguePhase {
    /// Not started; initial facts may still be seeded.
    Idle,
    AwaitingAnswer,
    /// Transient, while an answer or rollback is being applied.
    Processing,
    /// The selector has no further question.
    Complete,
}

/// A single consultation.
///
/// Operations run to completion before returning. A rejected operation
/// returns an [`EngineError`] and leaves the engine untouched.
#[derive(Debug, Clone)]
pub struct Engine {
    kb: Arc<KnowledgeBase>,
    config: EngineConfig,
    memory: WorkingMemory,
    states: RuleStateTable,
    log: ReasoningLog,
    current_question: Option<String>,
    phase: DialoguePhase,
}

impl Engine {
    /// Create an idle engine with every rule PENDING and empty memory.
    pub fn new(kb: Arc<KnowledgeBase>, config: EngineConfig) -> Self {
        let states = RuleStateTable::new(&kb);
        Self {
            kb,
            config,
            memory: WorkingMemory::new(),
            states,
            log: ReasoningLog::new(),
            current_question: None,
            phase: DialoguePhase::Idle,
        }
    }

    // -----------------------------------------------------------------------
    // Dialogue operations
    // -----------------------------------------------------------------------

    /// Pre-seed a finding before the dialogue starts.
    ///
    /// Seeds enter the answer history like any answer, so they can be rewound.
    pub fn seed(&mut self, fact: &str, value: bool) -> EngineResult<()> {
        if self.phase != DialoguePhase::Idle {
            return Err(EngineError::SeedAfterStart {
                fact: fact.to_string(),
            });
        }
        self.check_answerable(fact)?;

        let status = FactStatus::from(value);
        self.memory.put_finding(fact, status);
        self.log.push(ReasoningEvent::Seeded {
            fact: fact.to_string(),
            value: status,
        });
        tracing::debug!(fact, value = %status, "seeded fact");
        Ok(())
    }

    /// Converge the seeded facts and ask the first question.
    pub fn start(&mut self) -> EngineResult<Option<String>> {
        if self.phase != DialoguePhase::Idle {
            return Err(EngineError::AlreadyStarted);
        }
        Ok(self.begin())
    }

    /// Record an answer and advance the dialogue.
    ///
    /// `fact` may be any rule condition, not only the current question.
    pub fn answer(&mut self, fact: &str, value: AnswerValue) -> EngineResult<AnswerOutcome> {
        self.apply_answer(fact, value, None)
    }

    /// Like [`answer`](Self::answer), for a free-form token. Tokens outside
    /// the vocabulary are read as `unknown`, and the outcome reports the
    /// raw token in `normalized_from`.
    pub fn answer_token(&mut self, fact: &str, token: &str) -> EngineResult<AnswerOutcome> {
        let parsed = AnswerValue::parse_token(token);
        let normalized_from = parsed.normalized.then(|| token.to_string());
        self.apply_answer(fact, parsed.value, normalized_from)
    }

    /// Rewind `steps` answers.
    ///
    /// The rewound fact becomes the current question again. Every rule is
    /// reset to PENDING and recomputed with a single evaluate/propagate pass.
    pub fn go_back(&mut self, steps: usize) -> EngineResult<RollbackOutcome> {
        if self.phase == DialoguePhase::Idle {
            return Err(EngineError::NotStarted);
        }
        let answered = self.memory.answer_history().len();
        if steps == 0 || steps > answered {
            return Err(EngineError::RollbackOutOfRange { steps, answered });
        }

        self.phase = DialoguePhase::Processing;
        let target_index = answered - steps;
        let asked: Vec<String> = self.memory.answer_history()[..=target_index]
            .iter()
            .map(|(fact, _)| fact.clone())
            .collect();
        let target = asked[target_index].clone();

        self.memory.clear_after(&target);
        self.states.reset();
        evaluate_all(&self.kb, &self.memory, &mut self.states);
        propagate(
            &self.kb,
            &mut self.memory,
            &mut self.states,
            &mut self.log,
            self.config.max_propagation_iterations,
        );
        for fact in &asked {
            self.states.mark_evaluating(&self.kb, fact);
        }

        self.log.push(ReasoningEvent::RolledBack {
            fact: target.clone(),
            steps,
        });
        tracing::info!(fact = %target, steps, "rolled back");

        self.current_question = Some(target);
        self.phase = DialoguePhase::AwaitingAnswer;

        Ok(RollbackOutcome {
            current_question: self.current_question.clone(),
            answered_history: report::answered_history(&self.memory),
            rules_display: self.rules_display(),
        })
    }

    /// Discard everything, seeds included, and start a fresh dialogue.
    pub fn restart(&mut self) -> Option<String> {
        self.memory = WorkingMemory::new();
        self.states.reset();
        self.log.clear();
        self.current_question = None;
        self.phase = DialoguePhase::Idle;
        tracing::info!("consultation restarted");
        self.begin()
    }

    // -----------------------------------------------------------------------
    // Read-only views
    // -----------------------------------------------------------------------

    /// Snapshot of the dialogue. Never mutates.
    pub fn current_state(&self) -> StateSnapshot {
        let is_complete = self.is_complete();
        StateSnapshot {
            phase: self.phase,
            current_question: self.current_question.clone(),
            answered_history: report::answered_history(&self.memory),
            derived_facts: self.memory.hypotheses().clone(),
            rules_display: self.rules_display(),
            is_complete,
            result: is_complete.then(|| self.generate_result()),
        }
    }

    pub fn generate_result(&self) -> ConsultationResult {
        report::summarize(&self.kb, &self.memory, &self.states, &self.log)
    }

    pub fn rules_display(&self) -> Vec<RuleDisplay> {
        report::rules_display(&self.kb, &self.states)
    }

    /// Status of the first rule concluding `action`.
    pub fn rule_status(&self, action: &str) -> Option<RuleStatus> {
        self.kb.find(action).map(|id| self.states.status(id))
    }

    pub fn phase(&self) -> DialoguePhase {
        self.phase
    }

    pub fn is_complete(&self) -> bool {
        self.phase == DialoguePhase::Complete
    }

    pub fn current_question(&self) -> Option<&str> {
        self.current_question.as_deref()
    }

    pub fn memory(&self) -> &WorkingMemory {
        &self.memory
    }

    pub fn states(&self) -> &RuleStateTable {
        &self.states
    }

    pub fn log(&self) -> &ReasoningLog {
        &self.log
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeBase> {
        &self.kb
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn begin(&mut self) -> Option<String> {
        self.phase = DialoguePhase::Processing;
        self.log.push(ReasoningEvent::Started {
            goals: self.kb.goals().len(),
        });
        tracing::info!(
            rules = self.kb.len(),
            goals = self.kb.goals().len(),
            seeds = self.memory.answer_history().len(),
            "consultation started"
        );
        self.converge();
        self.ask();
        self.current_question.clone()
    }

    fn apply_answer(
        &mut self,
        fact: &str,
        value: AnswerValue,
        normalized_from: Option<String>,
    ) -> EngineResult<AnswerOutcome> {
        match self.phase {
            DialoguePhase::AwaitingAnswer => {}
            DialoguePhase::Idle => return Err(EngineError::NotStarted),
            DialoguePhase::Processing | DialoguePhase::Complete => {
                return Err(EngineError::NoPendingQuestion);
            }
        }
        self.check_answerable(fact)?;

        self.phase = DialoguePhase::Processing;
        if let Some(token) = &normalized_from {
            tracing::warn!(fact, token = %token, "answer token outside vocabulary, treated as unknown");
            self.log.push(ReasoningEvent::AnswerNormalized {
                fact: fact.to_string(),
                token: token.clone(),
            });
        }

        let status = FactStatus::from(value);
        self.memory.put_finding(fact, status);
        self.log.push(ReasoningEvent::Answered {
            fact: fact.to_string(),
            value: status,
        });
        tracing::debug!(fact, value = %status, "answer recorded");

        self.converge();
        self.ask();

        let is_complete = self.is_complete();
        Ok(AnswerOutcome {
            next_question: self.current_question.clone(),
            is_complete,
            derived_facts: self.memory.hypotheses().clone(),
            rules_display: self.rules_display(),
            result: is_complete.then(|| self.generate_result()),
            normalized_from,
        })
    }

    fn check_answerable(&self, fact: &str) -> EngineResult<()> {
        if !self.kb.is_condition(fact) {
            return Err(EngineError::UnknownFact {
                fact: fact.to_string(),
            });
        }
        if self.memory.finding(fact).is_some() {
            return Err(EngineError::AlreadyAnswered {
                fact: fact.to_string(),
            });
        }
        Ok(())
    }

    /// Alternate evaluation and propagation until neither changes anything,
    /// or the pass cap is reached. Returns the number of passes run.
    fn converge(&mut self) -> usize {
        let max_passes = self.config.max_evaluation_passes;
        for pass in 1..=max_passes {
            let reclassified = evaluate_all(&self.kb, &self.memory, &mut self.states);
            let propagation = propagate(
                &self.kb,
                &mut self.memory,
                &mut self.states,
                &mut self.log,
                self.config.max_propagation_iterations,
            );
            if reclassified == 0 && !propagation.changed {
                return pass;
            }
        }

        tracing::warn!(passes = max_passes, "evaluation stopped at its pass cap");
        self.log.push(ReasoningEvent::CapReached { passes: max_passes });
        max_passes
    }

    /// Pick the next question, or complete the dialogue when there is none.
    fn ask(&mut self) {
        self.current_question = next_question(
            &self.kb,
            &self.memory,
            &self.states,
            self.config.max_question_depth,
        );
        match &self.current_question {
            Some(fact) => {
                self.states.mark_evaluating(&self.kb, fact);
                self.phase = DialoguePhase::AwaitingAnswer;
            }
            None => {
                let summary = self.generate_result();
                self.log.push(ReasoningEvent::Completed {
                    applicable: summary.applicable.len(),
                    conditional: summary.conditional.len(),
                });
                tracing::info!(
                    applicable = summary.applicable.len(),
                    conditional = summary.conditional.len(),
                    "consultation complete"
                );
                self.phase = DialoguePhase::Complete;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Rule;

    fn visa_engine() -> Engine {
        let kb = KnowledgeBase::new(vec![
            Rule::and(["nat_match", "biz_ok"], "E_ok").as_goal(),
            Rule::or(["inv_ok", "trade_ok"], "biz_ok"),
        ])
        .unwrap();
        Engine::new(Arc::new(kb), EngineConfig::default())
    }

    #[test]
    fn operations_before_start_are_rejected() {
        let mut engine = visa_engine();
        assert_eq!(
            engine.answer("nat_match", AnswerValue::Yes).unwrap_err(),
            EngineError::NotStarted
        );
        assert_eq!(engine.go_back(1).unwrap_err(), EngineError::NotStarted);
        assert_eq!(engine.phase(), DialoguePhase::Idle);
    }

    #[test]
    fn start_asks_first_question_once() {
        let mut engine = visa_engine();
        assert_eq!(engine.start().unwrap().as_deref(), Some("nat_match"));
        assert_eq!(engine.phase(), DialoguePhase::AwaitingAnswer);
        assert_eq!(engine.rule_status("E_ok"), Some(RuleStatus::Evaluating));
        assert_eq!(engine.start().unwrap_err(), EngineError::AlreadyStarted);
    }

    #[test]
    fn rejected_answers_do_not_mutate() {
        let mut engine = visa_engine();
        engine.start().unwrap();
        let before = engine.current_state();

        assert_eq!(
            engine.answer("E_ok", AnswerValue::Yes).unwrap_err(),
            EngineError::UnknownFact {
                fact: "E_ok".into()
            }
        );
        engine.answer("nat_match", AnswerValue::Yes).unwrap();
        let mid = engine.current_state();
        assert_eq!(
            engine.answer("nat_match", AnswerValue::No).unwrap_err(),
            EngineError::AlreadyAnswered {
                fact: "nat_match".into()
            }
        );
        assert_eq!(engine.current_state(), mid);
        assert_ne!(before, mid);
    }

    #[test]
    fn seeds_converge_before_first_question() {
        let mut engine = visa_engine();
        engine.seed("nat_match", true).unwrap();
        engine.seed("trade_ok", true).unwrap();
        assert_eq!(engine.start().unwrap(), None);
        assert!(engine.is_complete());
        assert!(engine.generate_result().is_applicable("E_ok"));
        assert_eq!(
            engine.seed("inv_ok", false).unwrap_err(),
            EngineError::SeedAfterStart {
                fact: "inv_ok".into()
            }
        );
    }

    #[test]
    fn restart_discards_seeds() {
        let mut engine = visa_engine();
        engine.seed("nat_match", false).unwrap();
        assert_eq!(engine.start().unwrap(), None);

        assert_eq!(engine.restart().as_deref(), Some("nat_match"));
        assert!(engine.memory().answer_history().is_empty());
        assert_eq!(engine.phase(), DialoguePhase::AwaitingAnswer);
        assert_eq!(engine.rule_status("E_ok"), Some(RuleStatus::Evaluating));
    }

    #[test]
    fn complete_dialogue_rejects_further_answers() {
        let mut engine = visa_engine();
        engine.start().unwrap();
        let outcome = engine.answer("nat_match", AnswerValue::No).unwrap();
        assert!(outcome.is_complete);
        assert!(outcome.result.is_some());
        assert_eq!(
            engine.answer("inv_ok", AnswerValue::Yes).unwrap_err(),
            EngineError::NoPendingQuestion
        );
    }

    #[test]
    fn normalized_token_is_reported() {
        let mut engine = visa_engine();
        engine.start().unwrap();
        let outcome = engine.answer_token("nat_match", "perhaps").unwrap();
        assert_eq!(outcome.normalized_from.as_deref(), Some("perhaps"));
        assert_eq!(
            engine.memory().finding("nat_match"),
            Some(FactStatus::Unknown)
        );
        assert!(engine.log().events().contains(&ReasoningEvent::AnswerNormalized {
            fact: "nat_match".into(),
            token: "perhaps".into()
        }));

        let outcome = engine.answer_token("biz_ok", "YES").unwrap();
        assert_eq!(outcome.normalized_from, None);
    }

    #[test]
    fn go_back_validates_range() {
        let mut engine = visa_engine();
        engine.start().unwrap();
        assert_eq!(
            engine.go_back(1).unwrap_err(),
            EngineError::RollbackOutOfRange {
                steps: 1,
                answered: 0
            }
        );
        engine.answer("nat_match", AnswerValue::Yes).unwrap();
        assert_eq!(
            engine.go_back(0).unwrap_err(),
            EngineError::RollbackOutOfRange {
                steps: 0,
                answered: 1
            }
        );
        let outcome = engine.go_back(1).unwrap();
        assert_eq!(outcome.current_question.as_deref(), Some("nat_match"));
        assert!(outcome.answered_history.is_empty());
    }

    #[test]
    fn go_back_reopens_a_complete_dialogue() {
        let mut engine = visa_engine();
        engine.start().unwrap();
        engine.answer("nat_match", AnswerValue::No).unwrap();
        assert!(engine.is_complete());

        engine.go_back(1).unwrap();
        assert_eq!(engine.phase(), DialoguePhase::AwaitingAnswer);
        assert_eq!(engine.rule_status("E_ok"), Some(RuleStatus::Evaluating));
        assert!(engine.memory().hypotheses().is_empty());

        let outcome = engine.answer("nat_match", AnswerValue::Yes).unwrap();
        assert_eq!(outcome.next_question.as_deref(), Some("biz_ok"));
    }

    #[test]
    fn pass_cap_is_recorded_not_fatal() {
        let kb = KnowledgeBase::new(vec![
            Rule::and(["a"], "b"),
            Rule::and(["b"], "c"),
            Rule::and(["c"], "g").as_goal(),
        ])
        .unwrap();
        let config = EngineConfig {
            max_evaluation_passes: 1,
            ..Default::default()
        };
        let mut engine = Engine::new(Arc::new(kb), config);
        engine.start().unwrap();
        engine.answer("a", AnswerValue::Yes).unwrap();
        assert!(engine
            .log()
            .events()
            .contains(&ReasoningEvent::CapReached { passes: 1 }));
    }
}
