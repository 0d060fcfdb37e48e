// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # visa-expert
//!
//! An interactive inference engine that works out which visa categories a
//! case qualifies for, by asking questions against a knowledge base of
//! AND/OR rules whose conditions may themselves be conclusions of other rules.
//!
//! ## Architecture
//!
//! - **Knowledge base** (`knowledge`, `rule`): immutable, indexed rule snapshot
//! - **Working memory** (`memory`): user findings vs. derived hypotheses
//! - **Rule states** (`state`): per-rule lifecycle and condition snapshots
//! - **Forward chaining** (`evaluate`, `propagate`): statuses and hypotheses to a fixpoint
//! - **Backward chaining** (`select`): leftmost depth-first choice of the next question
//! - **Engine** (`engine`): the dialogue loop, rollback, and result summary
//! - **Diagnostics** (`validate`): read-only rule set integrity checks
//!
//! ## Library usage
//!
//! ```
//! use std::sync::Arc;
//!
//! use visa_expert::answer::AnswerValue;
//! use visa_expert::config::EngineConfig;
//! use visa_expert::engine::Engine;
//! use visa_expert::knowledge::KnowledgeBase;
//! use visa_expert::rule::Rule;
//!
//! let kb = KnowledgeBase::new(vec![
//!     Rule::and(["nat_match", "biz_ok"], "E_ok").as_goal(),
//!     Rule::or(["inv_ok", "trade_ok"], "biz_ok"),
//! ])
//! .unwrap();
//! let mut engine = Engine::new(Arc::new(kb), EngineConfig::default());
//!
//! assert_eq!(engine.start().unwrap().as_deref(), Some("nat_match"));
//! engine.answer("nat_match", AnswerValue::Yes).unwrap();
//! let outcome = engine.answer("inv_ok", AnswerValue::Yes).unwrap();
//! assert!(outcome.is_complete);
//! assert!(outcome.result.unwrap().is_applicable("E_ok"));
//! ```

pub mod answer;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluate;
pub mod knowledge;
pub mod memory;
pub mod propagate;
pub mod reasoning;
pub mod report;
pub mod rule;
pub mod select;
pub mod state;
pub mod validate;
