//! Rich diagnostic error types for the consultation engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so callers know exactly which operation
//! was rejected and why.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the crate.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum ExpertError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Knowledge(#[from] KnowledgeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

/// Rejected dialogue operations. Returning one of these never mutates the engine.
#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("the consultation has not been started")]
    #[diagnostic(
        code(visa::engine::not_started),
        help("Call `Engine::start()` before answering or rewinding.")
    )]
    NotStarted,

    #[error("the consultation is already running")]
    #[diagnostic(
        code(visa::engine::already_started),
        help("Use `Engine::restart()` to begin a fresh dialogue.")
    )]
    AlreadyStarted,

    #[error("no question is pending")]
    #[diagnostic(
        code(visa::engine::no_pending_question),
        help(
            "The dialogue is complete. Inspect the result with `current_state()`, \
             rewind with `go_back()`, or start over with `restart()`."
        )
    )]
    NoPendingQuestion,

    #[error("fact \"{fact}\" is not a condition of any rule")]
    #[diagnostic(
        code(visa::engine::unknown_fact),
        help("Only facts that appear in some rule's condition list can be answered.")
    )]
    UnknownFact { fact: String },

    #[error("fact \"{fact}\" has already been answered")]
    #[diagnostic(
        code(visa::engine::already_answered),
        help("Rewind with `go_back()` to change an earlier answer.")
    )]
    AlreadyAnswered { fact: String },

    #[error("cannot go back {steps} step(s): only {answered} answer(s) recorded")]
    #[diagnostic(
        code(visa::engine::rollback_out_of_range),
        help("The number of steps must be between 1 and the number of recorded answers.")
    )]
    RollbackOutOfRange { steps: usize, answered: usize },

    #[error("cannot seed fact \"{fact}\" after the consultation has started")]
    #[diagnostic(
        code(visa::engine::seed_after_start),
        help("Seed initial facts before calling `start()`, or `restart()` the dialogue.")
    )]
    SeedAfterStart { fact: String },
}

// ---------------------------------------------------------------------------
// Knowledge base errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum KnowledgeError {
    #[error("rule #{index} has an empty action")]
    #[diagnostic(
        code(visa::knowledge::empty_action),
        help("Every rule must conclude a non-empty fact key.")
    )]
    EmptyAction { index: usize },

    #[error("rule \"{rule}\" has no conditions")]
    #[diagnostic(
        code(visa::knowledge::no_conditions),
        help("A rule needs at least one condition to be evaluated.")
    )]
    NoConditions { rule: String },

    #[error("rule \"{rule}\" has an empty condition at position {position}")]
    #[diagnostic(
        code(visa::knowledge::empty_condition),
        help("Remove the blank condition or give it a fact key.")
    )]
    EmptyCondition { rule: String, position: usize },

    #[error("rule \"{rule}\" lists its own conclusion \"{condition}\" as a condition")]
    #[diagnostic(
        code(visa::knowledge::self_reference),
        help("A rule cannot depend on the fact it concludes. Split it into two rules.")
    )]
    SelfReference { rule: String, condition: String },

    #[error("failed to read rule file: {path}")]
    #[diagnostic(
        code(visa::knowledge::read),
        help("Ensure the rule file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse rule file {path}: {message}")]
    #[diagnostic(
        code(visa::knowledge::parse),
        help(
            "Rule files are JSON (or TOML with a `.toml` extension) with a top-level \
             `rules` array of {{conditions, action, combinator, goal, category}}."
        )
    )]
    Parse { path: String, message: String },
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read engine config: {path}")]
    #[diagnostic(
        code(visa::config::read),
        help("Ensure the config file exists and is valid TOML.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse engine config {path}: {message}")]
    #[diagnostic(
        code(visa::config::parse),
        help("Check the TOML syntax in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write engine config: {path}")]
    #[diagnostic(
        code(visa::config::write),
        help("Ensure you have write permissions to the target directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience result type for top-level operations.
pub type ExpertResult<T> = std::result::Result<T, ExpertError>;

/// Result type for dialogue operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Result type for knowledge base construction and loading.
pub type KnowledgeResult<T> = std::result::Result<T, KnowledgeError>;

/// Result type for configuration loading.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
