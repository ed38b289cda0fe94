//! Decision core for interactive connection-approval prompts
//!
//! Derives match candidates from a connection snapshot, runs a single
//! prompt at a time against a countdown, and turns the user's choice (or
//! the timeout default) into a rule for the enforcement engine.

pub mod candidate;
pub mod config;
pub mod error;
pub mod rule;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use candidate::{CandidateGenerator, Candidates, PasswdFile, UserDirectory};
pub use config::{Config, ConfigLoader, ConfigSource, FileConfig};
pub use error::{InvalidRule, PromptError, Result, ValidationError};
pub use rule::RuleBuilder;
pub use session::{
    DecisionSession, Outcome, PresentationAdapter, Prompt, PromptEvent, PromptView, Prompter,
    Selection, SessionHandle, SessionState,
};
pub use types::{
    Action, Candidate, ConnectionDescriptor, Decision, DurationOption, ExtraCriteria, Field,
    Operator, OperatorType, Rule,
};
