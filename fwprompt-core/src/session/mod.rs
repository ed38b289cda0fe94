//! Prompt sessions: countdown, single-flight gate and resolution

pub mod countdown;
pub mod decision;
pub mod prompt;

pub use countdown::{CountdownEvent, TimeoutCountdown};
pub use decision::{DecisionSession, Outcome, Prompter, SessionHandle, SessionState};
pub use prompt::{PresentationAdapter, Prompt, PromptEvent, PromptView, Selection};
