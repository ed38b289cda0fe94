//! Single-flight decision sessions
//!
//! `Prompter::open` presents one connection at a time. It holds a
//! process-wide gate from the moment it is called until the returned
//! `DecisionSession` is closed, so a second caller waits for the first
//! prompt to be dismissed. Each session resolves exactly once, either by
//! `SessionHandle::submit` or by the countdown expiring.

use super::countdown::{CountdownEvent, TimeoutCountdown};
use super::prompt::{PresentationAdapter, Prompt, PromptEvent, PromptView, Selection};
use crate::candidate::{CandidateGenerator, Candidates, UserDirectory};
use crate::config::{ConfigSource, ConfigValidator};
use crate::error::{PromptError, Result};
use crate::rule::RuleBuilder;
use crate::types::{
    Action, Candidate, ConnectionDescriptor, Decision, ExtraCriteria, Field, Operator, Rule,
};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot, OwnedMutexGuard};

/// Lifecycle of a decision session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Presenting,
    /// Resolved by an explicit submit
    Resolved,
    /// Resolved by the countdown
    Expired,
    Closed,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Created => "created",
            SessionState::Presenting => "presenting",
            SessionState::Resolved => "resolved",
            SessionState::Expired => "expired",
            SessionState::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// None when the chosen criterion could not form a valid rule
    pub rule: Option<Rule>,
    pub timed_out: bool,
}

/// Entry point for prompting; one per process
pub struct Prompter {
    gate: Arc<tokio::sync::Mutex<()>>,
    config: Arc<dyn ConfigSource>,
    generator: CandidateGenerator,
    adapter: Arc<dyn PresentationAdapter>,
}

impl Prompter {
    pub fn new(
        config: Arc<dyn ConfigSource>,
        users: Arc<dyn UserDirectory>,
        adapter: Arc<dyn PresentationAdapter>,
    ) -> Self {
        Self {
            gate: Arc::new(tokio::sync::Mutex::new(())),
            config,
            generator: CandidateGenerator::new(users),
            adapter,
        }
    }

    /// Prompt for a connection and wait for the decision.
    ///
    /// Waits for any earlier session to be closed first. Configuration is
    /// reloaded on every call; an invalid timeout or action fails here,
    /// before anything is presented. With a zero timeout nothing is
    /// presented and the preselected criterion is applied at once.
    pub async fn open(
        &self,
        conn: ConnectionDescriptor,
        is_local: bool,
        peer: impl Into<String>,
    ) -> Result<DecisionSession> {
        let permit = self.gate.clone().lock_owned().await;

        let config = self.config.load()?;
        ConfigValidator::validate(&config.prompt)?;
        let timeout = config.prompt.timeout_secs()?;
        let default_action = config.prompt.action()?;

        let candidates = self.generator.generate(&conn, is_local);
        let selection = Selection::initial(&conn, &candidates, &config.prompt);

        let mut countdown = TimeoutCountdown::new(self.config.clone());
        let mut countdown_events = countdown.start(timeout);

        let (resolve_tx, mut resolve_rx) = oneshot::channel();
        let shared = Arc::new(Shared {
            conn,
            candidates,
            default_action,
            countdown,
            inner: Mutex::new(Inner {
                state: SessionState::Created,
                selection: selection.clone(),
                resolver: Some(resolve_tx),
            }),
        });
        shared.transition(SessionState::Presenting);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        if timeout > 0 {
            self.adapter.present(Prompt {
                view: PromptView {
                    connection: shared.conn.clone(),
                    candidates: shared.candidates.clone(),
                    is_local,
                    peer: peer.into(),
                    default_action,
                    timeout,
                },
                selection,
                events: events_rx,
                handle: SessionHandle {
                    shared: shared.clone(),
                },
            });
        }

        let mut countdown_open = true;
        let outcome = loop {
            tokio::select! {
                biased;
                outcome = &mut resolve_rx => {
                    break outcome.map_err(|_| PromptError::SessionAborted)?;
                }
                event = countdown_events.recv(), if countdown_open => match event {
                    Some(CountdownEvent::Tick(remaining)) => {
                        let _ = events_tx.send(PromptEvent::Tick {
                            remaining,
                            action: default_action,
                        });
                    }
                    Some(CountdownEvent::Expired) => shared.expire(),
                    Some(CountdownEvent::Cancelled) | None => countdown_open = false,
                },
            }
        };

        let _ = events_tx.send(PromptEvent::Resolved {
            timed_out: outcome.timed_out,
        });

        Ok(DecisionSession {
            outcome,
            shared,
            _permit: permit,
        })
    }
}

/// A resolved prompt. Holds the single-flight gate until closed or dropped.
pub struct DecisionSession {
    outcome: Outcome,
    shared: Arc<Shared>,
    _permit: OwnedMutexGuard<()>,
}

impl DecisionSession {
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn rule(&self) -> Option<&Rule> {
        self.outcome.rule.as_ref()
    }

    pub fn timed_out(&self) -> bool {
        self.outcome.timed_out
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().state
    }

    /// Release the prompt so the next `open` may proceed
    pub fn close(self) -> Outcome {
        self.shared.transition(SessionState::Closed);
        self.outcome
    }
}

/// Adapter-side handle to a presenting session
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<Shared>,
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        self.shared.lock().state
    }

    /// Choices that apply if the countdown expires now
    pub fn selection(&self) -> Selection {
        self.shared.lock().selection.clone()
    }

    /// Update the pending choices without resolving.
    ///
    /// Turning advanced mode on pauses the countdown; turning it off
    /// resumes it.
    pub fn select(&self, selection: Selection) -> Result<()> {
        selection.validate(&self.shared.candidates)?;

        let mut inner = self.shared.lock();
        if inner.state != SessionState::Presenting {
            return Err(precondition(inner.state));
        }

        if selection.advanced != inner.selection.advanced {
            if selection.advanced {
                self.shared.countdown.pause();
            } else {
                self.shared.countdown.resume();
            }
        }
        inner.selection = selection;
        Ok(())
    }

    /// Toggle advanced mode, keeping the rest of the selection
    pub fn set_advanced(&self, advanced: bool) -> Result<()> {
        let mut selection = self.selection();
        selection.advanced = advanced;
        self.select(selection)
    }

    /// Resolve the session with the user's choice.
    ///
    /// Only valid while presenting. Once a session has resolved, by an
    /// earlier submit or by expiry, this returns `AlreadyResolved`.
    pub fn submit(&self, action: Action, selection: Selection) -> Result<()> {
        selection.validate(&self.shared.candidates)?;

        let mut inner = self.shared.lock();
        if inner.state != SessionState::Presenting {
            return Err(precondition(inner.state));
        }
        let resolver = inner.resolver.take().ok_or(PromptError::AlreadyResolved)?;

        self.shared.countdown.cancel();
        inner.state = SessionState::Resolved;
        inner.selection = selection;

        let decision = self.shared.decision(action, &inner.selection);
        drop(inner);

        tracing::info!(
            "Prompt resolved by user: {} {}",
            decision.action,
            decision.duration
        );
        let _ = resolver.send(Outcome {
            rule: build_rule(&decision),
            timed_out: false,
        });
        Ok(())
    }
}

fn precondition(state: SessionState) -> PromptError {
    match state {
        SessionState::Resolved | SessionState::Expired => PromptError::AlreadyResolved,
        state => PromptError::NotPresenting {
            state: state.as_str(),
        },
    }
}

struct Shared {
    conn: ConnectionDescriptor,
    candidates: Candidates,
    default_action: Action,
    countdown: TimeoutCountdown,
    inner: Mutex<Inner>,
}

struct Inner {
    state: SessionState,
    selection: Selection,
    /// Taken by whichever of submit and expiry resolves first
    resolver: Option<oneshot::Sender<Outcome>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, next: SessionState) {
        let mut inner = self.lock();
        tracing::debug!("Session {} -> {}", inner.state, next);
        inner.state = next;
    }

    /// Apply the default action to whatever is currently selected
    fn expire(&self) {
        let mut inner = self.lock();
        if inner.state != SessionState::Presenting {
            return;
        }
        let Some(resolver) = inner.resolver.take() else {
            return;
        };
        inner.state = SessionState::Expired;

        let decision = self.decision(self.default_action, &inner.selection);
        drop(inner);

        tracing::info!(
            "Prompt timed out, applying default: {} {}",
            decision.action,
            decision.duration
        );
        let _ = resolver.send(Outcome {
            rule: build_rule(&decision),
            timed_out: true,
        });
    }

    /// Materialise a selection. Indices were validated when stored.
    fn decision(&self, action: Action, selection: &Selection) -> Decision {
        let primary = self
            .candidates
            .primary
            .get(selection.primary)
            .or_else(|| self.candidates.primary.first())
            .cloned()
            .unwrap_or_else(|| empty_candidate(Field::ProcArgs));

        let extras = ExtraCriteria {
            dst_ip: selection
                .extra_dst_ip
                .and_then(|index| self.candidates.destination.get(index))
                .cloned(),
            dst_port: selection
                .extra_dst_port
                .then(|| self.find(Field::DstPort))
                .flatten(),
            user_id: selection
                .extra_user_id
                .then(|| self.find(Field::UserId))
                .flatten(),
        };

        Decision {
            action,
            duration: selection.duration,
            primary,
            extras,
            advanced: selection.advanced,
        }
    }

    fn find(&self, field: Field) -> Option<Candidate> {
        self.candidates
            .primary
            .iter()
            .find(|candidate| candidate.field == field)
            .cloned()
    }
}

fn empty_candidate(field: Field) -> Candidate {
    Candidate::new(field, "", Operator::simple("", ""))
}

fn build_rule(decision: &Decision) -> Option<Rule> {
    match RuleBuilder::build(decision) {
        Ok(rule) => {
            tracing::debug!("Built rule {}", rule.name);
            Some(rule)
        }
        Err(e) => {
            tracing::warn!("Invalid rule, discarding: {}", e);
            None
        }
    }
}
