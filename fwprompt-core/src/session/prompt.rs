//! What a presentation adapter receives for each prompt

use super::decision::SessionHandle;
use crate::candidate::Candidates;
use crate::config::PromptConfig;
use crate::error::{PromptError, Result};
use crate::types::{Action, ConnectionDescriptor, DurationOption};
use tokio::sync::mpsc;

/// Presentation layer for prompts.
///
/// `present` is called once per session while it is presenting. It must not
/// block; the adapter answers later through `Prompt::handle`.
pub trait PresentationAdapter: Send + Sync {
    fn present(&self, prompt: Prompt);
}

/// Notifications delivered to the adapter while a prompt is open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptEvent {
    /// Seconds left before `action` is applied
    Tick { remaining: u64, action: Action },
    /// The session resolved; the prompt should be dismissed
    Resolved { timed_out: bool },
}

/// A prompt handed to the presentation adapter
pub struct Prompt {
    pub view: PromptView,
    /// Preselected choices
    pub selection: Selection,
    pub events: mpsc::UnboundedReceiver<PromptEvent>,
    pub handle: SessionHandle,
}

/// Read-only data to render
#[derive(Debug, Clone)]
pub struct PromptView {
    pub connection: ConnectionDescriptor,
    pub candidates: Candidates,
    pub is_local: bool,
    /// Peer address of the daemon that raised the prompt, e.g. `ipv4:10.0.0.2:5000`
    pub peer: String,
    pub default_action: Action,
    pub timeout: u64,
}

impl PromptView {
    /// Host part of the peer address
    pub fn peer_host(&self) -> &str {
        self.peer.split(':').nth(1).unwrap_or(&self.peer)
    }

    /// One-line description of the connection attempt
    pub fn message(&self) -> String {
        let conn = &self.connection;
        let app = if conn.process_path.is_empty() {
            "Unknown process"
        } else {
            conn.process_path.as_str()
        };

        if self.is_local {
            format!(
                "{} is connecting to {} on {} port {}",
                app,
                conn.destination(),
                conn.protocol,
                conn.dst_port
            )
        } else {
            format!(
                "Remote process {} running on {} is connecting to {} on {} port {}",
                app,
                self.peer_host(),
                conn.destination(),
                conn.protocol,
                conn.dst_port
            )
        }
    }
}

/// Choices pending in the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Index into the primary candidates
    pub primary: usize,
    pub duration: DurationOption,
    pub advanced: bool,
    /// Index into the destination candidates, when the dst-ip extra is checked
    pub extra_dst_ip: Option<usize>,
    pub extra_dst_port: bool,
    pub extra_user_id: bool,
}

/// Primary index preselected for connections without a known process
const NO_PROCESS_TARGET: usize = 2;

impl Selection {
    /// Defaults for a new prompt
    pub fn initial(
        conn: &ConnectionDescriptor,
        candidates: &Candidates,
        prompt: &PromptConfig,
    ) -> Self {
        let target = if conn.process_id > 0 {
            prompt.default_target
        } else {
            NO_PROCESS_TARGET
        };

        let primary = if target < candidates.primary.len() {
            target
        } else {
            tracing::warn!(
                "Default target {} out of range ({} candidates), using 0",
                target,
                candidates.primary.len()
            );
            0
        };

        Self {
            primary,
            duration: prompt.duration(),
            advanced: false,
            extra_dst_ip: None,
            extra_dst_port: false,
            extra_user_id: false,
        }
    }

    /// Check indices against the candidate lists
    pub fn validate(&self, candidates: &Candidates) -> Result<()> {
        if self.primary >= candidates.primary.len() {
            return Err(PromptError::InvalidSelection {
                what: "primary",
                index: self.primary,
                len: candidates.primary.len(),
            });
        }

        if let Some(index) = self.extra_dst_ip {
            if index >= candidates.destination.len() {
                return Err(PromptError::InvalidSelection {
                    what: "destination",
                    index,
                    len: candidates.destination.len(),
                });
            }
        }

        Ok(())
    }
}
