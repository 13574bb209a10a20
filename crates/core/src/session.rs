// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session types: multi-turn conversations keyed by an external token.
//!
//! Session identity is an opaque token issued by the execution backend
//! after its first reply — never generated locally. A session with no
//! token has never completed a turn and must not reach the durable
//! mirror; `finalize` is the one-time null→token transition.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

crate::define_id! {
    /// Process-wide-unique identifier for a transcript message.
    pub struct MessageId("msg-");
}

/// Opaque session token issued by the execution backend.
///
/// The backend independently persists conversation state; this token is
/// the sole key for resumption and for the durable mirror.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(pub String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for SessionToken {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for SessionToken {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for SessionToken {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Who authored a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

crate::simple_display! {
    Role {
        User => "user",
        Assistant => "assistant",
        System => "system",
    }
}

/// One entry in a session transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub at_ms: u64,
}

/// Error finalizing a session.
#[derive(Debug, Error)]
pub enum FinalizeError {
    #[error("session already finalized with token {0}")]
    AlreadyFinalized(SessionToken),
}

/// A multi-turn conversation with one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Backend-issued token; None until the first turn completes.
    pub token: Option<SessionToken>,
    /// Name of the agent this conversation belongs to.
    pub agent: String,
    /// Ordered transcript.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Working-directory override for backend execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub archived: bool,
    pub created_at_ms: u64,
    pub last_access_ms: u64,
    /// Token of the session this one carried history forward from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continued_from: Option<SessionToken>,
}

impl Session {
    /// Create a new, unfinalized session.
    pub fn new(agent: impl Into<String>, now_ms: u64) -> Self {
        Self {
            token: None,
            agent: agent.into(),
            messages: Vec::new(),
            cwd: None,
            archived: false,
            created_at_ms: now_ms,
            last_access_ms: now_ms,
            continued_from: None,
        }
    }

    /// Whether the backend has issued a token for this session.
    pub fn is_finalized(&self) -> bool {
        self.token.is_some()
    }

    /// One-time null→token transition.
    ///
    /// Idempotent when called again with the same token; an attempt to
    /// reassign a different token is an error.
    pub fn finalize_token(&mut self, token: SessionToken) -> Result<(), FinalizeError> {
        match &self.token {
            None => {
                self.token = Some(token);
                Ok(())
            }
            Some(existing) if *existing == token => Ok(()),
            Some(existing) => Err(FinalizeError::AlreadyFinalized(existing.clone())),
        }
    }

    /// Append a message, assigning it a fresh process-wide-unique id.
    pub fn push_message(&mut self, role: Role, content: impl Into<String>, at_ms: u64) -> MessageId {
        let id = MessageId::new();
        self.messages.push(Message { id: id.clone(), role, content: content.into(), at_ms });
        self.last_access_ms = at_ms;
        id
    }

    /// Listing title: the first user message, truncated.
    pub fn title(&self) -> String {
        const TITLE_MAX: usize = 60;
        self.messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| {
                let line = m.content.lines().next().unwrap_or_default();
                if line.chars().count() > TITLE_MAX {
                    let cut: String = line.chars().take(TITLE_MAX).collect();
                    format!("{cut}…")
                } else {
                    line.to_string()
                }
            })
            .unwrap_or_else(|| format!("({})", self.agent))
    }
}

/// Lightweight index entry kept fully in memory for fast listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMeta {
    pub token: SessionToken,
    /// Location of the durable record.
    pub path: PathBuf,
    pub agent: String,
    pub title: String,
    pub created_at_ms: u64,
    pub last_access_ms: u64,
    pub archived: bool,
    pub message_count: usize,
}

impl SessionMeta {
    /// Build an index entry from a finalized session and its record path.
    ///
    /// Returns None for unfinalized sessions — they have no durable
    /// record and never enter the index.
    pub fn from_session(session: &Session, path: PathBuf) -> Option<Self> {
        let token = session.token.clone()?;
        Some(Self {
            token,
            path,
            agent: session.agent.clone(),
            title: session.title(),
            created_at_ms: session.created_at_ms,
            last_access_ms: session.last_access_ms,
            archived: session.archived,
            message_count: session.messages.len(),
        })
    }
}

crate::builder! {
    pub struct SessionBuilder => Session {
        into {
            agent: String = "scribe",
        }
        set {
            messages: Vec<Message> = Vec::new(),
            archived: bool = false,
            created_at_ms: u64 = 1_000_000,
            last_access_ms: u64 = 1_000_000,
        }
        option {
            token: SessionToken = None,
            cwd: PathBuf = None,
            continued_from: SessionToken = None,
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
