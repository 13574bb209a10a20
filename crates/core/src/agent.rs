// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent definitions.
//!
//! Agents are declared in TOML and validated at load time. Each kind
//! has explicit required fields — a definition is either valid for its
//! kind or rejected with the missing field named; nothing is accessed
//! optimistically later.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors loading or validating an agent definition.
#[derive(Debug, Error)]
pub enum AgentDefError {
    #[error("agent definition parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("agent '{agent}': missing required field '{field}'")]
    MissingField { agent: String, field: String },
}

/// What shape of work an agent does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentKind {
    /// Free-form multi-turn chat.
    Conversational,
    /// Bound to one document; activated by that document's triggers.
    DocumentBound {
        #[serde(default)]
        document: PathBuf,
    },
    /// One-shot task runner with no standing conversation.
    Standalone,
}

crate::simple_display! {
    AgentKind {
        Conversational => "conversational",
        DocumentBound { .. } => "document_bound",
        Standalone => "standalone",
    }
}

/// A validated agent definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDef {
    pub name: String,
    #[serde(flatten)]
    pub kind: AgentKind,
    /// System instructions sent to the backend each turn.
    pub instructions: String,
    /// Named capability sets this agent may use (Tier 3).
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Glob patterns of paths the agent may write without approval (Tier 2).
    #[serde(default)]
    pub allowed_paths: Vec<String>,
    /// Glob patterns of command lines the agent may run without approval (Tier 2).
    #[serde(default)]
    pub allowed_commands: Vec<String>,
    /// Whether this agent's output may spawn child tasks.
    #[serde(default)]
    pub can_spawn: bool,
}

impl AgentDef {
    pub fn new(name: impl Into<String>, kind: AgentKind, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            instructions: instructions.into(),
            capabilities: Vec::new(),
            allowed_paths: Vec::new(),
            allowed_commands: Vec::new(),
            can_spawn: false,
        }
    }

    crate::setters! {
        set {
            capabilities: Vec<String>,
            allowed_paths: Vec<String>,
            allowed_commands: Vec<String>,
            can_spawn: bool,
        }
    }

    /// Parse and validate a TOML definition.
    pub fn from_toml(text: &str) -> Result<Self, AgentDefError> {
        let def: AgentDef = toml::from_str(text)?;
        def.validate()?;
        Ok(def)
    }

    /// Check required fields per kind.
    pub fn validate(&self) -> Result<(), AgentDefError> {
        let missing = |field: &str| AgentDefError::MissingField {
            agent: self.name.clone(),
            field: field.to_string(),
        };
        if self.name.is_empty() {
            return Err(missing("name"));
        }
        if self.instructions.is_empty() {
            return Err(missing("instructions"));
        }
        if let AgentKind::DocumentBound { document } = &self.kind {
            if document.as_os_str().is_empty() {
                return Err(missing("document"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
