// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawn directives embedded in completed agent output.
//!
//! A directive is a fenced code block tagged `spawn` whose body is a
//! small TOML document with `agent`, `message`, and an optional
//! `priority`. Malformed blocks are logged and skipped; they never
//! fail the turn.

use serde::Deserialize;
use warden_core::Priority;

/// A parsed request to enqueue another agent as a child task.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SpawnDirective {
    pub agent: String,
    pub message: String,
    #[serde(default)]
    pub priority: Priority,
}

/// Extract every well-formed spawn directive from response text.
pub fn parse_spawn_directives(text: &str) -> Vec<SpawnDirective> {
    let mut directives = Vec::new();
    let mut body: Option<String> = None;
    for line in text.lines() {
        match &mut body {
            None => {
                if line.trim() == "```spawn" {
                    body = Some(String::new());
                }
            }
            Some(collected) => {
                if line.trim() == "```" {
                    match toml::from_str::<SpawnDirective>(collected) {
                        Ok(directive) => directives.push(directive),
                        Err(e) => {
                            tracing::warn!(error = %e, "ignoring malformed spawn directive");
                        }
                    }
                    body = None;
                } else {
                    collected.push_str(line);
                    collected.push('\n');
                }
            }
        }
    }
    if body.is_some() {
        tracing::warn!("ignoring unterminated spawn directive block");
    }
    directives
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
