// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent catalog: definitions loaded from a directory of TOML files.

use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use warden_core::{AgentDef, AgentDefError};

/// Errors loading the agent catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Def(#[from] AgentDefError),
    #[error("duplicate agent definition: {0}")]
    Duplicate(String),
}

/// Validated agent definitions keyed by name.
#[derive(Debug, Default)]
pub struct AgentCatalog {
    agents: HashMap<String, AgentDef>,
}

impl AgentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.toml` definition in `dir`.
    ///
    /// A missing directory is an empty catalog. Any invalid definition
    /// fails the whole load — a half-loaded catalog would let turns run
    /// against agents that were silently dropped.
    pub fn load(dir: &Path) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(catalog),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_none_or(|ext| ext != "toml") {
                continue;
            }
            let def = AgentDef::from_toml(&std::fs::read_to_string(&path)?)?;
            tracing::debug!(agent = %def.name, path = %path.display(), "loaded agent definition");
            catalog.insert(def)?;
        }
        Ok(catalog)
    }

    /// Add a validated definition; duplicate names are rejected.
    pub fn insert(&mut self, def: AgentDef) -> Result<(), CatalogError> {
        def.validate()?;
        if self.agents.contains_key(&def.name) {
            return Err(CatalogError::Duplicate(def.name));
        }
        self.agents.insert(def.name.clone(), def);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&AgentDef> {
        self.agents.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.agents.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
