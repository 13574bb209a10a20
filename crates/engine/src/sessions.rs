// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session manager: identity, caching, persistence, and resumption of
//! multi-turn conversations.
//!
//! Reads are served from a three-tier lookup: hot in-memory session →
//! lightweight index entry → durable record. All writes for one token
//! are serialized behind a per-token async lock acquired under a
//! timeout, so a stuck writer fails loudly instead of deadlocking the
//! session.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;
use warden_core::{Clock, FinalizeError, MessageId, Role, Session, SessionMeta, SessionToken};
use warden_storage::{SessionStore, StorageError};

/// Errors from session-manager operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unknown session: {0}")]
    UnknownToken(SessionToken),
    #[error("write-lock timeout for session {0}")]
    LockTimeout(SessionToken),
    #[error(transparent)]
    Finalize(#[from] FinalizeError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Which lookup tier served a `get_or_create`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeSource {
    /// Hot in-memory session.
    Cache,
    /// Loaded from the durable record.
    Disk,
    /// No prior state; a fresh session was created.
    New,
}

/// How a session was resolved, for observability and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeInfo {
    pub source: ResumeSource,
    /// Message count before this turn.
    pub prior_messages: usize,
}

impl ResumeInfo {
    pub fn is_new(&self) -> bool {
        self.source == ResumeSource::New
    }
}

#[derive(Default)]
struct Tiers {
    /// Full sessions, keyed by token. Bounded by the index: an index
    /// eviction always evicts the matching hot entry.
    cache: HashMap<SessionToken, Session>,
    /// Lightweight listing entries, LRU-bounded by `index_max`.
    index: HashMap<SessionToken, SessionMeta>,
}

/// Serializes writes and caches reads for all sessions.
pub struct SessionManager<C: Clock> {
    store: SessionStore,
    clock: C,
    index_max: usize,
    cache_max_age_ms: u64,
    lock_timeout: Duration,
    tiers: Mutex<Tiers>,
    locks: Mutex<HashMap<SessionToken, Arc<tokio::sync::Mutex<()>>>>,
}

impl<C: Clock> SessionManager<C> {
    pub fn new(
        store: SessionStore,
        clock: C,
        index_max: usize,
        cache_max_age_ms: u64,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            index_max,
            cache_max_age_ms,
            lock_timeout,
            tiers: Mutex::new(Tiers::default()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the per-token write lock, failing loudly on timeout.
    async fn acquire(&self, token: &SessionToken) -> Result<OwnedMutexGuard<()>, SessionError> {
        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(
                locks.entry(token.clone()).or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
            )
        };
        match tokio::time::timeout(self.lock_timeout, lock.lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                tracing::error!(token = %token, timeout = ?self.lock_timeout,
                    "session write-lock acquisition timed out");
                Err(SessionError::LockTimeout(token.clone()))
            }
        }
    }

    /// Resolve a session: hot cache → index/durable record → fresh.
    ///
    /// A supplied token that is unknown on every tier starts a fresh
    /// session; `ResumeInfo` reports the miss as [`ResumeSource::New`].
    pub fn get_or_create(
        &self,
        token: Option<&SessionToken>,
        agent: &str,
    ) -> Result<(Session, ResumeInfo), SessionError> {
        let Some(token) = token else {
            let session = Session::new(agent, self.clock.epoch_ms());
            return Ok((session, ResumeInfo { source: ResumeSource::New, prior_messages: 0 }));
        };

        {
            // A read counts as access: refresh the LRU stamp so a
            // frequently-resumed session is not evicted as idle.
            let now = self.clock.epoch_ms();
            let mut tiers = self.tiers.lock();
            if let Some(session) = tiers.cache.get_mut(token) {
                session.last_access_ms = now;
                let info = ResumeInfo {
                    source: ResumeSource::Cache,
                    prior_messages: session.messages.len(),
                };
                let session = session.clone();
                if let Some(meta) = tiers.index.get_mut(token) {
                    meta.last_access_ms = now;
                }
                return Ok((session, info));
            }
        }

        let indexed_path = self.tiers.lock().index.get(token).map(|meta| meta.path.clone());
        let loaded = match indexed_path {
            Some(path) => Some(self.store.load_path(&path)?),
            // Not indexed (evicted or never seen): probe the
            // deterministic record path before declaring it unknown.
            None => match self.store.load(agent, token) {
                Ok(session) => Some(session),
                Err(StorageError::NotFound(_)) => None,
                Err(e) => return Err(e.into()),
            },
        };

        match loaded {
            Some(mut session) => {
                let info =
                    ResumeInfo { source: ResumeSource::Disk, prior_messages: session.messages.len() };
                session.last_access_ms = self.clock.epoch_ms();
                self.admit(session.clone());
                Ok((session, info))
            }
            None => {
                tracing::debug!(token = %token, agent, "unknown token, starting fresh session");
                let session = Session::new(agent, self.clock.epoch_ms());
                Ok((session, ResumeInfo { source: ResumeSource::New, prior_messages: 0 }))
            }
        }
    }

    /// One-time token assignment plus the first durable write.
    ///
    /// Safe under concurrent racers: the per-token lock serializes
    /// them, and after acquisition the index is re-checked so the
    /// loser adopts the winner's record instead of writing a second.
    pub async fn finalize(
        &self,
        session: &mut Session,
        token: SessionToken,
    ) -> Result<PathBuf, SessionError> {
        let _guard = self.acquire(&token).await?;
        session.finalize_token(token.clone())?;

        let existing = self.tiers.lock().index.get(&token).map(|meta| meta.path.clone());
        if let Some(path) = existing {
            *session = self.store.load_path(&path)?;
            return Ok(path);
        }

        let path = self.store.save(session)?;
        self.admit(session.clone());
        Ok(path)
    }

    /// Append one message and write through to the durable record.
    pub async fn append_message(
        &self,
        token: &SessionToken,
        role: Role,
        content: impl Into<String>,
    ) -> Result<MessageId, SessionError> {
        let _guard = self.acquire(token).await?;
        let mut session = self.current(token)?;
        let id = session.push_message(role, content, self.clock.epoch_ms());
        self.store.save(&session)?;
        self.admit(session);
        Ok(id)
    }

    /// Full session by token; unknown tokens are an explicit error.
    pub fn get(&self, token: &SessionToken) -> Result<Session, SessionError> {
        self.current(token)
    }

    /// Index entries, most recently accessed first. Archived sessions
    /// are hidden unless asked for.
    pub fn list(&self, include_archived: bool) -> Vec<SessionMeta> {
        let tiers = self.tiers.lock();
        let mut metas: Vec<SessionMeta> = tiers
            .index
            .values()
            .filter(|meta| include_archived || !meta.archived)
            .cloned()
            .collect();
        metas.sort_by(|a, b| b.last_access_ms.cmp(&a.last_access_ms));
        metas
    }

    pub async fn archive(&self, token: &SessionToken) -> Result<(), SessionError> {
        self.set_archived(token, true).await
    }

    pub async fn unarchive(&self, token: &SessionToken) -> Result<(), SessionError> {
        self.set_archived(token, false).await
    }

    async fn set_archived(&self, token: &SessionToken, archived: bool) -> Result<(), SessionError> {
        let _guard = self.acquire(token).await?;
        let mut session = self.current(token)?;
        session.archived = archived;
        self.store.save(&session)?;
        self.admit(session);
        Ok(())
    }

    /// Remove the durable record and every in-memory trace. Unknown
    /// tokens fail explicitly; deletion never succeeds silently.
    pub async fn delete(&self, token: &SessionToken) -> Result<(), SessionError> {
        let _guard = self.acquire(token).await?;
        let path = {
            let tiers = self.tiers.lock();
            tiers.index.get(token).map(|meta| meta.path.clone())
        };
        let path = match path {
            Some(path) => path,
            None => {
                let session = self.current(token)?;
                self.store.record_path(&session.agent, token)
            }
        };
        self.store.delete(&path).map_err(|e| match e {
            StorageError::NotFound(_) => SessionError::UnknownToken(token.clone()),
            other => other.into(),
        })?;
        let mut tiers = self.tiers.lock();
        tiers.cache.remove(token);
        tiers.index.remove(token);
        drop(tiers);
        self.locks.lock().remove(token);
        Ok(())
    }

    /// Rescan the durable store and rebuild the index from scratch.
    pub fn rebuild_index(&self) -> Result<usize, SessionError> {
        let metas = self.store.scan()?;
        let mut tiers = self.tiers.lock();
        tiers.cache.clear();
        tiers.index = metas.into_iter().map(|meta| (meta.token.clone(), meta)).collect();
        Self::enforce_cap(&mut tiers, self.index_max);
        Ok(tiers.index.len())
    }

    /// Periodic sweep: drop hot entries idle past the max age. Index
    /// entries stay; the next access is a disk hit, not a loss.
    pub fn evict_stale(&self) -> usize {
        let now = self.clock.epoch_ms();
        let mut tiers = self.tiers.lock();
        let stale: Vec<SessionToken> = tiers
            .cache
            .iter()
            .filter(|(_, s)| now.saturating_sub(s.last_access_ms) > self.cache_max_age_ms)
            .map(|(token, _)| token.clone())
            .collect();
        for token in &stale {
            tiers.cache.remove(token);
        }
        if !stale.is_empty() {
            tracing::debug!(evicted = stale.len(), "swept idle sessions from hot cache");
        }
        drop(tiers);
        self.collect_idle_locks();
        stale.len()
    }

    /// Drop per-token lock entries nobody holds or waits on. Locks are
    /// recreated on demand, so the map stays proportional to in-flight
    /// writes instead of growing with every session ever touched.
    fn collect_idle_locks(&self) {
        let mut locks = self.locks.lock();
        let before = locks.len();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        let dropped = before - locks.len();
        if dropped > 0 {
            tracing::trace!(dropped, "collected idle session locks");
        }
    }

    /// Cache + index resolution without touching disk twice.
    fn current(&self, token: &SessionToken) -> Result<Session, SessionError> {
        if let Some(session) = self.tiers.lock().cache.get(token) {
            return Ok(session.clone());
        }
        let path = self.tiers.lock().index.get(token).map(|meta| meta.path.clone());
        match path {
            Some(path) => Ok(self.store.load_path(&path)?),
            None => Err(SessionError::UnknownToken(token.clone())),
        }
    }

    /// Insert into both tiers, then enforce the index cap.
    fn admit(&self, session: Session) {
        let Some(token) = session.token.clone() else {
            return;
        };
        let path = self.store.record_path(&session.agent, &token);
        let Some(meta) = SessionMeta::from_session(&session, path) else {
            return;
        };
        let mut tiers = self.tiers.lock();
        tiers.cache.insert(token.clone(), session);
        tiers.index.insert(token, meta);
        Self::enforce_cap(&mut tiers, self.index_max);
    }

    /// Evict least-recently-accessed index entries past the cap; each
    /// index eviction also drops the matching hot entry.
    fn enforce_cap(tiers: &mut Tiers, index_max: usize) {
        while tiers.index.len() > index_max {
            let oldest = tiers
                .index
                .values()
                .min_by_key(|meta| meta.last_access_ms)
                .map(|meta| meta.token.clone());
            let Some(token) = oldest else {
                break;
            };
            tiers.index.remove(&token);
            tiers.cache.remove(&token);
            tracing::debug!(token = %token, "evicted session index entry past cap");
        }
    }
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;
