// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution-backend abstraction.
//!
//! The engine never talks to a concrete agent runtime directly; it
//! drives an [`ExecutionBackend`] that owns conversation state on its
//! side and reports progress through an event stream. Tool calls are
//! screened through a [`PermissionGate`] supplied per turn.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod backend;
pub mod gate;

#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use backend::{BackendError, BackendEvent, ExecutionBackend, TurnReply, TurnRequest};
pub use gate::PermissionGate;

#[cfg(any(test, feature = "test-support"))]
pub use fake::{BackendCall, FakeBackend, FakeTurn, StaticGate};
