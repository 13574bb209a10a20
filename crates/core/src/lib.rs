// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! warden-core: domain types for the warden agent coordination core

pub mod macros;

pub mod agent;
pub mod clock;
pub mod id;
pub mod permission;
pub mod queue;
pub mod session;
pub mod trigger;

pub use agent::{AgentDef, AgentDefError, AgentKind};
pub use clock::{Clock, FakeClock, SystemClock};
pub use permission::{
    classify, is_builtin_capability, DenyReason, GateDecision, PermissionId, PermissionRequest,
    PermissionStatus, Tier,
};
#[cfg(any(test, feature = "test-support"))]
pub use queue::QueueItemBuilder;
pub use queue::{EnqueueOptions, ItemId, ItemStatus, Priority, QueueItem};
#[cfg(any(test, feature = "test-support"))]
pub use session::SessionBuilder;
pub use session::{FinalizeError, Message, MessageId, Role, Session, SessionMeta, SessionToken};
pub use trigger::{
    parse_interval, AgentAttachment, AttachmentStatus, DocumentAgents, Trigger, TriggerError,
    Weekday,
};
