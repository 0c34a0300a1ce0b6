// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The messaging engine seam.
//!
//! The engine performs the actual IMAP/SMTP work and owns the backing store.
//! This crate only drives it: the worker loops call the per-protocol steps,
//! and the engine reports back through the callback registered with
//! [`Engine::set_callback`], from whatever thread it happens to be on.

pub mod error;
pub mod memory;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::event::Event;
use crate::handler::EventReply;

pub use error::{EngineError, EngineResult};
pub use memory::MemoryEngine;
pub use types::{ChatId, ContactId, ContactFilter, MessageId, Protocol};

/// Callback the engine invokes for every event it raises.
///
/// The returned reply is handed back to the engine, which takes ownership of it.
pub type EventCallback = Arc<dyn Fn(Event) -> EventReply + Send + Sync>;

/// Operations the account binding needs from a messaging engine.
///
/// Implementations must be safe to call concurrently from every worker thread
/// and from the account's owner; all locking around engine state is theirs.
pub trait Engine: Send + Sync + 'static {
    /// Opens (creating if absent) the backing store at `path`.
    fn open(&self, path: &Path) -> EngineResult<()>;

    /// Starts configuration. Progress and failures are reported as events.
    fn configure(&self);

    fn perform_jobs(&self, protocol: Protocol);

    fn perform_fetch(&self, protocol: Protocol);

    /// Blocks until new work arrives, the engine's own idle timeout passes,
    /// [`Engine::interrupt_idle`] is called for `protocol`, or `cancel` fires.
    fn perform_idle(&self, protocol: Protocol, cancel: &CancellationToken);

    fn interrupt_idle(&self, protocol: Protocol);

    /// Registers (`Some`) or clears (`None`) the event callback.
    fn set_callback(&self, callback: Option<EventCallback>);

    fn set_config(&self, key: &str, value: &str) -> EngineResult<()>;

    fn get_config(&self, key: &str) -> Option<String>;

    fn is_configured(&self) -> bool;

    fn create_contact(&self, email: &str, name: Option<&str>) -> EngineResult<ContactId>;

    fn get_contacts(&self, filter: ContactFilter, query: Option<&str>) -> Vec<ContactId>;

    fn create_chat_by_contact(&self, contact: ContactId) -> EngineResult<ChatId>;

    fn create_chat_by_message(&self, message: MessageId) -> EngineResult<ChatId>;

    fn mark_seen(&self, messages: &[MessageId]);
}
