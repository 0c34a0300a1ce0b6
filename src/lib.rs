//! Library core for mailaccount.
//!
//! An [`account::Account`] drives a messaging [`engine::Engine`] with one
//! background worker per protocol, fans every engine event out to an
//! [`logger::EventLogger`] and an [`handler::EventHandler`], and lets callers
//! block-wait on the observed events.

// --- Modules ---
pub mod account;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod handler;
pub mod io_threads;
pub mod logger;

pub mod prelude {
    // Config
    pub use crate::config::{AccountConfig, Settings};

    // Account
    pub use crate::account::{dispatch, Account, AccountState};
    pub use crate::error::{AccountError, AccountResult};
    pub use crate::event::{Event, EventPayload};
    pub use crate::handler::{DefaultEventHandler, EventHandler, EventReply, UrlFetcher};
    pub use crate::io_threads::IoThreads;
    pub use crate::logger::EventLogger;

    // Engine
    pub use crate::engine::{
        ChatId, ContactId, Engine, EngineError, EventCallback, MemoryEngine, MessageId, Protocol,
    };

    // Common Libs
    pub use log::{debug, error, info, trace, warn};
    pub use std::sync::Arc;
}
