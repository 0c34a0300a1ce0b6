// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The account: one engine handle plus the machinery that drives it.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info};
use uuid::Uuid;

use crate::config::AccountConfig;
use crate::engine::{
    ChatId, ContactFilter, ContactId, Engine, EventCallback, MessageId, Protocol,
};
use crate::error::{AccountError, AccountResult};
use crate::event::Event;
use crate::handler::{DefaultEventHandler, EventHandler, EventReply};
use crate::io_threads::IoThreads;
use crate::logger::EventLogger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountState {
    /// No callback registered, no workers.
    Inactive,
    /// Callback registered, workers running.
    Active,
}

/// Records `event`, then lets the handler answer it.
///
/// Runs on the thread that raised the event.
pub fn dispatch(logger: &EventLogger, handler: &dyn EventHandler, event: Event) -> EventReply {
    logger.record(&event);
    handler.handle(&event)
}

pub struct Account<E: Engine> {
    engine: Arc<E>,
    logger: Arc<EventLogger>,
    handler: Arc<dyn EventHandler>,
    threads: IoThreads<E>,
    protocols: Vec<Protocol>,
    state: Mutex<AccountState>,
}

impl<E: Engine> Account<E> {
    /// Opens the store at `db_path` (created if missing) with the stock handler.
    pub fn new(engine: E, db_path: impl AsRef<Path>, logid: Option<String>) -> AccountResult<Self> {
        let handler = DefaultEventHandler::with_http(AccountConfig::default().http_timeout())?;
        Self::with_handler(engine, db_path, logid, Arc::new(handler))
    }

    pub fn with_handler(
        engine: E,
        db_path: impl AsRef<Path>,
        logid: Option<String>,
        handler: Arc<dyn EventHandler>,
    ) -> AccountResult<Self> {
        let config = AccountConfig {
            logid,
            ..AccountConfig::default()
        };
        Self::open(engine, db_path.as_ref(), &config, handler)
    }

    /// Opens an account using settings loaded from configuration.
    pub fn from_config(engine: E, config: &AccountConfig) -> AccountResult<Self> {
        let handler = DefaultEventHandler::with_http(config.http_timeout())?;
        Self::open(engine, Path::new(&config.db_path), config, Arc::new(handler))
    }

    fn open(
        engine: E,
        db_path: &Path,
        config: &AccountConfig,
        handler: Arc<dyn EventHandler>,
    ) -> AccountResult<Self> {
        engine.open(db_path).map_err(|e| AccountError::Open {
            path: db_path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let logid = config
            .logid
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string()[..8].to_string());
        let logger = EventLogger::new(logid, config.debug_events);
        logger.set_timeout(config.event_timeout());

        let engine = Arc::new(engine);
        info!("Opened account {} at {}", logger.logid(), db_path.display());

        Ok(Self {
            threads: IoThreads::new(Arc::clone(&engine)),
            engine,
            logger: Arc::new(logger),
            handler,
            protocols: config.protocols.clone(),
            state: Mutex::new(AccountState::Inactive),
        })
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// The observation queue for events dispatched by this account.
    pub fn logger(&self) -> &EventLogger {
        &self.logger
    }

    pub fn logid(&self) -> &str {
        self.logger.logid()
    }

    pub fn state(&self) -> AccountState {
        *self.lock_state()
    }

    /// Registers the dispatch callback, begins configuration and starts the workers.
    pub fn start(&self) -> AccountResult<()> {
        let mut state = self.lock_state();
        if *state == AccountState::Active {
            return Err(AccountError::Precondition(
                "account already started".to_string(),
            ));
        }
        if self.threads.is_stopped() {
            return Err(AccountError::Precondition(
                "account was shut down and cannot be restarted".to_string(),
            ));
        }

        let logger = Arc::clone(&self.logger);
        let handler = Arc::clone(&self.handler);
        let callback: EventCallback =
            Arc::new(move |event: Event| dispatch(&logger, handler.as_ref(), event));
        self.engine.set_callback(Some(callback));
        self.engine.configure();

        if let Err(e) = self.threads.start(&self.protocols) {
            self.engine.set_callback(None);
            return Err(e);
        }

        *state = AccountState::Active;
        info!("Account {} started", self.logid());
        Ok(())
    }

    /// Stops receiving events, then stops and joins the workers.
    pub fn shutdown(&self) {
        let mut state = self.lock_state();
        if *state == AccountState::Inactive {
            debug!("Account {} not running", self.logid());
            return;
        }

        self.engine.set_callback(None);
        self.threads.stop(true);
        *state = AccountState::Inactive;
        info!("Account {} shut down", self.logid());
    }

    pub fn set_config<K, V>(&self, pairs: &[(K, V)]) -> AccountResult<()>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in pairs {
            self.engine.set_config(key.as_ref(), value.as_ref())?;
        }
        Ok(())
    }

    /// Configuration value for `key`; empty when unset.
    pub fn get_config(&self, key: &str) -> String {
        self.engine.get_config(key).unwrap_or_default()
    }

    pub fn is_configured(&self) -> bool {
        self.engine.is_configured()
    }

    pub fn check_is_configured(&self) -> AccountResult<()> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(AccountError::NotConfigured)
        }
    }

    pub fn get_self_contact(&self) -> AccountResult<ContactId> {
        self.check_is_configured()?;
        Ok(ContactId::SELF)
    }

    /// Creates a contact, or unblocks and renames an existing one with that address.
    pub fn create_contact(&self, email: &str, name: Option<&str>) -> AccountResult<ContactId> {
        Ok(self.engine.create_contact(email, name)?)
    }

    pub fn get_contacts(
        &self,
        query: Option<&str>,
        with_self: bool,
        only_verified: bool,
    ) -> Vec<ContactId> {
        let filter = ContactFilter {
            with_self,
            only_verified,
        };
        self.engine.get_contacts(filter, query)
    }

    pub fn create_chat_by_contact(&self, contact: ContactId) -> AccountResult<ChatId> {
        Ok(self.engine.create_chat_by_contact(contact)?)
    }

    pub fn create_chat_by_message(&self, message: MessageId) -> AccountResult<ChatId> {
        Ok(self.engine.create_chat_by_message(message)?)
    }

    pub fn get_message_by_id(&self, id: u32) -> MessageId {
        MessageId(id)
    }

    pub fn mark_seen_messages(&self, messages: &[MessageId]) {
        self.engine.mark_seen(messages);
    }

    fn lock_state(&self) -> MutexGuard<'_, AccountState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<E: Engine> Drop for Account<E> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
