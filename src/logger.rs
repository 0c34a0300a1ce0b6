// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Observation queue for dispatched events.
//!
//! Every event the account dispatches lands here in arrival order. Producers
//! are worker and engine threads; consumers (tests, monitors, the command line
//! tool) block on [`EventLogger::get`] or [`EventLogger::get_matching`].
//! The queue is unbounded so recording never waits on a slow consumer.

use std::sync::RwLock;
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use log::debug;
use regex::Regex;

use crate::error::{AccountError, AccountResult};
use crate::event::Event;

/// Log target used for per-event trace records.
pub const EVENT_TRACE_TARGET: &str = "mailaccount::events";

pub struct EventLogger {
    sender: Sender<Event>,
    receiver: Receiver<Event>,
    logid: String,
    debug: bool,
    timeout: RwLock<Option<Duration>>,
}

impl EventLogger {
    pub fn new(logid: impl Into<String>, debug: bool) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            logid: logid.into(),
            debug,
            timeout: RwLock::new(None),
        }
    }

    pub fn logid(&self) -> &str {
        &self.logid
    }

    /// Appends `event` to the queue. Never blocks and never fails.
    pub fn record(&self, event: &Event) {
        if self.debug {
            let thread = std::thread::current();
            debug!(
                target: EVENT_TRACE_TARGET,
                "[{}-{}] {}",
                thread.name().unwrap_or("<unnamed>"),
                self.logid,
                event
            );
        }
        // We hold the receiver ourselves, so the channel can't be disconnected.
        let _ = self.sender.send(event.clone());
    }

    /// Default timeout for [`EventLogger::get`] calls that don't pass one.
    pub fn set_timeout(&self, timeout: Option<Duration>) {
        match self.timeout.write() {
            Ok(mut guard) => *guard = timeout,
            Err(poisoned) => *poisoned.into_inner() = timeout,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Waits for the next event.
    ///
    /// Without a timeout here or a default from [`EventLogger::set_timeout`]
    /// this blocks until an event arrives. With `check_error`, error-class
    /// events come back as [`AccountError::Event`].
    pub fn get(&self, timeout: Option<Duration>, check_error: bool) -> AccountResult<Event> {
        let event = match timeout.or_else(|| self.timeout()) {
            Some(timeout) => match self.receiver.recv_timeout(timeout) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => return Err(AccountError::Timeout(timeout)),
                Err(RecvTimeoutError::Disconnected) => return Err(queue_closed()),
            },
            None => self
                .receiver
                .recv()
                .map_err(|_| queue_closed())?,
        };

        if check_error && event.is_error() {
            let (data1, data2) = event.payload();
            return Err(AccountError::Event {
                name: event.name().to_string(),
                data1,
                data2,
            });
        }
        Ok(event)
    }

    /// Consumes events until one whose name matches `pattern` at its start.
    ///
    /// Non-matching events are discarded. Error events and default-timeout
    /// expiry end the wait early.
    pub fn get_matching(&self, pattern: &str) -> AccountResult<Event> {
        let rex = Regex::new(&format!("^(?:{})", pattern))?;
        loop {
            let event = self.get(None, true)?;
            if rex.is_match(event.name()) {
                return Ok(event);
            }
        }
    }

    /// Next event if one is already queued.
    pub fn try_get(&self) -> Option<Event> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Number of events waiting to be consumed.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

// The logger keeps its own sender alive, so this only guards the types.
fn queue_closed() -> AccountError {
    AccountError::Precondition("event queue closed".to_string())
}
