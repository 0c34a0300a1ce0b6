// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! In-process engine without network I/O.
//!
//! Keeps contacts, chats and configuration in memory, runs configuration as an
//! IMAP job and parks idle-waits on an interruptible channel. Used by the
//! command line tool and the test suite.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, RwLock};
use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, Sender};
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use super::{
    ChatId, ContactFilter, ContactId, Engine, EngineError, EngineResult, EventCallback, MessageId,
    Protocol,
};
use crate::event::Event;
use crate::handler::EventReply;

/// First id handed out to real contacts and chats; lower ids are reserved.
const FIRST_REGULAR_ID: u32 = 10;

enum Job {
    Configure,
    Emit(Event),
}

#[derive(Debug, Clone)]
struct Contact {
    email: String,
    name: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct StoredMessage {
    from: ContactId,
    chat: Option<ChatId>,
    seen: bool,
}

#[derive(Default)]
struct Store {
    path: Option<PathBuf>,
    config: HashMap<String, String>,
    configured: bool,
    contacts: Vec<Contact>,
    chats: HashMap<ContactId, ChatId>,
    messages: HashMap<MessageId, StoredMessage>,
    jobs: HashMap<Protocol, VecDeque<Job>>,
    connected: HashSet<Protocol>,
}

impl Store {
    fn require_open(&self) -> EngineResult<()> {
        match self.path {
            Some(_) => Ok(()),
            None => Err(EngineError::NotOpen),
        }
    }

    fn contact(&self, id: ContactId) -> Option<&Contact> {
        id.0.checked_sub(FIRST_REGULAR_ID)
            .and_then(|idx| self.contacts.get(idx as usize))
    }

    fn chat_for(&mut self, contact: ContactId) -> (ChatId, bool) {
        if let Some(chat) = self.chats.get(&contact) {
            return (*chat, false);
        }
        let chat = ChatId(FIRST_REGULAR_ID + self.chats.len() as u32);
        self.chats.insert(contact, chat);
        (chat, true)
    }
}

struct Wakeup {
    tx: Sender<()>,
    rx: Receiver<()>,
}

pub struct MemoryEngine {
    store: Mutex<Store>,
    callback: RwLock<Option<EventCallback>>,
    wakeups: HashMap<Protocol, Wakeup>,
    idle_timeout: Duration,
    replies: Mutex<Vec<(String, EventReply)>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::with_idle_timeout(Duration::from_secs(60))
    }

    /// Engine whose idle-waits return on their own after `idle_timeout`.
    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        let wakeups = Protocol::ALL
            .iter()
            .map(|p| {
                // One slot is enough: a pending wakeup is never lost, duplicates are.
                let (tx, rx) = bounded(1);
                (*p, Wakeup { tx, rx })
            })
            .collect();

        Self {
            store: Mutex::new(Store::default()),
            callback: RwLock::new(None),
            wakeups,
            idle_timeout,
            replies: Mutex::new(Vec::new()),
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Queues `event` to be raised by the `protocol` worker on its next job step.
    pub fn inject(&self, protocol: Protocol, event: Event) {
        self.lock_store()
            .jobs
            .entry(protocol)
            .or_default()
            .push_back(Job::Emit(event));
        self.interrupt_idle(protocol);
    }

    /// Stores an incoming message from `from` and announces it.
    pub fn receive_message(&self, from: &str) -> EngineResult<MessageId> {
        let contact = self.create_contact(from, None)?;
        let (msg_id, chat) = {
            let mut store = self.lock_store();
            let id = MessageId(FIRST_REGULAR_ID + store.messages.len() as u32);
            let chat = store.chats.get(&contact).copied();
            store.messages.insert(id, StoredMessage { from: contact, chat, seen: false });
            (id, chat)
        };
        self.emit(Event::IncomingMsg {
            chat_id: chat.map_or(0, |c| c.0),
            msg_id: msg_id.0,
        });
        Ok(msg_id)
    }

    pub fn is_seen(&self, message: MessageId) -> bool {
        self.lock_store().messages.get(&message).is_some_and(|m| m.seen)
    }

    /// Replies returned by the callback, in the order events were raised.
    pub fn replies(&self) -> Vec<(String, EventReply)> {
        match self.replies.lock() {
            Ok(replies) => replies.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn lock_store(&self) -> MutexGuard<'_, Store> {
        // A panicking callback must not take the whole engine down with it.
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: Event) -> EventReply {
        let callback = match self.callback.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        let Some(callback) = callback else {
            debug!("No callback registered, dropping {}", event.name());
            return EventReply::Ack;
        };

        let name = event.name().to_string();
        let reply = callback(event);
        match self.replies.lock() {
            Ok(mut replies) => replies.push((name, reply.clone())),
            Err(poisoned) => poisoned.into_inner().push((name, reply.clone())),
        }
        reply
    }

    fn run_configure(&self) {
        self.emit(Event::ConfigureProgress(0));

        let (addr, has_password) = {
            let store = self.lock_store();
            (
                store.config.get("addr").cloned().filter(|a| !a.is_empty()),
                store.config.get("mail_pw").is_some_and(|p| !p.is_empty()),
            )
        };

        let addr = match addr {
            Some(addr) if has_password => addr,
            _ => {
                warn!("Configuration aborted: addr and mail_pw are required");
                self.emit(Event::Error {
                    code: 0,
                    msg: "Please enter an email address and a password.".to_string(),
                });
                self.emit(Event::ConfigureProgress(0));
                return;
            }
        };

        self.emit(Event::ConfigureProgress(500));
        {
            let mut store = self.lock_store();
            store.configured = true;
            store.config.insert("configured".to_string(), "1".to_string());
            store.connected.clear();
        }
        info!("Configured account {}", addr);
        self.emit(Event::ConfigureProgress(1000));

        // SMTP may be parked in idle since before configuration finished.
        self.interrupt_idle(Protocol::Smtp);
    }

    /// Emits the connected event the first time `protocol` runs configured.
    fn connect_if_needed(&self, protocol: Protocol) {
        let addr = {
            let mut store = self.lock_store();
            if !store.configured || !store.connected.insert(protocol) {
                return;
            }
            store.config.get("addr").cloned().unwrap_or_default()
        };

        match protocol {
            Protocol::Imap => self.emit(Event::ImapConnected(format!("IMAP-LOGIN as {}", addr))),
            Protocol::Smtp => self.emit(Event::SmtpConnected(format!("SMTP-LOGIN as {}", addr))),
        };
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for MemoryEngine {
    fn open(&self, path: &Path) -> EngineResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| EngineError::Open(e.to_string()))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| EngineError::Open(e.to_string()))?;

        debug!("Opened store at {}", path.display());
        self.lock_store().path = Some(path.to_path_buf());
        Ok(())
    }

    fn configure(&self) {
        self.lock_store()
            .jobs
            .entry(Protocol::Imap)
            .or_default()
            .push_back(Job::Configure);
        self.interrupt_idle(Protocol::Imap);
    }

    fn perform_jobs(&self, protocol: Protocol) {
        if protocol == Protocol::Smtp {
            self.connect_if_needed(protocol);
        }

        loop {
            let job = self
                .lock_store()
                .jobs
                .get_mut(&protocol)
                .and_then(|queue| queue.pop_front());
            match job {
                Some(Job::Configure) => self.run_configure(),
                Some(Job::Emit(event)) => {
                    self.emit(event);
                }
                None => break,
            }
        }
    }

    fn perform_fetch(&self, protocol: Protocol) {
        if protocol == Protocol::Imap {
            self.connect_if_needed(protocol);
        }
    }

    fn perform_idle(&self, protocol: Protocol, cancel: &CancellationToken) {
        if cancel.is_cancelled() {
            return;
        }
        let has_jobs = self
            .lock_store()
            .jobs
            .get(&protocol)
            .is_some_and(|queue| !queue.is_empty());
        if has_jobs {
            return;
        }
        if let Some(wakeup) = self.wakeups.get(&protocol) {
            // Timeout and wakeup both just end the idle step.
            let _ = wakeup.rx.recv_timeout(self.idle_timeout);
        }
    }

    fn interrupt_idle(&self, protocol: Protocol) {
        if let Some(wakeup) = self.wakeups.get(&protocol) {
            let _ = wakeup.tx.try_send(());
        }
    }

    fn set_callback(&self, callback: Option<EventCallback>) {
        match self.callback.write() {
            Ok(mut guard) => *guard = callback,
            Err(poisoned) => *poisoned.into_inner() = callback,
        }
    }

    fn set_config(&self, key: &str, value: &str) -> EngineResult<()> {
        let mut store = self.lock_store();
        store.require_open()?;
        store.config.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get_config(&self, key: &str) -> Option<String> {
        self.lock_store().config.get(key).cloned()
    }

    fn is_configured(&self) -> bool {
        self.lock_store().configured
    }

    fn create_contact(&self, email: &str, name: Option<&str>) -> EngineResult<ContactId> {
        let email = email.trim();
        if !email.contains('@') {
            return Err(EngineError::InvalidAddress(email.to_string()));
        }

        let id = {
            let mut store = self.lock_store();
            store.require_open()?;
            let existing = store
                .contacts
                .iter()
                .position(|c| c.email.eq_ignore_ascii_case(email));
            match existing {
                Some(idx) => {
                    if let Some(name) = name {
                        store.contacts[idx].name = Some(name.to_string());
                    }
                    ContactId(FIRST_REGULAR_ID + idx as u32)
                }
                None => {
                    store.contacts.push(Contact {
                        email: email.to_string(),
                        name: name.map(str::to_string),
                    });
                    ContactId(FIRST_REGULAR_ID + store.contacts.len() as u32 - 1)
                }
            }
        };

        self.emit(Event::ContactsChanged(id.0));
        Ok(id)
    }

    fn get_contacts(&self, filter: ContactFilter, query: Option<&str>) -> Vec<ContactId> {
        let store = self.lock_store();
        let query = query.map(str::to_lowercase);

        let mut ids = Vec::new();
        if filter.with_self {
            ids.push(ContactId::SELF);
        }
        // Nothing in memory is ever verified.
        if filter.only_verified {
            return ids;
        }

        ids.extend(
            store
                .contacts
                .iter()
                .enumerate()
                .filter(|(_, c)| match &query {
                    Some(q) => {
                        c.email.to_lowercase().contains(q)
                            || c.name.as_deref().is_some_and(|n| n.to_lowercase().contains(q))
                    }
                    None => true,
                })
                .map(|(idx, _)| ContactId(FIRST_REGULAR_ID + idx as u32)),
        );
        ids
    }

    fn create_chat_by_contact(&self, contact: ContactId) -> EngineResult<ChatId> {
        let (chat, created) = {
            let mut store = self.lock_store();
            store.require_open()?;
            if contact != ContactId::SELF && store.contact(contact).is_none() {
                return Err(EngineError::UnknownContact(contact));
            }
            let (chat, created) = store.chat_for(contact);
            for message in store.messages.values_mut().filter(|m| m.from == contact) {
                message.chat = Some(chat);
            }
            (chat, created)
        };

        if created {
            self.emit(Event::MsgsChanged { chat_id: chat.0, msg_id: 0 });
        }
        Ok(chat)
    }

    fn create_chat_by_message(&self, message: MessageId) -> EngineResult<ChatId> {
        let from = self
            .lock_store()
            .messages
            .get(&message)
            .map(|m| m.from)
            .ok_or(EngineError::UnknownMessage(message))?;
        self.create_chat_by_contact(from)
    }

    fn mark_seen(&self, messages: &[MessageId]) {
        let changed: Vec<(u32, u32)> = {
            let mut store = self.lock_store();
            messages
                .iter()
                .filter_map(|id| {
                    let msg = store.messages.get_mut(id)?;
                    if msg.seen {
                        return None;
                    }
                    msg.seen = true;
                    Some((msg.chat.map_or(0, |c| c.0), id.0))
                })
                .collect()
        };

        for (chat_id, msg_id) in changed {
            self.emit(Event::MsgsChanged { chat_id, msg_id });
        }
    }
}
