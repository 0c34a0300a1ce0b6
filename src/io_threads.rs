// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Background worker loops, one per protocol.
//!
//! Each worker repeats `jobs -> fetch -> idle` against the engine until the
//! shared cancellation token fires. Cancellation is checked once per cycle, so
//! [`IoThreads::stop`] also interrupts the engine's idle-wait to make a
//! blocked worker notice promptly.

use std::collections::BTreeMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use log::{debug, error, info};
use tokio_util::sync::CancellationToken;

use crate::engine::{Engine, Protocol};
use crate::error::{AccountError, AccountResult};

pub struct IoThreads<E: Engine> {
    engine: Arc<E>,
    quit: CancellationToken,
    workers: Mutex<BTreeMap<Protocol, JoinHandle<()>>>,
}

impl<E: Engine> IoThreads<E> {
    pub fn new(engine: Arc<E>) -> Self {
        Self {
            engine,
            quit: CancellationToken::new(),
            workers: Mutex::new(BTreeMap::new()),
        }
    }

    /// Spawns one worker per protocol in `protocols`.
    ///
    /// Fails if workers are already registered, or if this instance was
    /// stopped before: the quit flag is never reset. If a spawn fails, the
    /// workers started so far are cancelled and joined before returning.
    pub fn start(&self, protocols: &[Protocol]) -> AccountResult<()> {
        self.start_with(protocols, |protocol, body| {
            thread::Builder::new()
                .name(protocol.name().to_string())
                .spawn(body)
        })
    }

    fn start_with<S>(&self, protocols: &[Protocol], mut spawn: S) -> AccountResult<()>
    where
        S: FnMut(Protocol, Box<dyn FnOnce() + Send + 'static>) -> io::Result<JoinHandle<()>>,
    {
        let mut workers = self.lock_workers();
        if !workers.is_empty() {
            return Err(AccountError::Precondition(
                "io threads already started".to_string(),
            ));
        }
        if self.quit.is_cancelled() {
            return Err(AccountError::Precondition(
                "io threads were stopped and cannot be restarted".to_string(),
            ));
        }

        let mut tokens = Vec::with_capacity(protocols.len());
        for &protocol in protocols {
            if workers.contains_key(&protocol) {
                continue;
            }
            let engine = Arc::clone(&self.engine);
            let cancel = self.quit.child_token();
            tokens.push(cancel.clone());
            let body: Box<dyn FnOnce() + Send> =
                Box::new(move || run_worker(engine.as_ref(), protocol, &cancel));
            match spawn(protocol, body) {
                Ok(handle) => {
                    workers.insert(protocol, handle);
                }
                Err(e) => {
                    error!("Failed to spawn {} thread: {}", protocol, e);
                    tokens.iter().for_each(CancellationToken::cancel);
                    for protocol in workers.keys() {
                        self.engine.interrupt_idle(*protocol);
                    }
                    join_all(std::mem::take(&mut *workers));
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    /// Sets the quit flag and interrupts every idle-wait.
    ///
    /// With `wait`, returns once all workers have exited.
    pub fn stop(&self, wait: bool) {
        self.quit.cancel();
        for protocol in Protocol::ALL {
            self.engine.interrupt_idle(protocol);
        }

        if !wait {
            return;
        }
        let workers = std::mem::take(&mut *self.lock_workers());
        join_all(workers);
    }

    pub fn is_running(&self) -> bool {
        !self.lock_workers().is_empty()
    }

    pub fn running_protocols(&self) -> Vec<Protocol> {
        self.lock_workers().keys().copied().collect()
    }

    pub fn is_stopped(&self) -> bool {
        self.quit.is_cancelled()
    }

    fn lock_workers(&self) -> MutexGuard<'_, BTreeMap<Protocol, JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn join_all(workers: BTreeMap<Protocol, JoinHandle<()>>) {
    for (protocol, handle) in workers {
        if handle.join().is_err() {
            error!("{} worker panicked", protocol);
        }
    }
}

fn run_worker<E: Engine>(engine: &E, protocol: Protocol, cancel: &CancellationToken) {
    info!("starting {} thread", protocol);
    let mut cycles: u64 = 0;
    while !cancel.is_cancelled() {
        engine.perform_jobs(protocol);
        engine.perform_fetch(protocol);
        engine.perform_idle(protocol, cancel);
        cycles += 1;
    }
    debug!("{} thread exiting after {} cycles", protocol, cycles);
}
