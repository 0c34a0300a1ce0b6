//! Policy hooks answering questions the engine raises as events.

use std::time::Duration;

use log::{debug, warn};
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use crate::event::Event;

/// Answer handed back to the engine for a dispatched event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EventReply {
    /// Nothing to say; the engine reads this as zero.
    #[default]
    Ack,
    Flag(bool),
    Int(i64),
    /// Freshly allocated buffer the engine takes ownership of.
    Bytes(Vec<u8>),
}

/// Hooks invoked synchronously on whichever thread raised the event.
///
/// Implementations are shared between all worker threads and may be called
/// concurrently, with no ordering between distinct events.
pub trait EventHandler: Send + Sync {
    /// Connectivity probe. `Flag(false)` keeps the engine online.
    fn is_offline(&self) -> EventReply {
        EventReply::Flag(false)
    }

    /// Content fetch on behalf of the engine.
    fn http_get(&self, _url: &str) -> EventReply {
        EventReply::Bytes(Vec::new())
    }

    /// Routes an event to its hook; events without one are acknowledged.
    fn handle(&self, event: &Event) -> EventReply {
        match event {
            Event::IsOffline => self.is_offline(),
            Event::HttpGet { url } => self.http_get(url),
            _ => EventReply::Ack,
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Unexpected status {0}")]
    Status(u16),
}

/// Retrieves the body behind a URL.
#[cfg_attr(test, automock)]
pub trait UrlFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Blocking HTTP fetcher; safe to use from worker threads.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl UrlFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response.bytes()?.to_vec())
    }
}

/// Stock handler: always online, fetches with the given [`UrlFetcher`].
pub struct DefaultEventHandler {
    fetcher: Box<dyn UrlFetcher>,
}

impl DefaultEventHandler {
    pub fn new(fetcher: Box<dyn UrlFetcher>) -> Self {
        Self { fetcher }
    }

    pub fn with_http(timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self::new(Box::new(HttpFetcher::new(timeout)?)))
    }
}

impl EventHandler for DefaultEventHandler {
    fn http_get(&self, url: &str) -> EventReply {
        match self.fetcher.fetch(url) {
            Ok(body) => {
                debug!("Fetched {} bytes from {}", body.len(), url);
                EventReply::Bytes(body)
            }
            Err(e) => {
                warn!("Fetching {} failed, answering with an empty body: {}", url, e);
                EventReply::Bytes(Vec::new())
            }
        }
    }
}
