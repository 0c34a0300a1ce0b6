//! Events raised by the messaging engine.
//!
//! Engines report everything that happens through a single callback. The
//! notification arrives here as a typed [`Event`]; engines that only know
//! loose `(name, data1, data2)` triples go through [`Event::from_raw`].

use std::fmt;

/// Loosely typed payload slot of an event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EventPayload {
    #[default]
    Empty,
    Int(i64),
    Text(String),
    Bytes(Vec<u8>),
}

impl EventPayload {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            EventPayload::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            EventPayload::Text(s) => Some(s),
            EventPayload::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    fn as_id(&self) -> u32 {
        self.as_int().and_then(|v| u32::try_from(v).ok()).unwrap_or(0)
    }

    fn into_text(self) -> String {
        match self {
            EventPayload::Text(s) => s,
            EventPayload::Bytes(b) => String::from_utf8_lossy(&b).into_owned(),
            EventPayload::Int(v) => v.to_string(),
            EventPayload::Empty => String::new(),
        }
    }
}

impl From<i64> for EventPayload {
    fn from(v: i64) -> Self {
        EventPayload::Int(v)
    }
}

impl From<u32> for EventPayload {
    fn from(v: u32) -> Self {
        EventPayload::Int(i64::from(v))
    }
}

impl From<&str> for EventPayload {
    fn from(v: &str) -> Self {
        EventPayload::Text(v.to_string())
    }
}

impl From<String> for EventPayload {
    fn from(v: String) -> Self {
        EventPayload::Text(v)
    }
}

impl fmt::Display for EventPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventPayload::Empty => write!(f, "0"),
            EventPayload::Int(v) => write!(f, "{}", v),
            EventPayload::Text(s) => write!(f, "{:?}", s),
            EventPayload::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// A single notification from the engine. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Info(String),
    SmtpConnected(String),
    ImapConnected(String),
    SmtpMessageSent(String),
    Warning(String),
    Error { code: i64, msg: String },
    ErrorNetwork { first: bool, msg: String },
    ErrorSelfNotInGroup(String),
    MsgsChanged { chat_id: u32, msg_id: u32 },
    IncomingMsg { chat_id: u32, msg_id: u32 },
    MsgDelivered { chat_id: u32, msg_id: u32 },
    MsgFailed { chat_id: u32, msg_id: u32 },
    MsgRead { chat_id: u32, msg_id: u32 },
    ChatModified(u32),
    ContactsChanged(u32),
    ConfigureProgress(u32),
    ImexProgress(u32),
    WakeLock(bool),
    /// Connectivity probe; the reply tells the engine whether to go offline.
    IsOffline,
    /// Content fetch request; the reply carries the fetched body.
    HttpGet { url: String },
    /// Any name without a dedicated variant.
    Other {
        name: String,
        data1: EventPayload,
        data2: EventPayload,
    },
}

impl Event {
    /// Builds a typed event from a loose triple, keeping unknown names as [`Event::Other`].
    ///
    /// Names are matched case-insensitively, with or without the engine's
    /// `DC_EVENT_` prefix.
    pub fn from_raw(name: &str, data1: EventPayload, data2: EventPayload) -> Event {
        match canonical_name(name).as_str() {
            "INFO" => Event::Info(data2.into_text()),
            "SMTP_CONNECTED" => Event::SmtpConnected(data2.into_text()),
            "IMAP_CONNECTED" => Event::ImapConnected(data2.into_text()),
            "SMTP_MESSAGE_SENT" => Event::SmtpMessageSent(data2.into_text()),
            "WARNING" => Event::Warning(data2.into_text()),
            "ERROR" => Event::Error {
                code: data1.as_int().unwrap_or(0),
                msg: data2.into_text(),
            },
            "ERROR_NETWORK" => Event::ErrorNetwork {
                first: data1.as_int().unwrap_or(0) != 0,
                msg: data2.into_text(),
            },
            "ERROR_SELF_NOT_IN_GROUP" => Event::ErrorSelfNotInGroup(data2.into_text()),
            "MSGS_CHANGED" => Event::MsgsChanged { chat_id: data1.as_id(), msg_id: data2.as_id() },
            "INCOMING_MSG" => Event::IncomingMsg { chat_id: data1.as_id(), msg_id: data2.as_id() },
            "MSG_DELIVERED" => Event::MsgDelivered { chat_id: data1.as_id(), msg_id: data2.as_id() },
            "MSG_FAILED" => Event::MsgFailed { chat_id: data1.as_id(), msg_id: data2.as_id() },
            "MSG_READ" => Event::MsgRead { chat_id: data1.as_id(), msg_id: data2.as_id() },
            "CHAT_MODIFIED" => Event::ChatModified(data1.as_id()),
            "CONTACTS_CHANGED" => Event::ContactsChanged(data1.as_id()),
            "CONFIGURE_PROGRESS" => Event::ConfigureProgress(data1.as_id()),
            "IMEX_PROGRESS" => Event::ImexProgress(data1.as_id()),
            "WAKE_LOCK" => Event::WakeLock(data1.as_int().unwrap_or(0) != 0),
            "IS_OFFLINE" => Event::IsOffline,
            "HTTP_GET" => Event::HttpGet { url: data1.into_text() },
            _ => Event::Other {
                name: name.to_string(),
                data1,
                data2,
            },
        }
    }

    /// Canonical upper-case name, used for pattern matching and trace output.
    pub fn name(&self) -> &str {
        match self {
            Event::Info(_) => "INFO",
            Event::SmtpConnected(_) => "SMTP_CONNECTED",
            Event::ImapConnected(_) => "IMAP_CONNECTED",
            Event::SmtpMessageSent(_) => "SMTP_MESSAGE_SENT",
            Event::Warning(_) => "WARNING",
            Event::Error { .. } => "ERROR",
            Event::ErrorNetwork { .. } => "ERROR_NETWORK",
            Event::ErrorSelfNotInGroup(_) => "ERROR_SELF_NOT_IN_GROUP",
            Event::MsgsChanged { .. } => "MSGS_CHANGED",
            Event::IncomingMsg { .. } => "INCOMING_MSG",
            Event::MsgDelivered { .. } => "MSG_DELIVERED",
            Event::MsgFailed { .. } => "MSG_FAILED",
            Event::MsgRead { .. } => "MSG_READ",
            Event::ChatModified(_) => "CHAT_MODIFIED",
            Event::ContactsChanged(_) => "CONTACTS_CHANGED",
            Event::ConfigureProgress(_) => "CONFIGURE_PROGRESS",
            Event::ImexProgress(_) => "IMEX_PROGRESS",
            Event::WakeLock(_) => "WAKE_LOCK",
            Event::IsOffline => "IS_OFFLINE",
            Event::HttpGet { .. } => "HTTP_GET",
            Event::Other { name, .. } => name,
        }
    }

    /// The `(data1, data2)` pair as the engine would have raised it.
    pub fn payload(&self) -> (EventPayload, EventPayload) {
        use EventPayload::{Empty, Int, Text};

        match self {
            Event::Info(msg)
            | Event::SmtpConnected(msg)
            | Event::ImapConnected(msg)
            | Event::SmtpMessageSent(msg)
            | Event::Warning(msg)
            | Event::ErrorSelfNotInGroup(msg) => (Empty, Text(msg.clone())),
            Event::Error { code, msg } => (Int(*code), Text(msg.clone())),
            Event::ErrorNetwork { first, msg } => (Int(i64::from(*first)), Text(msg.clone())),
            Event::MsgsChanged { chat_id, msg_id }
            | Event::IncomingMsg { chat_id, msg_id }
            | Event::MsgDelivered { chat_id, msg_id }
            | Event::MsgFailed { chat_id, msg_id }
            | Event::MsgRead { chat_id, msg_id } => (Int(i64::from(*chat_id)), Int(i64::from(*msg_id))),
            Event::ChatModified(id)
            | Event::ContactsChanged(id)
            | Event::ConfigureProgress(id)
            | Event::ImexProgress(id) => (Int(i64::from(*id)), Empty),
            Event::WakeLock(on) => (Int(i64::from(*on)), Empty),
            Event::IsOffline => (Empty, Empty),
            Event::HttpGet { url } => (Text(url.clone()), Empty),
            Event::Other { data1, data2, .. } => (data1.clone(), data2.clone()),
        }
    }

    /// Error-class events are turned into failures by checked retrieval.
    pub fn is_error(&self) -> bool {
        match self {
            Event::Error { .. } | Event::ErrorNetwork { .. } | Event::ErrorSelfNotInGroup(_) => true,
            Event::Other { name, .. } => {
                let name = canonical_name(name);
                name == "ERROR" || name.starts_with("ERROR_")
            }
            _ => false,
        }
    }
}

const RAW_PREFIX: &str = "DC_EVENT_";

/// Upper-cases `name` and drops a leading `DC_EVENT_`.
fn canonical_name(name: &str) -> String {
    let upper = name.to_ascii_uppercase();
    match upper.strip_prefix(RAW_PREFIX) {
        Some(rest) => rest.to_string(),
        None => upper,
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (data1, data2) = self.payload();
        write!(f, "{}({},{})", self.name(), data1, data2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_known_names() {
        let ev = Event::from_raw("http_get", "https://example.org/".into(), EventPayload::Empty);
        assert_eq!(ev, Event::HttpGet { url: "https://example.org/".to_string() });

        let ev = Event::from_raw("MSGS_CHANGED", 3u32.into(), 7u32.into());
        assert_eq!(ev, Event::MsgsChanged { chat_id: 3, msg_id: 7 });
        assert_eq!(ev.name(), "MSGS_CHANGED");
    }

    #[test]
    fn test_from_raw_keeps_unknown_names() {
        let ev = Event::from_raw("FOO_A", 1i64.into(), "x".into());
        assert_eq!(ev.name(), "FOO_A");
        assert_eq!(ev.payload(), (EventPayload::Int(1), EventPayload::Text("x".to_string())));
    }

    #[test]
    fn test_error_class() {
        assert!(Event::Error { code: 0, msg: "boom".into() }.is_error());
        assert!(Event::ErrorNetwork { first: true, msg: "down".into() }.is_error());
        assert!(Event::from_raw("ERROR_CUSTOM", EventPayload::Empty, EventPayload::Empty).is_error());
        assert!(!Event::Warning("careful".into()).is_error());
        assert!(!Event::IsOffline.is_error());
        assert!(!Event::from_raw("ERRORLESS_X", EventPayload::Empty, EventPayload::Empty).is_error());
    }

    #[test]
    fn test_from_raw_accepts_engine_prefix() {
        let ev = Event::from_raw("DC_EVENT_ERROR", 1i64.into(), "boom".into());
        assert_eq!(ev, Event::Error { code: 1, msg: "boom".to_string() });
        assert!(ev.is_error());

        let ev = Event::from_raw("dc_event_http_get", "https://x".into(), EventPayload::Empty);
        assert_eq!(ev, Event::HttpGet { url: "https://x".to_string() });

        let ev = Event::from_raw("DC_EVENT_ERROR_CUSTOM", EventPayload::Empty, EventPayload::Empty);
        assert_eq!(ev.name(), "DC_EVENT_ERROR_CUSTOM");
        assert!(ev.is_error());
    }

    #[test]
    fn test_display() {
        let ev = Event::Error { code: 2, msg: "bad".into() };
        assert_eq!(ev.to_string(), "ERROR(2,\"bad\")");
        assert_eq!(Event::IsOffline.to_string(), "IS_OFFLINE(0,0)");
    }
}
