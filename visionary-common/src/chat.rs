//! Visitor identity and chat session rules
//!
//! A session is keyed by the visitor token. Every append bumps the unread
//! counter of the party that did *not* write the message; each party clears
//! only its own counter.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::models::{ChatMessage, ChatSession, Sender, Template};
use crate::{Error, Result};

const VISITOR_PREFIX: &str = "user_";
const VISITOR_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Id of the admin greeting that opens every session
pub const WELCOME_MESSAGE_ID: &str = "welcome";

pub const DEFAULT_WELCOME: &str =
    "Hello! Welcome to Visionary. Ask us anything about our templates.";

/// Opaque visitor token, `user_` followed by 9 base-36 characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VisitorId(String);

impl VisitorId {
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..VISITOR_SUFFIX_LEN)
            .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
            .collect();
        VisitorId(format!("{}{}", VISITOR_PREFIX, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last four characters, used in the default display name
    pub fn short(&self) -> &str {
        let start = self.0.len().saturating_sub(4);
        &self.0[start..]
    }

    pub fn display_name(&self) -> String {
        format!("Visitor {}", self.short())
    }
}

impl FromStr for VisitorId {
    type Err = Error;

    /// Accepts any token of the form `user_<alphanumeric>`
    ///
    /// Tokens are client-held, so older ones with a different suffix length
    /// are still honoured.
    fn from_str(s: &str) -> Result<Self> {
        let suffix = s
            .strip_prefix(VISITOR_PREFIX)
            .ok_or_else(|| Error::InvalidInput(format!("Invalid visitor id: {}", s)))?;
        if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::InvalidInput(format!("Invalid visitor id: {}", s)));
        }
        Ok(VisitorId(s.to_string()))
    }
}

impl TryFrom<String> for VisitorId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<VisitorId> for String {
    fn from(id: VisitorId) -> Self {
        id.0
    }
}

impl fmt::Display for VisitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Side of the conversation looking at a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    Customer,
    Admin,
}

impl Party {
    /// The party whose unread counter a message from `sender` increments
    pub fn recipient_of(sender: Sender) -> Party {
        match sender {
            Sender::Customer => Party::Admin,
            Sender::Admin | Sender::Assistant => Party::Customer,
        }
    }
}

/// Fresh session for a first-time visitor
///
/// Starts with the admin welcome message, which counts as one unread message
/// for the customer.
pub fn new_session(visitor: &VisitorId, welcome: &str, now_ms: i64) -> ChatSession {
    let welcome = ChatMessage {
        id: WELCOME_MESSAGE_ID.to_string(),
        sender: Sender::Admin,
        content: welcome.to_string(),
        timestamp: now_ms,
        kind: Default::default(),
    };

    ChatSession {
        session_id: visitor.as_str().to_string(),
        user_id: visitor.as_str().to_string(),
        user_name: visitor.display_name(),
        avatar: None,
        messages: vec![welcome],
        last_updated: now_ms,
        unread_admin_count: 0,
        unread_user_count: 1,
    }
}

/// Append one message and bump the opposite party's unread counter
pub fn append(session: &mut ChatSession, message: ChatMessage, now_ms: i64) {
    match Party::recipient_of(message.sender) {
        Party::Admin => {
            session.unread_admin_count = session.unread_admin_count.saturating_add(1);
        }
        Party::Customer => {
            session.unread_user_count = session.unread_user_count.saturating_add(1);
        }
    }
    session.messages.push(message);
    session.last_updated = now_ms;
}

/// Clear the viewing party's own counter
///
/// Returns `true` when the counter was non-zero, i.e. a write is needed.
pub fn mark_read(session: &mut ChatSession, party: Party) -> bool {
    let counter = match party {
        Party::Customer => &mut session.unread_user_count,
        Party::Admin => &mut session.unread_admin_count,
    };
    let changed = *counter != 0;
    *counter = 0;
    changed
}

/// Sessions for the admin console, most recently active first
pub fn sort_by_activity(sessions: &mut [ChatSession]) {
    sessions.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
}

/// Pre-filled message for the "contact us" action
pub fn contact_prompt(template: Option<&Template>) -> String {
    match template {
        Some(t) => format!("Hi, I'd like to ask about 【{}】.", t.title),
        None => "Hi, I'd like to ask about your templates.".to_string(),
    }
}

/// Storage object name for a chat attachment
///
/// `<visitor>_<ms>.<ext>`; the extension comes from the uploaded file name,
/// falling back to the MIME subtype.
pub fn attachment_object_name(visitor: &VisitorId, filename: Option<&str>, mime: &str, now_ms: i64) -> String {
    let from_name = filename
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    let ext = match from_name {
        Some(ext) => ext.to_ascii_lowercase(),
        None => mime
            .split('/')
            .nth(1)
            .map(|sub| sub.split(';').next().unwrap_or(sub).trim().to_ascii_lowercase())
            .filter(|sub| !sub.is_empty())
            .unwrap_or_else(|| "bin".to_string()),
    };
    format!("{}_{}.{}", visitor, now_ms, ext)
}
