//! Core data models for Rookery
//!
//! Plain row types mirroring the SQLite schema. Everything is created and
//! fetched through `database::Database`; nothing here talks to SQL itself.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// A tenant boundary: every user and stream belongs to exactly one realm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Realm {
    pub id: i64,
    pub domain: String,
}

/// A registered user within a realm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: i64,
    pub realm_id: i64,
    pub email: String,
    pub full_name: String,
    pub short_name: String,
}

/// A named channel users subscribe to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stream {
    pub id: i64,
    pub realm_id: i64,
    pub name: String,
}

/// Discriminant for the polymorphic `recipients` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecipientType {
    /// One-to-one conversation; `type_id` is the receiving user's id
    Personal,
    /// Stream message; `type_id` is the stream id
    Stream,
    /// Ad hoc group conversation; `type_id` is the huddle id
    Huddle,
}

impl RecipientType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientType::Personal => "personal",
            RecipientType::Stream => "stream",
            RecipientType::Huddle => "huddle",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "personal" => Some(RecipientType::Personal),
            "stream" => Some(RecipientType::Stream),
            "huddle" => Some(RecipientType::Huddle),
            _ => None,
        }
    }
}

/// Polymorphic message target: a user's personal feed, a stream, or a huddle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recipient {
    pub id: i64,
    pub recipient_type: RecipientType,
    pub type_id: i64,
}

/// A user's membership in a recipient (stream, huddle, or own personal feed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub recipient_id: i64,
}

/// An ad hoc group conversation, deduplicated by member-set hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Huddle {
    pub id: i64,
    pub huddle_hash: String,
}

/// A message as stored: sender, target, optional topic, rendered content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Option<i64>,
    pub sender_id: i64,
    pub recipient_id: i64,
    /// Only non-empty for stream messages
    pub topic: String,
    pub content: String,
    pub sent_at_unix: i64,
}

impl Message {
    pub fn new(
        sender_id: i64,
        recipient_id: i64,
        topic: String,
        content: String,
        sent_at_unix: i64,
    ) -> Self {
        Self {
            id: None,
            sender_id,
            recipient_id,
            topic,
            content,
            sent_at_unix,
        }
    }
}

/// Hash a string using Rust's default hasher
pub fn hash_string(s: &str) -> String {
    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish().to_string()
}

/// Stable, order-independent hash of a huddle's member ids.
///
/// Two huddles with the same member set must map to the same hash, so the
/// ids are sorted and deduplicated before hashing.
pub fn huddle_hash(user_ids: &[i64]) -> String {
    let mut sorted = user_ids.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    let joined = sorted
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",");
    hash_string(&joined)
}

/// Render corpus lines the way the application stores message bodies:
/// each line ends with a break tag, the whole body wrapped in a paragraph.
pub fn render_body<S: AsRef<str>>(lines: &[S]) -> String {
    let mut body = String::from("<p>");
    for line in lines {
        body.push_str(line.as_ref().trim());
        body.push_str("<br />");
    }
    body.push_str("</p>");
    body
}
