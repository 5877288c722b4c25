//! SQLite persistence layer for the Rookery entities
//!
//! One table per entity plus a polymorphic `recipients` table pointing at
//! users, streams, or huddles. Uses r2d2 connection pooling so seeder
//! workers can write concurrently without mutex blocking.

use crate::models::{
    huddle_hash, Huddle, Message, Realm, Recipient, RecipientType, Stream, Subscription,
    UserProfile,
};
use chrono::{DateTime, TimeZone, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Timestamp text format used by every table
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

fn format_timestamp(unix: i64) -> String {
    let ts = Utc
        .timestamp_opt(unix, 0)
        .single()
        .unwrap_or_else(Utc::now);
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse timestamp string from database to DateTime<Utc>
fn parse_db_timestamp(timestamp_str: &str) -> DateTime<Utc> {
    chrono::NaiveDateTime::parse_from_str(timestamp_str, TIMESTAMP_FORMAT)
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(timestamp_str, "%Y-%m-%d %H:%M:%S"))
        .map(|dt| Utc.from_utc_datetime(&dt))
        .unwrap_or_else(|_| Utc::now())
}

/// Row counts per entity, for the seeder summary and fixture tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub realms: u64,
    pub users: u64,
    pub streams: u64,
    pub recipients: u64,
    pub subscriptions: u64,
    pub huddles: u64,
    pub messages: u64,
    pub receipts: u64,
}

/// Thread-safe database wrapper using connection pooling
///
/// Uses an r2d2 connection pool so independent workers get independent
/// connections. WAL mode lets readers proceed without blocking each other.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open or create a database at the given path with the default pool size
    pub fn open<P: AsRef<Path>>(path: P) -> DatabaseResult<Self> {
        Self::open_with_pool_size(path, 8)
    }

    /// Open or create a database with an explicit pool size.
    ///
    /// The seeder sizes the pool to its worker count so that no worker ever
    /// waits on another for a connection.
    pub fn open_with_pool_size<P: AsRef<Path>>(path: P, pool_size: u32) -> DatabaseResult<Self> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(
                "
                    PRAGMA journal_mode=WAL;
                    PRAGMA synchronous=NORMAL;
                    PRAGMA foreign_keys=ON;
                    PRAGMA busy_timeout=10000;
                ",
            )?;
            Ok(())
        });

        let pool = Pool::builder().max_size(pool_size.max(1)).build(manager)?;

        let db = Self { pool };
        db.setup_schema()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> DatabaseResult<Self> {
        let manager = SqliteConnectionManager::memory().with_init(|conn| {
            conn.execute_batch(
                "
                    PRAGMA journal_mode=WAL;
                    PRAGMA synchronous=NORMAL;
                    PRAGMA foreign_keys=ON;
                ",
            )?;
            Ok(())
        });

        // In-memory needs single connection to maintain state
        let pool = Pool::builder().max_size(1).build(manager)?;

        let db = Self { pool };
        db.setup_schema()?;
        Ok(db)
    }

    /// Get a connection from the pool
    fn get_conn(&self) -> DatabaseResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    /// Set up the database schema
    fn setup_schema(&self) -> DatabaseResult<()> {
        let conn = self.get_conn()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS realms (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                domain TEXT NOT NULL UNIQUE,
                createdAt TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS user_profiles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                realmId INTEGER NOT NULL REFERENCES realms(id) ON DELETE CASCADE,
                email TEXT NOT NULL UNIQUE,
                fullName TEXT NOT NULL,
                shortName TEXT NOT NULL,
                createdAt TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS streams (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                realmId INTEGER NOT NULL REFERENCES realms(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                UNIQUE(realmId, name)
            );

            CREATE TABLE IF NOT EXISTS recipients (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                type TEXT NOT NULL,
                typeId INTEGER NOT NULL,
                UNIQUE(type, typeId)
            );

            CREATE TABLE IF NOT EXISTS subscriptions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                userId INTEGER NOT NULL REFERENCES user_profiles(id) ON DELETE CASCADE,
                recipientId INTEGER NOT NULL REFERENCES recipients(id) ON DELETE CASCADE,
                UNIQUE(userId, recipientId)
            );

            CREATE TABLE IF NOT EXISTS huddles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                huddleHash TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                senderId INTEGER NOT NULL REFERENCES user_profiles(id),
                recipientId INTEGER NOT NULL REFERENCES recipients(id),
                topic TEXT NOT NULL DEFAULT '',
                content TEXT NOT NULL,
                sentAt TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS user_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                userId INTEGER NOT NULL REFERENCES user_profiles(id) ON DELETE CASCADE,
                messageId INTEGER NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                UNIQUE(userId, messageId)
            );

            CREATE INDEX IF NOT EXISTS idx_messages_recipient ON messages(recipientId);
            CREATE INDEX IF NOT EXISTS idx_messages_sent_at ON messages(sentAt);
            CREATE INDEX IF NOT EXISTS idx_subscriptions_recipient ON subscriptions(recipientId);
            CREATE INDEX IF NOT EXISTS idx_user_messages_user ON user_messages(userId);
        "#,
        )?;

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // ENTITY CREATION
    // ─────────────────────────────────────────────────────────────────────

    /// Create a realm. Creating the same domain twice is a hard error.
    pub fn create_realm(&self, domain: &str) -> DatabaseResult<Realm> {
        let conn = self.get_conn()?;

        let existing: Option<i64> = conn
            .query_row("SELECT id FROM realms WHERE domain = ?1", params![domain], |row| {
                row.get(0)
            })
            .optional()?;
        if existing.is_some() {
            return Err(DatabaseError::AlreadyExists(format!("realm '{}'", domain)));
        }

        conn.execute(
            "INSERT INTO realms (domain, createdAt) VALUES (?1, ?2)",
            params![domain, format_timestamp(Utc::now().timestamp())],
        )?;
        Ok(Realm {
            id: conn.last_insert_rowid(),
            domain: domain.to_string(),
        })
    }

    /// Look up a realm by domain
    pub fn realm_by_domain(&self, domain: &str) -> DatabaseResult<Realm> {
        let conn = self.get_conn()?;
        conn.query_row(
            "SELECT id, domain FROM realms WHERE domain = ?1",
            params![domain],
            |row| {
                Ok(Realm {
                    id: row.get(0)?,
                    domain: row.get(1)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| DatabaseError::NotFound(format!("realm '{}'", domain)))
    }

    /// Create a user along with their personal recipient and the
    /// subscription that lets them receive personal messages.
    ///
    /// Creating the same email twice is a hard error.
    pub fn create_user(
        &self,
        realm_id: i64,
        email: &str,
        full_name: &str,
        short_name: &str,
    ) -> DatabaseResult<UserProfile> {
        let conn = self.get_conn()?;

        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM user_profiles WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(DatabaseError::AlreadyExists(format!("user '{}'", email)));
        }

        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO user_profiles (realmId, email, fullName, shortName, createdAt)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                realm_id,
                email,
                full_name,
                short_name,
                format_timestamp(Utc::now().timestamp())
            ],
        )?;
        let user_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO recipients (type, typeId) VALUES (?1, ?2)",
            params![RecipientType::Personal.as_str(), user_id],
        )?;
        let recipient_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO subscriptions (userId, recipientId) VALUES (?1, ?2)",
            params![user_id, recipient_id],
        )?;
        tx.commit()?;

        Ok(UserProfile {
            id: user_id,
            realm_id,
            email: email.to_string(),
            full_name: full_name.to_string(),
            short_name: short_name.to_string(),
        })
    }

    /// Create a stream and its recipient row.
    ///
    /// Creating the same (realm, name) twice is a hard error.
    pub fn create_stream(&self, realm_id: i64, name: &str) -> DatabaseResult<Stream> {
        let conn = self.get_conn()?;

        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM streams WHERE realmId = ?1 AND name = ?2",
                params![realm_id, name],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(DatabaseError::AlreadyExists(format!("stream '{}'", name)));
        }

        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO streams (realmId, name) VALUES (?1, ?2)",
            params![realm_id, name],
        )?;
        let stream_id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO recipients (type, typeId) VALUES (?1, ?2)",
            params![RecipientType::Stream.as_str(), stream_id],
        )?;
        tx.commit()?;

        Ok(Stream {
            id: stream_id,
            realm_id,
            name: name.to_string(),
        })
    }

    /// Subscribe a user to a recipient. Duplicate pairs are a hard error.
    pub fn subscribe(&self, user_id: i64, recipient_id: i64) -> DatabaseResult<Subscription> {
        let conn = self.get_conn()?;

        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM subscriptions WHERE userId = ?1 AND recipientId = ?2",
                params![user_id, recipient_id],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(DatabaseError::AlreadyExists(format!(
                "subscription (user {}, recipient {})",
                user_id, recipient_id
            )));
        }

        conn.execute(
            "INSERT INTO subscriptions (userId, recipientId) VALUES (?1, ?2)",
            params![user_id, recipient_id],
        )?;
        Ok(Subscription {
            id: conn.last_insert_rowid(),
            user_id,
            recipient_id,
        })
    }

    /// Look up a huddle by its member-set hash
    pub fn huddle_by_hash(&self, hash: &str) -> DatabaseResult<Option<Huddle>> {
        let conn = self.get_conn()?;
        Ok(conn
            .query_row(
                "SELECT id FROM huddles WHERE huddleHash = ?1",
                params![hash],
                |row| row.get(0),
            )
            .optional()?
            .map(|id| Huddle {
                id,
                huddle_hash: hash.to_string(),
            }))
    }

    /// Fetch the huddle for the given member set, creating it (with its
    /// recipient row and member subscriptions) if it does not exist yet.
    pub fn get_or_create_huddle(&self, member_ids: &[i64]) -> DatabaseResult<Recipient> {
        let hash = huddle_hash(member_ids);
        if let Some(huddle) = self.huddle_by_hash(&hash)? {
            return self.recipient(RecipientType::Huddle, huddle.id);
        }
        let conn = self.get_conn()?;

        let tx = conn.unchecked_transaction()?;
        tx.execute("INSERT INTO huddles (huddleHash) VALUES (?1)", params![hash])?;
        let huddle_id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO recipients (type, typeId) VALUES (?1, ?2)",
            params![RecipientType::Huddle.as_str(), huddle_id],
        )?;
        let recipient_id = tx.last_insert_rowid();
        for user_id in member_ids {
            tx.execute(
                "INSERT INTO subscriptions (userId, recipientId) VALUES (?1, ?2)",
                params![user_id, recipient_id],
            )?;
        }
        tx.commit()?;

        Ok(Recipient {
            id: recipient_id,
            recipient_type: RecipientType::Huddle,
            type_id: huddle_id,
        })
    }

    /// Insert a message and a receipt row for every receiving user
    /// (the recipient's subscribers plus the sender).
    pub fn insert_message(&self, message: &Message) -> DatabaseResult<i64> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO messages (senderId, recipientId, topic, content, sentAt)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                message.sender_id,
                message.recipient_id,
                message.topic,
                message.content,
                format_timestamp(message.sent_at_unix)
            ],
        )?;
        let message_id = tx.last_insert_rowid();

        let mut receivers: Vec<i64> = {
            let mut stmt =
                tx.prepare("SELECT userId FROM subscriptions WHERE recipientId = ?1")?;
            let x = stmt
                .query_map(params![message.recipient_id], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            x
        };
        if !receivers.contains(&message.sender_id) {
            receivers.push(message.sender_id);
        }
        for user_id in receivers {
            tx.execute(
                "INSERT INTO user_messages (userId, messageId) VALUES (?1, ?2)",
                params![user_id, message_id],
            )?;
        }

        tx.commit()?;
        Ok(message_id)
    }

    // ─────────────────────────────────────────────────────────────────────
    // QUERIES
    // ─────────────────────────────────────────────────────────────────────

    /// Look up a recipient by (type, typeId)
    pub fn recipient(&self, recipient_type: RecipientType, type_id: i64) -> DatabaseResult<Recipient> {
        let conn = self.get_conn()?;
        conn.query_row(
            "SELECT id FROM recipients WHERE type = ?1 AND typeId = ?2",
            params![recipient_type.as_str(), type_id],
            |row| row.get(0),
        )
        .optional()?
        .map(|id| Recipient {
            id,
            recipient_type,
            type_id,
        })
        .ok_or_else(|| {
            DatabaseError::NotFound(format!(
                "recipient ({}, {})",
                recipient_type.as_str(),
                type_id
            ))
        })
    }

    /// All recipient ids of the given type, in id order
    pub fn recipient_ids(&self, recipient_type: RecipientType) -> DatabaseResult<Vec<i64>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT id FROM recipients WHERE type = ?1 ORDER BY id")?;
        let ids = stmt
            .query_map(params![recipient_type.as_str()], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// All user ids, in id order
    pub fn user_ids(&self) -> DatabaseResult<Vec<i64>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT id FROM user_profiles ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Map each user id to the recipient id of their personal feed
    pub fn personal_recipients(&self) -> DatabaseResult<HashMap<i64, i64>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT typeId, id FROM recipients WHERE type = 'personal'")?;
        let map = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(map)
    }

    /// Subscriber user ids for every recipient of the given type
    pub fn subscribers_by_recipient(
        &self,
        recipient_type: RecipientType,
    ) -> DatabaseResult<HashMap<i64, Vec<i64>>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT s.recipientId, s.userId
             FROM subscriptions s
             JOIN recipients r ON r.id = s.recipientId
             WHERE r.type = ?1
             ORDER BY s.recipientId, s.userId",
        )?;
        let rows = stmt
            .query_map(params![recipient_type.as_str()], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut map: HashMap<i64, Vec<i64>> = HashMap::new();
        for (recipient_id, user_id) in rows {
            map.entry(recipient_id).or_default().push(user_id);
        }
        Ok(map)
    }

    /// Map each stream recipient id to the stream's name (for topics)
    pub fn stream_names_by_recipient(&self) -> DatabaseResult<HashMap<i64, String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT r.id, st.name
             FROM recipients r
             JOIN streams st ON st.id = r.typeId
             WHERE r.type = 'stream'",
        )?;
        let map = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(map)
    }

    /// The most recently inserted messages, newest first
    pub fn fetch_recent_messages(&self, limit: u32) -> DatabaseResult<Vec<Message>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, senderId, recipientId, topic, content, sentAt
             FROM messages ORDER BY id DESC LIMIT ?1",
        )?;
        let messages = stmt
            .query_map(params![limit], |row| {
                let sent_at: String = row.get(5)?;
                Ok(Message {
                    id: Some(row.get(0)?),
                    sender_id: row.get(1)?,
                    recipient_id: row.get(2)?,
                    topic: row.get(3)?,
                    content: row.get(4)?,
                    sent_at_unix: parse_db_timestamp(&sent_at).timestamp(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(messages)
    }

    /// Delete every row of every table (the seeder's delete-and-recreate path)
    pub fn wipe(&self) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            "
            DELETE FROM user_messages;
            DELETE FROM messages;
            DELETE FROM subscriptions;
            DELETE FROM huddles;
            DELETE FROM recipients;
            DELETE FROM streams;
            DELETE FROM user_profiles;
            DELETE FROM realms;
        ",
        )?;
        Ok(())
    }

    /// Row counts per entity
    pub fn counts(&self) -> DatabaseResult<Counts> {
        let conn = self.get_conn()?;
        let count = |table: &str| -> DatabaseResult<u64> {
            let n: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })?;
            Ok(n as u64)
        };
        Ok(Counts {
            realms: count("realms")?,
            users: count("user_profiles")?,
            streams: count("streams")?,
            recipients: count("recipients")?,
            subscriptions: count("subscriptions")?,
            huddles: count("huddles")?,
            messages: count("messages")?,
            receipts: count("user_messages")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_db() -> (Database, Realm) {
        let db = Database::open_in_memory().unwrap();
        let realm = db.create_realm("rookery.test").unwrap();
        (db, realm)
    }

    #[test]
    fn test_create_user_creates_personal_recipient() {
        let (db, realm) = seeded_db();
        let user = db
            .create_user(realm.id, "iago@rookery.test", "Iago", "iago")
            .unwrap();

        let recipient = db.recipient(RecipientType::Personal, user.id).unwrap();
        assert_eq!(recipient.type_id, user.id);

        // The user is subscribed to their own personal feed
        let subs = db.subscribers_by_recipient(RecipientType::Personal).unwrap();
        assert_eq!(subs.get(&recipient.id), Some(&vec![user.id]));
    }

    #[test]
    fn test_duplicate_user_is_hard_error() {
        let (db, realm) = seeded_db();
        db.create_user(realm.id, "iago@rookery.test", "Iago", "iago")
            .unwrap();
        let err = db
            .create_user(realm.id, "iago@rookery.test", "Iago Again", "iago2")
            .unwrap_err();
        assert!(matches!(err, DatabaseError::AlreadyExists(_)));
    }

    #[test]
    fn test_duplicate_stream_is_hard_error() {
        let (db, realm) = seeded_db();
        db.create_stream(realm.id, "Verona").unwrap();
        let err = db.create_stream(realm.id, "Verona").unwrap_err();
        assert!(matches!(err, DatabaseError::AlreadyExists(_)));
    }

    #[test]
    fn test_duplicate_realm_is_hard_error() {
        let (db, _realm) = seeded_db();
        let err = db.create_realm("rookery.test").unwrap_err();
        assert!(matches!(err, DatabaseError::AlreadyExists(_)));
    }

    #[test]
    fn test_huddle_deduplicated_by_member_set() {
        let (db, realm) = seeded_db();
        let ids: Vec<i64> = (0..4)
            .map(|i| {
                db.create_user(
                    realm.id,
                    &format!("user{}@rookery.test", i),
                    &format!("User {}", i),
                    &format!("user{}", i),
                )
                .unwrap()
                .id
            })
            .collect();

        let first = db.get_or_create_huddle(&[ids[0], ids[1], ids[2]]).unwrap();
        let again = db.get_or_create_huddle(&[ids[2], ids[0], ids[1]]).unwrap();
        assert_eq!(first, again, "Same member set should reuse the huddle");

        let other = db.get_or_create_huddle(&[ids[0], ids[1], ids[3]]).unwrap();
        assert_ne!(first.id, other.id);
        assert_eq!(db.counts().unwrap().huddles, 2);
    }

    #[test]
    fn test_huddle_members_subscribed() {
        let (db, realm) = seeded_db();
        let ids: Vec<i64> = (0..3)
            .map(|i| {
                db.create_user(
                    realm.id,
                    &format!("m{}@rookery.test", i),
                    &format!("Member {}", i),
                    &format!("m{}", i),
                )
                .unwrap()
                .id
            })
            .collect();

        let huddle = db.get_or_create_huddle(&ids).unwrap();
        let members = db.subscribers_by_recipient(RecipientType::Huddle).unwrap();
        assert_eq!(members.get(&huddle.id), Some(&ids));
    }

    #[test]
    fn test_insert_message_fans_out_receipts() {
        let (db, realm) = seeded_db();
        let sender = db
            .create_user(realm.id, "hamlet@rookery.test", "King Hamlet", "hamlet")
            .unwrap();
        let other = db
            .create_user(realm.id, "cordelia@rookery.test", "Cordelia Lear", "cordelia")
            .unwrap();

        let stream = db.create_stream(realm.id, "Denmark").unwrap();
        let recipient = db.recipient(RecipientType::Stream, stream.id).unwrap();
        db.subscribe(other.id, recipient.id).unwrap();

        let message = Message::new(
            sender.id,
            recipient.id,
            "Denmark1".to_string(),
            "<p>something is rotten<br /></p>".to_string(),
            1_700_000_000,
        );
        db.insert_message(&message).unwrap();

        // Receipts for the subscriber and for the (unsubscribed) sender
        let counts = db.counts().unwrap();
        assert_eq!(counts.messages, 1);
        assert_eq!(counts.receipts, 2);
    }

    #[test]
    fn test_fetch_recent_messages_roundtrip() {
        let (db, realm) = seeded_db();
        let sender = db
            .create_user(realm.id, "prospero@rookery.test", "Prospero", "prospero")
            .unwrap();
        let stream = db.create_stream(realm.id, "Venice").unwrap();
        let recipient = db.recipient(RecipientType::Stream, stream.id).unwrap();
        db.subscribe(sender.id, recipient.id).unwrap();

        let sent = Message::new(
            sender.id,
            recipient.id,
            "Venice2".to_string(),
            "<p>my library was dukedom large enough<br /></p>".to_string(),
            1_700_000_123,
        );
        db.insert_message(&sent).unwrap();

        let fetched = db.fetch_recent_messages(10).unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].topic, "Venice2");
        assert_eq!(fetched[0].content, sent.content);
        assert_eq!(fetched[0].sent_at_unix, 1_700_000_123);
    }

    #[test]
    fn test_wipe_clears_everything() {
        let (db, realm) = seeded_db();
        db.create_user(realm.id, "othello@rookery.test", "Othello", "othello")
            .unwrap();
        db.create_stream(realm.id, "Scotland").unwrap();

        db.wipe().unwrap();
        let counts = db.counts().unwrap();
        assert_eq!(counts.realms, 0);
        assert_eq!(counts.users, 0);
        assert_eq!(counts.streams, 0);
        assert_eq!(counts.recipients, 0);
        assert_eq!(counts.subscriptions, 0);
    }
}
