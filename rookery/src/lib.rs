//! Rookery Core - storage layer for the Rookery team-messaging app
//!
//! This library implements the persistent entities of a Rookery deployment
//! (realms, user profiles, streams, subscriptions, huddles, messages) over
//! SQLite. It is the surface the `seed-gen` tool drives to populate a test
//! database; the serving side of the application lives elsewhere.

pub mod database;
pub mod models;

pub use database::{Counts, Database, DatabaseError, DatabaseResult};
pub use models::{
    huddle_hash, render_body, Huddle, Message, Realm, Recipient, RecipientType, Stream,
    Subscription, UserProfile,
};
