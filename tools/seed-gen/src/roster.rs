//! Fixed rosters for the seeded realm.
//!
//! Names are placeholders with obvious provenance so a populated test
//! database is recognizable at a glance.

/// Domain of the realm the seeder populates
pub const REALM_DOMAIN: &str = "rookery.test";

/// The named cast every seeded database starts with: (full name, email)
pub const BASE_USERS: &[(&str, &str)] = &[
    ("Othello, the Moor of Venice", "othello@rookery.test"),
    ("Iago", "iago@rookery.test"),
    ("Prospero from The Tempest", "prospero@rookery.test"),
    ("Cordelia Lear", "cordelia@rookery.test"),
    ("King Hamlet", "hamlet@rookery.test"),
];

/// Public streams created in the base realm
pub const STREAM_NAMES: &[&str] = &["Verona", "Denmark", "Scotland", "Venice", "Rome"];
