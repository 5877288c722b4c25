//! One-time setup phase: base realm, users, streams, graduated
//! subscriptions, initial huddles, and personal pairs.

use crate::roster;
use anyhow::{bail, Context, Result};
use rand::prelude::*;
use rand::rngs::StdRng;
use rookery::{Database, Realm, RecipientType};

/// Create the base realm, the named cast plus `extra_users` synthetic
/// users, the public streams, and the graduated stream subscriptions.
/// Any duplicate entity is a hard error.
pub fn create_base_entities(db: &Database, extra_users: usize) -> Result<Realm> {
    let realm = db.create_realm(roster::REALM_DOMAIN)?;

    let mut users: Vec<(String, String)> = roster::BASE_USERS
        .iter()
        .map(|(name, email)| (name.to_string(), email.to_string()))
        .collect();
    for i in 0..extra_users {
        users.push((
            format!("Extra User {}", i),
            format!("extrauser{}@{}", i, roster::REALM_DOMAIN),
        ));
    }

    for (full_name, email) in &users {
        let short_name = email
            .split('@')
            .next()
            .context("user email has no local part")?;
        db.create_user(realm.id, email, full_name, short_name)?;
    }

    for name in roster::STREAM_NAMES {
        db.create_stream(realm.id, name)?;
    }

    subscribe_users_to_streams(db)?;
    Ok(realm)
}

/// Subscribe each user to a prefix of the stream list that grows with the
/// user's position: user `i` of `n` gets the first `streams * i / n + 1`.
/// The first stream ends up with everyone, the last with a handful.
fn subscribe_users_to_streams(db: &Database) -> Result<()> {
    let users = db.user_ids()?;
    let stream_recipients = db.recipient_ids(RecipientType::Stream)?;
    for (i, user_id) in users.iter().enumerate() {
        let take = stream_recipients.len() * i / users.len() + 1;
        for recipient_id in &stream_recipients[..take] {
            db.subscribe(*user_id, *recipient_id)?;
        }
    }
    Ok(())
}

/// Create `count` huddles of 3-4 distinct random users each. Huddles are
/// deduplicated by member set, so the resulting row count may be lower.
pub fn create_huddles(
    db: &Database,
    users: &[i64],
    count: usize,
    rng: &mut StdRng,
) -> Result<()> {
    if count == 0 {
        return Ok(());
    }
    if users.len() < 4 {
        bail!(
            "need at least 4 users to create huddles, have {}",
            users.len()
        );
    }
    for _ in 0..count {
        let size = rng.gen_range(3..=4);
        let members: Vec<i64> = users.choose_multiple(rng, size).copied().collect();
        db.get_or_create_huddle(&members)?;
    }
    Ok(())
}

/// Pick `count` random user pairs for personal conversations.
pub fn pick_personal_pairs(
    users: &[i64],
    count: usize,
    rng: &mut StdRng,
) -> Result<Vec<[i64; 2]>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    if users.len() < 2 {
        bail!(
            "need at least 2 users to create personal pairs, have {}",
            users.len()
        );
    }
    Ok((0..count)
        .map(|_| {
            let pick: Vec<i64> = users.choose_multiple(rng, 2).copied().collect();
            [pick[0], pick[1]]
        })
        .collect())
}
