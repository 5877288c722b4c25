//! Randomized message generation.
//!
//! A fixed total is partitioned across independent workers. Each worker
//! composes bodies from rolling corpus excerpts and classifies every
//! message as a huddle, personal, or stream message by percentage
//! thresholds, with a configurable chance of reusing the previous
//! message's recipient ("stickiness").

use anyhow::{anyhow, Result};
use indicatif::ProgressBar;
use rand::prelude::*;
use rand::rngs::StdRng;
use rookery::{render_body, Database, Message, RecipientType};
use std::collections::HashMap;

/// Resolution of the classifier draws
pub const RANDOM_MAX: u64 = 1_000_000;

/// Seed for the timestamp spread when no --seed is given
const TIMESTAMP_SEED: u64 = 0x5EED_DA7A;

/// Message timestamps decay over roughly this window
const MAX_AGE_SECONDS: i64 = 60 * 24 * 60 * 60;

/// Percentage knobs for the classifier
#[derive(Debug, Clone, Copy)]
pub struct MessageMix {
    pub percent_huddles: f64,
    pub percent_personals: f64,
    pub stickiness: f64,
}

/// Candidate recipients the classifier draws from
pub struct TargetPools {
    pub stream_recipients: Vec<i64>,
    pub huddle_recipients: Vec<i64>,
    pub personal_pairs: Vec<[i64; 2]>,
}

/// A chosen message target; also the sticky state carried between messages.
/// A stream target's topic is decided at send time, so it is `None` until
/// the message is actually composed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Stream {
        recipient_id: i64,
        topic: Option<String>,
    },
    Personal {
        pair: [i64; 2],
    },
    Huddle {
        recipient_id: i64,
    },
}

/// Split `total` across `workers` as evenly as possible; the first
/// `total % workers` workers get one extra.
pub fn partition(total: usize, workers: usize) -> Vec<usize> {
    (0..workers)
        .map(|i| total / workers + usize::from(i < total % workers))
        .collect()
}

/// Pick the target for the next message.
///
/// When a previous target exists, an independent draw under `stickiness`
/// percent reuses it (personal pairs get reshuffled so the direction may
/// flip). Otherwise a single `randkey` draw against the configured
/// percentages picks a huddle, a personal pair, or a stream.
pub fn choose_target(
    rng: &mut StdRng,
    mix: &MessageMix,
    pools: &TargetPools,
    prev: Option<&Target>,
) -> Result<Target> {
    let randkey = rng.gen_range(1..=RANDOM_MAX);

    if let Some(prev) = prev {
        let sticky_draw = rng.gen_range(1..=RANDOM_MAX) as f64 * 100.0 / RANDOM_MAX as f64;
        if sticky_draw < mix.stickiness {
            return Ok(match prev.clone() {
                Target::Personal { mut pair } => {
                    pair.shuffle(rng);
                    Target::Personal { pair }
                }
                other => other,
            });
        }
    }

    let threshold = |percent: f64| RANDOM_MAX as f64 * percent / 100.0;
    if (randkey as f64) <= threshold(mix.percent_huddles) {
        let recipient_id = *pools
            .huddle_recipients
            .choose(rng)
            .ok_or_else(|| anyhow!("huddle message requested but no huddles exist"))?;
        Ok(Target::Huddle { recipient_id })
    } else if (randkey as f64) <= threshold(mix.percent_huddles + mix.percent_personals) {
        let mut pair = *pools
            .personal_pairs
            .choose(rng)
            .ok_or_else(|| anyhow!("personal message requested but no personal pairs exist"))?;
        pair.shuffle(rng);
        Ok(Target::Personal { pair })
    } else {
        let recipient_id = *pools
            .stream_recipients
            .choose(rng)
            .ok_or_else(|| anyhow!("stream message requested but no streams exist"))?;
        Ok(Target::Stream {
            recipient_id,
            topic: None,
        })
    }
}

/// Take 1-5 consecutive corpus lines at the rolling offset and render them
/// as a message body. Returns the body and the advanced offset.
pub fn next_excerpt(rng: &mut StdRng, corpus: &[String], offset: usize) -> (String, usize) {
    let length = rng.gen_range(1..=5);
    let end = (offset + length).min(corpus.len());
    let body = render_body(&corpus[offset..end]);
    (body, (offset + length) % corpus.len())
}

/// Timestamp for the message at `index`: exponential decay over the
/// trailing window, so recent traffic is dense and old traffic sparse.
/// Deterministic per index for a fixed seed.
pub fn spread_timestamp(index: usize, now: i64, seed: u64) -> i64 {
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(index as u64));
    let lambda = 4.0 / MAX_AGE_SECONDS as f64;
    let u: f64 = rng.gen_range(0.0001..1.0);
    let age_seconds = (-u.ln() / lambda).min(MAX_AGE_SECONDS as f64) as i64;
    now - age_seconds
}

/// Shared, read-only context for one generation run
pub struct GenContext<'a> {
    pub db: &'a Database,
    pub corpus: &'a [String],
    pub pools: TargetPools,
    pub mix: MessageMix,
    /// huddle recipient id -> member user ids
    pub huddle_members: HashMap<i64, Vec<i64>>,
    /// stream recipient id -> subscriber user ids
    pub stream_subscribers: HashMap<i64, Vec<i64>>,
    /// stream recipient id -> stream name
    pub stream_names: HashMap<i64, String>,
    /// user id -> recipient id of their personal feed
    pub personal_recipients: HashMap<i64, i64>,
    pub seed: Option<u64>,
    pub now: i64,
}

impl<'a> GenContext<'a> {
    /// Prefetch everything the workers need so the generation loop only
    /// ever writes.
    pub fn load(
        db: &'a Database,
        corpus: &'a [String],
        personal_pairs: Vec<[i64; 2]>,
        mix: MessageMix,
        seed: Option<u64>,
    ) -> Result<Self> {
        Ok(Self {
            db,
            corpus,
            pools: TargetPools {
                stream_recipients: db.recipient_ids(RecipientType::Stream)?,
                huddle_recipients: db.recipient_ids(RecipientType::Huddle)?,
                personal_pairs,
            },
            mix,
            huddle_members: db.subscribers_by_recipient(RecipientType::Huddle)?,
            stream_subscribers: db.subscribers_by_recipient(RecipientType::Stream)?,
            stream_names: db.stream_names_by_recipient()?,
            personal_recipients: db.personal_recipients()?,
            seed,
            now: chrono::Utc::now().timestamp(),
        })
    }
}

/// One worker's share: generate and persist `count` messages.
///
/// `start_index` is the worker's offset into the global message sequence,
/// used to place its timestamps in the overall spread. Sticky state is
/// local to the worker.
pub fn send_messages(
    ctx: &GenContext,
    worker: usize,
    count: usize,
    start_index: usize,
    progress: &ProgressBar,
) -> Result<usize> {
    let mut rng = match ctx.seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(1 + worker as u64)),
        None => StdRng::from_entropy(),
    };
    let ts_seed = ctx.seed.unwrap_or(TIMESTAMP_SEED);

    let mut offset = 0usize;
    let mut prev: Option<Target> = None;

    for i in 0..count {
        let (content, next_offset) = next_excerpt(&mut rng, ctx.corpus, offset);
        offset = next_offset;

        let target = choose_target(&mut rng, &ctx.mix, &ctx.pools, prev.as_ref())?;

        let (sender_id, recipient_id, topic) = match &target {
            Target::Huddle { recipient_id } => {
                let sender = *ctx
                    .huddle_members
                    .get(recipient_id)
                    .and_then(|members| members.choose(&mut rng))
                    .ok_or_else(|| anyhow!("huddle recipient {} has no members", recipient_id))?;
                (sender, *recipient_id, String::new())
            }
            Target::Personal { pair } => {
                let recipient_id = *ctx
                    .personal_recipients
                    .get(&pair[0])
                    .ok_or_else(|| anyhow!("user {} has no personal recipient", pair[0]))?;
                (pair[1], recipient_id, String::new())
            }
            Target::Stream {
                recipient_id,
                topic,
            } => {
                let sender = *ctx
                    .stream_subscribers
                    .get(recipient_id)
                    .and_then(|subscribers| subscribers.choose(&mut rng))
                    .ok_or_else(|| {
                        anyhow!("stream recipient {} has no subscribers", recipient_id)
                    })?;
                let topic = match topic {
                    Some(topic) => topic.clone(),
                    None => {
                        let name = ctx.stream_names.get(recipient_id).ok_or_else(|| {
                            anyhow!("stream recipient {} has no stream row", recipient_id)
                        })?;
                        format!("{}{}", name, rng.gen_range(1..=3))
                    }
                };
                (sender, *recipient_id, topic)
            }
        };

        let sent_at = spread_timestamp(start_index + i, ctx.now, ts_seed);
        ctx.db.insert_message(&Message::new(
            sender_id,
            recipient_id,
            topic.clone(),
            content,
            sent_at,
        ))?;

        prev = Some(match target {
            Target::Stream { recipient_id, .. } => Target::Stream {
                recipient_id,
                topic: Some(topic),
            },
            other => other,
        });
        progress.inc(1);
    }

    Ok(count)
}
