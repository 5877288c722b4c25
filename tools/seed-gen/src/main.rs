//! Synthetic test-database seeder for Rookery
//!
//! Populates a Rookery SQLite database with a realm, users, streams,
//! subscriptions, huddles, and randomized messages so the application can
//! be exercised against a non-empty dataset during development.
//!
//! Run with: cargo run -p seed-gen -- --db-path rookery_test.sqlite

mod generator;
mod roster;
mod setup;

use anyhow::{bail, Context, Result};
use clap::Parser;
use generator::{GenContext, MessageMix};
use indicatif::{ProgressBar, ProgressStyle};
use rand::prelude::*;
use rand::rngs::StdRng;
use rookery::{Counts, Database};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The number of messages to create
    #[arg(short = 'n', long)]
    num_messages: Option<usize>,

    /// The number of extra users to create
    #[arg(long)]
    extra_users: Option<usize>,

    /// The number of huddles to create
    #[arg(long)]
    huddles: Option<usize>,

    /// The number of personal pairs to create
    #[arg(long)]
    personals: Option<usize>,

    /// The number of worker threads to use
    #[arg(long)]
    workers: Option<usize>,

    /// The percent of messages to be huddles
    #[arg(long)]
    percent_huddles: Option<f64>,

    /// The percent of messages to be personals
    #[arg(long)]
    percent_personals: Option<f64>,

    /// The percent of messages that repeat the previous recipient
    #[arg(long)]
    stickiness: Option<f64>,

    /// Keep existing rows instead of deleting everything first
    #[arg(long)]
    nodelete: bool,

    /// Path of the SQLite database to populate
    #[arg(short, long, default_value = "rookery_test.sqlite")]
    db_path: String,

    /// Text file to use as the message corpus instead of the embedded one
    #[arg(long)]
    text_file: Option<PathBuf>,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// JSON file with default knob values (explicit flags win)
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Print the final row-count summary as JSON
    #[arg(long)]
    summary_json: bool,
}

/// Knob defaults loadable from a JSON profile; any field may be omitted
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
struct SeedProfile {
    num_messages: Option<usize>,
    extra_users: Option<usize>,
    huddles: Option<usize>,
    personals: Option<usize>,
    workers: Option<usize>,
    percent_huddles: Option<f64>,
    percent_personals: Option<f64>,
    stickiness: Option<f64>,
}

/// Fully resolved run configuration
#[derive(Debug, Clone)]
struct SeedOpts {
    num_messages: usize,
    extra_users: usize,
    huddles: usize,
    personals: usize,
    workers: usize,
    percent_huddles: f64,
    percent_personals: f64,
    stickiness: f64,
    delete: bool,
    seed: Option<u64>,
}

impl SeedOpts {
    /// Explicit flags win over the profile, the profile over built-ins.
    fn resolve(args: &Args, profile: &SeedProfile) -> Self {
        Self {
            num_messages: args.num_messages.or(profile.num_messages).unwrap_or(600),
            extra_users: args.extra_users.or(profile.extra_users).unwrap_or(0),
            huddles: args.huddles.or(profile.huddles).unwrap_or(3),
            personals: args.personals.or(profile.personals).unwrap_or(6),
            workers: args.workers.or(profile.workers).unwrap_or(10),
            percent_huddles: args
                .percent_huddles
                .or(profile.percent_huddles)
                .unwrap_or(15.0),
            percent_personals: args
                .percent_personals
                .or(profile.percent_personals)
                .unwrap_or(15.0),
            stickiness: args.stickiness.or(profile.stickiness).unwrap_or(20.0),
            delete: !args.nodelete,
            seed: args.seed,
        }
    }

    /// Reject impossible configurations before touching the database.
    fn validate(&self) -> Result<()> {
        if self.percent_huddles + self.percent_personals > 100.0 {
            bail!("more than 100% of messages allocated to huddles and personals");
        }
        if self.num_messages == 0 {
            bail!("--num-messages must be at least 1");
        }
        if self.workers == 0 {
            bail!("--workers must be at least 1");
        }
        Ok(())
    }
}

fn load_profile(path: Option<&PathBuf>) -> Result<SeedProfile> {
    match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read profile {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse profile {}", path.display()))
        }
        None => Ok(SeedProfile::default()),
    }
}

/// The message corpus: an external text file if given, the embedded
/// fixture lines otherwise. An empty corpus is a hard error.
fn load_corpus(path: Option<&PathBuf>) -> Result<Vec<String>> {
    let lines: Vec<String> = match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read corpus {}", path.display()))?
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        None => fixture_text::lines().iter().map(|l| l.to_string()).collect(),
    };
    if lines.is_empty() {
        bail!("message corpus is empty");
    }
    Ok(lines)
}

/// Execute a full seeding run against an open database.
fn run(db: &Database, opts: &SeedOpts, corpus: &[String], progress: &ProgressBar) -> Result<Counts> {
    let mut rng = match opts.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    if opts.delete {
        db.wipe()?;
        setup::create_base_entities(db, opts.extra_users)?;
    } else {
        db.realm_by_domain(roster::REALM_DOMAIN)
            .context("a run with --nodelete requires a previously seeded database")?;
    }

    let users = db.user_ids()?;
    setup::create_huddles(db, &users, opts.huddles, &mut rng)?;
    let pairs = setup::pick_personal_pairs(&users, opts.personals, &mut rng)?;

    let mix = MessageMix {
        percent_huddles: opts.percent_huddles,
        percent_personals: opts.percent_personals,
        stickiness: opts.stickiness,
    };
    let ctx = GenContext::load(db, corpus, pairs, mix, opts.seed)?;

    let shares = generator::partition(opts.num_messages, opts.workers);
    std::thread::scope(|scope| -> Result<()> {
        let mut handles = Vec::with_capacity(shares.len());
        let mut start_index = 0;
        for (worker, count) in shares.iter().copied().enumerate() {
            let ctx = &ctx;
            handles.push(scope.spawn(move || {
                generator::send_messages(ctx, worker, count, start_index, progress)
            }));
            start_index += count;
        }
        for handle in handles {
            handle
                .join()
                .map_err(|_| anyhow::anyhow!("worker thread panicked"))??;
        }
        Ok(())
    })?;

    Ok(db.counts()?)
}

fn print_summary(counts: &Counts) {
    println!();
    println!("Successfully populated test database.");
    println!("  Realms: {}", counts.realms);
    println!("  Users: {}", counts.users);
    println!("  Streams: {}", counts.streams);
    println!("  Subscriptions: {}", counts.subscriptions);
    println!("  Huddles: {}", counts.huddles);
    println!("  Messages: {}", counts.messages);
    println!("  Receipts: {}", counts.receipts);
}

fn main() -> Result<()> {
    let args = Args::parse();
    let profile = load_profile(args.profile.as_ref())?;
    let opts = SeedOpts::resolve(&args, &profile);
    opts.validate()?;

    let corpus = load_corpus(args.text_file.as_ref())?;

    let db = Database::open_with_pool_size(&args.db_path, opts.workers as u32 + 2)
        .with_context(|| format!("failed to open database {}", args.db_path))?;

    let progress = ProgressBar::new(opts.num_messages as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let counts = run(&db, &opts, &corpus, &progress)?;
    progress.finish_and_clear();

    if args.summary_json {
        println!("{}", serde_json::to_string_pretty(&counts)?);
    } else {
        print_summary(&counts);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_opts(messages: usize, workers: usize) -> SeedOpts {
        SeedOpts {
            num_messages: messages,
            extra_users: 2,
            huddles: 2,
            personals: 3,
            workers,
            percent_huddles: 15.0,
            percent_personals: 15.0,
            stickiness: 20.0,
            delete: true,
            seed: Some(7),
        }
    }

    fn corpus() -> Vec<String> {
        fixture_text::lines().iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn full_run_produces_requested_counts() {
        let temp = TempDir::new().unwrap();
        let db = Database::open_with_pool_size(temp.path().join("seed.db"), 6).unwrap();
        let opts = test_opts(40, 3);
        let progress = ProgressBar::hidden();

        let counts = run(&db, &opts, &corpus(), &progress).unwrap();
        assert_eq!(counts.realms, 1);
        assert_eq!(counts.users, 7, "5 named users plus 2 extras");
        assert_eq!(counts.streams, 5);
        assert!(counts.huddles >= 1 && counts.huddles <= 2);
        assert_eq!(counts.messages, 40, "exactly the requested message count");
        assert!(counts.receipts >= counts.messages);
    }

    #[test]
    fn stream_messages_carry_numbered_topics() {
        let temp = TempDir::new().unwrap();
        let db = Database::open_with_pool_size(temp.path().join("seed.db"), 4).unwrap();
        let mut opts = test_opts(30, 2);
        // Stream-only mix so every message has a topic
        opts.percent_huddles = 0.0;
        opts.percent_personals = 0.0;
        let progress = ProgressBar::hidden();

        run(&db, &opts, &corpus(), &progress).unwrap();
        for message in db.fetch_recent_messages(30).unwrap() {
            let stream = roster::STREAM_NAMES
                .iter()
                .find(|name| message.topic.starts_with(*name))
                .unwrap_or_else(|| panic!("topic '{}' names no stream", message.topic));
            let suffix = &message.topic[stream.len()..];
            assert!(
                matches!(suffix, "1" | "2" | "3"),
                "topic '{}' should end in 1-3",
                message.topic
            );
            assert!(message.content.starts_with("<p>"));
            assert!(message.content.ends_with("<br /></p>"));
        }
    }

    #[test]
    fn nodelete_appends_to_an_existing_database() {
        let temp = TempDir::new().unwrap();
        let db = Database::open_with_pool_size(temp.path().join("seed.db"), 6).unwrap();
        let progress = ProgressBar::hidden();

        run(&db, &test_opts(20, 2), &corpus(), &progress).unwrap();
        let mut again = test_opts(15, 2);
        again.delete = false;
        let counts = run(&db, &again, &corpus(), &progress).unwrap();
        assert_eq!(counts.messages, 35);
        assert_eq!(counts.users, 7, "no users added on a --nodelete run");
    }

    #[test]
    fn nodelete_against_an_empty_database_fails() {
        let temp = TempDir::new().unwrap();
        let db = Database::open_with_pool_size(temp.path().join("seed.db"), 2).unwrap();
        let mut opts = test_opts(5, 1);
        opts.delete = false;
        assert!(run(&db, &opts, &corpus(), &ProgressBar::hidden()).is_err());
    }

    #[test]
    fn overcommitted_percentages_are_rejected() {
        let mut bad = test_opts(10, 1);
        bad.percent_huddles = 60.0;
        bad.percent_personals = 50.0;
        assert!(bad.validate().is_err());
        assert!(test_opts(10, 1).validate().is_ok());
    }

    #[test]
    fn profile_fills_gaps_and_flags_win() {
        let profile: SeedProfile =
            serde_json::from_str(r#"{"numMessages": 50, "workers": 2}"#).unwrap();
        let args = Args::parse_from(["seed-gen", "--num-messages", "75"]);
        let opts = SeedOpts::resolve(&args, &profile);
        assert_eq!(opts.num_messages, 75, "explicit flag wins over profile");
        assert_eq!(opts.workers, 2, "profile fills unset knobs");
        assert_eq!(opts.huddles, 3, "built-in default when neither is set");
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let progress = ProgressBar::hidden();
        let mut summaries = Vec::new();
        for _ in 0..2 {
            let temp = TempDir::new().unwrap();
            let db = Database::open_with_pool_size(temp.path().join("seed.db"), 3).unwrap();
            run(&db, &test_opts(25, 1), &corpus(), &progress).unwrap();
            let mut messages = db.fetch_recent_messages(25).unwrap();
            messages.iter_mut().for_each(|m| m.id = None);
            summaries.push(messages);
        }
        // Same seed, single worker: identical senders, recipients, topics,
        // and contents (timestamps differ through "now")
        let strip = |ms: &[rookery::Message]| -> Vec<(i64, i64, String, String)> {
            ms.iter()
                .map(|m| (m.sender_id, m.recipient_id, m.topic.clone(), m.content.clone()))
                .collect()
        };
        assert_eq!(strip(&summaries[0]), strip(&summaries[1]));
    }
}
