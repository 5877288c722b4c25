//! Embedded placeholder message corpus for the test-database seeder.
//!
//! A plain text file of chat-like filler lines, one message line each.
//! `seed-gen` takes short consecutive runs of these as message bodies.

use once_cell::sync::Lazy;

static RAW: &str = include_str!("../corpus.txt");

static LINES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    RAW.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
});

/// All corpus lines, in file order.
pub fn lines() -> &'static [&'static str] {
    &LINES
}
