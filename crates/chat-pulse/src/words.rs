//! Free-text word extraction and batching.
//!
//! Words feed the word cloud. They are cleaned, filtered against stop words
//! and emote catalogs, then buffered in a [`WordBatcher`] which flushes them
//! in one batch after a single-shot delay.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rustc_hash::FxHashSet;
use tracing::trace;

use crate::catalog::CatalogSet;
use crate::emote::is_word_char;

/// Built-in stop words for chat text.
const STOP_WORDS: &[&str] = &[
    "the", "and", "you", "that", "for", "are", "with", "this", "have", "but", "was", "not",
    "your", "all", "can", "our", "will", "just", "like", "get", "has", "had", "its", "how",
    "why", "when", "where", "what", "who", "which", "their", "there", "from", "they", "been",
    "were", "then", "than", "some", "because", "would", "could", "should", "might", "well",
    "also", "very", "into", "through", "about", "upon", "since", "until", "while", "though",
    "although", "however", "therefore", "moreover", "furthermore", "nevertheless",
    "nonetheless", "no", "yes", "ok", "okay", "hey", "hi", "hello", "lol", "lmfao", "lmao",
    "rofl", "haha", "hehe", "xd", "pls", "please", "thx", "thanks", "thank", "ty", "omg",
    "wtf", "brb", "afk", "imo", "imho", "btw", "fyi", "irl", "tbh", "idk", "smh", "nsfw",
    "sfw", "gg", "wp", "gl", "hf", "mb", "rip", "op", "nerf", "buff", "patch", "update",
    "game", "play", "player", "stream", "twitch", "chat", "viewer", "sub", "follow", "bit",
    "donation",
];

/// Filters chat words before they are counted.
#[derive(Debug, Clone)]
pub struct WordFilter {
    min_len: usize,
    stop_words: FxHashSet<String>,
}

impl WordFilter {
    /// Create a filter with the built-in stop words plus `extra_stop_words`.
    pub fn new<I, S>(min_len: usize, extra_stop_words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut stop_words: FxHashSet<String> = STOP_WORDS.iter().map(|s| s.to_string()).collect();
        stop_words.extend(
            extra_stop_words
                .into_iter()
                .map(|s| s.as_ref().to_lowercase()),
        );
        Self {
            min_len,
            stop_words,
        }
    }

    pub fn min_len(&self) -> usize {
        self.min_len
    }

    /// Extract countable words from a message.
    ///
    /// Each word is lowercased with non-word characters removed. Words that
    /// are too short, stop words, links, numbers or emote tokens are skipped.
    pub fn extract(&self, message: &str, catalogs: &CatalogSet) -> Vec<String> {
        message
            .split_whitespace()
            .filter_map(|raw| {
                let clean = clean_word(raw);
                self.accepts(raw, &clean, catalogs).then_some(clean)
            })
            .collect()
    }

    fn accepts(&self, raw: &str, clean: &str, catalogs: &CatalogSet) -> bool {
        if clean.len() < self.min_len
            || self.stop_words.contains(clean)
            || clean.contains("www")
            || clean.contains("http")
        {
            return false;
        }
        if catalogs.contains(clean) || catalogs.contains(raw) {
            trace!(raw, "Skipping emote token in word extraction");
            return false;
        }
        !clean.bytes().all(|b| b.is_ascii_digit())
    }
}

impl Default for WordFilter {
    fn default() -> Self {
        Self::new(3, std::iter::empty::<&str>())
    }
}

/// Lowercase and drop every non-word character.
fn clean_word(raw: &str) -> String {
    raw.to_lowercase().chars().filter(|c| is_word_char(*c)).collect()
}

/// Scheduling state of a [`WordBatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// Nothing scheduled.
    Idle,
    /// A flush is due at `deadline`.
    Armed { deadline: DateTime<Utc> },
}

/// Buffers words and releases them in batches after a single-shot delay.
///
/// The delay is armed by the first word buffered since the last flush and is
/// never re-armed while pending, so a steady stream of messages still flushes
/// once per delay.
#[derive(Debug)]
pub struct WordBatcher {
    delay: Duration,
    pending: Vec<String>,
    state: BatchState,
}

impl WordBatcher {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Vec::new(),
            state: BatchState::Idle,
        }
    }

    /// Buffer words. Returns `true` when this call armed the timer.
    pub fn push(&mut self, words: Vec<String>, now: DateTime<Utc>) -> bool {
        if words.is_empty() {
            return false;
        }
        self.pending.extend(words);

        if self.state == BatchState::Idle {
            let delay = chrono::Duration::from_std(self.delay).unwrap_or(chrono::Duration::MAX);
            self.state = BatchState::Armed {
                deadline: now.checked_add_signed(delay).unwrap_or(now),
            };
            return true;
        }
        false
    }

    /// Flush when armed and due.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Option<Vec<String>> {
        match self.state {
            BatchState::Armed { deadline } if now >= deadline => Some(self.flush()),
            _ => None,
        }
    }

    /// Drain the buffer and return to idle.
    pub fn flush(&mut self) -> Vec<String> {
        self.state = BatchState::Idle;
        std::mem::take(&mut self.pending)
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Deadline of the armed timer.
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        match self.state {
            BatchState::Armed { deadline } => Some(deadline),
            BatchState::Idle => None,
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EmoteCatalog, EmoteDescriptor};
    use chrono::TimeZone;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_extract_filters() {
        let filter = WordFilter::default();
        let set = CatalogSet::new();
        let words = filter.extract(
            "The RAIDERS, are here!! 1234 www.example.com https://x.y ab Boss_fight",
            &set,
        );
        assert_eq!(words, vec!["raiders", "here", "boss_fight"]);
    }

    #[test]
    fn test_extract_skips_emotes() {
        let catalog = EmoteCatalog::from_entries(
            "bttv",
            [
                ("pepega", EmoteDescriptor::new("1", "u", "bttv")),
                ("KEKW", EmoteDescriptor::new("2", "u", "bttv")),
            ],
        );
        let set = CatalogSet::new().with(catalog);
        let words = WordFilter::default().extract("Pepega! KEKW kekw? nice", &set);
        // `Pepega!` cleans to a catalog token, `KEKW` matches raw.
        assert_eq!(words, vec!["kekw", "nice"]);
    }

    #[test]
    fn test_extra_stop_words() {
        let filter = WordFilter::new(3, ["Streamer"]);
        let words = filter.extract("streamer rocks", &CatalogSet::new());
        assert_eq!(words, vec!["rocks"]);
        assert_eq!(filter.min_len(), 3);
    }

    #[test]
    fn test_batcher_arms_once() {
        let now = base();
        let mut batcher = WordBatcher::new(Duration::from_secs(3));
        assert_eq!(batcher.state(), BatchState::Idle);

        assert!(!batcher.push(vec![], now));
        assert_eq!(batcher.state(), BatchState::Idle);

        assert!(batcher.push(vec!["one".into()], now));
        assert!(!batcher.push(vec!["two".into()], now + chrono::Duration::seconds(2)));
        assert_eq!(batcher.deadline(), Some(now + chrono::Duration::seconds(3)));
        assert_eq!(batcher.pending_len(), 2);

        assert!(batcher.poll(now + chrono::Duration::seconds(2)).is_none());
        let batch = batcher.poll(now + chrono::Duration::seconds(3)).unwrap();
        assert_eq!(batch, vec!["one", "two"]);
        assert_eq!(batcher.state(), BatchState::Idle);
        assert!(batcher.poll(now + chrono::Duration::seconds(10)).is_none());
    }

    #[test]
    fn test_batcher_rearms_after_flush() {
        let now = base();
        let mut batcher = WordBatcher::new(Duration::from_secs(3));
        batcher.push(vec!["a".into()], now);
        batcher.flush();
        assert_eq!(batcher.state(), BatchState::Idle);

        let later = now + chrono::Duration::seconds(10);
        assert!(batcher.push(vec!["b".into()], later));
        assert_eq!(batcher.deadline(), Some(later + chrono::Duration::seconds(3)));
    }

    #[test]
    fn test_flush_empty_returns_to_idle() {
        let mut batcher = WordBatcher::new(Duration::from_millis(10));
        assert!(batcher.flush().is_empty());
        assert_eq!(batcher.state(), BatchState::Idle);
    }
}
