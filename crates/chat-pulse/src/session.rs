//! Single-stream session state.
//!
//! [`PulseSession`] owns every piece of mutable state for one chat stream:
//! the catalogs, emote metadata, both frequency trackers, the word batcher and
//! the particle field. The driver calls into it from its cooperative timers;
//! each call runs to completion, so no call observes another half-done.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, trace};

use crate::catalog::{CatalogSet, EmoteRegistry};
use crate::config::PulseConfig;
use crate::emote::{Span, SpanResolver};
use crate::irc::IrcMessage;
use crate::particles::{ParticleField, ParticleView, ReconcileStats};
use crate::statistics::{FrequencyTracker, TimeWindow, rank_counts, rank_scores};
use crate::words::{WordBatcher, WordFilter};

/// Number of size buckets in the word cloud.
const WORD_SIZE_LEVELS: f64 = 7.0;

/// A chat message resolved into spans.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatLine {
    pub channel: String,
    pub display_name: String,
    pub text: String,
    pub spans: Vec<Span>,
    pub received_at: DateTime<Utc>,
}

impl ChatLine {
    /// Number of emote occurrences in the message.
    pub fn emote_count(&self) -> usize {
        self.spans.iter().filter(|s| s.as_emote().is_some()).count()
    }
}

/// One row of the ranked emote counter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterRow {
    pub key: String,
    pub count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_label: Option<String>,
}

/// Ranked emote counts for the active window.
#[derive(Debug, Clone, Serialize)]
pub struct CounterView {
    pub window: TimeWindow,
    pub rows: Vec<CounterRow>,
    /// Keys alive in the window before truncation
    pub tracked_keys: usize,
    #[serde(skip)]
    pub reconcile: ReconcileStats,
}

/// A word cloud entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordScore {
    pub word: String,
    pub score: f64,
    /// Display bucket from 1 to 7, relative to the top score
    pub size_level: u8,
}

/// State of one chat stream.
#[derive(Debug)]
pub struct PulseSession {
    config: PulseConfig,
    catalogs: CatalogSet,
    registry: EmoteRegistry,
    emotes: FrequencyTracker,
    words: FrequencyTracker,
    word_filter: WordFilter,
    batcher: WordBatcher,
    field: ParticleField,
}

impl PulseSession {
    pub fn new(config: PulseConfig, catalogs: CatalogSet) -> Self {
        let field = ParticleField::new(config.particles.clone());
        Self::with_field(config, catalogs, field)
    }

    /// Session with a caller-provided particle field, e.g. a seeded one.
    pub fn with_field(config: PulseConfig, catalogs: CatalogSet, field: ParticleField) -> Self {
        Self {
            word_filter: config.words.build(),
            batcher: WordBatcher::new(config.timing.word_batch_delay()),
            registry: EmoteRegistry::new(),
            emotes: FrequencyTracker::new(),
            words: FrequencyTracker::new(),
            catalogs,
            field,
            config,
        }
    }

    /// Parse and ingest one raw protocol line.
    ///
    /// Returns the resolved chat line for `PRIVMSG`, `None` for anything else.
    pub fn ingest_line(&mut self, line: &str, now: DateTime<Utc>) -> Option<ChatLine> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() || line.starts_with("PING") {
            return None;
        }
        let msg = IrcMessage::parse(line);
        self.ingest_message(&msg, now)
    }

    /// Ingest a parsed message.
    ///
    /// Emote occurrences are counted immediately; words are buffered until
    /// the batch delay expires.
    pub fn ingest_message(&mut self, msg: &IrcMessage, now: DateTime<Utc>) -> Option<ChatLine> {
        if !msg.is_privmsg() {
            if !msg.command.is_empty() {
                debug!(command = %msg.command, "IRC command seen");
            }
            return None;
        }

        let text = msg.trailing().unwrap_or_default().to_string();
        let channel = msg.channel().unwrap_or_default().to_string();
        let display_name = msg
            .tag("display-name")
            .filter(|n| !n.is_empty())
            .or_else(|| msg.nick())
            .unwrap_or("unknown")
            .to_string();

        let native_tag = msg.tag("emotes").filter(|t| !t.is_empty());
        let spans = SpanResolver::new(&self.catalogs).resolve(&text, native_tag);

        for emote in spans.iter().filter_map(Span::as_emote) {
            self.emotes.record(&emote.key, now);
            self.registry
                .upsert(&emote.key, emote.render_url.as_str(), emote.source_label.as_str());
            trace!(key = %emote.key, source = %emote.source_label, "Counted emote");
        }

        // Only the text between emotes is free text.
        let free_text = spans
            .iter()
            .filter(|s| s.as_emote().is_none())
            .map(Span::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        let words = self.word_filter.extract(&free_text, &self.catalogs);
        if self.batcher.push(words, now) {
            trace!(deadline = ?self.batcher.deadline(), "Word batch armed");
        }

        Some(ChatLine {
            channel,
            display_name,
            text,
            spans,
            received_at: now,
        })
    }

    /// Record the buffered words if the batch delay has expired.
    ///
    /// Returns the number of words recorded.
    pub fn poll_words(&mut self, now: DateTime<Utc>) -> usize {
        match self.batcher.poll(now) {
            Some(batch) => self.record_words(batch, now),
            None => 0,
        }
    }

    /// Record the buffered words immediately.
    pub fn flush_words(&mut self, now: DateTime<Utc>) -> usize {
        let batch = self.batcher.flush();
        self.record_words(batch, now)
    }

    fn record_words(&mut self, batch: Vec<String>, now: DateTime<Utc>) -> usize {
        let min_len = self.word_filter.min_len();
        let mut recorded = 0;
        for word in batch.iter().filter(|w| w.len() >= min_len) {
            self.words.record(word, now);
            recorded += 1;
        }
        debug!(recorded, "Flushed word batch");
        recorded
    }

    /// When the pending word batch is due, if one is armed.
    pub fn word_deadline(&self) -> Option<DateTime<Utc>> {
        self.batcher.deadline()
    }

    /// Count emotes in the window, rank them and reconcile the particles.
    pub fn refresh_counters(&mut self, now: DateTime<Utc>) -> CounterView {
        let counts = self.emotes.snapshot_counts(self.config.window, now);
        let reconcile = self.field.reconcile(&counts, &self.registry);
        let tracked_keys = counts.len();

        let rows = rank_counts(counts, self.config.ranking.counter_rows)
            .into_iter()
            .map(|c| {
                let meta = self.registry.get(&c.key);
                CounterRow {
                    render_url: meta.map(|m| m.render_url.clone()),
                    source_label: meta.map(|m| m.source_label.clone()),
                    key: c.key,
                    count: c.count,
                }
            })
            .collect();

        CounterView {
            window: self.config.window,
            rows,
            tracked_keys,
            reconcile,
        }
    }

    /// Decay-scored top words in the window.
    pub fn word_cloud(&mut self, now: DateTime<Utc>) -> Vec<WordScore> {
        let window = self.config.window;
        self.words.prune(window, now);
        let ranked = rank_scores(
            self.words.decay_scores(window, now),
            self.config.ranking.word_rows,
        );

        let max = ranked.first().map(|s| s.score).unwrap_or(0.0);
        ranked
            .into_iter()
            .map(|s| WordScore {
                size_level: size_level(s.score, max),
                word: s.key,
                score: s.score,
            })
            .collect()
    }

    /// Advance the particle physics by one tick.
    pub fn tick(&mut self) {
        self.field.step();
    }

    pub fn particles(&self) -> Vec<ParticleView> {
        self.field.views()
    }

    /// Log a liveness summary.
    pub fn heartbeat(&mut self, now: DateTime<Utc>) {
        let emote_keys = self.emotes.snapshot_counts(self.config.window, now).len();
        info!(
            emote_keys,
            word_keys = self.words.len(),
            particles = self.field.len(),
            pending_words = self.batcher.pending_len(),
            "heartbeat"
        );
    }

    pub fn set_window(&mut self, window: TimeWindow) {
        debug!(%window, "Time window changed");
        self.config.window = window;
    }

    pub fn window(&self) -> TimeWindow {
        self.config.window
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.field.resize(width, height);
    }

    /// Forget all counts, words and particles. Catalogs and emote metadata
    /// are kept.
    pub fn reset(&mut self) {
        self.emotes.clear();
        self.words.clear();
        self.batcher.flush();
        self.field.clear();
    }

    pub fn config(&self) -> &PulseConfig {
        &self.config
    }

    pub fn catalogs(&self) -> &CatalogSet {
        &self.catalogs
    }

    pub fn registry(&self) -> &EmoteRegistry {
        &self.registry
    }

    pub fn emote_tracker(&self) -> &FrequencyTracker {
        &self.emotes
    }

    pub fn word_tracker(&self) -> &FrequencyTracker {
        &self.words
    }

    pub fn field(&self) -> &ParticleField {
        &self.field
    }
}

/// Bucket a score relative to the top score into 1..=7.
fn size_level(score: f64, max: f64) -> u8 {
    if max <= 0.0 {
        return 1;
    }
    (score / max * WORD_SIZE_LEVELS).ceil().clamp(1.0, WORD_SIZE_LEVELS) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EmoteCatalog, EmoteDescriptor};
    use chrono::TimeZone;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn session() -> PulseSession {
        let bttv = EmoteCatalog::from_entries(
            "bttv",
            [("catJAM", EmoteDescriptor::new("c1", "https://b/c1", "bttv"))],
        );
        let config = PulseConfig::default();
        let field = ParticleField::with_seed(config.particles.clone(), 42);
        PulseSession::with_field(config, CatalogSet::new().with(bttv), field)
    }

    fn privmsg(tags: &str, text: &str) -> String {
        format!(
            "@{} :viewer!viewer@viewer.tmi.twitch.tv PRIVMSG #chan :{}",
            tags, text
        )
    }

    #[test]
    fn test_ingest_counts_emotes() {
        let mut s = session();
        let now = base();
        let line = s
            .ingest_line(
                &privmsg("display-name=Viewer;emotes=25:0-4", "Kappa catJAM catJAM"),
                now,
            )
            .unwrap();

        assert_eq!(line.display_name, "Viewer");
        assert_eq!(line.channel, "#chan");
        assert_eq!(line.emote_count(), 3);
        assert_eq!(s.emote_tracker().log_len("catJAM"), Some(2));
        assert_eq!(s.emote_tracker().log_len("Kappa"), Some(1));
        assert_eq!(s.registry().get("Kappa").unwrap().source_label, "twitch");
    }

    #[test]
    fn test_display_name_fallback() {
        let mut s = session();
        let line = s
            .ingest_line(&privmsg("display-name=", "hello"), base())
            .unwrap();
        assert_eq!(line.display_name, "viewer");

        let line = s.ingest_line("PRIVMSG #chan :anon", base()).unwrap();
        assert_eq!(line.display_name, "unknown");
    }

    #[test]
    fn test_non_privmsg_ignored() {
        let mut s = session();
        assert!(s.ingest_line("PING :tmi.twitch.tv", base()).is_none());
        assert!(s.ingest_line(":tmi.twitch.tv 001 justinfan :Welcome", base()).is_none());
        assert!(s.ingest_line("", base()).is_none());
        assert!(s.emote_tracker().is_empty());
    }

    #[test]
    fn test_words_are_batched() {
        let mut s = session();
        let now = base();
        s.ingest_line(&privmsg("a=1", "massive play catJAM"), now);
        s.ingest_line(&privmsg("a=1", "massive clutch"), now + chrono::Duration::seconds(1));

        assert!(s.word_tracker().is_empty());
        assert_eq!(s.word_deadline(), Some(now + chrono::Duration::seconds(3)));
        assert_eq!(s.poll_words(now + chrono::Duration::seconds(2)), 0);

        let due = now + chrono::Duration::seconds(3);
        assert_eq!(s.poll_words(due), 3);
        assert_eq!(s.word_tracker().log_len("massive"), Some(2));
        assert_eq!(s.word_tracker().log_len("clutch"), Some(1));
        assert!(!s.word_tracker().contains("catjam"));
        assert_eq!(s.word_deadline(), None);

        let cloud = s.word_cloud(due);
        assert_eq!(cloud[0].word, "massive");
        assert_eq!(cloud[0].score, 2.0);
        assert_eq!(cloud[0].size_level, 7);
        assert_eq!(cloud[1].size_level, 4);
    }

    #[test]
    fn test_refresh_counters_and_particles() {
        let mut s = session();
        let now = base();
        for _ in 0..3 {
            s.ingest_line(&privmsg("emotes=25:0-4", "Kappa catJAM"), now);
        }
        s.ingest_line(&privmsg("a=1", "catJAM"), now);

        let view = s.refresh_counters(now);
        assert_eq!(view.tracked_keys, 2);
        assert_eq!(view.rows[0].key, "catJAM");
        assert_eq!(view.rows[0].count, 4);
        assert_eq!(view.rows[0].source_label.as_deref(), Some("bttv"));
        assert_eq!(view.rows[1].count, 3);
        assert_eq!(view.reconcile.spawned, 7);
        assert_eq!(s.particles().len(), 7);

        // Everything ages out of the window.
        let later = now + chrono::Duration::seconds(120);
        let view = s.refresh_counters(later);
        assert!(view.rows.is_empty());
        assert!(s.particles().is_empty());
        assert!(s.emote_tracker().is_empty());
    }

    #[test]
    fn test_unbounded_window() {
        let mut s = session();
        s.set_window(TimeWindow::Unbounded);
        let now = base();
        s.ingest_line(&privmsg("a=1", "catJAM"), now);

        let view = s.refresh_counters(now + chrono::Duration::days(1));
        assert_eq!(view.rows.len(), 1);
    }

    #[test]
    fn test_tick_moves_particles() {
        let mut s = session();
        let now = base();
        s.ingest_line(&privmsg("a=1", "catJAM"), now);
        s.refresh_counters(now);
        let before = s.particles();
        s.tick();
        let after = s.particles();
        assert_eq!(before.len(), after.len());
        assert_ne!(before[0].rotation, after[0].rotation);
    }

    #[test]
    fn test_reset() {
        let mut s = session();
        let now = base();
        s.ingest_line(&privmsg("a=1", "catJAM massive"), now);
        s.refresh_counters(now);
        s.reset();

        assert!(s.emote_tracker().is_empty());
        assert!(s.particles().is_empty());
        assert_eq!(s.word_deadline(), None);
        assert!(s.registry().get("catJAM").is_some());
    }

    #[test]
    fn test_size_level() {
        assert_eq!(size_level(0.0, 0.0), 1);
        assert_eq!(size_level(10.0, 10.0), 7);
        assert_eq!(size_level(0.1, 10.0), 1);
        assert_eq!(size_level(5.0, 10.0), 4);
    }
}
