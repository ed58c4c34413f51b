//! Chat-pulse: live emote and word statistics for a chat stream.
//!
//! This crate turns raw chat-protocol lines into resolved messages, counts
//! emote and word usage over a sliding time window, and keeps a bounded set
//! of animated emote particles in sync with those counts.
//!
//! ## Parsing
//!
//! - [`IrcMessage`] - A parsed IRCv3 line (tags, prefix, command, params)
//!
//! ## Emotes
//!
//! - [`SpanResolver`] - Partitions message text into [`Span`]s
//! - [`EmoteCatalog`] / [`CatalogSet`] - Third-party catalogs in priority order
//! - [`EmoteRegistry`] - Render metadata of every emote seen
//!
//! ## Statistics
//!
//! - [`FrequencyTracker`] - Per-key timestamp logs with windowed counts and decay scores
//! - [`WordFilter`] / [`WordBatcher`] - Word extraction and delayed batching
//!
//! ## Particles
//!
//! - [`ParticleField`] - Population reconciliation and bounce physics
//!
//! ## Session
//!
//! - [`PulseSession`] - All state of one stream, driven by the caller's timers

pub mod catalog;
pub mod config;
pub mod emote;
pub mod error;
pub mod irc;
pub mod particles;
pub mod session;
pub mod statistics;
pub mod words;

pub use catalog::{
    CatalogSet, EmoteCatalog, EmoteDescriptor, EmoteLookup, EmoteRegistry, RenderMeta,
    RenderMetadata,
};
pub use config::{PulseConfig, ParticleConfig, RankingConfig, TimingConfig, WordFilterConfig};
pub use emote::{EmoteRange, EmoteSpan, Span, SpanResolver, parse_native_ranges, spans_to_string};
pub use error::{PulseError, Result};
pub use irc::{IrcMessage, unescape_tag_value};
pub use particles::{Particle, ParticleField, ParticleView, ReconcileStats, select_targets};
pub use session::{ChatLine, CounterRow, CounterView, PulseSession, WordScore};
pub use statistics::{FrequencyTracker, KeyCount, KeyScore, TimeWindow, rank_counts, rank_scores};
pub use words::{BatchState, WordBatcher, WordFilter};
