//! Emote span resolution.
//!
//! A chat message is partitioned into ordered [`Span`]s. Native emote ranges
//! carried by the `emotes` tag are placed first; the text between them is then
//! tokenized and matched against the third-party catalogs.
//!
//! Native offsets are inclusive UTF-16 code-unit indices, the unit the chat
//! protocol counts in. An offset that lands inside a surrogate pair is rounded
//! down to the start of that character.

use serde::Serialize;
use tracing::{debug, trace};

use crate::catalog::{CatalogSet, NATIVE_SOURCE, native_render_url};

/// One native emote occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmoteRange {
    /// First code unit (inclusive)
    pub start: usize,
    /// Last code unit (inclusive)
    pub end: usize,
    /// Native emote id
    pub id: String,
}

/// Parse an `emotes` tag value (`id:s-e,s-e/id:s-e`).
///
/// Malformed segments and ranges are dropped. The result is stably sorted by
/// `start`, so ranges sharing a start keep their encounter order.
pub fn parse_native_ranges(tag: &str) -> Vec<EmoteRange> {
    let mut ranges = Vec::new();

    for segment in tag.split('/').filter(|s| !s.is_empty()) {
        let Some((id, positions)) = segment.split_once(':') else {
            trace!(segment, "Emote segment without ranges");
            continue;
        };
        for pos in positions.split(',') {
            let parsed = pos
                .split_once('-')
                .and_then(|(s, e)| Some((s.parse::<usize>().ok()?, e.parse::<usize>().ok()?)));
            match parsed {
                Some((start, end)) if start <= end => ranges.push(EmoteRange {
                    start,
                    end,
                    id: id.to_string(),
                }),
                _ => trace!(id, pos, "Dropping malformed emote range"),
            }
        }
    }

    ranges.sort_by_key(|r| r.start);
    ranges
}

/// An emote occurrence inside a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmoteSpan {
    /// Key under which the occurrence is counted
    pub key: String,
    /// Provider-specific id
    pub id: String,
    pub render_url: String,
    pub source_label: String,
    /// Text the emote replaces in the message
    pub display_text: String,
}

/// A piece of a resolved message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Span {
    Text { content: String },
    Emote(EmoteSpan),
}

impl Span {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    /// The message text this span stands for.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text { content } => content,
            Self::Emote(emote) => &emote.display_text,
        }
    }

    pub fn as_emote(&self) -> Option<&EmoteSpan> {
        match self {
            Self::Emote(emote) => Some(emote),
            Self::Text { .. } => None,
        }
    }
}

/// Concatenate the text of a span sequence.
pub fn spans_to_string(spans: &[Span]) -> String {
    spans.iter().map(Span::as_str).collect()
}

/// Characters kept when stripping punctuation around a token (`[A-Za-z0-9_]`).
pub(crate) fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Byte offsets of every UTF-16 code unit of a string.
struct Utf16Index {
    /// `offsets[unit]` is the byte offset of the character holding `unit`;
    /// the final element is `text.len()`.
    offsets: Vec<usize>,
}

impl Utf16Index {
    fn new(text: &str) -> Self {
        let mut offsets = Vec::with_capacity(text.len() + 1);
        for (idx, c) in text.char_indices() {
            offsets.extend(std::iter::repeat_n(idx, c.len_utf16()));
        }
        offsets.push(text.len());
        Self { offsets }
    }

    fn len_units(&self) -> usize {
        self.offsets.len() - 1
    }

    fn byte(&self, unit: usize) -> usize {
        self.offsets[unit.min(self.len_units())]
    }
}

/// Accumulates spans, merging neighbouring text.
#[derive(Default)]
struct SpanBuilder {
    spans: Vec<Span>,
}

impl SpanBuilder {
    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Span::Text { content }) = self.spans.last_mut() {
            content.push_str(text);
        } else {
            self.spans.push(Span::text(text));
        }
    }

    fn push_emote(&mut self, emote: EmoteSpan) {
        self.spans.push(Span::Emote(emote));
    }

    fn finish(self) -> Vec<Span> {
        self.spans
    }
}

/// Partitions message text into text and emote spans.
pub struct SpanResolver<'a> {
    catalogs: &'a CatalogSet,
}

impl<'a> SpanResolver<'a> {
    pub fn new(catalogs: &'a CatalogSet) -> Self {
        Self { catalogs }
    }

    /// Resolve a message. `native_tag` is the raw `emotes` tag value.
    pub fn resolve(&self, text: &str, native_tag: Option<&str>) -> Vec<Span> {
        let ranges = native_tag.map(parse_native_ranges).unwrap_or_default();
        let mut out = SpanBuilder::default();

        if ranges.is_empty() {
            self.tokenize_into(text, &mut out);
            return out.finish();
        }

        let index = Utf16Index::new(text);
        let len = index.len_units();
        let mut cursor = 0usize;
        let mut byte_cursor = 0usize;

        for range in &ranges {
            if range.start < cursor {
                debug!(
                    id = %range.id,
                    start = range.start,
                    cursor,
                    "Skipping overlapping emote range"
                );
                continue;
            }
            if range.start >= len {
                debug!(id = %range.id, start = range.start, len, "Emote range out of bounds");
                continue;
            }

            let end = range.end.min(len - 1);
            let start_byte = index.byte(range.start).max(byte_cursor);
            let end_byte = index.byte(end + 1).max(start_byte);

            self.tokenize_into(&text[byte_cursor..start_byte], &mut out);
            if start_byte < end_byte {
                let matched = &text[start_byte..end_byte];
                out.push_emote(EmoteSpan {
                    key: matched.to_string(),
                    id: range.id.clone(),
                    render_url: native_render_url(&range.id),
                    source_label: NATIVE_SOURCE.to_string(),
                    display_text: matched.to_string(),
                });
            }

            cursor = end + 1;
            byte_cursor = end_byte;
        }

        self.tokenize_into(&text[byte_cursor..], &mut out);
        out.finish()
    }

    /// Split a slice into whitespace runs and tokens, matching each token
    /// against the catalogs.
    fn tokenize_into(&self, slice: &str, out: &mut SpanBuilder) {
        let mut run_start = 0;
        let mut run_is_ws = None;

        for (idx, c) in slice.char_indices() {
            let is_ws = c.is_whitespace();
            match run_is_ws {
                Some(prev) if prev != is_ws => {
                    self.emit_run(&slice[run_start..idx], prev, out);
                    run_start = idx;
                }
                _ => {}
            }
            run_is_ws = Some(is_ws);
        }
        if let Some(is_ws) = run_is_ws {
            self.emit_run(&slice[run_start..], is_ws, out);
        }
    }

    fn emit_run(&self, run: &str, is_ws: bool, out: &mut SpanBuilder) {
        if is_ws {
            out.push_text(run);
        } else {
            self.match_token(run, out);
        }
    }

    fn match_token(&self, token: &str, out: &mut SpanBuilder) {
        if let Some(desc) = self.catalogs.lookup(token) {
            trace!(token, source = %desc.source_label, "Matched emote token");
            out.push_emote(EmoteSpan {
                key: token.to_string(),
                id: desc.id.clone(),
                render_url: desc.render_url.clone(),
                source_label: desc.source_label.clone(),
                display_text: token.to_string(),
            });
            return;
        }

        let leading_trimmed = token.trim_start_matches(|c| !is_word_char(c));
        let stripped = leading_trimmed.trim_end_matches(|c| !is_word_char(c));
        if stripped.is_empty() || stripped.len() == token.len() {
            out.push_text(token);
            return;
        }

        match self.catalogs.lookup(stripped) {
            Some(desc) => {
                trace!(token, stripped, source = %desc.source_label, "Matched emote with punctuation");
                // Leading punctuation is not re-emitted.
                let trailing = &leading_trimmed[stripped.len()..];
                out.push_emote(EmoteSpan {
                    key: stripped.to_string(),
                    id: desc.id.clone(),
                    render_url: desc.render_url.clone(),
                    source_label: desc.source_label.clone(),
                    display_text: stripped.to_string(),
                });
                out.push_text(trailing);
            }
            None => out.push_text(token),
        }
    }
}
