//! IRCv3 line parser.
//!
//! Turns one raw chat-protocol line into a [`IrcMessage`]. Parsing never fails:
//! anything missing from a malformed line is left empty.

use rustc_hash::FxHashMap;
use serde::Serialize;

/// A parsed IRC line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IrcMessage {
    /// Unescaped message tags
    pub tags: FxHashMap<String, String>,
    /// Source prefix without the leading colon
    pub prefix: Option<String>,
    /// Command (empty on malformed input)
    pub command: String,
    /// Parameters; the last one may be a trailing parameter containing spaces
    pub params: Vec<String>,
}

impl IrcMessage {
    /// Parse a single raw line.
    pub fn parse(line: &str) -> Self {
        let mut msg = Self::default();
        let mut rest = line;

        if let Some(stripped) = rest.strip_prefix('@') {
            let (tag_block, remaining) = split_at_space(stripped);
            for piece in tag_block.split(';') {
                let (key, value) = piece.split_once('=').unwrap_or((piece, ""));
                msg.tags.insert(key.to_string(), unescape_tag_value(value));
            }
            rest = remaining;
        }

        if let Some(stripped) = rest.strip_prefix(':') {
            let (prefix, remaining) = split_at_space(stripped);
            msg.prefix = Some(prefix.to_string());
            rest = remaining;
        }

        let (leading, trailing) = match rest.find(" :") {
            Some(idx) => (&rest[..idx], Some(&rest[idx + 2..])),
            None => (rest, None),
        };

        let mut words = leading.split_whitespace();
        msg.command = words.next().unwrap_or_default().to_string();
        msg.params = words.map(str::to_string).collect();
        if let Some(trailing) = trailing {
            msg.params.push(trailing.to_string());
        }

        msg
    }

    /// Look up a tag value.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Nickname part of the prefix (`nick!user@host`).
    pub fn nick(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .and_then(|p| p.split('!').next())
            .filter(|n| !n.is_empty())
    }

    /// First parameter, usually the channel.
    pub fn channel(&self) -> Option<&str> {
        self.params.first().map(String::as_str)
    }

    /// Last parameter, the message body for `PRIVMSG`.
    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }

    pub fn is_privmsg(&self) -> bool {
        self.command == "PRIVMSG"
    }
}

/// Split at the first space, dropping it. Without a space the whole input is
/// the head and the tail is empty.
fn split_at_space(s: &str) -> (&str, &str) {
    match s.find(' ') {
        Some(idx) => (&s[..idx], &s[idx + 1..]),
        None => (s, ""),
    }
}

/// Unescape an IRCv3 tag value in one left-to-right pass.
///
/// Only the five defined escapes are translated. Any other backslash sequence
/// and a lone trailing backslash pass through unchanged.
pub fn unescape_tag_value(value: &str) -> String {
    if !value.contains('\\') {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(':') => out.push(';'),
            Some('s') => out.push(' '),
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
