use std::io::Write;

use chat_pulse::{ChatLine, CounterView, ParticleView, Span, WordScore};
#[cfg(feature = "colored-output")]
use colored::*;
use serde::Serialize;

use crate::{cli::OutputFormat, error::Result};

/// One line of JSON output.
#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Event<'a> {
    Chat(&'a ChatLine),
    Counters {
        #[serde(flatten)]
        view: &'a CounterView,
        #[serde(skip_serializing_if = "Option::is_none")]
        particles: Option<&'a [ParticleView]>,
    },
    Words {
        words: &'a [WordScore],
    },
}

pub struct OutputManager<W: Write> {
    writer: W,
    format: OutputFormat,
    colored: bool,
}

impl<W: Write> OutputManager<W> {
    pub fn new(writer: W, format: OutputFormat, colored: bool) -> Self {
        Self {
            writer,
            format,
            colored,
        }
    }

    pub fn chat_line(&mut self, line: &ChatLine) -> Result<()> {
        match self.format {
            OutputFormat::Json => self.emit(&Event::Chat(line)),
            OutputFormat::Pretty => {
                let body: String = line
                    .spans
                    .iter()
                    .map(|span| match span {
                        Span::Text { content } => content.clone(),
                        Span::Emote(emote) => self.highlight(&format!("[{}]", emote.display_text)),
                    })
                    .collect();
                writeln!(
                    self.writer,
                    "{} {}: {}",
                    line.channel,
                    self.bold(&line.display_name),
                    body
                )?;
                Ok(())
            }
        }
    }

    pub fn counters(
        &mut self,
        view: &CounterView,
        particles: Option<&[ParticleView]>,
    ) -> Result<()> {
        match self.format {
            OutputFormat::Json => self.emit(&Event::Counters { view, particles }),
            OutputFormat::Pretty => {
                writeln!(
                    self.writer,
                    "{}",
                    self.bold(&format!("Emotes ({})", view.window))
                )?;
                if view.rows.is_empty() {
                    writeln!(self.writer, "  No emotes counted yet.")?;
                }
                for row in &view.rows {
                    writeln!(
                        self.writer,
                        "  {:>6}  {} {}",
                        row.count,
                        self.highlight(&row.key),
                        row.source_label.as_deref().unwrap_or_default()
                    )?;
                }
                if let Some(particles) = particles {
                    writeln!(self.writer, "  particles: {}", particles.len())?;
                }
                Ok(())
            }
        }
    }

    pub fn words(&mut self, words: &[WordScore]) -> Result<()> {
        match self.format {
            OutputFormat::Json => self.emit(&Event::Words { words }),
            OutputFormat::Pretty => {
                if words.is_empty() {
                    writeln!(self.writer, "Words: No words to display yet.")?;
                    return Ok(());
                }
                let cloud: Vec<String> = words
                    .iter()
                    .map(|w| format!("{}({})", w.word, w.score))
                    .collect();
                writeln!(self.writer, "Words: {}", cloud.join(" "))?;
                Ok(())
            }
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn emit(&mut self, event: &Event<'_>) -> Result<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    #[cfg(feature = "colored-output")]
    fn highlight(&self, text: &str) -> String {
        if self.colored {
            text.magenta().to_string()
        } else {
            text.to_string()
        }
    }

    #[cfg(not(feature = "colored-output"))]
    fn highlight(&self, text: &str) -> String {
        let _ = self.colored;
        text.to_string()
    }

    #[cfg(feature = "colored-output")]
    fn bold(&self, text: &str) -> String {
        if self.colored {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    #[cfg(not(feature = "colored-output"))]
    fn bold(&self, text: &str) -> String {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_pulse::{CounterRow, EmoteSpan, ReconcileStats, TimeWindow};
    use chrono::{TimeZone, Utc};

    fn chat() -> ChatLine {
        ChatLine {
            channel: "#forsen".into(),
            display_name: "Viewer".into(),
            text: "hi Kappa".into(),
            spans: vec![
                Span::text("hi "),
                Span::Emote(EmoteSpan {
                    key: "Kappa".into(),
                    id: "25".into(),
                    render_url: "u".into(),
                    source_label: "twitch".into(),
                    display_text: "Kappa".into(),
                }),
            ],
            received_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn view() -> CounterView {
        CounterView {
            window: TimeWindow::secs(60),
            rows: vec![CounterRow {
                key: "Kappa".into(),
                count: 3,
                render_url: Some("u".into()),
                source_label: Some("twitch".into()),
            }],
            tracked_keys: 1,
            reconcile: ReconcileStats::default(),
        }
    }

    fn text(out: OutputManager<Vec<u8>>) -> String {
        String::from_utf8(out.into_inner()).unwrap()
    }

    #[test]
    fn test_pretty_chat() {
        let mut out = OutputManager::new(Vec::new(), OutputFormat::Pretty, false);
        out.chat_line(&chat()).unwrap();
        assert_eq!(text(out), "#forsen Viewer: hi [Kappa]\n");
    }

    #[test]
    fn test_json_events() {
        let mut out = OutputManager::new(Vec::new(), OutputFormat::Json, false);
        out.chat_line(&chat()).unwrap();
        out.counters(&view(), Some(&[])).unwrap();
        out.words(&[]).unwrap();

        let output = text(out);
        let events: Vec<serde_json::Value> = output
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0]["event"], "chat");
        assert_eq!(events[0]["spans"][1]["type"], "emote");
        assert_eq!(events[0]["spans"][1]["sourceLabel"], "twitch");
        assert_eq!(events[1]["event"], "counters");
        assert_eq!(events[1]["window"], 60);
        assert_eq!(events[1]["rows"][0]["count"], 3);
        assert_eq!(events[1]["particles"], serde_json::json!([]));
        assert_eq!(events[2]["event"], "words");
    }

    #[test]
    fn test_pretty_counters() {
        let mut out = OutputManager::new(Vec::new(), OutputFormat::Pretty, false);
        out.counters(&view(), None).unwrap();
        out.words(&[]).unwrap();
        let output = text(out);
        assert!(output.starts_with("Emotes (last 60s)\n"));
        assert!(output.contains("     3  Kappa twitch"));
        assert!(output.contains("No words to display yet."));
    }
}
