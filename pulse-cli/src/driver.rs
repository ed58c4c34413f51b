use std::io::Write;
use std::time::Duration;

use chat_pulse::PulseSession;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until};
use tracing::{debug, info};

use crate::error::Result;
use crate::output::OutputManager;

/// Wall-clock timestamps derived from the tokio clock, so that paused
/// test time drives the session as well.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    origin: Instant,
    origin_utc: DateTime<Utc>,
}

impl Clock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
            origin_utc: Utc::now(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.at(Instant::now())
    }

    pub fn at(&self, instant: Instant) -> DateTime<Utc> {
        let elapsed = instant.saturating_duration_since(self.origin);
        self.origin_utc + chrono::Duration::from_std(elapsed).unwrap_or(chrono::Duration::zero())
    }

    /// The tokio instant matching a wall-clock time; past times map to the
    /// clock origin.
    pub fn instant_of(&self, time: DateTime<Utc>) -> Instant {
        let offset = (time - self.origin_utc).to_std().unwrap_or(Duration::ZERO);
        self.origin + offset
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DriverOptions {
    pub show_chat: bool,
    pub particles: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub lines: u64,
    pub messages: u64,
}

/// Feed lines into the session until the input ends, running the periodic
/// timers in between. At end of input pending words are flushed and a final
/// snapshot is written.
pub async fn run<R, W>(
    session: &mut PulseSession,
    reader: R,
    output: &mut OutputManager<W>,
    options: DriverOptions,
) -> Result<RunSummary>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let clock = Clock::start();
    let timing = session.config().timing.clone();
    let start = Instant::now();

    let mut tick = interval_at(start + timing.tick(), timing.tick());
    let mut counters = interval_at(start + timing.counter_refresh(), timing.counter_refresh());
    let mut words = interval_at(start + timing.word_refresh(), timing.word_refresh());
    let mut heartbeat = interval_at(start + timing.heartbeat(), timing.heartbeat());
    for timer in [&mut tick, &mut counters, &mut words, &mut heartbeat] {
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    }

    let mut lines = reader.lines();
    let mut summary = RunSummary::default();

    loop {
        let deadline = session.word_deadline();
        let wake = deadline.map(|d| clock.instant_of(d));

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("End of input");
                    break;
                };
                summary.lines += 1;
                if let Some(chat) = session.ingest_line(&line, clock.now()) {
                    summary.messages += 1;
                    if options.show_chat {
                        output.chat_line(&chat)?;
                    }
                }
            }
            _ = sleep_until(wake.unwrap_or(start)), if wake.is_some() => {
                if let Some(deadline) = deadline {
                    session.poll_words(clock.now().max(deadline));
                }
            }
            _ = tick.tick() => session.tick(),
            _ = counters.tick() => {
                let view = session.refresh_counters(clock.now());
                let particles = options.particles.then(|| session.particles());
                output.counters(&view, particles.as_deref())?;
                output.flush()?;
            }
            _ = words.tick() => {
                let cloud = session.word_cloud(clock.now());
                output.words(&cloud)?;
                output.flush()?;
            }
            _ = heartbeat.tick() => session.heartbeat(clock.now()),
        }
    }

    let now = clock.now();
    session.flush_words(now);
    let view = session.refresh_counters(now);
    let particles = options.particles.then(|| session.particles());
    output.counters(&view, particles.as_deref())?;
    output.words(&session.word_cloud(now))?;
    output.flush()?;

    info!(
        lines = summary.lines,
        messages = summary.messages,
        "Input finished"
    );
    Ok(summary)
}
