use std::path::PathBuf;

use chat_pulse::TimeWindow;
use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "pulse",
    version,
    about = "Live emote and word statistics from a raw Twitch IRC stream",
    long_about = "Reads raw chat-protocol lines from a file or stdin, resolves native and \
                  third-party emotes, and periodically prints ranked emote counters, a \
                  decay-weighted word cloud and the emote particle population."
)]
pub struct Args {
    /// File with raw IRC lines; reads stdin when omitted or `-`
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Emote catalog snapshot (JSON), highest priority first. Repeatable.
    #[arg(short = 'e', long = "catalog", value_name = "FILE")]
    pub catalogs: Vec<PathBuf>,

    /// Configuration file (TOML)
    #[arg(short, long, env = "CHAT_PULSE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Time window in seconds, or `all`
    #[arg(short, long)]
    pub window: Option<TimeWindow>,

    /// Particle area width
    #[arg(long)]
    pub width: Option<f64>,

    /// Particle area height
    #[arg(long)]
    pub height: Option<f64>,

    /// Seed for particle spawning, for reproducible output
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
    pub format: OutputFormat,

    /// Include particle snapshots with each counter refresh
    #[arg(long)]
    pub particles: bool,

    /// Print every resolved chat message
    #[arg(long)]
    pub show_chat: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summaries
    Pretty,
    /// One JSON object per event
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from([
            "pulse",
            "-i",
            "chat.log",
            "-e",
            "bttv.json",
            "-e",
            "ffz.json",
            "--window",
            "all",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(args.input, Some(PathBuf::from("chat.log")));
        assert_eq!(args.catalogs.len(), 2);
        assert_eq!(args.window, Some(TimeWindow::Unbounded));
        assert_eq!(args.format, OutputFormat::Json);
        assert!(!args.particles);
    }

    #[test]
    fn test_rejects_bad_window() {
        assert!(Args::try_parse_from(["pulse", "--window", "0"]).is_err());
        assert!(Args::try_parse_from(["pulse", "-v", "-q"]).is_err());
    }
}
