use std::path::{Path, PathBuf};

use chat_pulse::{CatalogSet, EmoteCatalog, PulseConfig};
use tracing::{debug, info, warn};

use crate::cli::Args;
use crate::error::{CliError, Result};

const CONFIG_DIR: &str = "chat-pulse";
const CONFIG_FILE: &str = "config.toml";

/// Default config location, `<config dir>/chat-pulse/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Load the session configuration.
///
/// An explicit path must exist. Without one the default location is used
/// when present, otherwise built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<PulseConfig> {
    let path = match path {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path().filter(|p| p.exists()),
    };

    let config = match path {
        Some(path) => {
            debug!("Loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)?;
            parse_config(&content).map_err(|source| CliError::Config { path, source })?
        }
        None => PulseConfig::default(),
    };

    config.validate()?;
    Ok(config)
}

fn parse_config(content: &str) -> std::result::Result<PulseConfig, toml::de::Error> {
    toml::from_str(content)
}

/// Apply command-line overrides on top of the loaded configuration.
pub fn apply_overrides(config: &mut PulseConfig, args: &Args) -> Result<()> {
    if let Some(window) = args.window {
        config.window = window;
    }
    if let Some(width) = args.width {
        config.particles.width = width;
    }
    if let Some(height) = args.height {
        config.particles.height = height;
    }
    config.validate()?;
    Ok(())
}

/// Load catalog snapshots in priority order.
///
/// A snapshot that cannot be read contributes an empty catalog, so a failed
/// upstream fetch only means fewer matches.
pub fn load_catalogs(paths: &[PathBuf]) -> CatalogSet {
    let mut set = CatalogSet::new();
    for path in paths {
        match EmoteCatalog::from_file(path) {
            Ok(catalog) => {
                info!("Loaded {} emotes from {}", catalog.len(), path.display());
                set.push(catalog);
            }
            Err(e) => {
                warn!("Failed to load catalog {}: {}", path.display(), e);
                let name = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                set.push(EmoteCatalog::new(name));
            }
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_pulse::TimeWindow;
    use clap::Parser;

    #[test]
    fn test_parse_partial_toml() {
        let config = parse_config(
            r#"
window = 300

[particles]
max_keys = 10
width = 800.0

[timing]
word_batch_delay_ms = 1000

[words]
stop_words = ["forsen"]
"#,
        )
        .unwrap();

        assert_eq!(config.window, TimeWindow::secs(300));
        assert_eq!(config.particles.max_keys, 10);
        assert_eq!(config.particles.width, 800.0);
        assert_eq!(config.particles.height, 720.0);
        assert_eq!(config.timing.word_batch_delay_ms, 1000);
        assert_eq!(config.timing.tick_ms, 16);
        assert_eq!(config.words.stop_words, vec!["forsen"]);
    }

    #[test]
    fn test_load_config_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.toml");
        assert!(matches!(load_config(Some(&missing)), Err(CliError::Io(_))));

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "window = [").unwrap();
        assert!(matches!(
            load_config(Some(&broken)),
            Err(CliError::Config { .. })
        ));

        let invalid = dir.path().join("invalid.toml");
        std::fs::write(&invalid, "[particles]\nwidth = 0.0\n").unwrap();
        assert!(matches!(load_config(Some(&invalid)), Err(CliError::Pulse(_))));
    }

    #[test]
    fn test_overrides() {
        let args = Args::parse_from(["pulse", "--window", "all", "--width", "640"]);
        let mut config = PulseConfig::default();
        apply_overrides(&mut config, &args).unwrap();
        assert_eq!(config.window, TimeWindow::Unbounded);
        assert_eq!(config.particles.width, 640.0);

        let args = Args::parse_from(["pulse", "--height=-5"]);
        assert!(apply_overrides(&mut config, &args).is_err());
    }

    #[test]
    fn test_load_catalogs_tolerates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("bttv.json");
        std::fs::write(
            &good,
            r#"{"OMEGALUL": {"id": "1", "renderUrl": "u", "sourceLabel": "bttv"}}"#,
        )
        .unwrap();
        let bad = dir.path().join("ffz.json");
        std::fs::write(&bad, "not json").unwrap();

        let set = load_catalogs(&[bad, good, dir.path().join("7tv.json")]);
        assert_eq!(set.len(), 3);
        assert!(set.contains("OMEGALUL"));
    }
}
