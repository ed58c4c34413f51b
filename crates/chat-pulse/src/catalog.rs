//! Emote catalogs.
//!
//! Third-party emote catalogs are immutable token→descriptor snapshots supplied
//! by an external loader. They are consulted in priority order through
//! [`CatalogSet`]; the first catalog with a hit wins.

use std::path::Path;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// Source label used for emotes identified by the chat protocol itself.
pub const NATIVE_SOURCE: &str = "twitch";

/// Render URL template for native emotes.
const NATIVE_RENDER_URL: &str = "https://static-cdn.jtvnw.net/emoticons/v2/{id}/default/dark/2.0";

/// Build the render URL of a native emote.
pub fn native_render_url(id: &str) -> String {
    NATIVE_RENDER_URL.replace("{id}", id)
}

/// Descriptor of a single emote in a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmoteDescriptor {
    /// Provider-specific identifier
    pub id: String,
    /// Image URL used by the renderer
    #[serde(default)]
    pub render_url: String,
    /// Provider label (e.g. `bttv`, `ffz`, `7tv`)
    #[serde(default)]
    pub source_label: String,
}

impl EmoteDescriptor {
    pub fn new(
        id: impl Into<String>,
        render_url: impl Into<String>,
        source_label: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            render_url: render_url.into(),
            source_label: source_label.into(),
        }
    }
}

/// Capability to resolve a token to an emote descriptor.
pub trait EmoteLookup {
    /// Name of this source, used for logging.
    fn name(&self) -> &str;

    /// Look up an exact token.
    fn lookup(&self, token: &str) -> Option<&EmoteDescriptor>;
}

/// A token→descriptor snapshot for one emote provider.
#[derive(Debug, Clone, Default)]
pub struct EmoteCatalog {
    name: String,
    entries: FxHashMap<String, EmoteDescriptor>,
}

impl EmoteCatalog {
    /// Create an empty catalog.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: FxHashMap::default(),
        }
    }

    /// Build a catalog from `(token, descriptor)` pairs. Later duplicates win.
    pub fn from_entries<I, T>(name: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (T, EmoteDescriptor)>,
        T: Into<String>,
    {
        Self {
            name: name.into(),
            entries: entries.into_iter().map(|(t, d)| (t.into(), d)).collect(),
        }
    }

    /// Decode a JSON snapshot of the form `{token: {id, renderUrl, sourceLabel}}`.
    ///
    /// An empty token can never match and is skipped; the rest of the snapshot
    /// is kept.
    pub fn from_json(name: impl Into<String>, json: &str) -> Result<Self> {
        let name = name.into();
        let mut entries: FxHashMap<String, EmoteDescriptor> = serde_json::from_str(json)?;
        if entries.remove("").is_some() {
            warn!(catalog = %name, "Skipping empty token in emote catalog");
        }
        debug!(catalog = %name, count = entries.len(), "Decoded emote catalog");
        Ok(Self { name, entries })
    }

    /// Read and decode a JSON snapshot file. The file stem names the catalog.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "catalog".to_string());
        let json = std::fs::read_to_string(path)?;
        Self::from_json(name, &json)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl EmoteLookup for EmoteCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, token: &str) -> Option<&EmoteDescriptor> {
        self.entries.get(token)
    }
}

/// Catalogs in priority order.
#[derive(Default)]
pub struct CatalogSet {
    sources: Vec<Box<dyn EmoteLookup + Send + Sync>>,
}

impl CatalogSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source with lower priority than every source already present.
    pub fn push(&mut self, source: impl EmoteLookup + Send + Sync + 'static) {
        self.sources.push(Box::new(source));
    }

    /// Builder-style [`CatalogSet::push`].
    pub fn with(mut self, source: impl EmoteLookup + Send + Sync + 'static) -> Self {
        self.push(source);
        self
    }

    /// First hit in priority order.
    pub fn lookup(&self, token: &str) -> Option<&EmoteDescriptor> {
        self.sources.iter().find_map(|source| source.lookup(token))
    }

    /// Whether any catalog knows the token.
    pub fn contains(&self, token: &str) -> bool {
        self.lookup(token).is_some()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl std::fmt::Debug for CatalogSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.sources.iter().map(|s| s.name()))
            .finish()
    }
}

/// Render metadata for an emote key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderMeta {
    pub render_url: String,
    pub source_label: String,
}

impl RenderMeta {
    /// A descriptor is usable when there is something to draw.
    pub fn is_usable(&self) -> bool {
        !self.render_url.is_empty()
    }
}

/// Source of render metadata for the particle reconciler.
pub trait RenderMetadata {
    fn render_meta(&self, key: &str) -> Option<&RenderMeta>;
}

/// Last-seen render metadata of every emote key that has been resolved.
#[derive(Debug, Clone, Default)]
pub struct EmoteRegistry {
    entries: FxHashMap<String, RenderMeta>,
}

impl EmoteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the metadata of a key.
    pub fn upsert(
        &mut self,
        key: &str,
        render_url: impl Into<String>,
        source_label: impl Into<String>,
    ) {
        let meta = RenderMeta {
            render_url: render_url.into(),
            source_label: source_label.into(),
        };
        match self.entries.get_mut(key) {
            Some(existing) => *existing = meta,
            None => {
                self.entries.insert(key.to_string(), meta);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&RenderMeta> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RenderMetadata for EmoteRegistry {
    fn render_meta(&self, key: &str) -> Option<&RenderMeta> {
        self.get(key)
    }
}

impl RenderMetadata for FxHashMap<String, RenderMeta> {
    fn render_meta(&self, key: &str) -> Option<&RenderMeta> {
        self.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PulseError;

    fn desc(id: &str, source: &str) -> EmoteDescriptor {
        EmoteDescriptor::new(id, format!("https://cdn.example/{}", id), source)
    }

    #[test]
    fn test_priority_order() {
        let bttv = EmoteCatalog::from_entries("bttv", [("OMEGALUL", desc("b1", "bttv"))]);
        let ffz = EmoteCatalog::from_entries(
            "ffz",
            [("OMEGALUL", desc("f1", "ffz")), ("monkaS", desc("f2", "ffz"))],
        );
        let set = CatalogSet::new().with(bttv).with(ffz);

        assert_eq!(set.len(), 2);
        assert_eq!(set.lookup("OMEGALUL").unwrap().source_label, "bttv");
        assert_eq!(set.lookup("monkaS").unwrap().source_label, "ffz");
        assert!(set.lookup("Kappa").is_none());
        assert!(!set.contains("omegalul"));
    }

    #[test]
    fn test_empty_set() {
        let set = CatalogSet::new();
        assert!(set.is_empty());
        assert!(set.lookup("anything").is_none());
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "catJAM": {"id": "5f1b0186cf6d2144653d2970", "renderUrl": "https://cdn.7tv.app/emote/x/2x.webp", "sourceLabel": "7tv"},
            "EZ": {"id": "ez"}
        }"#;
        let catalog = EmoteCatalog::from_json("7tv", json).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.name(), "7tv");
        assert_eq!(catalog.lookup("catJAM").unwrap().source_label, "7tv");
        assert_eq!(catalog.lookup("EZ").unwrap().render_url, "");
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            EmoteCatalog::from_json("x", "[1, 2]"),
            Err(PulseError::Json(_))
        ));
    }

    #[test]
    fn test_from_json_skips_empty_token() {
        let json = r#"{
            "OMEGALUL": {"id": "1", "renderUrl": "https://b/1", "sourceLabel": "bttv"},
            "": {"id": "2"}
        }"#;
        let catalog = EmoteCatalog::from_json("bttv", json).unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.lookup("OMEGALUL").is_some());
        assert!(catalog.lookup("").is_none());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bttv.json");
        std::fs::write(&path, r#"{"LULW": {"id": "l", "renderUrl": "u", "sourceLabel": "bttv"}}"#)
            .unwrap();

        let catalog = EmoteCatalog::from_file(&path).unwrap();
        assert_eq!(catalog.name(), "bttv");
        assert!(catalog.lookup("LULW").is_some());

        assert!(matches!(
            EmoteCatalog::from_file(dir.path().join("missing.json")),
            Err(PulseError::Io(_))
        ));
    }

    #[test]
    fn test_registry_upsert_and_usable() {
        let mut registry = EmoteRegistry::new();
        registry.upsert("Kappa", native_render_url("25"), NATIVE_SOURCE);
        registry.upsert("Blank", "", "ffz");

        let kappa = registry.get("Kappa").unwrap();
        assert_eq!(
            kappa.render_url,
            "https://static-cdn.jtvnw.net/emoticons/v2/25/default/dark/2.0"
        );
        assert!(kappa.is_usable());
        assert!(!registry.get("Blank").unwrap().is_usable());

        registry.upsert("Kappa", "other", "bttv");
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("Kappa").unwrap().source_label, "bttv");
    }
}
