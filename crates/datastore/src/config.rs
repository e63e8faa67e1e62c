//! TOML configuration for a store and its remote sources.
//!
//! ```toml
//! [store]
//! max_notify_depth = 16
//!
//! [sources.albums]
//! url = "https://photos.example/albums?user={user}"
//! transport = "json"
//! notify_on_failure = true
//! params = { user = "ada" }
//! envelope = { prefix = "handle(", suffix = ");" }
//! ```

use std::path::Path;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, LoadError};
use crate::remote::{RemoteConfig, Transport};
use crate::store::{Store, StoreOptions};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub store: StoreOptions,
    /// Remote sources by name, in declaration order.
    pub sources: IndexMap<String, RemoteConfig>,
}

impl StoreConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: StoreConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|err| ConfigError::Io(format!("{}: {}", path.as_ref().display(), err)))?;
        Self::from_toml_str(&text)
    }

    /// Every source needs a URL whose placeholders are all bound.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.max_notify_depth == 0 {
            return Err(ConfigError::Parse(
                "store.max_notify_depth must be at least 1".to_string(),
            ));
        }
        for (name, source) in &self.sources {
            let reason = match source.resolve_url() {
                Ok(_) => continue,
                Err(LoadError::NoEndpoint) => "missing url".to_string(),
                Err(err) => err.to_string(),
            };
            return Err(ConfigError::InvalidSource {
                name: name.clone(),
                reason,
            });
        }
        Ok(())
    }
}

impl Store {
    /// Build a store from `config`, registering every configured source.
    /// Sources with `autoload` start loading right away.
    pub fn from_config(
        config: &StoreConfig,
        transport: Rc<dyn Transport>,
    ) -> Result<Store, ConfigError> {
        config.validate()?;
        let store = Store::with_options(transport, config.store.clone());
        for (name, source) in &config.sources {
            store.add_remote(name, source.clone())?;
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{Envelope, QueuedTransport, TransportKind};
    use crate::{LoadState, StoreError};

    const FULL: &str = r#"
[store]
max_notify_depth = 8

[sources.albums]
url = "https://photos.example/albums?user={user}"
transport = "json"
notify_on_failure = true
params = { user = "ada" }
envelope = { prefix = "handle(", suffix = ");" }

[sources.feed]
url = "https://photos.example/feed.xml"
transport = "xml"
autoload = true
"#;

    #[test]
    fn parses_every_field() {
        let config = StoreConfig::from_toml_str(FULL).unwrap();
        assert_eq!(config.store.max_notify_depth, 8);
        let names: Vec<&str> = config.sources.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["albums", "feed"]);

        let albums = &config.sources["albums"];
        assert_eq!(albums.transport, TransportKind::Json);
        assert!(albums.notify_on_failure);
        assert!(!albums.autoload);
        assert_eq!(
            albums.envelope,
            Some(Envelope {
                prefix: "handle(".into(),
                suffix: ");".into()
            })
        );
        assert_eq!(
            albums.resolve_url().unwrap(),
            "https://photos.example/albums?user=ada"
        );
        assert_eq!(config.sources["feed"].transport, TransportKind::Xml);
    }

    #[test]
    fn defaults() {
        let config = StoreConfig::from_toml_str("").unwrap();
        assert_eq!(config.store.max_notify_depth, 16);
        assert!(config.sources.is_empty());
    }

    #[test]
    fn rejects_bad_sources() {
        let err = StoreConfig::from_toml_str("[sources.a]\ntransport = \"json\"\n").unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidSource {
                name: "a".into(),
                reason: "missing url".into()
            }
        );

        let err = StoreConfig::from_toml_str("[sources.a]\nurl = \"/u/{who}\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSource { .. }));

        let err = StoreConfig::from_toml_str("[sources.a]\nurl = \"/a\"\ncolour = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = StoreConfig::from_toml_str("[sources.a]\nurl = \"/a\"\ntransport = \"yaml\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn builds_a_store() {
        let queue = QueuedTransport::new();
        let config = StoreConfig::from_toml_str(FULL).unwrap();
        let store = Store::from_config(&config, Rc::new(queue.clone())).unwrap();

        assert_eq!(store.source_names(), vec!["albums", "feed"]);
        assert_eq!(store.options().max_notify_depth, 8);
        assert_eq!(store.load_state("albums"), Some(LoadState::NotLoaded));
        assert_eq!(store.load_state("feed"), Some(LoadState::Loading));
        assert_eq!(queue.pending_count(), 1);
    }

    #[test]
    fn invalid_source_names_surface_as_store_errors() {
        let config = StoreConfig::from_toml_str("[sources.\"a/b\"]\nurl = \"/x\"\n").unwrap();
        let err = Store::from_config(&config, Rc::new(QueuedTransport::new())).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Store(StoreError::InvalidSourceName("a/b".into()))
        );
    }
}
