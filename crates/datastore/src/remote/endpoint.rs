use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::LoadError;

/// How a source's payload is encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Json,
    Xml,
}

/// Markers wrapped around a payload delivered as a script, e.g.
/// `handle(` … `);`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Envelope {
    pub prefix: String,
    pub suffix: String,
}

/// Where and how a remote source fetches its data.
///
/// # Example
///
/// ```
/// use datastore::RemoteConfig;
///
/// let config = RemoteConfig::json("https://photos.example/albums?user={user}")
///     .with_param("user", "ada lovelace");
/// assert_eq!(
///     config.resolve_url().unwrap(),
///     "https://photos.example/albums?user=ada%20lovelace"
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteConfig {
    /// URL template; `{name}` placeholders are filled from `params`.
    pub url: Option<String>,
    pub transport: TransportKind,
    pub params: BTreeMap<String, String>,
    pub envelope: Option<Envelope>,
    /// Start loading as soon as the source is registered.
    pub autoload: bool,
    /// Notify listeners of the source path when a load fails.
    pub notify_on_failure: bool,
}

impl RemoteConfig {
    pub fn json(url: impl Into<String>) -> Self {
        RemoteConfig {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn xml(url: impl Into<String>) -> Self {
        RemoteConfig {
            url: Some(url.into()),
            transport: TransportKind::Xml,
            ..Default::default()
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_envelope(mut self, prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.envelope = Some(Envelope {
            prefix: prefix.into(),
            suffix: suffix.into(),
        });
        self
    }

    pub fn with_autoload(mut self, autoload: bool) -> Self {
        self.autoload = autoload;
        self
    }

    pub fn with_notify_on_failure(mut self, notify: bool) -> Self {
        self.notify_on_failure = notify;
        self
    }

    /// Fill the URL template. Parameter values are percent-encoded; a `{`
    /// without a closing `}` is kept literally.
    pub fn resolve_url(&self) -> Result<String, LoadError> {
        let template = match self.url.as_deref() {
            Some(url) if !url.trim().is_empty() => url,
            _ => return Err(LoadError::NoEndpoint),
        };
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}') else {
                break;
            };
            let name = &rest[open + 1..open + close];
            let value = self
                .params
                .get(name)
                .ok_or_else(|| LoadError::UnboundParameter(name.to_string()))?;
            out.push_str(&rest[..open]);
            out.push_str(&urlencoding::encode(value));
            rest = &rest[open + close + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_without_placeholders() {
        let config = RemoteConfig::json("https://photos.example/feed");
        assert_eq!(config.resolve_url().unwrap(), "https://photos.example/feed");
    }

    #[test]
    fn several_placeholders() {
        let config = RemoteConfig::json("/u/{user}/albums/{album}?q={q}")
            .with_param("user", "ada")
            .with_param("album", "a/1")
            .with_param("q", "x&y");
        assert_eq!(config.resolve_url().unwrap(), "/u/ada/albums/a%2F1?q=x%26y");
    }

    #[test]
    fn unbound_parameter() {
        let config = RemoteConfig::json("/u/{user}");
        assert_eq!(
            config.resolve_url(),
            Err(LoadError::UnboundParameter("user".into()))
        );
    }

    #[test]
    fn unclosed_brace_is_literal() {
        let config = RemoteConfig::json("/weird{path");
        assert_eq!(config.resolve_url().unwrap(), "/weird{path");
    }

    #[test]
    fn missing_endpoint() {
        assert_eq!(RemoteConfig::default().resolve_url(), Err(LoadError::NoEndpoint));
        assert_eq!(RemoteConfig::json("  ").resolve_url(), Err(LoadError::NoEndpoint));
    }
}
