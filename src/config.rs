use crate::{error::BaldError, properties::BALD_ONTOLOGY};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
    time::Duration,
};

/// Options for [crate::http::ReqwestFetcher] and [crate::http::UriCache].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpOptions {
    pub primary_accept: String,
    pub fallback_accept: String,
    pub primary_timeout_secs: u64,
    pub fallback_timeout_secs: u64,
    /// `None` keeps every response for the lifetime of the cache.
    pub cache_capacity: Option<usize>,
    pub user_agent: String,
}

impl Default for HttpOptions {
    fn default() -> Self {
        HttpOptions {
            primary_accept: "application/rdf+xml".to_string(),
            fallback_accept: "text/html".to_string(),
            primary_timeout_secs: 11,
            fallback_timeout_secs: 64,
            cache_capacity: None,
            user_agent: format!("bald-core/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpOptions {
    pub fn primary_timeout(&self) -> Duration {
        Duration::from_secs(self.primary_timeout_secs)
    }

    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_secs(self.fallback_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    pub check_uris: bool,
    pub check_domains: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        ValidationOptions {
            check_uris: true,
            check_domains: true,
        }
    }
}

/// Load-time configuration.
///
/// ```toml
/// base_uri = "http://example.org/data/ProcessedSonarData.nc"
/// file_locator = "http://example.org/downloads/ProcessedSonarData.nc"
///
/// [aliases]
/// NetCDF = "http://vocab.nerc.ac.uk/collection/P01/current/"
///
/// [http]
/// primary_timeout_secs = 5
///
/// [documents]
/// "https://www.opengis.net/def/binary-array-ld" = "ontologies/bald.ttl"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaldConfig {
    pub base_uri: Option<String>,
    pub file_locator: Option<String>,
    pub core_ontology: String,
    pub aliases: IndexMap<String, String>,
    pub prefix_contexts: Vec<String>,
    pub http: HttpOptions,
    pub validation: ValidationOptions,
    /// Local files served in place of network fetches, keyed by URI.
    pub documents: IndexMap<String, PathBuf>,
}

impl Default for BaldConfig {
    fn default() -> Self {
        BaldConfig {
            base_uri: None,
            file_locator: None,
            core_ontology: BALD_ONTOLOGY.to_string(),
            aliases: IndexMap::new(),
            prefix_contexts: Vec::new(),
            http: HttpOptions::default(),
            validation: ValidationOptions::default(),
            documents: IndexMap::new(),
        }
    }
}

impl BaldConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, BaldError> {
        Ok(toml::from_str(content)?)
    }

    /// Reads a TOML config file. Relative `documents` paths are resolved against the file's
    /// directory.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, BaldError> {
        let path = path.as_ref();
        tracing::debug!("Reading config from: {:?}", path);
        let content = read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        if let Some(dir) = path.parent() {
            for doc_path in config.documents.values_mut() {
                if doc_path.is_relative() {
                    *doc_path = dir.join(&doc_path);
                }
            }
        }
        Ok(config)
    }

    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = Some(base_uri.into());
        self
    }

    pub fn with_alias(mut self, name: impl Into<String>, uri: impl Into<String>) -> Self {
        self.aliases.insert(name.into(), uri.into());
        self
    }

    /// The identity base for a dataset, always ending in `/`.
    ///
    /// Falls back to `file://<location>/` when no base URI is configured.
    pub fn resolve_base_uri(&self, location: Option<&str>) -> Result<String, BaldError> {
        let mut base = match (&self.base_uri, location) {
            (Some(base), _) => base.clone(),
            (None, Some(location)) => {
                let absolute = std::path::absolute(location)
                    .unwrap_or_else(|_| PathBuf::from(location));
                url::Url::from_file_path(&absolute)
                    .map(|u| u.to_string())
                    .unwrap_or_else(|_| format!("file://{location}"))
            }
            (None, None) => {
                return Err(BaldError::Config(
                    "no base URI configured and the dataset has no location".to_string(),
                ))
            }
        };
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(base)
    }
}
