//! Memoizing HTTP access for URI checks and ontology payloads.
//!
//! [UriCache] sits in front of a [Fetch] implementation. Every URI is fetched at most once per
//! cache: transport failures are stored as an unresolved response so later lookups fail
//! immediately. [ReqwestFetcher] talks to the network with content negotiation;
//! [StaticFetcher] serves registered documents and is what tests and offline runs use.

use indexmap::IndexMap;
use lru::LruCache;
use oxigraph::io::RdfFormat;
use parking_lot::Mutex;
use reqwest::{
    blocking::Client,
    header::{ACCEPT, CONTENT_TYPE},
};
use std::{
    fs::read_to_string,
    num::NonZeroUsize,
    path::Path,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use crate::{config::HttpOptions, error::BaldError, properties::is_http_uri};

/// The outcome of dereferencing one URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub uri: String,
    /// `None` when no response was received at all.
    pub status: Option<u16>,
    pub content_type: Option<String>,
    pub body: String,
}

impl Response {
    pub fn unresolved(uri: impl Into<String>) -> Self {
        Response {
            uri: uri.into(),
            status: None,
            content_type: None,
            body: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Some(200)
    }

    /// The media type without parameters, lower-cased.
    pub fn media_type(&self) -> Option<String> {
        self.content_type.as_ref().map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }

    /// The RDF format announced by the content type, if any.
    pub fn rdf_format(&self) -> Option<RdfFormat> {
        let media_type = self.media_type()?;
        match media_type.as_str() {
            "application/xml" | "text/xml" => Some(RdfFormat::RdfXml),
            other => RdfFormat::from_media_type(other),
        }
    }

    pub fn is_rdf(&self) -> bool {
        self.rdf_format().is_some()
    }
}

/// Something able to dereference an HTTP(S) URI.
pub trait Fetch: Send + Sync {
    /// Performs the request. `Err` means no response was obtained; non-200 statuses are
    /// returned as responses.
    fn fetch(&self, uri: &str) -> Result<Response, BaldError>;
}

/// Network fetcher: `Accept: application/rdf+xml` with a short timeout, then the fallback
/// media type with a longer one if the first attempt fails in transport.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
    options: HttpOptions,
}

impl ReqwestFetcher {
    pub fn new(options: HttpOptions) -> Result<Self, BaldError> {
        let client = Client::builder().user_agent(&options.user_agent).build()?;
        Ok(ReqwestFetcher { client, options })
    }

    fn attempt(
        &self,
        uri: &str,
        accept: &str,
        timeout: std::time::Duration,
    ) -> Result<Response, BaldError> {
        let response = self
            .client
            .get(uri)
            .header(ACCEPT, accept)
            .timeout(timeout)
            .send()?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text()?;
        Ok(Response {
            uri: uri.to_string(),
            status: Some(status),
            content_type,
            body,
        })
    }
}

impl Fetch for ReqwestFetcher {
    fn fetch(&self, uri: &str) -> Result<Response, BaldError> {
        match self.attempt(
            uri,
            &self.options.primary_accept,
            self.options.primary_timeout(),
        ) {
            Ok(response) => Ok(response),
            Err(err) => {
                tracing::debug!(
                    "GET {uri} ({}) failed: {err}; retrying with {}",
                    self.options.primary_accept,
                    self.options.fallback_accept
                );
                self.attempt(
                    uri,
                    &self.options.fallback_accept,
                    self.options.fallback_timeout(),
                )
            }
        }
    }
}

#[derive(Debug, Clone)]
struct StaticDocument {
    content_type: String,
    body: String,
}

/// Serves registered documents without touching the network.
///
/// Exact URIs are matched first; otherwise the longest registered namespace that prefixes the
/// URI answers with an empty 200 response. Everything else is a 404.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    documents: IndexMap<String, StaticDocument>,
    namespaces: Vec<String>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        StaticFetcher::default()
    }

    pub fn with_document(
        mut self,
        uri: impl Into<String>,
        content_type: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        self.insert(uri, content_type, body);
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespaces.push(namespace.into());
        self
    }

    pub fn insert(
        &mut self,
        uri: impl Into<String>,
        content_type: impl Into<String>,
        body: impl Into<String>,
    ) {
        self.documents.insert(
            uri.into(),
            StaticDocument {
                content_type: content_type.into(),
                body: body.into(),
            },
        );
    }

    /// Registers the file at `path` for `uri`, with a content type guessed from its extension.
    pub fn insert_file<P: AsRef<Path>>(&mut self, uri: impl Into<String>, path: P) -> Result<(), BaldError> {
        let path = path.as_ref();
        let body = read_to_string(path)?;
        let content_type = match path.extension().and_then(|e| e.to_str()) {
            Some("ttl") => "text/turtle",
            Some("nt") => "application/n-triples",
            Some("n3") => "text/n3",
            Some("rdf") | Some("owl") | Some("xml") => "application/rdf+xml",
            Some("json") | Some("jsonld") => "application/ld+json",
            _ => "text/plain",
        };
        self.insert(uri, content_type, body);
        Ok(())
    }

    /// A fetcher serving every `uri = path` entry of a config `documents` table.
    pub fn from_documents(documents: &IndexMap<String, std::path::PathBuf>) -> Result<Self, BaldError> {
        let mut fetcher = StaticFetcher::new();
        for (uri, path) in documents {
            fetcher.insert_file(uri.clone(), path)?;
        }
        Ok(fetcher)
    }
}

impl Fetch for StaticFetcher {
    fn fetch(&self, uri: &str) -> Result<Response, BaldError> {
        if let Some(doc) = self.documents.get(uri) {
            return Ok(Response {
                uri: uri.to_string(),
                status: Some(200),
                content_type: Some(doc.content_type.clone()),
                body: doc.body.clone(),
            });
        }
        let in_namespace = self
            .namespaces
            .iter()
            .any(|ns| uri.starts_with(ns.as_str()));
        Ok(Response {
            uri: uri.to_string(),
            status: Some(if in_namespace { 200 } else { 404 }),
            content_type: in_namespace.then(|| "text/html".to_string()),
            body: String::new(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    /// `None` for an unbounded cache.
    pub capacity: Option<usize>,
    pub hits: u64,
    pub misses: u64,
}

/// Memoizing front for a [Fetch] implementation, keyed by exact URI.
pub struct UriCache {
    fetcher: Box<dyn Fetch>,
    entries: Mutex<LruCache<String, Arc<Response>>>,
    capacity: Option<usize>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for UriCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UriCache")
            .field("stats", &self.stats())
            .finish()
    }
}

impl UriCache {
    /// A cache over `fetcher`; `capacity` bounds it with LRU eviction.
    pub fn new<F: Fetch + 'static>(fetcher: F, capacity: Option<usize>) -> Self {
        let entries = match capacity.and_then(NonZeroUsize::new) {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };
        UriCache {
            fetcher: Box::new(fetcher),
            entries: Mutex::new(entries),
            capacity: capacity.filter(|c| *c > 0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// A network-backed cache configured from `options`.
    pub fn from_options(options: &HttpOptions) -> Result<Self, BaldError> {
        Ok(Self::new(
            ReqwestFetcher::new(options.clone())?,
            options.cache_capacity,
        ))
    }

    /// The response for `uri`, fetching it on first use.
    pub fn get(&self, uri: &str) -> Result<Arc<Response>, BaldError> {
        if !is_http_uri(uri) {
            return Err(BaldError::NotHttpUri(uri.to_string()));
        }
        if let Some(response) = self.entries.lock().get(uri) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("cache hit: {uri}");
            return Ok(response.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let response = match self.fetcher.fetch(uri) {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!("{uri} is unresolved: {err}");
                Response::unresolved(uri)
            }
        };
        let response = Arc::new(response);
        self.entries.lock().put(uri.to_string(), response.clone());
        Ok(response)
    }

    /// True if `uri` dereferences with status 200.
    pub fn check_uri(&self, uri: &str) -> bool {
        self.get(uri).map(|r| r.is_success()).unwrap_or(false)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.lock().len(),
            capacity: self.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use test_log::test;

    struct CountingFetcher {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Fetch for CountingFetcher {
        fn fetch(&self, uri: &str) -> Result<Response, BaldError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(BaldError::Http(format!("connection refused: {uri}")));
            }
            Ok(Response {
                uri: uri.to_string(),
                status: Some(200),
                content_type: Some("text/turtle; charset=utf-8".to_string()),
                body: String::new(),
            })
        }
    }

    fn counting(fail: bool) -> (UriCache, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = UriCache::new(
            CountingFetcher {
                calls: calls.clone(),
                fail,
            },
            None,
        );
        (cache, calls)
    }

    #[test]
    fn test_responses_are_memoized() {
        let (cache, calls) = counting(false);
        assert!(cache.check_uri("http://example.org/a"));
        assert!(cache.check_uri("http://example.org/a"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!((stats.size, stats.hits, stats.misses), (1, 1, 1));
        assert_eq!(stats.capacity, None);
    }

    #[test]
    fn test_failures_are_attempted_once() {
        let (cache, calls) = counting(true);
        assert!(!cache.check_uri("http://example.org/down"));
        assert!(!cache.check_uri("http://example.org/down"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let response = cache.get("http://example.org/down").unwrap();
        assert_eq!(response.status, None);
    }

    #[test]
    fn test_non_http_uris_are_rejected() {
        let (cache, calls) = counting(false);
        assert!(matches!(
            cache.get("file:///tmp/x"),
            Err(BaldError::NotHttpUri(_))
        ));
        assert!(!cache.check_uri("bald__Array"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_clear_forces_refetch() {
        let (cache, calls) = counting(false);
        cache.get("http://example.org/a").unwrap();
        cache.clear();
        cache.get("http://example.org/a").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_bounded_cache_evicts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = UriCache::new(
            CountingFetcher {
                calls: calls.clone(),
                fail: false,
            },
            Some(1),
        );
        cache.get("http://example.org/a").unwrap();
        cache.get("http://example.org/b").unwrap();
        cache.get("http://example.org/a").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.stats().size, 1);
        assert_eq!(cache.stats().capacity, Some(1));
    }

    #[test]
    fn test_static_fetcher_routes() {
        let cache = UriCache::new(
            StaticFetcher::new()
                .with_document("http://example.org/onto", "text/turtle", "")
                .with_namespace("https://www.opengis.net/def/binary-array-ld/"),
            None,
        );
        let doc = cache.get("http://example.org/onto").unwrap();
        assert_eq!(doc.rdf_format(), Some(RdfFormat::Turtle));
        assert!(cache.check_uri("https://www.opengis.net/def/binary-array-ld/Array"));
        let missing = cache.get("http://example.org/missing").unwrap();
        assert_eq!(missing.status, Some(404));
        assert!(!missing.is_rdf());
    }

    #[test]
    fn test_media_type_parameters_are_ignored() {
        let response = Response {
            uri: "http://example.org".into(),
            status: Some(200),
            content_type: Some("Application/RDF+XML; charset=UTF-8".into()),
            body: String::new(),
        };
        assert_eq!(response.media_type().as_deref(), Some("application/rdf+xml"));
        assert_eq!(response.rdf_format(), Some(RdfFormat::RdfXml));
    }
}
