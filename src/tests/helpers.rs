//! Shared fixtures for unit tests.

use crate::{
    http::{StaticFetcher, UriCache},
    properties::{BALD_NS, BALD_ONTOLOGY, BALD_REFERENCES, RDF_NS},
    source::{Dataset, Group, Variable},
};

/// The core ontology as served offline.
pub const BALD_TTL: &str = include_str!("../../tests/fixtures/bald.ttl");

/// Initialize logging for tests
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Serves the core ontology and answers 200 for anything in the `bald` and `rdf` namespaces.
pub fn offline_fetcher() -> StaticFetcher {
    StaticFetcher::new()
        .with_document(BALD_ONTOLOGY, "text/turtle", BALD_TTL)
        .with_namespace(BALD_NS)
        .with_namespace(RDF_NS)
}

pub fn offline_cache() -> UriCache {
    UriCache::new(offline_fetcher(), None)
}

/// A parent array of shape (11, 17) declaring a reference to a child of shape (11, `width`).
pub fn parent_child_dataset(width: usize) -> Dataset {
    let child_dims: &[(&str, usize)] = if width == 17 {
        &[("pdim0", 11), ("pdim1", 17)]
    } else {
        &[("pdim0", 11), ("cdim1", width)]
    };
    Dataset::new(
        None,
        Group::new("")
            .with_variable(
                Variable::new("parent_variable")
                    .with_dimensions(&[("pdim0", 11), ("pdim1", 17)])
                    .with_attribute(BALD_REFERENCES, "child_variable"),
            )
            .with_variable(Variable::new("child_variable").with_dimensions(child_dims)),
    )
    .unwrap_or_default()
}
