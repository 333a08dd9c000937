//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use bald_core::{
    build::{LoadResult, Loader},
    config::BaldConfig,
    http::{StaticFetcher, UriCache},
    properties::{BALD_NS, BALD_ONTOLOGY, RDF_NS},
    source::Dataset,
};
use oxigraph::model::{Term, Triple};
use std::{
    collections::{hash_map::DefaultHasher, BTreeMap},
    hash::{Hash, Hasher},
    path::PathBuf,
    sync::Arc,
};

pub const BASE_URI: &str = "http://example.org/base";

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[allow(dead_code)]
pub fn dataset(name: &str) -> Dataset {
    Dataset::from_path(fixture(name)).unwrap()
}

/// Serves the bundled core ontology and answers 200 for the bald, rdf and base namespaces.
#[allow(dead_code)]
pub fn fetcher() -> StaticFetcher {
    let mut fetcher = StaticFetcher::new()
        .with_namespace(BALD_NS)
        .with_namespace(RDF_NS)
        .with_namespace(format!("{BASE_URI}/"));
    fetcher
        .insert_file(BALD_ONTOLOGY, fixture("bald.ttl"))
        .unwrap();
    fetcher
}

#[allow(dead_code)]
pub fn loader_with(fetcher: StaticFetcher, config: BaldConfig) -> Loader {
    Loader::with_cache(config, Arc::new(UriCache::new(fetcher, None)))
}

#[allow(dead_code)]
pub fn loader() -> Loader {
    loader_with(fetcher(), BaldConfig::default().with_base_uri(BASE_URI))
}

#[allow(dead_code)]
pub fn load(name: &str) -> LoadResult {
    loader().load(&dataset(name)).unwrap()
}

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn label(term: &Term, colours: &BTreeMap<String, u64>) -> String {
    match term {
        Term::BlankNode(b) => format!("_:{}", colours.get(b.as_str()).copied().unwrap_or(0)),
        other => other.to_string(),
    }
}

/// A blank-node-insensitive signature of a triple set: blank nodes are coloured by repeated
/// refinement over their neighbourhoods, then every triple is rendered with colours in place of
/// blank node labels. Isomorphic graphs have equal signatures.
#[allow(dead_code)]
pub fn graph_signature(triples: &[Triple]) -> Vec<String> {
    let rows: Vec<(Term, String, Term)> = triples
        .iter()
        .map(|t| {
            (
                Term::from(t.subject.clone()),
                t.predicate.as_str().to_string(),
                t.object.clone(),
            )
        })
        .collect();
    let mut colours: BTreeMap<String, u64> = BTreeMap::new();
    for (s, _, o) in &rows {
        for term in [s, o] {
            if let Term::BlankNode(b) = term {
                colours.insert(b.as_str().to_string(), 0);
            }
        }
    }
    for _ in 0..=colours.len() {
        let mut next = BTreeMap::new();
        for (node, colour) in &colours {
            let mut neighbourhood: Vec<String> = rows
                .iter()
                .filter_map(|(s, p, o)| match (s, o) {
                    (Term::BlankNode(b), _) if b.as_str() == node => {
                        Some(format!("out {p} {}", label(o, &colours)))
                    }
                    (_, Term::BlankNode(b)) if b.as_str() == node => {
                        Some(format!("in {p} {}", label(s, &colours)))
                    }
                    _ => None,
                })
                .collect();
            neighbourhood.sort();
            next.insert(node.clone(), hash_of(&(colour, neighbourhood)));
        }
        colours = next;
    }
    let mut signature: Vec<String> = rows
        .iter()
        .map(|(s, p, o)| format!("{} {p} {}", label(s, &colours), label(o, &colours)))
        .collect();
    signature.sort();
    signature
}
