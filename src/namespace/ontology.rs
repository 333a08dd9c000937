//! A small in-memory index over fetched ontology documents.
//!
//! Only the lookups the loader and validator need are supported: identifier aliases for
//! predicates and objects, declared ranges and domains, the subclass closure used to find
//! reference-bearing predicates, and `vann` namespace declarations.

use indexmap::{IndexMap, IndexSet};
use oxigraph::{
    io::{RdfFormat, RdfParser},
    model::Term,
};

use crate::{
    error::BaldError,
    properties::{BALD_NS, DCT_NS, OWL_NS, RDFS_NS, RDF_NS, VANN_NS},
};

const RDF_TYPE_IRI: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

fn iri(ns: &str, local: &str) -> String {
    format!("{ns}{local}")
}

/// One parsed triple object, reduced to what the index needs.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Iri(String),
    Blank(String),
    Literal { value: String, tagged: bool },
}

impl Node {
    fn resource(&self) -> Option<&str> {
        match self {
            Node::Iri(s) | Node::Blank(s) => Some(s.as_str()),
            Node::Literal { .. } => None,
        }
    }

    fn text(&self) -> &str {
        match self {
            Node::Iri(s) | Node::Blank(s) => s.as_str(),
            Node::Literal { value, .. } => value.as_str(),
        }
    }
}

/// Triple index over every ontology document fetched during one load.
#[derive(Debug, Clone, Default)]
pub struct OntologyIndex {
    documents: Vec<String>,
    triples: usize,
    identifiers: IndexMap<String, IndexSet<String>>,
    types: IndexMap<String, IndexSet<String>>,
    ranges: IndexMap<String, IndexSet<String>>,
    domains: IndexMap<String, IndexSet<String>>,
    superclasses: IndexMap<String, IndexSet<String>>,
    preferred_prefix: IndexMap<String, String>,
    preferred_uri: IndexMap<String, String>,
}

impl OntologyIndex {
    pub fn new() -> Self {
        OntologyIndex::default()
    }

    /// Parses `body` with each format in turn and indexes the first complete parse.
    ///
    /// Returns the number of triples added. Nothing is indexed when no format parses the
    /// whole document; the error of the last attempt is returned.
    pub fn load(
        &mut self,
        uri: &str,
        body: &str,
        formats: &[RdfFormat],
    ) -> Result<usize, BaldError> {
        let mut last_error = BaldError::ontology(uri, "no RDF format to parse with");
        for format in formats {
            match Self::parse(uri, body, *format) {
                Ok(triples) => {
                    let count = triples.len();
                    let doc = self.documents.len();
                    self.documents.push(uri.to_string());
                    for (s, p, o) in triples {
                        self.ingest(doc, s, p, o);
                    }
                    tracing::debug!("Indexed {count} triples from {uri} ({format})");
                    return Ok(count);
                }
                Err(err) => {
                    tracing::trace!("{uri} does not parse as {format}: {err}");
                    last_error = BaldError::ontology(uri, err);
                }
            }
        }
        Err(last_error)
    }

    fn parse(uri: &str, body: &str, format: RdfFormat) -> Result<Vec<(Node, String, Node)>, BaldError> {
        let parser = RdfParser::from_format(format)
            .with_base_iri(uri)
            .unwrap_or_else(|_| RdfParser::from_format(format));
        let mut triples = Vec::new();
        for quad in parser.for_reader(body.as_bytes()) {
            let quad = quad?;
            let Some(subject) = Self::node(Term::from(quad.subject)) else {
                continue;
            };
            let Some(object) = Self::node(quad.object) else {
                continue;
            };
            triples.push((subject, quad.predicate.into_string(), object));
        }
        Ok(triples)
    }

    fn node(term: Term) -> Option<Node> {
        match term {
            Term::NamedNode(n) => Some(Node::Iri(n.into_string())),
            Term::BlankNode(b) => Some(Node::Blank(b.into_string())),
            Term::Literal(l) => Some(Node::Literal {
                tagged: l.language().is_some(),
                value: l.value().to_string(),
            }),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    fn ingest(&mut self, doc: usize, subject: Node, predicate: String, object: Node) {
        self.triples += 1;
        let scope = |node: Node| match node {
            Node::Blank(id) => Node::Blank(format!("_:d{doc}_{id}")),
            other => other,
        };
        let subject = scope(subject);
        let object = scope(object);
        let Some(s) = subject.resource().map(str::to_string) else {
            return;
        };

        let slot = match predicate.as_str() {
            p if p == iri(DCT_NS, "identifier") => match &object {
                Node::Literal { value, tagged: false } => {
                    self.identifiers
                        .entry(value.clone())
                        .or_default()
                        .insert(s);
                    return;
                }
                _ => return,
            },
            RDF_TYPE_IRI => &mut self.types,
            p if p == iri(RDFS_NS, "range") => &mut self.ranges,
            p if p == iri(RDFS_NS, "domain") => &mut self.domains,
            p if p == iri(RDFS_NS, "subClassOf") => &mut self.superclasses,
            p if p == iri(VANN_NS, "preferredNamespacePrefix") => {
                self.preferred_prefix.insert(s, object.text().to_string());
                return;
            }
            p if p == iri(VANN_NS, "preferredNamespaceUri") => {
                self.preferred_uri.insert(s, object.text().to_string());
                return;
            }
            _ => return,
        };
        if let Some(o) = object.resource() {
            slot.entry(s).or_default().insert(o.to_string());
        }
    }

    /// URIs of the documents indexed so far, in load order.
    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    pub fn contains_document(&self, uri: &str) -> bool {
        self.documents.iter().any(|d| d == uri)
    }

    pub fn len(&self) -> usize {
        self.triples
    }

    pub fn is_empty(&self) -> bool {
        self.triples == 0
    }

    pub fn types_of(&self, resource: &str) -> Vec<&str> {
        Self::members(&self.types, resource)
    }

    pub fn ranges(&self, predicate: &str) -> Vec<&str> {
        Self::members(&self.ranges, predicate)
    }

    pub fn domains(&self, predicate: &str) -> Vec<&str> {
        Self::members(&self.domains, predicate)
    }

    fn members<'a>(map: &'a IndexMap<String, IndexSet<String>>, key: &str) -> Vec<&'a str> {
        map.get(key)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Resources identified by `identifier` that are declared properties
    /// (`rdf:Property` or `owl:ObjectProperty`).
    pub fn predicate_aliases(&self, identifier: &str) -> Vec<String> {
        let property_types = [iri(RDF_NS, "Property"), iri(OWL_NS, "ObjectProperty")];
        self.identified(identifier, |types| {
            types.iter().any(|t| property_types.iter().any(|p| p == t))
        })
    }

    /// Resources identified by `identifier` whose type lies in the declared range of
    /// `predicate`.
    pub fn object_aliases(&self, identifier: &str, predicate: &str) -> Vec<String> {
        let ranges = self.ranges(predicate);
        if ranges.is_empty() {
            return Vec::new();
        }
        self.identified(identifier, |types| {
            types.iter().any(|t| ranges.contains(&t.as_str()))
        })
    }

    fn identified<F>(&self, identifier: &str, accept: F) -> Vec<String>
    where
        F: Fn(&IndexSet<String>) -> bool,
    {
        let Some(subjects) = self.identifiers.get(identifier) else {
            return Vec::new();
        };
        let empty = IndexSet::new();
        subjects
            .iter()
            .filter(|s| accept(self.types.get(*s).unwrap_or(&empty)))
            .cloned()
            .collect()
    }

    /// True if `class` equals `ancestor` or reaches it through `rdfs:subClassOf`.
    pub fn is_subclass_of(&self, class: &str, ancestor: &str) -> bool {
        let mut seen: IndexSet<&str> = IndexSet::new();
        let mut pending = vec![class];
        while let Some(current) = pending.pop() {
            if current == ancestor {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(parents) = self.superclasses.get(current) {
                pending.extend(parents.iter().map(String::as_str));
            }
        }
        false
    }

    /// Predicates whose declared range is `bald:Resource` or one of its subclasses; attributes
    /// using them name other variables.
    pub fn reference_predicates(&self) -> IndexSet<String> {
        let resource = iri(BALD_NS, "Resource");
        self.ranges
            .iter()
            .filter(|(_, ranges)| ranges.iter().any(|r| self.is_subclass_of(r, &resource)))
            .map(|(predicate, _)| predicate.clone())
            .collect()
    }

    /// `(prefix, namespace)` pairs declared with `vann:preferredNamespacePrefix` and
    /// `vann:preferredNamespaceUri` on the same resource.
    pub fn vann_declarations(&self) -> Vec<(String, String)> {
        self.preferred_prefix
            .iter()
            .filter_map(|(subject, prefix)| {
                self.preferred_uri
                    .get(subject)
                    .map(|uri| (prefix.clone(), uri.clone()))
            })
            .collect()
    }
}
