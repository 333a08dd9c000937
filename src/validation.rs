//! Read-only checks over a loaded [GraphModel].
//!
//! Data problems never raise: every unresolvable URI and every reference between arrays that
//! cannot broadcast becomes a [ValidationIssue]. Only configuration problems (an ambiguous
//! alias, a malformed ontology document) are returned as errors.

use indexmap::IndexSet;
use parking_lot::Mutex;
use std::{
    fmt::{Display, Formatter},
    sync::Arc,
};

use crate::{
    config::ValidationOptions,
    error::BaldError,
    graph::{ContextId, EntityId, EntityKind, GraphModel},
    http::UriCache,
    namespace::OntologyIndex,
    properties::{
        is_http_uri, Term, Value, BALD_CONTAINS, BALD_REFERENCES, BALD_SOURCE_RESHAPE,
        BALD_TARGET, BALD_TARGET_RESHAPE, BALD_TARGET_SHAPE,
    },
};

/// True if two shapes broadcast against each other: aligned from the last axis, every pair of
/// sizes is equal or contains a 1.
pub fn broadcast_compatible(a: &[usize], b: &[usize]) -> bool {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .all(|(x, y)| x == y || *x == 1 || *y == 1)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// The URI did not dereference with status 200, whatever the actual cause.
    Unresolved { uri: String },
    /// A reference between arrays whose natural shapes do not broadcast.
    Broadcast { source: String, target: String },
}

impl Display for ValidationIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationIssue::Unresolved { uri } => {
                write!(f, "{uri} is not resolving as a resource (404).")
            }
            ValidationIssue::Broadcast { source, target } => write!(
                f,
                "{source} declares a child of {target} but the arrays do not conform to the \
                 bald array reference rules."
            ),
        }
    }
}

/// The outcome of validating one graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    issues: Vec<ValidationIssue>,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// The issues as messages, in the order they were found.
    pub fn messages(&self) -> Vec<String> {
        self.issues.iter().map(ToString::to_string).collect()
    }
}

/// Validates graphs against a shared [UriCache].
#[derive(Debug)]
pub struct Validator {
    cache: Arc<UriCache>,
    options: ValidationOptions,
    /// Predicates whose ontology response has been parsed already.
    inspected: Mutex<IndexSet<String>>,
}

impl Validator {
    pub fn new(cache: Arc<UriCache>, options: ValidationOptions) -> Self {
        Validator {
            cache,
            options,
            inspected: Mutex::new(IndexSet::new()),
        }
    }

    pub fn validate(&self, model: &GraphModel) -> Result<Validation, BaldError> {
        let mut issues = Vec::new();
        let mut seen_contexts: IndexSet<ContextId> = IndexSet::new();
        for id in model.walk() {
            let Some(entity) = model.entity(id) else {
                continue;
            };
            if self.options.check_uris && seen_contexts.insert(entity.context) {
                for uri in model.context(entity.context).declared_uris() {
                    self.check_uri(uri, &mut issues);
                }
            }
            self.check_statements(model, id, &mut issues)?;
            for reference in model.references(id) {
                self.check_statements(model, *reference, &mut issues)?;
                self.check_broadcast(model, id, *reference, &mut issues);
            }
        }
        tracing::debug!("Validation found {} issues", issues.len());
        Ok(Validation { issues })
    }

    fn check_uri(&self, uri: &str, issues: &mut Vec<ValidationIssue>) {
        if is_http_uri(uri) && !self.cache.check_uri(uri) {
            tracing::debug!("{uri} does not resolve");
            issues.push(ValidationIssue::Unresolved {
                uri: uri.to_string(),
            });
        }
    }

    /// Predicates an entity's kind contributes on output, in addition to its attributes.
    fn kind_predicates(model: &GraphModel, id: EntityId) -> Vec<&'static str> {
        match model.entity(id).map(|e| &e.kind) {
            Some(EntityKind::Container) if !model.children(id).is_empty() => vec![BALD_CONTAINS],
            Some(EntityKind::Array { references, .. }) if !references.is_empty() => {
                vec![BALD_REFERENCES]
            }
            Some(EntityKind::Reference {
                source_reshape,
                target_reshape,
                ..
            }) => {
                let mut predicates = vec![BALD_TARGET, BALD_TARGET_SHAPE];
                if source_reshape.is_some() {
                    predicates.push(BALD_SOURCE_RESHAPE);
                }
                if target_reshape.is_some() {
                    predicates.push(BALD_TARGET_RESHAPE);
                }
                predicates
            }
            _ => Vec::new(),
        }
    }

    fn check_statements(
        &self,
        model: &GraphModel,
        id: EntityId,
        issues: &mut Vec<ValidationIssue>,
    ) -> Result<(), BaldError> {
        let Some(entity) = model.entity(id) else {
            return Ok(());
        };
        let resolver = model.resolver(id);
        let attributes = entity
            .attrs
            .iter()
            .map(|(key, value)| (key.as_str(), Some(value)));
        let derived = Self::kind_predicates(model, id).into_iter().map(|p| (p, None));

        for (key, value) in attributes.chain(derived) {
            let predicate = resolver.unpack_predicate(key)?;
            if self.options.check_uris {
                self.check_uri(&predicate, issues);
            }
            if self.options.check_domains {
                self.lookup_domain(&predicate)?;
            }
            let Some(value) = value else {
                continue;
            };
            if !self.options.check_uris {
                continue;
            }
            for text in Self::text_terms(value) {
                let object = resolver.unpack_rdfobject(&text, &predicate)?;
                self.check_uri(&object, issues);
            }
        }
        Ok(())
    }

    fn text_terms(value: &Value) -> Vec<String> {
        value
            .terms()
            .iter()
            .filter_map(Term::as_text)
            .map(str::to_string)
            .collect()
    }

    /// Reads the declared domain of `predicate` from its own RDF description.
    ///
    /// Mismatches are not reported; a malformed RDF response is an error.
    fn lookup_domain(&self, predicate: &str) -> Result<(), BaldError> {
        if !is_http_uri(predicate) || !self.inspected.lock().insert(predicate.to_string()) {
            return Ok(());
        }
        let response = self.cache.get(predicate)?;
        let Some(format) = response.rdf_format().filter(|_| response.is_success()) else {
            return Ok(());
        };
        let mut index = OntologyIndex::new();
        index.load(predicate, &response.body, &[format])?;
        let domains = index.domains(predicate);
        tracing::trace!("{predicate} has domains {domains:?}");
        Ok(())
    }

    fn check_broadcast(
        &self,
        model: &GraphModel,
        source: EntityId,
        reference: EntityId,
        issues: &mut Vec<ValidationIssue>,
    ) {
        let Some(EntityKind::Reference { target, .. }) = model.entity(reference).map(|e| &e.kind)
        else {
            return;
        };
        let (Some(from), Some(to)) = (model.entity(source), model.entity(*target)) else {
            return;
        };
        let (Some(source_shape), Some(target_shape)) = (from.shape(), to.shape()) else {
            return;
        };
        if !broadcast_compatible(source_shape, target_shape) {
            issues.push(ValidationIssue::Broadcast {
                source: from.label(),
                target: to.label(),
            });
        }
    }
}
