/// [crate::properties] contains the basic building blocks for entity attribute bags: the tagged
/// [Value] type with its explicit promotion rules, and the vocabulary constants shared by the
/// builder, validator and serializer.
use indexmap::IndexMap;
use std::fmt::{Display, Formatter};

use crate::graph::EntityId;

/// Namespace of the binary-array linked data ontology.
pub const BALD_NS: &str = "https://www.opengis.net/def/binary-array-ld/";
/// Location of the core ontology document (the namespace without its trailing slash).
pub const BALD_ONTOLOGY: &str = "https://www.opengis.net/def/binary-array-ld";
pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDFS_NS: &str = "http://www.w3.org/2000/01/rdf-schema#";
pub const OWL_NS: &str = "http://www.w3.org/2002/07/owl#";
pub const DCT_NS: &str = "http://purl.org/dc/terms/";
pub const DCAT_NS: &str = "http://www.w3.org/ns/dcat#";
pub const VANN_NS: &str = "http://purl.org/vocab/vann/";

pub const NETCDF_MIME_TYPE: &str = "application/x-netcdf";
pub const NETCDF_FORMAT_DEFINITION: &str = "http://vocab.nerc.ac.uk/collection/M01/current/NC/";

// Shorthand attribute names used on entities.
pub const RDF_TYPE: &str = "rdf__type";
pub const BALD_CONTAINS: &str = "bald__contains";
pub const BALD_REFERENCES: &str = "bald__references";
pub const BALD_TARGET: &str = "bald__target";
pub const BALD_SHAPE: &str = "bald__shape";
pub const BALD_TARGET_SHAPE: &str = "bald__targetShape";
pub const BALD_SOURCE_RESHAPE: &str = "bald__sourceReshape";
pub const BALD_TARGET_RESHAPE: &str = "bald__targetReshape";
pub const BALD_ARRAY_FIRST_VALUE: &str = "bald__arrayFirstValue";
pub const BALD_ARRAY_LAST_VALUE: &str = "bald__arrayLastValue";
pub const BALD_IS_PREFIXED_BY: &str = "bald__isPrefixedBy";
pub const BALD_IS_ALIASED_BY: &str = "bald__isAliasedBy";

/// True for strings that look like dereferenceable HTTP(S) URIs.
///
/// Commas and spaces disqualify a string, as they only appear in free text and in
/// space-delimited reference lists.
pub fn is_http_uri(item: &str) -> bool {
    (item.starts_with("http://") || item.starts_with("https://"))
        && !item.contains(',')
        && !item.contains(' ')
}

/// A single literal attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Text(String),
    Integer(i64),
    Float(f64),
    /// An ISO-8601 date-time produced by a [crate::build::TemporalDecoder].
    DateTime(String),
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Text(s) | Literal::DateTime(s) => write!(f, "{s}"),
            Literal::Integer(i) => write!(f, "{i}"),
            Literal::Float(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::Text(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::Text(s)
    }
}

impl From<i64> for Literal {
    fn from(i: i64) -> Self {
        Literal::Integer(i)
    }
}

impl From<f64> for Literal {
    fn from(v: f64) -> Self {
        Literal::Float(v)
    }
}

/// One member of a [Value]: either a literal or a handle to another entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Literal(Literal),
    Entity(EntityId),
}

impl Term {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Term::Literal(Literal::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<EntityId> {
        match self {
            Term::Entity(id) => Some(*id),
            Term::Literal(_) => None,
        }
    }
}

impl<T: Into<Literal>> From<T> for Term {
    fn from(value: T) -> Self {
        Term::Literal(value.into())
    }
}

impl From<EntityId> for Term {
    fn from(id: EntityId) -> Self {
        Term::Entity(id)
    }
}

/// An attribute value.
///
/// `Set` is unordered and deduplicated (insertion order is kept for stable output); `List` is
/// ordered and becomes an RDF collection when serialized.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Literal),
    EntityRef(EntityId),
    Set(Vec<Term>),
    List(Vec<Term>),
}

impl Value {
    pub fn single(term: Term) -> Self {
        match term {
            Term::Literal(lit) => Value::Scalar(lit),
            Term::Entity(id) => Value::EntityRef(id),
        }
    }

    pub fn set<I: IntoIterator<Item = Term>>(terms: I) -> Self {
        let mut members: Vec<Term> = Vec::new();
        for term in terms {
            if !members.contains(&term) {
                members.push(term);
            }
        }
        Value::Set(members)
    }

    /// The members of this value, in storage order.
    pub fn terms(&self) -> Vec<Term> {
        match self {
            Value::Scalar(lit) => vec![Term::Literal(lit.clone())],
            Value::EntityRef(id) => vec![Term::Entity(*id)],
            Value::Set(terms) | Value::List(terms) => terms.clone(),
        }
    }

    pub fn contains(&self, term: &Term) -> bool {
        match self {
            Value::Scalar(lit) => matches!(term, Term::Literal(other) if other == lit),
            Value::EntityRef(id) => matches!(term, Term::Entity(other) if other == id),
            Value::Set(terms) | Value::List(terms) => terms.contains(term),
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Scalar(Literal::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Ordered mapping from (possibly prefix-shorthand) predicate names to [Value]s.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttrBag(IndexMap<String, Value>);

impl AttrBag {
    pub fn new() -> Self {
        AttrBag::default()
    }

    /// Records a statement about `key`.
    ///
    /// The first write creates a singleton; a second distinct write promotes it to a `Set`.
    /// Writes to a `List` append. Repeated writes of a value already present are no-ops.
    pub fn insert(&mut self, key: impl Into<String>, term: impl Into<Term>) {
        let key = key.into();
        let term = term.into();
        let Some(existing) = self.0.get_mut(&key) else {
            self.0.insert(key, Value::single(term));
            return;
        };
        if existing.contains(&term) {
            return;
        }
        match existing {
            Value::Set(terms) | Value::List(terms) => terms.push(term),
            Value::Scalar(_) | Value::EntityRef(_) => {
                let mut members = existing.terms();
                members.push(term);
                *existing = Value::Set(members);
            }
        }
    }

    /// Replaces whatever is stored under `key`.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
