use indexmap::IndexMap;
use std::ops::Deref;

use crate::{
    error::BaldError,
    properties::{is_http_uri, BALD_NS, RDF_NS},
};

/// Merges `other` into `main`, failing if the two share any key.
///
/// Used to combine independently sourced declarations, such as a file's alias holder and the
/// caller's alias dictionary.
pub fn disjoint_merge(
    main: &mut IndexMap<String, String>,
    other: &IndexMap<String, String>,
) -> Result<(), BaldError> {
    let shared: Vec<&str> = other
        .keys()
        .filter(|key| main.contains_key(*key))
        .map(String::as_str)
        .collect();
    if !shared.is_empty() {
        return Err(BaldError::Config(format!(
            "declarations collide on {}",
            shared.join(", ")
        )));
    }
    main.extend(other.iter().map(|(k, v)| (k.clone(), v.clone())));
    Ok(())
}

/// Fills keys of `main` that are absent with the values from `other`; existing keys are never
/// overwritten.
pub fn precedence_merge(main: &mut IndexMap<String, String>, other: &IndexMap<String, String>) {
    for (key, value) in other {
        if !main.contains_key(key) {
            main.insert(key.clone(), value.clone());
        }
    }
}

/// Accumulates `(key, value)` declarations from several sources, dropping any key that is
/// declared with conflicting values.
#[derive(Debug, Default)]
pub(crate) struct ConsensusMap {
    entries: IndexMap<String, Option<String>>,
}

impl ConsensusMap {
    pub fn declare(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.get(&key) {
            Some(Some(existing)) if *existing != value => {
                self.entries.insert(key, None);
            }
            Some(_) => {}
            None => {
                self.entries.insert(key, Some(value));
            }
        }
    }

    pub fn into_map(self) -> IndexMap<String, String> {
        self.entries
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect()
    }
}

/// True for values usable as a namespace: an HTTP(S) URI ending in `/` or `#`.
pub fn is_namespace_uri(value: &str) -> bool {
    is_http_uri(value) && (value.ends_with('/') || value.ends_with('#'))
}

/// Prefix name (without the trailing `__`) to namespace URI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixTable(IndexMap<String, String>);

impl PrefixTable {
    /// Builds a table from holder attributes: only names ending in `__` with a namespace URI
    /// value are prefix declarations.
    pub fn from_declarations<'a, I>(declarations: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut table = PrefixTable::default();
        for (name, value) in declarations {
            if let Some(prefix) = name.strip_suffix("__") {
                if !prefix.is_empty() && is_namespace_uri(value) {
                    table.0.insert(prefix.to_string(), value.to_string());
                }
            }
        }
        table
    }

    pub fn insert(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.0.insert(prefix.into(), uri.into());
    }

    pub fn precedence_merge(&mut self, other: &PrefixTable) {
        precedence_merge(&mut self.0, &other.0);
    }

    pub fn precedence_merge_map(&mut self, other: &IndexMap<String, String>) {
        precedence_merge(&mut self.0, other);
    }

    /// Guarantees the `bald` and `rdf` prefixes.
    pub fn ensure_defaults(&mut self) {
        if !self.0.contains_key("bald") {
            self.0.insert("bald".to_string(), BALD_NS.to_string());
        }
        if !self.0.contains_key("rdf") {
            self.0.insert("rdf".to_string(), RDF_NS.to_string());
        }
    }

    pub fn with_defaults(mut self) -> Self {
        self.ensure_defaults();
        self
    }

    pub fn as_map(&self) -> &IndexMap<String, String> {
        &self.0
    }
}

impl Deref for PrefixTable {
    type Target = IndexMap<String, String>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PrefixTable {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        PrefixTable(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Alias name to the URI of an alias document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable(IndexMap<String, String>);

impl AliasTable {
    pub fn disjoint_merge(&mut self, other: &IndexMap<String, String>) -> Result<(), BaldError> {
        disjoint_merge(&mut self.0, other)
    }

    pub fn precedence_merge(&mut self, other: &AliasTable) {
        precedence_merge(&mut self.0, &other.0);
    }

    pub fn insert(&mut self, alias: impl Into<String>, uri: impl Into<String>) {
        self.0.insert(alias.into(), uri.into());
    }

    pub fn as_map(&self) -> &IndexMap<String, String> {
        &self.0
    }

    /// The namespace an alias is bound to on output: any `?_format` query dropped and a `/`
    /// appended unless the URI already ends in `/` or `#`.
    pub fn binding_namespace(uri: &str) -> String {
        let mut namespace = if uri.contains("?_format") {
            uri.split('?').next().unwrap_or(uri).to_string()
        } else {
            uri.to_string()
        };
        if !(namespace.ends_with('/') || namespace.ends_with('#')) {
            namespace.push('/');
        }
        namespace
    }
}

impl Deref for AliasTable {
    type Target = IndexMap<String, String>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AliasTable {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        AliasTable(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_disjoint_merge_rejects_shared_keys() {
        let mut main = map(&[("a", "1")]);
        disjoint_merge(&mut main, &map(&[("b", "2")])).unwrap();
        assert_eq!(main.len(), 2);
        let err = disjoint_merge(&mut main, &map(&[("b", "3"), ("c", "4")])).unwrap_err();
        assert!(matches!(err, BaldError::Config(msg) if msg.contains('b')));
        assert_eq!(main.get("b").map(String::as_str), Some("2"));
        assert!(!main.contains_key("c"));
    }

    #[test]
    fn test_precedence_merge_keeps_main_values() {
        let mut main = map(&[("a", "local")]);
        precedence_merge(&mut main, &map(&[("a", "context"), ("b", "context")]));
        assert_eq!(main, map(&[("a", "local"), ("b", "context")]));
    }

    #[test]
    fn test_consensus_drops_conflicts() {
        let mut consensus = ConsensusMap::default();
        consensus.declare("geo", "http://a/");
        consensus.declare("geo", "http://b/");
        consensus.declare("geo", "http://a/");
        consensus.declare("skos", "http://skos/");
        consensus.declare("skos", "http://skos/");
        assert_eq!(consensus.into_map(), map(&[("skos", "http://skos/")]));
    }

    #[test]
    fn test_prefix_declarations_filtered() {
        let table = PrefixTable::from_declarations(vec![
            ("geo__", "http://www.opengis.net/ont/geosparql#"),
            ("bad__", "not a uri"),
            ("nosuffix", "http://example.org/"),
            ("slashless__", "http://example.org/onto"),
        ])
        .with_defaults();
        assert_eq!(
            table.get("geo").map(String::as_str),
            Some("http://www.opengis.net/ont/geosparql#")
        );
        assert!(!table.contains_key("bad"));
        assert!(!table.contains_key("nosuffix"));
        assert!(!table.contains_key("slashless"));
        assert_eq!(table.get("bald").map(String::as_str), Some(BALD_NS));
        assert_eq!(table.get("rdf").map(String::as_str), Some(RDF_NS));
    }

    #[test]
    fn test_declared_defaults_are_not_replaced() {
        let table = PrefixTable::from_declarations(vec![("bald__", "https://example.org/bald/")])
            .with_defaults();
        assert_eq!(
            table.get("bald").map(String::as_str),
            Some("https://example.org/bald/")
        );
    }

    #[test]
    fn test_alias_binding_namespace() {
        assert_eq!(
            AliasTable::binding_namespace("http://vocab.nerc.ac.uk/collection/P01/current/"),
            "http://vocab.nerc.ac.uk/collection/P01/current/"
        );
        assert_eq!(
            AliasTable::binding_namespace("http://def.scitools.org.uk/CFTerms?_format=ttl"),
            "http://def.scitools.org.uk/CFTerms/"
        );
        assert_eq!(
            AliasTable::binding_namespace("http://example.org/onto#"),
            "http://example.org/onto#"
        );
    }
}
