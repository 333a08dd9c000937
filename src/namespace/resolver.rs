use crate::{
    error::BaldError,
    namespace::{tables::is_namespace_uri, NamespaceContext, OntologyIndex},
};

/// Splits `prefix__suffix` shorthand at its first `__`.
///
/// The suffix may not contain another `__`; names without exactly that shape are not
/// shorthand.
pub fn split_prefixed(name: &str) -> Option<(&str, &str)> {
    let at = name.find("__")?;
    let (prefix, rest) = name.split_at(at);
    let suffix = &rest[2..];
    if suffix.contains("__") {
        None
    } else {
        Some((prefix, suffix))
    }
}

/// Turns shorthand names and identifier aliases into absolute URIs for one namespace
/// context.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    base_uri: &'a str,
    context: &'a NamespaceContext,
    ontology: &'a OntologyIndex,
}

impl<'a> Resolver<'a> {
    pub fn new(base_uri: &'a str, context: &'a NamespaceContext, ontology: &'a OntologyIndex) -> Self {
        Resolver {
            base_uri,
            context,
            ontology,
        }
    }

    pub fn context(&self) -> &'a NamespaceContext {
        self.context
    }

    fn expand_shorthand(&self, name: &str) -> Option<String> {
        let (prefix, suffix) = split_prefixed(name)?;
        let namespace = self.context.prefixes.get(prefix)?;
        is_namespace_uri(namespace).then(|| format!("{namespace}{suffix}"))
    }

    /// Resolves an attribute name to a predicate URI.
    ///
    /// Known `prefix__suffix` shorthand is expanded. Other names that are not shorthand are
    /// looked up as property identifiers in the ontology index. Anything left unresolved is
    /// placed under the base URI.
    pub fn unpack_predicate(&self, name: &str) -> Result<String, BaldError> {
        if split_prefixed(name).is_some() {
            if let Some(uri) = self.expand_shorthand(name) {
                return Ok(uri);
            }
        } else {
            let mut candidates = self.ontology.predicate_aliases(name);
            if candidates.len() > 1 {
                return Err(BaldError::AmbiguousAlias {
                    identifier: name.to_string(),
                    candidates,
                });
            }
            if let Some(uri) = candidates.pop() {
                return Ok(uri);
            }
        }
        Ok(format!("{}{name}", self.base_uri))
    }

    /// Resolves an attribute value used as the object of `predicate`.
    ///
    /// Known shorthand is expanded; otherwise the value is looked up as an identifier of a
    /// resource typed within the predicate's range. Unresolved values are returned unchanged.
    pub fn unpack_rdfobject(&self, value: &str, predicate: &str) -> Result<String, BaldError> {
        if split_prefixed(value).is_some() {
            return Ok(self.expand_shorthand(value).unwrap_or_else(|| value.to_string()));
        }
        let mut candidates = self.ontology.object_aliases(value, predicate);
        if candidates.len() > 1 {
            return Err(BaldError::AmbiguousAlias {
                identifier: value.to_string(),
                candidates,
            });
        }
        Ok(candidates.pop().unwrap_or_else(|| value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::{AliasTable, PrefixTable};
    use oxigraph::io::RdfFormat;
    use test_log::test;

    const BASE: &str = "http://example.org/base/";

    fn context() -> NamespaceContext {
        NamespaceContext {
            prefixes: PrefixTable::from_iter([
                ("bald", "https://example.org/bald/"),
                ("CFTerms", "http://def.scitools.org.uk/CFTerms/"),
                ("odd", "not-a-namespace"),
            ]),
            aliases: AliasTable::default(),
        }
    }

    fn ontology(turtle: &str) -> OntologyIndex {
        let mut index = OntologyIndex::new();
        index
            .load("http://example.org/aliases", turtle, &[RdfFormat::Turtle])
            .unwrap();
        index
    }

    const ALIASES: &str = r#"
@prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> .
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
@prefix owl: <http://www.w3.org/2002/07/owl#> .
@prefix dct: <http://purl.org/dc/terms/> .

<http://def.scitools.org.uk/CFTerms/standard_name> a rdf:Property ;
    dct:identifier "standard_name" ;
    rdfs:range <http://vocab.nerc.ac.uk/standard_name/Concept> .
<http://vocab.nerc.ac.uk/collection/P07/current/CFSN0023/> a <http://vocab.nerc.ac.uk/standard_name/Concept> ;
    dct:identifier "air_temperature" .
<http://example.org/a/units> a rdf:Property ; dct:identifier "units" .
<http://example.org/b/units> a owl:ObjectProperty ; dct:identifier "units" .
"#;

    #[test]
    fn test_split_prefixed() {
        assert_eq!(split_prefixed("bald__references"), Some(("bald", "references")));
        assert_eq!(split_prefixed("a___b"), Some(("a", "_b")));
        assert_eq!(split_prefixed("bald__"), Some(("bald", "")));
        assert_eq!(split_prefixed("a__b__c"), None);
        assert_eq!(split_prefixed("units"), None);
    }

    #[test]
    fn test_unpack_predicate_expands_prefix() {
        let ctx = context();
        let index = OntologyIndex::new();
        let resolver = Resolver::new(BASE, &ctx, &index);
        assert_eq!(
            resolver.unpack_predicate("bald__references").unwrap(),
            "https://example.org/bald/references"
        );
    }

    #[test]
    fn test_unknown_or_invalid_prefix_falls_back_to_base() {
        let ctx = context();
        let index = OntologyIndex::new();
        let resolver = Resolver::new(BASE, &ctx, &index);
        assert_eq!(
            resolver.unpack_predicate("geo__lat").unwrap(),
            "http://example.org/base/geo__lat"
        );
        assert_eq!(
            resolver.unpack_predicate("odd__thing").unwrap(),
            "http://example.org/base/odd__thing"
        );
        assert_eq!(
            resolver.unpack_predicate("long_name").unwrap(),
            "http://example.org/base/long_name"
        );
    }

    #[test]
    fn test_predicate_alias_and_ambiguity() {
        let ctx = context();
        let index = ontology(ALIASES);
        let resolver = Resolver::new(BASE, &ctx, &index);
        assert_eq!(
            resolver.unpack_predicate("standard_name").unwrap(),
            "http://def.scitools.org.uk/CFTerms/standard_name"
        );
        let err = resolver.unpack_predicate("units").unwrap_err();
        assert!(
            matches!(err, BaldError::AmbiguousAlias { ref candidates, .. } if candidates.len() == 2)
        );
    }

    #[test]
    fn test_unpack_rdfobject_uses_range() {
        let ctx = context();
        let index = ontology(ALIASES);
        let resolver = Resolver::new(BASE, &ctx, &index);
        let predicate = "http://def.scitools.org.uk/CFTerms/standard_name";
        assert_eq!(
            resolver.unpack_rdfobject("air_temperature", predicate).unwrap(),
            "http://vocab.nerc.ac.uk/collection/P07/current/CFSN0023/"
        );
        // outside the predicate's range the value passes through
        assert_eq!(
            resolver
                .unpack_rdfobject("air_temperature", "http://example.org/a/units")
                .unwrap(),
            "air_temperature"
        );
        assert_eq!(
            resolver.unpack_rdfobject("CFTerms__units", predicate).unwrap(),
            "http://def.scitools.org.uk/CFTerms/units"
        );
        assert_eq!(
            resolver.unpack_rdfobject("geo__unknown", predicate).unwrap(),
            "geo__unknown"
        );
    }
}
