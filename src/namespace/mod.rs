//! Namespace handling: prefix and alias tables, the ontology index built from fetched
//! documents, and the [Resolver] that expands shorthand names against both.
//!
//! A [NamespaceContext] is owned by the container that declared it (the file root, or a
//! group with its own `bald__isPrefixedBy`/`bald__isAliasedBy` attributes) and is shared by
//! every entity below it until another declaration overrides it.

mod ontology;
mod resolver;
mod tables;

pub use ontology::OntologyIndex;
pub use resolver::{split_prefixed, Resolver};
pub use tables::{
    disjoint_merge, is_namespace_uri, precedence_merge, AliasTable, PrefixTable,
};

pub(crate) use tables::ConsensusMap;

/// The prefix and alias tables in force for a subtree of the entity graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceContext {
    pub prefixes: PrefixTable,
    pub aliases: AliasTable,
}

impl NamespaceContext {
    pub fn new(prefixes: PrefixTable, aliases: AliasTable) -> Self {
        NamespaceContext { prefixes, aliases }
    }

    /// A context derived from `self` with local declarations taking precedence.
    pub fn overlay(&self, local_prefixes: PrefixTable, local_aliases: AliasTable) -> Self {
        let mut prefixes = local_prefixes;
        prefixes.precedence_merge(&self.prefixes);
        let mut aliases = local_aliases;
        aliases.precedence_merge(&self.aliases);
        NamespaceContext { prefixes, aliases }
    }

    /// Every URI this context declares: prefix namespaces, then alias documents.
    pub fn declared_uris(&self) -> Vec<&str> {
        self.prefixes
            .values()
            .chain(self.aliases.values())
            .map(String::as_str)
            .collect()
    }
}
