//! Pass 1: namespace contexts, ontology documents and the entity tree.

use indexmap::{IndexMap, IndexSet};
use oxigraph::io::RdfFormat;

use crate::{
    build::{
        diagnostic::LoadDiagnostic,
        temporal::{parse_units, TemporalDecoder},
    },
    config::BaldConfig,
    error::BaldError,
    graph::{ContextId, Entity, EntityId, EntityKind, GraphModel},
    http::UriCache,
    namespace::{
        is_namespace_uri, AliasTable, ConsensusMap, NamespaceContext, OntologyIndex, PrefixTable,
    },
    properties::{
        is_http_uri, AttrBag, Literal, Term, Value, BALD_ARRAY_FIRST_VALUE,
        BALD_ARRAY_LAST_VALUE, BALD_IS_ALIASED_BY, BALD_IS_PREFIXED_BY, BALD_SHAPE,
    },
    source::{AttrValue, DataValue, Dataset, Group, Variable},
};

/// Entities created for one source group, kept for the reference pass.
#[derive(Debug, Clone)]
pub(crate) struct GroupScope<'d> {
    /// Variable names visible from this group: its own, overlaying its ancestors'.
    pub scope: IndexMap<String, EntityId>,
    pub variables: Vec<(&'d Variable, EntityId)>,
}

/// Namespace declarations made by one group, and the holders that carried them.
struct Declarations {
    prefixes: PrefixTable,
    aliases: AliasTable,
    holders: IndexSet<String>,
}

fn literal(value: &DataValue) -> Literal {
    match value {
        DataValue::Int(i) => Literal::Integer(*i),
        DataValue::Float(f) => Literal::Float(*f),
        DataValue::Text(s) => Literal::Text(s.clone()),
    }
}

fn attr_value(value: &AttrValue) -> Value {
    match value {
        AttrValue::Int(i) => Value::Scalar(Literal::Integer(*i)),
        AttrValue::Float(f) => Value::Scalar(Literal::Float(*f)),
        AttrValue::Text(s) => Value::Scalar(Literal::Text(s.clone())),
        AttrValue::IntArray(items) => Value::List(items.iter().map(|i| Term::from(*i)).collect()),
        AttrValue::FloatArray(items) => {
            Value::List(items.iter().map(|f| Term::from(*f)).collect())
        }
        AttrValue::TextArray(items) => {
            Value::List(items.iter().map(|s| Term::from(s.as_str())).collect())
        }
    }
}

/// Converts source attributes into an entity attribute bag.
pub(crate) fn attribute_bag(attributes: &IndexMap<String, AttrValue>) -> AttrBag {
    let mut bag = AttrBag::new();
    for (name, value) in attributes {
        bag.set(name.clone(), attr_value(value));
    }
    bag
}

pub(crate) struct EntityBuilder<'a> {
    config: &'a BaldConfig,
    cache: &'a UriCache,
    decoder: &'a dyn TemporalDecoder,
    attempted: IndexSet<String>,
    pub diagnostics: Vec<LoadDiagnostic>,
}

impl<'a> EntityBuilder<'a> {
    pub fn new(config: &'a BaldConfig, cache: &'a UriCache, decoder: &'a dyn TemporalDecoder) -> Self {
        EntityBuilder {
            config,
            cache,
            decoder,
            attempted: IndexSet::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Builds the root container, every group container and every variable entity.
    pub fn build<'d>(
        &mut self,
        dataset: &'d Dataset,
    ) -> Result<(GraphModel, Vec<GroupScope<'d>>), BaldError> {
        let base_uri = self.config.resolve_base_uri(dataset.location.as_deref())?;
        tracing::debug!("Loading dataset with base URI {base_uri}");

        let declarations = self.root_declarations(&dataset.root)?;
        let root_context = NamespaceContext::new(declarations.prefixes, declarations.aliases);

        let mut ontology = OntologyIndex::new();
        self.index_core_ontology(&mut ontology)?;
        self.index_context_documents(&root_context, &mut ontology);

        let mut model = GraphModel::new(
            base_uri,
            root_context,
            attribute_bag(&dataset.root.attributes),
            ontology,
        )
        .with_file_locator(self.config.file_locator.clone());

        tracing::debug!("Pass 1: building entities");
        let mut scopes = Vec::new();
        let root = model.root();
        self.build_group(
            &mut model,
            &dataset.root,
            root,
            0,
            &IndexMap::new(),
            &declarations.holders,
            &mut scopes,
        )?;
        tracing::debug!("Pass 1 complete: {} entities", model.len());
        Ok((model, scopes))
    }

    #[allow(clippy::too_many_arguments)]
    fn build_group<'d>(
        &mut self,
        model: &mut GraphModel,
        group: &'d Group,
        container: EntityId,
        context: ContextId,
        inherited: &IndexMap<String, EntityId>,
        holders: &IndexSet<String>,
        scopes: &mut Vec<GroupScope<'d>>,
    ) -> Result<(), BaldError> {
        let prefix = model
            .entity(container)
            .and_then(|e| e.identity.clone())
            .unwrap_or_else(|| model.base_uri().to_string());

        let mut scope = inherited.clone();
        let mut variables = Vec::new();
        for (name, variable) in &group.variables {
            if holders.contains(name) {
                continue;
            }
            let entity = self.variable_entity(variable, &prefix, context)?;
            let id = model.add_child(container, entity);
            scope.insert(name.clone(), id);
            variables.push((variable, id));
        }
        scopes.push(GroupScope {
            scope: scope.clone(),
            variables,
        });

        for (name, child) in &group.groups {
            if holders.contains(name) {
                continue;
            }
            let (child_context, child_holders) = if Self::declares_namespace(child) {
                let declarations = self.group_declarations(child);
                let derived = model
                    .context(context)
                    .overlay(declarations.prefixes, declarations.aliases);
                self.index_context_documents(&derived, model.ontology_mut());
                (model.add_context(derived), declarations.holders)
            } else {
                (context, IndexSet::new())
            };
            let entity = Entity::new(
                Some(name.clone()),
                Some(format!("{prefix}{name}/")),
                EntityKind::Container,
                attribute_bag(&child.attributes),
                child_context,
            );
            let id = model.add_child(container, entity);
            self.build_group(model, child, id, child_context, &scope, &child_holders, scopes)?;
        }
        Ok(())
    }

    fn variable_entity(
        &mut self,
        variable: &Variable,
        prefix: &str,
        context: ContextId,
    ) -> Result<Entity, BaldError> {
        let mut attrs = attribute_bag(&variable.attributes);
        if variable.is_coordinate() && !variable.values.is_empty() {
            self.coordinate_bounds(variable, &mut attrs)?;
        }
        let kind = if variable.is_scalar() {
            EntityKind::Resource
        } else {
            attrs.set(
                BALD_SHAPE,
                Value::List(variable.shape.iter().map(|s| Term::from(*s as i64)).collect()),
            );
            EntityKind::array(variable.shape.clone(), variable.dimensions.clone())
        };
        Ok(Entity::new(
            Some(variable.name.clone()),
            Some(format!("{prefix}{}", variable.name)),
            kind,
            attrs,
            context,
        ))
    }

    /// Records the first and last unmasked values of a coordinate variable, decoded to
    /// date-times when its units are an epoch offset.
    fn coordinate_bounds(&mut self, variable: &Variable, attrs: &mut AttrBag) -> Result<(), BaldError> {
        let count = variable.values.len();
        let first = variable.unmasked(0);
        let last = if count > 1 {
            variable.unmasked(count - 1)
        } else {
            None
        };

        let since = match variable.attributes.get("units").and_then(AttrValue::as_text) {
            Some(units) => parse_units(units)?.map(|parsed| (units, parsed)),
            None => None,
        };
        let decoder = self.decoder;
        let decode = |value: &DataValue| -> Option<Literal> {
            let (_, (quantity, origin)) = since.as_ref()?;
            let offset = value.as_f64()?;
            decoder
                .decode(offset, quantity, origin)
                .map(Literal::DateTime)
        };

        let mut undecoded = false;
        for (key, value) in [(BALD_ARRAY_FIRST_VALUE, first), (BALD_ARRAY_LAST_VALUE, last)] {
            let Some(value) = value else {
                continue;
            };
            let decoded = decode(value);
            undecoded |= since.is_some() && decoded.is_none();
            attrs.set(key, Value::Scalar(decoded.unwrap_or_else(|| literal(value))));
        }
        if undecoded {
            if let Some((units, _)) = since {
                self.diagnostics.push(LoadDiagnostic::RawTemporalValues {
                    variable: variable.name.clone(),
                    units: units.to_string(),
                });
            }
        }
        Ok(())
    }

    fn declares_namespace(group: &Group) -> bool {
        group.attributes.contains_key(BALD_IS_PREFIXED_BY)
            || group.attributes.contains_key(BALD_IS_ALIASED_BY)
    }

    /// Text attributes of the child group or variable named `token`.
    fn holder_attributes<'g>(group: &'g Group, token: &str) -> Option<Vec<(&'g str, &'g str)>> {
        let attributes = group
            .find_group(token)
            .map(|g| &g.attributes)
            .or_else(|| group.find_variable(token).map(|v| &v.attributes))?;
        Some(
            attributes
                .iter()
                .filter_map(|(k, v)| v.as_text().map(|text| (k.as_str(), text)))
                .collect(),
        )
    }

    fn tokens<'g>(group: &'g Group, attribute: &str) -> Vec<&'g str> {
        group
            .attribute_text(attribute)
            .map(|text| text.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Prefix and alias declarations made by `group` itself: holder groups/variables and
    /// external `vann` prefix documents.
    fn group_declarations(&mut self, group: &Group) -> Declarations {
        let mut holders = IndexSet::new();
        let mut prefixes = PrefixTable::default();
        let mut external = ConsensusMap::default();

        for token in Self::tokens(group, BALD_IS_PREFIXED_BY) {
            if let Some(declarations) = Self::holder_attributes(group, token) {
                holders.insert(token.to_string());
                for (prefix, uri) in PrefixTable::from_declarations(declarations).iter() {
                    prefixes.insert(prefix.clone(), uri.clone());
                }
            } else if is_http_uri(token) {
                for (prefix, uri) in self.external_prefixes(token) {
                    external.declare(prefix, uri);
                }
            }
        }
        let external: IndexMap<String, String> = external
            .into_map()
            .into_iter()
            .filter(|(_, uri)| is_namespace_uri(uri))
            .collect();
        prefixes.precedence_merge_map(&external);

        let mut aliases = AliasTable::default();
        for token in Self::tokens(group, BALD_IS_ALIASED_BY) {
            if let Some(declarations) = Self::holder_attributes(group, token) {
                holders.insert(token.to_string());
                for (alias, uri) in declarations {
                    aliases.insert(alias, uri);
                }
            }
        }
        Declarations {
            prefixes,
            aliases,
            holders,
        }
    }

    /// Root declarations: the group's own, then JSON-LD prefix contexts, then the guaranteed
    /// `bald`/`rdf` prefixes. Caller-supplied aliases may not collide with the file's.
    fn root_declarations(&mut self, root: &Group) -> Result<Declarations, BaldError> {
        let mut declarations = self.group_declarations(root);
        let contexts = self.context_prefixes();
        declarations.prefixes.precedence_merge_map(&contexts);
        declarations.prefixes.ensure_defaults();
        let config = self.config;
        declarations.aliases.disjoint_merge(&config.aliases)?;
        Ok(declarations)
    }

    fn external_prefixes(&mut self, uri: &str) -> Vec<(String, String)> {
        let mut scratch = OntologyIndex::new();
        match self.fetch_document(uri, "prefix") {
            Some(body) => match scratch.load(uri, &body, &[RdfFormat::RdfXml, RdfFormat::Turtle]) {
                Ok(_) => scratch.vann_declarations(),
                Err(err) => {
                    self.diagnostics
                        .push(LoadDiagnostic::unparseable(uri, "prefix", err));
                    Vec::new()
                }
            },
            None => Vec::new(),
        }
    }

    /// Prefixes declared by the configured JSON-LD contexts; a key declared with different
    /// values in different contexts is dropped.
    fn context_prefixes(&mut self) -> IndexMap<String, String> {
        let config = self.config;
        let mut consensus = ConsensusMap::default();
        for context in &config.prefix_contexts {
            let body = if is_http_uri(context) {
                match self.fetch_document(context, "prefix context") {
                    Some(body) => body,
                    None => continue,
                }
            } else {
                context.clone()
            };
            let document: serde_json::Value = match serde_json::from_str(&body) {
                Ok(document) => document,
                Err(err) => {
                    tracing::warn!("Ignoring prefix context {context}: {err}");
                    self.diagnostics.push(LoadDiagnostic::PrefixContext {
                        context: context.clone(),
                        message: err.to_string(),
                    });
                    continue;
                }
            };
            if let Some(entries) = document.get("@context").and_then(|c| c.as_object()) {
                for (key, value) in entries {
                    if let Some(uri) = value.as_str() {
                        consensus.declare(key.clone(), uri);
                    }
                }
            }
        }
        consensus.into_map()
    }

    /// The body of a 200 response for `uri`, recording a diagnostic otherwise.
    fn fetch_document(&mut self, uri: &str, role: &'static str) -> Option<String> {
        match self.cache.get(uri) {
            Ok(response) if response.is_success() => Some(response.body.clone()),
            Ok(response) => {
                tracing::debug!("{role} document {uri} unavailable");
                self.diagnostics
                    .push(LoadDiagnostic::unavailable(uri, role, response.status));
                None
            }
            Err(err) => {
                self.diagnostics
                    .push(LoadDiagnostic::unparseable(uri, role, err));
                None
            }
        }
    }

    /// Indexes one document once. With `strict`, a 200 response that does not parse is an
    /// error rather than a diagnostic.
    fn index_document(
        &mut self,
        ontology: &mut OntologyIndex,
        uri: &str,
        role: &'static str,
        formats: &[RdfFormat],
        strict: bool,
    ) -> Result<(), BaldError> {
        if ontology.contains_document(uri) || !self.attempted.insert(uri.to_string()) {
            return Ok(());
        }
        let Some(body) = self.fetch_document(uri, role) else {
            return Ok(());
        };
        match ontology.load(uri, &body, formats) {
            Ok(_) => Ok(()),
            Err(err) if strict => Err(err),
            Err(err) => {
                tracing::warn!("Could not parse {role} document {uri}: {err}");
                self.diagnostics
                    .push(LoadDiagnostic::unparseable(uri, role, err));
                Ok(())
            }
        }
    }

    fn index_core_ontology(&mut self, ontology: &mut OntologyIndex) -> Result<(), BaldError> {
        let uri = self.config.core_ontology.clone();
        self.index_document(
            ontology,
            &uri,
            "core ontology",
            &[RdfFormat::Turtle, RdfFormat::RdfXml],
            true,
        )?;
        if !ontology.contains_document(&uri) {
            tracing::warn!("Core ontology {uri} unavailable; declared references are not inferred");
        }
        Ok(())
    }

    /// Indexes the alias documents and prefix namespace documents of a context.
    fn index_context_documents(&mut self, context: &NamespaceContext, ontology: &mut OntologyIndex) {
        let formats = [RdfFormat::RdfXml, RdfFormat::Turtle];
        for uri in context.aliases.values() {
            if is_http_uri(uri) {
                self.index_context_document(ontology, uri, "alias", &formats);
            }
        }
        for namespace in context.prefixes.values() {
            if is_namespace_uri(namespace) {
                let document = namespace.trim_end_matches(['/', '#']);
                self.index_context_document(ontology, document, "prefix", &formats);
            }
        }
    }

    fn index_context_document(
        &mut self,
        ontology: &mut OntologyIndex,
        uri: &str,
        role: &'static str,
        formats: &[RdfFormat],
    ) {
        if let Err(err) = self.index_document(ontology, uri, role, formats, false) {
            tracing::warn!("Could not index {role} document {uri}: {err}");
            self.diagnostics
                .push(LoadDiagnostic::unparseable(uri, role, err));
        }
    }
}
