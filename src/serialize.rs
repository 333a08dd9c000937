//! RDF output for a [GraphModel].
//!
//! The serializer walks the containment tree from the root, emitting each entity once.
//! Anonymous reference entities become blank nodes the first time something points at them.
//! Prefix bindings (`bald`, `this`, every declared prefix and alias, one `this__<group>` per
//! group) are collected up front and bound once on the output document.

use indexmap::{IndexMap, IndexSet};
use oxigraph::{
    io::{RdfFormat, RdfSerializer},
    model::{
        vocab::{rdf, xsd},
        BlankNode, Literal as RdfLiteral, NamedNode, Term as RdfTerm, Triple,
    },
};
use serde_json::json;
use std::{fmt::Display, io::Write, str::FromStr};

use crate::{
    error::BaldError,
    graph::{EntityId, EntityKind, GraphModel, ShapeMap},
    namespace::{AliasTable, Resolver},
    properties::{
        is_http_uri, Literal, Term, Value, BALD_CONTAINS, BALD_NS, BALD_REFERENCES,
        BALD_SOURCE_RESHAPE, BALD_TARGET, BALD_TARGET_RESHAPE, BALD_TARGET_SHAPE, DCAT_NS, DCT_NS,
        NETCDF_FORMAT_DEFINITION, NETCDF_MIME_TYPE,
    },
};

/// Output syntaxes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Turtle,
    /// Written as Turtle, which every N3 reader accepts.
    N3,
    NTriples,
    RdfXml,
    /// A flattened JSON-LD document with the prefix bindings as its `@context`.
    JsonLd,
}

impl OutputFormat {
    fn rdf_format(self) -> Option<RdfFormat> {
        match self {
            OutputFormat::Turtle | OutputFormat::N3 => Some(RdfFormat::Turtle),
            OutputFormat::NTriples => Some(RdfFormat::NTriples),
            OutputFormat::RdfXml => Some(RdfFormat::RdfXml),
            OutputFormat::JsonLd => None,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = BaldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ttl" | "turtle" => Ok(OutputFormat::Turtle),
            "n3" => Ok(OutputFormat::N3),
            "nt" | "ntriples" | "n-triples" => Ok(OutputFormat::NTriples),
            "xml" | "rdf" | "rdfxml" | "rdf/xml" => Ok(OutputFormat::RdfXml),
            "jsonld" | "json-ld" => Ok(OutputFormat::JsonLd),
            other => Err(BaldError::Config(format!("unsupported output format: {other}"))),
        }
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OutputFormat::Turtle => "ttl",
            OutputFormat::N3 => "n3",
            OutputFormat::NTriples => "nt",
            OutputFormat::RdfXml => "xml",
            OutputFormat::JsonLd => "jsonld",
        };
        write!(f, "{name}")
    }
}

/// A named or blank subject.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Named(NamedNode),
    Blank(BlankNode),
}

impl Node {
    fn term(&self) -> RdfTerm {
        match self {
            Node::Named(n) => n.clone().into(),
            Node::Blank(b) => b.clone().into(),
        }
    }

    fn triple(&self, predicate: NamedNode, object: impl Into<RdfTerm>) -> Triple {
        match self {
            Node::Named(n) => Triple::new(n.clone(), predicate, object),
            Node::Blank(b) => Triple::new(b.clone(), predicate, object),
        }
    }
}

fn iri(namespace: &str, local: &str) -> Result<NamedNode, BaldError> {
    Ok(NamedNode::new(format!("{namespace}{local}"))?)
}

/// Decimal lexical form; Rust never prints floats in exponent notation.
fn float_literal(value: f64) -> RdfLiteral {
    if value.is_finite() {
        RdfLiteral::new_typed_literal(value.to_string(), xsd::DECIMAL)
    } else {
        RdfLiteral::from(value)
    }
}

struct Emitter<'m> {
    model: &'m GraphModel,
    triples: Vec<Triple>,
    visited: IndexSet<EntityId>,
    blanks: IndexMap<EntityId, BlankNode>,
}

impl<'m> Emitter<'m> {
    fn node(&mut self, id: EntityId) -> Result<Node, BaldError> {
        match self.model.entity(id).and_then(|e| e.identity.as_ref()) {
            Some(identity) => Ok(Node::Named(NamedNode::new(identity.as_str())?)),
            None => Ok(Node::Blank(self.blanks.entry(id).or_default().clone())),
        }
    }

    /// The object for an entity, emitting it on first sight.
    fn entity_object(&mut self, id: EntityId) -> Result<RdfTerm, BaldError> {
        let node = self.node(id)?;
        self.emit(id)?;
        Ok(node.term())
    }

    fn literal_object(
        resolver: &Resolver<'_>,
        literal: &Literal,
        predicate: &str,
    ) -> Result<RdfTerm, BaldError> {
        Ok(match literal {
            Literal::Text(text) => {
                let object = resolver.unpack_rdfobject(text, predicate)?;
                match is_http_uri(&object).then(|| NamedNode::new(object.as_str())) {
                    Some(Ok(named)) => named.into(),
                    _ => RdfLiteral::new_simple_literal(text.as_str()).into(),
                }
            }
            Literal::Integer(i) => RdfLiteral::from(*i).into(),
            Literal::Float(v) => float_literal(*v).into(),
            Literal::DateTime(s) => RdfLiteral::new_typed_literal(s.as_str(), xsd::DATE_TIME).into(),
        })
    }

    fn object(
        &mut self,
        resolver: &Resolver<'_>,
        term: &Term,
        predicate: &str,
    ) -> Result<RdfTerm, BaldError> {
        match term {
            Term::Entity(id) => self.entity_object(*id),
            Term::Literal(literal) => Self::literal_object(resolver, literal, predicate),
        }
    }

    /// Emits an RDF collection and returns its head.
    fn collection(&mut self, items: Vec<RdfTerm>) -> RdfTerm {
        let mut head: RdfTerm = rdf::NIL.into_owned().into();
        for item in items.into_iter().rev() {
            let cell = Node::Blank(BlankNode::default());
            self.triples.push(cell.triple(rdf::FIRST.into_owned(), item));
            self.triples.push(cell.triple(rdf::REST.into_owned(), head));
            head = cell.term();
        }
        head
    }

    fn integer_list(&mut self, sizes: impl IntoIterator<Item = usize>) -> RdfTerm {
        let items = sizes
            .into_iter()
            .map(|s| RdfLiteral::from(s as i64).into())
            .collect();
        self.collection(items)
    }

    fn emit(&mut self, id: EntityId) -> Result<(), BaldError> {
        if !self.visited.insert(id) {
            return Ok(());
        }
        let model = self.model;
        let Some(entity) = model.entity(id) else {
            return Ok(());
        };
        let subject = self.node(id)?;
        let resolver = model.resolver(id);

        for (key, value) in entity.attrs.iter() {
            let predicate = resolver.unpack_predicate(key)?;
            let named = NamedNode::new(predicate.as_str())?;
            match value {
                Value::List(terms) => {
                    let items = terms
                        .iter()
                        .map(|t| self.object(&resolver, t, &predicate))
                        .collect::<Result<Vec<_>, _>>()?;
                    let head = self.collection(items);
                    self.triples.push(subject.triple(named, head));
                }
                other => {
                    for term in other.terms() {
                        let object = self.object(&resolver, &term, &predicate)?;
                        self.triples.push(subject.triple(named.clone(), object));
                    }
                }
            }
        }

        match &entity.kind {
            EntityKind::Container => {
                let contains = NamedNode::new(resolver.unpack_predicate(BALD_CONTAINS)?)?;
                for child in model.children(id) {
                    let object = self.node(child)?.term();
                    self.triples.push(subject.triple(contains.clone(), object));
                }
                for child in model.children(id) {
                    self.emit(child)?;
                }
            }
            EntityKind::Array { references, .. } => {
                let predicate = NamedNode::new(resolver.unpack_predicate(BALD_REFERENCES)?)?;
                for reference in references {
                    let object = self.entity_object(*reference)?;
                    self.triples.push(subject.triple(predicate.clone(), object));
                }
            }
            EntityKind::Reference {
                target,
                target_shape,
                source_reshape,
                target_reshape,
            } => {
                let predicate = NamedNode::new(resolver.unpack_predicate(BALD_TARGET)?)?;
                let object = self.entity_object(*target)?;
                self.triples.push(subject.triple(predicate, object));

                let shape = self.integer_list(target_shape.iter().copied());
                let predicate = NamedNode::new(resolver.unpack_predicate(BALD_TARGET_SHAPE)?)?;
                self.triples.push(subject.triple(predicate, shape));

                let reshapes: [(&str, &Option<ShapeMap>); 2] = [
                    (BALD_SOURCE_RESHAPE, source_reshape),
                    (BALD_TARGET_RESHAPE, target_reshape),
                ];
                for (key, reshape) in reshapes {
                    if let Some(reshape) = reshape {
                        let sizes = self.integer_list(reshape.values().copied());
                        let predicate = NamedNode::new(resolver.unpack_predicate(key)?)?;
                        self.triples.push(subject.triple(predicate, sizes));
                    }
                }
            }
            EntityKind::Resource => {}
        }

        if entity.is_file {
            self.distribution(&subject)?;
        }
        Ok(())
    }

    /// The `dcat:distribution` and `dct:format` description of the file itself.
    fn distribution(&mut self, file: &Node) -> Result<(), BaldError> {
        let rdf_type = rdf::TYPE.into_owned();
        let identifier = iri(DCT_NS, "identifier")?;

        let distribution = Node::Blank(BlankNode::default());
        self.triples
            .push(file.triple(iri(DCAT_NS, "distribution")?, distribution.term()));
        self.triples.push(
            distribution.triple(rdf_type.clone(), iri(DCAT_NS, "Distribution")?),
        );
        if let Some(locator) = self.model.file_locator() {
            self.triples.push(
                distribution.triple(iri(DCAT_NS, "downloadURL")?, NamedNode::new(locator)?),
            );
        }
        let media_type = Node::Blank(BlankNode::default());
        self.triples
            .push(media_type.triple(rdf_type.clone(), iri(DCAT_NS, "MediaType")?));
        self.triples.push(media_type.triple(
            identifier.clone(),
            RdfLiteral::new_simple_literal(NETCDF_MIME_TYPE),
        ));
        self.triples
            .push(distribution.triple(iri(DCAT_NS, "mediaType")?, media_type.term()));

        let format = Node::Blank(BlankNode::default());
        self.triples
            .push(format.triple(rdf_type, iri(DCT_NS, "MediaType")?));
        self.triples.push(
            format.triple(identifier, NamedNode::new(NETCDF_FORMAT_DEFINITION)?),
        );
        self.triples
            .push(file.triple(iri(DCT_NS, "format")?, format.term()));
        Ok(())
    }
}

fn json_ld_id(term: &RdfTerm) -> Option<String> {
    match term {
        RdfTerm::NamedNode(n) => Some(n.as_str().to_string()),
        RdfTerm::BlankNode(b) => Some(format!("_:{}", b.as_str())),
        _ => None,
    }
}

fn json_ld_object(term: &RdfTerm) -> Option<serde_json::Value> {
    match term {
        RdfTerm::Literal(literal) => {
            let mut object = json!({ "@value": literal.value() });
            if let Some(language) = literal.language() {
                object["@language"] = json!(language);
            } else if literal.datatype() != xsd::STRING {
                object["@type"] = json!(literal.datatype().as_str());
            }
            Some(object)
        }
        other => json_ld_id(other).map(|id| json!({ "@id": id })),
    }
}

/// Turns a [GraphModel] into RDF triples and documents.
#[derive(Debug, Clone, Copy)]
pub struct GraphSerializer<'m> {
    model: &'m GraphModel,
}

impl<'m> GraphSerializer<'m> {
    pub fn new(model: &'m GraphModel) -> Self {
        GraphSerializer { model }
    }

    /// Prefix name to namespace, in binding order. Later bindings of a name replace earlier
    /// ones.
    pub fn prefixes(&self) -> IndexMap<String, String> {
        let base = self.model.base_uri();
        let mut bindings = IndexMap::new();
        bindings.insert("bald".to_string(), BALD_NS.to_string());
        bindings.insert("this".to_string(), base.to_string());
        for context in self.model.contexts() {
            for (prefix, uri) in context.prefixes.as_map() {
                bindings.insert(prefix.clone(), uri.clone());
            }
            for (alias, uri) in context.aliases.as_map() {
                bindings.insert(alias.clone(), AliasTable::binding_namespace(uri));
            }
        }
        for id in self.model.walk() {
            let Some(identity) = self.model.entity(id).and_then(|e| e.identity.as_deref()) else {
                continue;
            };
            if identity == base || !identity.ends_with('/') {
                continue;
            }
            if let Some(path) = identity.strip_prefix(base) {
                let name = format!("this__{}", path.trim_end_matches('/').replace('/', "__"));
                bindings.insert(name, identity.to_string());
            }
        }
        if self.model.entity(self.model.root()).is_some_and(|e| e.is_file) {
            bindings.insert("dcat".to_string(), DCAT_NS.to_string());
            bindings.insert("dct".to_string(), DCT_NS.to_string());
        }
        bindings
    }

    /// Every triple of the graph, emitted depth-first from the root.
    pub fn triples(&self) -> Result<Vec<Triple>, BaldError> {
        let mut emitter = Emitter {
            model: self.model,
            triples: Vec::new(),
            visited: IndexSet::new(),
            blanks: IndexMap::new(),
        };
        emitter.emit(self.model.root())?;
        tracing::debug!("Emitted {} triples", emitter.triples.len());
        Ok(emitter.triples)
    }

    /// The graph as a JSON-LD document: one node object per subject in `@graph`.
    pub fn json_ld(&self) -> Result<serde_json::Value, BaldError> {
        let mut nodes: IndexMap<String, serde_json::Map<String, serde_json::Value>> =
            IndexMap::new();
        for triple in self.triples()? {
            let Some(subject) = json_ld_id(&RdfTerm::from(triple.subject.clone())) else {
                continue;
            };
            let Some(object) = json_ld_object(&triple.object) else {
                continue;
            };
            let node = nodes.entry(subject.clone()).or_insert_with(|| {
                let mut node = serde_json::Map::new();
                node.insert("@id".to_string(), json!(subject));
                node
            });
            let objects = node
                .entry(triple.predicate.as_str().to_string())
                .or_insert_with(|| json!([]));
            if let Some(items) = objects.as_array_mut() {
                items.push(object);
            }
        }
        let context: serde_json::Map<String, serde_json::Value> = self
            .prefixes()
            .into_iter()
            .map(|(prefix, namespace)| (prefix, json!(namespace)))
            .collect();
        let graph: Vec<serde_json::Value> = nodes.into_values().map(Into::into).collect();
        Ok(json!({ "@context": context, "@graph": graph }))
    }

    pub fn write<W: Write>(&self, format: OutputFormat, mut writer: W) -> Result<W, BaldError> {
        let Some(rdf_format) = format.rdf_format() else {
            serde_json::to_writer_pretty(&mut writer, &self.json_ld()?)?;
            return Ok(writer);
        };
        let mut serializer = RdfSerializer::from_format(rdf_format);
        for (prefix, namespace) in self.prefixes() {
            if NamedNode::new(namespace.as_str()).is_err() {
                tracing::debug!("Not binding {prefix}: {namespace} is not an IRI");
                continue;
            }
            serializer = serializer.with_prefix(prefix, namespace)?;
        }
        let mut output = serializer.for_writer(writer);
        for triple in self.triples()? {
            output.serialize_triple(triple.as_ref())?;
        }
        Ok(output.finish()?)
    }

    pub fn serialize(&self, format: OutputFormat) -> Result<String, BaldError> {
        let bytes = self.write(format, Vec::new())?;
        Ok(String::from_utf8(bytes)?)
    }
}
