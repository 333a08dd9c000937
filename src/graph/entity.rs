use indexmap::IndexMap;
use petgraph::graph::NodeIndex;
use std::fmt::{Display, Formatter};

use crate::properties::{AttrBag, RDF_TYPE};

/// Handle of an [Entity] inside a [super::GraphModel].
pub type EntityId = NodeIndex;

/// Index of a namespace context (prefix/alias tables) inside a [super::GraphModel].
pub type ContextId = usize;

/// An ordered dimension-name to size mapping produced by the dimension merge.
pub type ShapeMap = IndexMap<String, usize>;

/// The closed set of entity variants.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    /// A leaf carrying only statements (a scalar variable).
    Resource,
    /// A variable with a shape. `references` holds the [EntityKind::Reference] entities inferred
    /// for it, in creation order.
    Array {
        shape: Vec<usize>,
        dimensions: Vec<String>,
        references: Vec<EntityId>,
    },
    /// A group or the file root; its children hang off `contains` edges in the graph.
    Container,
    /// An anonymous array reference from the array owning it to `target`.
    Reference {
        target: EntityId,
        target_shape: Vec<usize>,
        source_reshape: Option<ShapeMap>,
        target_reshape: Option<ShapeMap>,
    },
}

impl EntityKind {
    pub fn array(shape: Vec<usize>, dimensions: Vec<String>) -> Self {
        EntityKind::Array {
            shape,
            dimensions,
            references: Vec::new(),
        }
    }

    /// The shorthand rdf type every entity of this kind carries.
    pub fn rdf_type(&self) -> &'static str {
        match self {
            EntityKind::Resource => "bald__Resource",
            EntityKind::Array { .. } => "bald__Array",
            EntityKind::Container => "bald__Container",
            EntityKind::Reference { .. } => "bald__Reference",
        }
    }

    /// The natural shape of array-like entities.
    pub fn shape(&self) -> Option<&[usize]> {
        match self {
            EntityKind::Array { shape, .. } => Some(shape.as_slice()),
            EntityKind::Reference { target_shape, .. } => Some(target_shape.as_slice()),
            EntityKind::Resource | EntityKind::Container => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, EntityKind::Array { .. })
    }

    pub fn is_container(&self) -> bool {
        matches!(self, EntityKind::Container)
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, EntityKind::Reference { .. })
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            EntityKind::Resource => "Resource",
            EntityKind::Array { .. } => "Array",
            EntityKind::Container => "Container",
            EntityKind::Reference { .. } => "Reference",
        };
        write!(f, "{label}")
    }
}

/// A node of the in-memory graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Source name of the variable or group; `None` for the root and for references.
    pub name: Option<String>,
    /// Absolute URI, or `None` for anonymous (blank node) entities.
    pub identity: Option<String>,
    pub kind: EntityKind,
    pub attrs: AttrBag,
    /// Namespace context used to unpack this entity's predicates and objects.
    pub context: ContextId,
    /// Marks the file-root container, which carries the distribution block on output.
    pub is_file: bool,
}

impl Entity {
    /// Creates an entity, recording its kind's rdf type in the attribute bag (merged with any
    /// type the source already declared).
    pub fn new(
        name: Option<String>,
        identity: Option<String>,
        kind: EntityKind,
        mut attrs: AttrBag,
        context: ContextId,
    ) -> Self {
        attrs.insert(RDF_TYPE, kind.rdf_type());
        Entity {
            name,
            identity,
            kind,
            attrs,
            context,
            is_file: false,
        }
    }

    pub fn shape(&self) -> Option<&[usize]> {
        self.kind.shape()
    }

    /// A printable label: the identity, else the source name, else `_:anonymous`.
    pub fn label(&self) -> String {
        self.identity
            .clone()
            .or_else(|| self.name.clone())
            .unwrap_or_else(|| "_:anonymous".to_string())
    }
}

impl Display for Entity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {} attributes", self.label(), self.kind, self.attrs.len())
    }
}
