//! The in-memory entity graph.
//!
//! A [GraphModel] owns every [Entity] created during one load. Entities live in a
//! `petgraph` directed graph whose only edges are `contains` edges from a container to its
//! children, so the containment structure can be checked and walked with petgraph's
//! algorithms. Reference entities are graph nodes without a parent: they hang off the
//! `references` list of the [EntityKind::Array] that owns them.

mod entity;

pub use entity::{ContextId, Entity, EntityId, EntityKind, ShapeMap};

use petgraph::{
    algo::is_cyclic_directed,
    graph::DiGraph,
    visit::{Dfs, EdgeRef},
    Direction,
};

use crate::{
    error::BaldError,
    namespace::{NamespaceContext, OntologyIndex, Resolver},
    properties::AttrBag,
};

/// Weight of a `contains` edge: the position of the child within its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Contains(pub usize);

/// The entity tree of one loaded dataset, plus the namespace contexts and ontology index used
/// to interpret its statements.
#[derive(Debug, Clone)]
pub struct GraphModel {
    graph: DiGraph<Entity, Contains>,
    root: EntityId,
    base_uri: String,
    file_locator: Option<String>,
    contexts: Vec<NamespaceContext>,
    ontology: OntologyIndex,
}

impl GraphModel {
    /// Creates a model holding only the file-root container, identified by `base_uri` and
    /// interpreted in `root_context`.
    pub fn new(
        base_uri: impl Into<String>,
        root_context: NamespaceContext,
        root_attrs: AttrBag,
        ontology: OntologyIndex,
    ) -> Self {
        let base_uri = base_uri.into();
        let mut graph = DiGraph::new();
        let mut root_entity = Entity::new(
            None,
            Some(base_uri.clone()),
            EntityKind::Container,
            root_attrs,
            0,
        );
        root_entity.is_file = true;
        let root = graph.add_node(root_entity);
        GraphModel {
            graph,
            root,
            base_uri,
            file_locator: None,
            contexts: vec![root_context],
            ontology,
        }
    }

    pub fn with_file_locator(mut self, file_locator: Option<String>) -> Self {
        self.file_locator = file_locator;
        self
    }

    pub fn root(&self) -> EntityId {
        self.root
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    pub fn file_locator(&self) -> Option<&str> {
        self.file_locator.as_deref()
    }

    pub fn ontology(&self) -> &OntologyIndex {
        &self.ontology
    }

    pub fn ontology_mut(&mut self) -> &mut OntologyIndex {
        &mut self.ontology
    }

    pub fn add_context(&mut self, context: NamespaceContext) -> ContextId {
        self.contexts.push(context);
        self.contexts.len() - 1
    }

    pub fn context(&self, id: ContextId) -> &NamespaceContext {
        &self.contexts[id.min(self.contexts.len() - 1)]
    }

    pub fn contexts(&self) -> &[NamespaceContext] {
        &self.contexts
    }

    pub fn contexts_mut(&mut self) -> &mut [NamespaceContext] {
        &mut self.contexts
    }

    /// Adds `entity` as the last child of `parent`.
    pub fn add_child(&mut self, parent: EntityId, entity: Entity) -> EntityId {
        let order = self
            .graph
            .edges_directed(parent, Direction::Outgoing)
            .count();
        let child = self.graph.add_node(entity);
        self.graph.add_edge(parent, child, Contains(order));
        child
    }

    /// Attaches a reference entity to the `references` list of the array `source`.
    pub fn add_reference(
        &mut self,
        source: EntityId,
        reference: Entity,
    ) -> Result<EntityId, BaldError> {
        if !self.entity(source).is_some_and(|e| e.kind.is_array()) {
            return Err(BaldError::NotFound(format!(
                "array entity {source:?} to attach a reference to"
            )));
        }
        let id = self.graph.add_node(reference);
        if let Some(EntityKind::Array { references, .. }) =
            self.graph.node_weight_mut(source).map(|e| &mut e.kind)
        {
            references.push(id);
        }
        Ok(id)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.graph.node_weight(id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.graph.node_weight_mut(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.graph
            .node_indices()
            .filter_map(move |id| self.graph.node_weight(id).map(|e| (id, e)))
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Children of `parent` in insertion order.
    pub fn children(&self, parent: EntityId) -> Vec<EntityId> {
        let mut edges: Vec<(Contains, EntityId)> = self
            .graph
            .edges_directed(parent, Direction::Outgoing)
            .map(|edge| (*edge.weight(), edge.target()))
            .collect();
        edges.sort();
        edges.into_iter().map(|(_, child)| child).collect()
    }

    pub fn parents(&self, child: EntityId) -> Vec<EntityId> {
        self.graph
            .neighbors_directed(child, Direction::Incoming)
            .collect()
    }

    /// The reference entities owned by an array, empty for any other kind.
    pub fn references(&self, source: EntityId) -> &[EntityId] {
        match self.entity(source).map(|e| &e.kind) {
            Some(EntityKind::Array { references, .. }) => references.as_slice(),
            _ => &[],
        }
    }

    /// Every entity reachable from the root through `contains`, depth-first, parents before
    /// children.
    pub fn walk(&self) -> Vec<EntityId> {
        let mut order = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.push(id);
            let mut children = self.children(id);
            children.reverse();
            stack.extend(children);
        }
        order
    }

    /// Checks that `contains` forms a tree rooted at the file root: no cycles, no entity with
    /// more than one parent and nothing but the root without a parent among the reachable
    /// entities.
    pub fn check_tree(&self) -> Result<(), BaldError> {
        if is_cyclic_directed(&self.graph) {
            return Err(BaldError::Config(
                "the contains relation has a cycle".to_string(),
            ));
        }
        let mut dfs = Dfs::new(&self.graph, self.root);
        while let Some(id) = dfs.next(&self.graph) {
            let parents = self.parents(id).len();
            let expected = usize::from(id != self.root);
            if parents != expected {
                let label = self.entity(id).map(Entity::label).unwrap_or_default();
                return Err(BaldError::Config(format!(
                    "{label} has {parents} containers, expected {expected}"
                )));
            }
        }
        Ok(())
    }

    /// A resolver for the statements of `id`, using the entity's namespace context.
    pub fn resolver(&self, id: EntityId) -> Resolver<'_> {
        let context = self.entity(id).map(|e| e.context).unwrap_or(0);
        Resolver::new(&self.base_uri, self.context(context), &self.ontology)
    }

    /// Finds an entity by its absolute identity.
    pub fn find_identity(&self, identity: &str) -> Option<EntityId> {
        self.entities()
            .find(|(_, e)| e.identity.as_deref() == Some(identity))
            .map(|(id, _)| id)
    }
}
