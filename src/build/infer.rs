//! Pass 2: references between arrays.
//!
//! Runs once every entity exists, so a reference may name a variable declared later in the
//! file. Dimension references are inferred from matching variable names; declared references
//! come from attributes whose predicate ranges over `bald:Resource`.

use indexmap::IndexSet;

use crate::{
    build::{
        builder::GroupScope,
        diagnostic::LoadDiagnostic,
        reshape::{merge_dimensions, named_shape},
    },
    error::BaldError,
    graph::{ContextId, Entity, EntityId, EntityKind, GraphModel, ShapeMap},
    properties::{Term, Value, BALD_NS},
    source::Variable,
};

/// How a reference-valued attribute lists its targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ReferenceTokens<'s> {
    /// `"(a b c)"`: order is significant.
    Ordered(Vec<&'s str>),
    /// `"a b c"`.
    Unordered(Vec<&'s str>),
}

impl<'s> ReferenceTokens<'s> {
    pub fn parse(text: &'s str) -> Self {
        let trimmed = text.trim();
        match trimmed
            .strip_prefix('(')
            .and_then(|inner| inner.strip_suffix(')'))
        {
            Some(inner) => ReferenceTokens::Ordered(inner.split_whitespace().collect()),
            None => ReferenceTokens::Unordered(trimmed.split_whitespace().collect()),
        }
    }

    pub fn tokens(&self) -> &[&'s str] {
        match self {
            ReferenceTokens::Ordered(tokens) | ReferenceTokens::Unordered(tokens) => tokens,
        }
    }
}

pub(crate) struct ReferenceInferencer<'m> {
    model: &'m mut GraphModel,
    predicates: IndexSet<String>,
    implicit: bool,
    pub diagnostics: Vec<LoadDiagnostic>,
}

impl<'m> ReferenceInferencer<'m> {
    pub fn new(model: &'m mut GraphModel) -> Self {
        let predicates = model.ontology().reference_predicates();
        let implicit = predicates.contains(&format!("{BALD_NS}references"));
        if !implicit {
            tracing::debug!("bald:references is not declared; dimension references are off");
        }
        ReferenceInferencer {
            model,
            predicates,
            implicit,
            diagnostics: Vec::new(),
        }
    }

    pub fn infer(&mut self, scopes: &[GroupScope<'_>]) -> Result<(), BaldError> {
        tracing::debug!("Pass 2: inferring references");
        for scope in scopes {
            for (variable, id) in &scope.variables {
                if self.implicit {
                    self.dimension_references(variable, *id, scope);
                }
                self.declared_references(variable, *id, scope)?;
            }
        }
        Ok(())
    }

    fn dimension_references(&mut self, variable: &Variable, id: EntityId, scope: &GroupScope<'_>) {
        for dimension in &variable.dimensions {
            if *dimension == variable.name {
                continue;
            }
            if let Some(target) = scope.scope.get(dimension) {
                self.reference(id, *target);
            }
        }
    }

    fn declared_references(
        &mut self,
        variable: &Variable,
        id: EntityId,
        scope: &GroupScope<'_>,
    ) -> Result<(), BaldError> {
        let Some(entity) = self.model.entity(id) else {
            return Ok(());
        };
        let candidates: Vec<(String, String)> = entity
            .attrs
            .iter()
            .filter_map(|(key, value)| value.as_text().map(|text| (key.clone(), text.to_string())))
            .collect();

        for (attribute, text) in candidates {
            let predicate = self.model.resolver(id).unpack_predicate(&attribute)?;
            if !self.predicates.contains(&predicate) {
                continue;
            }
            let parsed = ReferenceTokens::parse(&text);
            if parsed.tokens().is_empty() {
                continue;
            }
            let unknown: Vec<String> = parsed
                .tokens()
                .iter()
                .filter(|token| !scope.scope.contains_key(**token))
                .map(|token| token.to_string())
                .collect();
            if !unknown.is_empty() {
                tracing::debug!("{attribute} on {} names unknown variables", variable.name);
                self.diagnostics
                    .push(LoadDiagnostic::UnresolvedReferenceTokens {
                        source: self.label(id),
                        attribute,
                        tokens: unknown,
                    });
                continue;
            }

            let targets: Vec<EntityId> = parsed
                .tokens()
                .iter()
                .filter_map(|token| scope.scope.get(*token).copied())
                .collect();
            let value = match parsed {
                ReferenceTokens::Ordered(_) => {
                    Value::List(targets.iter().map(|t| Term::from(*t)).collect())
                }
                ReferenceTokens::Unordered(_) => Value::set(targets.iter().map(|t| Term::from(*t))),
            };
            if let Some(entity) = self.model.entity_mut(id) {
                entity.attrs.set(attribute, value);
            }

            for (token, target) in parsed.tokens().iter().zip(targets) {
                let is_dimension = variable.dimensions.iter().any(|d| d == token);
                // the dimension pass already linked these
                let unordered = matches!(parsed, ReferenceTokens::Unordered(_));
                if self.implicit && unordered && is_dimension {
                    continue;
                }
                self.reference(id, target);
            }
        }
        Ok(())
    }

    fn label(&self, id: EntityId) -> String {
        self.model.entity(id).map(Entity::label).unwrap_or_default()
    }

    /// Attaches a reference from `source` to `target` unless one exists already, or either is
    /// not an array with a shape.
    fn reference(&mut self, source: EntityId, target: EntityId) {
        if source == target {
            return;
        }
        let (Some(from), Some(to)) = (self.model.entity(source), self.model.entity(target)) else {
            return;
        };
        let (
            EntityKind::Array {
                shape: source_shape,
                dimensions: source_dims,
                references,
            },
            EntityKind::Array {
                shape: target_shape,
                dimensions: target_dims,
                ..
            },
        ) = (&from.kind, &to.kind)
        else {
            return;
        };
        if source_shape.is_empty() || target_shape.is_empty() {
            return;
        }
        let exists = references.iter().any(|r| {
            matches!(
                self.model.entity(*r).map(|e| &e.kind),
                Some(EntityKind::Reference { target: t, .. }) if *t == target
            )
        });
        if exists {
            return;
        }

        if source_shape == target_shape {
            let kind = EntityKind::Reference {
                target,
                target_shape: target_shape.clone(),
                source_reshape: None,
                target_reshape: None,
            };
            let context = from.context;
            self.attach(source, kind, context);
            return;
        }

        let reshape = match merge_dimensions(
            &named_shape(source_dims, source_shape),
            &named_shape(target_dims, target_shape),
        ) {
            Ok(reshape) => reshape,
            Err(err) => {
                tracing::warn!("Skipping reference {} -> {}: {err}", from.label(), to.label());
                self.diagnostics
                    .push(LoadDiagnostic::skipped_reference(from.label(), to.label(), err));
                return;
            }
        };
        let differs = |map: &ShapeMap, natural: &[usize]| -> Option<ShapeMap> {
            let sizes: Vec<usize> = map.values().copied().collect();
            (sizes != natural).then(|| map.clone())
        };
        let kind = EntityKind::Reference {
            target,
            target_shape: target_shape.clone(),
            source_reshape: differs(&reshape.source, source_shape),
            target_reshape: differs(&reshape.target, target_shape),
        };
        let context = from.context;
        self.attach(source, kind, context);
    }

    fn attach(&mut self, source: EntityId, kind: EntityKind, context: ContextId) {
        tracing::trace!("Reference from {}", self.label(source));
        let entity = Entity::new(None, None, kind, Default::default(), context);
        if let Err(err) = self.model.add_reference(source, entity) {
            tracing::warn!("{err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        build::{builder::EntityBuilder, temporal::GregorianDecoder},
        config::BaldConfig,
        properties::BALD_REFERENCES,
        source::{Dataset, Group},
        tests::helpers,
    };
    use test_log::test;

    fn infer(dataset: &Dataset) -> (GraphModel, Vec<LoadDiagnostic>) {
        let config = BaldConfig::default().with_base_uri("http://example.org/base");
        let cache = helpers::offline_cache();
        let decoder = GregorianDecoder;
        let mut builder = EntityBuilder::new(&config, &cache, &decoder);
        let (mut model, scopes) = builder.build(dataset).unwrap();
        let mut inferencer = ReferenceInferencer::new(&mut model);
        inferencer.infer(&scopes).unwrap();
        let mut diagnostics = builder.diagnostics;
        diagnostics.extend(inferencer.diagnostics);
        (model, diagnostics)
    }

    fn id(model: &GraphModel, name: &str) -> EntityId {
        model
            .find_identity(&format!("http://example.org/base/{name}"))
            .unwrap()
    }

    fn reference_kinds(model: &GraphModel, source: EntityId) -> Vec<EntityKind> {
        model
            .references(source)
            .iter()
            .map(|r| model.entity(*r).unwrap().kind.clone())
            .collect()
    }

    #[test]
    fn test_parse_reference_tokens() {
        assert_eq!(
            ReferenceTokens::parse("(a b c)"),
            ReferenceTokens::Ordered(vec!["a", "b", "c"])
        );
        assert_eq!(
            ReferenceTokens::parse("( a  b )"),
            ReferenceTokens::Ordered(vec!["a", "b"])
        );
        assert_eq!(
            ReferenceTokens::parse("b a"),
            ReferenceTokens::Unordered(vec!["b", "a"])
        );
        assert!(ReferenceTokens::parse("  ").tokens().is_empty());
    }

    #[test]
    fn test_declared_reference_same_shape() {
        let (model, diagnostics) = infer(&helpers::parent_child_dataset(17));
        let parent = id(&model, "parent_variable");
        let child = id(&model, "child_variable");
        assert_eq!(
            reference_kinds(&model, parent),
            vec![EntityKind::Reference {
                target: child,
                target_shape: vec![11, 17],
                source_reshape: None,
                target_reshape: None,
            }]
        );
        assert_eq!(
            model.entity(parent).unwrap().attrs.get(BALD_REFERENCES),
            Some(&Value::Set(vec![Term::from(child)]))
        );
        assert!(diagnostics.iter().all(|d| !d.is_skipped_reference()));
    }

    #[test]
    fn test_declared_reference_with_reshape() {
        let (model, _) = infer(&helpers::parent_child_dataset(13));
        let parent = id(&model, "parent_variable");
        let child = id(&model, "child_variable");
        let kinds = reference_kinds(&model, parent);
        assert_eq!(kinds.len(), 1);
        let EntityKind::Reference {
            target,
            source_reshape,
            target_reshape,
            ..
        } = &kinds[0]
        else {
            panic!("expected a reference");
        };
        assert_eq!(*target, child);
        let sizes = |m: &Option<ShapeMap>| m.as_ref().map(|m| m.values().copied().collect::<Vec<_>>());
        assert_eq!(sizes(source_reshape), Some(vec![11, 17, 1]));
        assert_eq!(sizes(target_reshape), Some(vec![11, 1, 13]));
    }

    #[test]
    fn test_dimension_references() {
        let dataset = Dataset::new(
            None,
            Group::new("")
                .with_variable(Variable::new("time").with_dimensions(&[("time", 4)]))
                .with_variable(Variable::new("lat").with_dimensions(&[("lat", 3)]))
                .with_variable(
                    Variable::new("temp").with_dimensions(&[("time", 4), ("lat", 3)]),
                ),
        )
        .unwrap();
        let (model, _) = infer(&dataset);
        let temp = id(&model, "temp");
        let targets: Vec<EntityId> = reference_kinds(&model, temp)
            .into_iter()
            .filter_map(|k| match k {
                EntityKind::Reference { target, .. } => Some(target),
                _ => None,
            })
            .collect();
        assert_eq!(targets, vec![id(&model, "time"), id(&model, "lat")]);
        assert!(model.references(id(&model, "time")).is_empty());
    }

    #[test]
    fn test_unknown_token_leaves_attribute() {
        let dataset = Dataset::new(
            None,
            Group::new("")
                .with_variable(
                    Variable::new("a")
                        .with_dimensions(&[("x", 2)])
                        .with_attribute(BALD_REFERENCES, "b missing"),
                )
                .with_variable(Variable::new("b").with_dimensions(&[("y", 2)])),
        )
        .unwrap();
        let (model, diagnostics) = infer(&dataset);
        let a = id(&model, "a");
        assert_eq!(
            model.entity(a).unwrap().attrs.get(BALD_REFERENCES),
            Some(&Value::Scalar("b missing".into()))
        );
        assert!(model.references(a).is_empty());
        assert!(diagnostics.iter().any(|d| matches!(
            d,
            LoadDiagnostic::UnresolvedReferenceTokens { tokens, .. } if tokens == &vec!["missing".to_string()]
        )));
    }

    #[test]
    fn test_ordered_references_keep_order() {
        let dataset = Dataset::new(
            None,
            Group::new("")
                .with_variable(
                    Variable::new("a")
                        .with_dimensions(&[("x", 2)])
                        .with_attribute(BALD_REFERENCES, "(c b)"),
                )
                .with_variable(Variable::new("b").with_dimensions(&[("x", 2)]))
                .with_variable(Variable::new("c").with_dimensions(&[("x", 2)])),
        )
        .unwrap();
        let (model, _) = infer(&dataset);
        let (a, b, c) = (id(&model, "a"), id(&model, "b"), id(&model, "c"));
        assert_eq!(
            model.entity(a).unwrap().attrs.get(BALD_REFERENCES),
            Some(&Value::List(vec![Term::from(c), Term::from(b)]))
        );
        assert_eq!(model.references(a).len(), 2);
    }

    #[test]
    fn test_repeated_dimension_skips_reference() {
        let dataset = Dataset::new(
            None,
            Group::new("")
                .with_variable(
                    Variable::new("a")
                        .with_dimensions(&[("x", 2), ("x", 3)])
                        .with_attribute(BALD_REFERENCES, "b"),
                )
                .with_variable(Variable::new("b").with_dimensions(&[("y", 2)])),
        )
        .unwrap();
        let (model, diagnostics) = infer(&dataset);
        assert!(model.references(id(&model, "a")).is_empty());
        assert!(diagnostics.iter().any(LoadDiagnostic::is_skipped_reference));
    }

    #[test]
    fn test_group_scope_sees_ancestors() {
        let dataset = Dataset::new(
            None,
            Group::new("")
                .with_variable(Variable::new("x").with_dimensions(&[("x", 5)]))
                .with_group(
                    Group::new("sub").with_variable(
                        Variable::new("v").with_dimensions(&[("x", 5), ("z", 2)]),
                    ),
                ),
        )
        .unwrap();
        let (model, _) = infer(&dataset);
        let v = id(&model, "sub/v");
        assert_eq!(
            reference_kinds(&model, v),
            vec![EntityKind::Reference {
                target: id(&model, "x"),
                target_shape: vec![5],
                source_reshape: None,
                target_reshape: Some([("x".to_string(), 5), ("z".to_string(), 1)].into_iter().collect()),
            }]
        );
    }

    #[test]
    fn test_declared_dimension_reference_kept_without_implicit_references() {
        let ontology = r#"
@prefix bald: <https://www.opengis.net/def/binary-array-ld/> .
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
bald:Resource a rdfs:Class .
bald:Array rdfs:subClassOf bald:Resource .
bald:linksTo rdfs:range bald:Array .
"#;
        let cache = crate::http::UriCache::new(
            crate::http::StaticFetcher::new()
                .with_document(crate::properties::BALD_ONTOLOGY, "text/turtle", ontology),
            None,
        );
        let dataset = Dataset::new(
            None,
            Group::new("")
                .with_variable(Variable::new("time").with_dimensions(&[("time", 4)]))
                .with_variable(
                    Variable::new("profile")
                        .with_dimensions(&[("time", 4)])
                        .with_attribute("bald__linksTo", "time"),
                ),
        )
        .unwrap();
        let config = BaldConfig::default().with_base_uri("http://example.org/base");
        let decoder = GregorianDecoder;
        let mut builder = EntityBuilder::new(&config, &cache, &decoder);
        let (mut model, scopes) = builder.build(&dataset).unwrap();
        let mut inferencer = ReferenceInferencer::new(&mut model);
        assert!(!inferencer.implicit);
        inferencer.infer(&scopes).unwrap();

        let time = id(&model, "time");
        let profile = id(&model, "profile");
        assert_eq!(
            reference_kinds(&model, profile),
            vec![EntityKind::Reference {
                target: time,
                target_shape: vec![4],
                source_reshape: None,
                target_reshape: None,
            }]
        );
        assert!(model.references(time).is_empty());
    }

    #[test]
    fn test_without_core_ontology_nothing_is_inferred() {
        let config = BaldConfig::default().with_base_uri("http://example.org/base");
        let cache = crate::http::UriCache::new(crate::http::StaticFetcher::new(), None);
        let decoder = GregorianDecoder;
        let mut builder = EntityBuilder::new(&config, &cache, &decoder);
        let dataset = helpers::parent_child_dataset(17);
        let (mut model, scopes) = builder.build(&dataset).unwrap();
        let mut inferencer = ReferenceInferencer::new(&mut model);
        inferencer.infer(&scopes).unwrap();
        let parent = model
            .find_identity("http://example.org/base/parent_variable")
            .unwrap();
        assert!(model.references(parent).is_empty());
        assert_eq!(
            model.entity(parent).unwrap().attrs.get(BALD_REFERENCES),
            Some(&Value::Scalar("child_variable".into()))
        );
    }
}
