//! Loading dataset descriptions from disk into entity graphs.

mod common;

use bald_core::{
    build::{LoadDiagnostic, Loader},
    config::BaldConfig,
    graph::{EntityId, EntityKind, GraphModel, ShapeMap},
    properties::{Literal, Term, Value, BALD_ARRAY_FIRST_VALUE, BALD_ARRAY_LAST_VALUE, RDF_TYPE},
};
use test_log::test;

fn id(model: &GraphModel, path: &str) -> EntityId {
    model
        .find_identity(&format!("{}/{path}", common::BASE_URI))
        .unwrap_or_else(|| panic!("no entity {path}"))
}

fn targets(model: &GraphModel, source: EntityId) -> Vec<EntityId> {
    model
        .references(source)
        .iter()
        .filter_map(|r| match &model.entity(*r)?.kind {
            EntityKind::Reference { target, .. } => Some(*target),
            _ => None,
        })
        .collect()
}

#[test]
fn test_array_reference() {
    let result = common::load("array_reference.toml");
    let model = &result.model;
    let parent = id(model, "parent_variable");
    let child = id(model, "child_variable");

    assert_eq!(targets(model, parent), vec![child]);
    assert!(model.references(child).is_empty());
    let reference = model.references(parent)[0];
    let reference = model.entity(reference).unwrap();
    assert!(reference.identity.is_none());
    match &reference.kind {
        EntityKind::Reference {
            target_shape,
            source_reshape,
            target_reshape,
            ..
        } => {
            assert_eq!(target_shape, &vec![11, 17]);
            assert!(source_reshape.is_none());
            assert!(target_reshape.is_none());
        }
        other => panic!("unexpected kind {other:?}"),
    }
    assert_eq!(
        model.entity(parent).unwrap().attrs.get("bald__references"),
        Some(&Value::Set(vec![Term::Entity(child)]))
    );
    assert_eq!(model.children(model.root()).len(), 2);
    assert!(result.diagnostics.iter().all(|d| d.is_document()));
}

#[test]
fn test_broadcast_error_still_loads() {
    let result = common::load("broadcast_error.toml");
    let model = &result.model;
    let parent = id(model, "parent_variable");
    let reference = model.entity(model.references(parent)[0]).unwrap();
    let EntityKind::Reference {
        source_reshape,
        target_reshape,
        ..
    } = &reference.kind
    else {
        panic!("not a reference");
    };
    let sizes = |shape: &Option<ShapeMap>| {
        shape
            .as_ref()
            .map(|s| s.values().copied().collect::<Vec<_>>())
    };
    assert_eq!(sizes(source_reshape), Some(vec![11, 17, 1]));
    assert_eq!(sizes(target_reshape), Some(vec![11, 1, 13]));
    assert!(result
        .diagnostics
        .iter()
        .all(|d| !d.is_skipped_reference()));
}

#[test]
fn test_profile_structure() {
    let result = common::load("profile.toml");
    let model = &result.model;

    assert!(model
        .find_identity(&format!("{}/prefix_list/", common::BASE_URI))
        .is_none());
    let station = id(model, "station/");
    assert!(model.entity(station).unwrap().kind.is_container());
    let offset = id(model, "station/offset");
    assert_eq!(model.parents(offset), vec![station]);
    assert_eq!(targets(model, offset), vec![id(model, "depth")]);

    let profile = id(model, "profile_temperature");
    assert_eq!(
        targets(model, profile),
        vec![id(model, "time"), id(model, "depth")]
    );
    assert!(targets(model, id(model, "time")).is_empty());

    let surface = model.entity(id(model, "surface_temperature")).unwrap();
    let types = surface.attrs.get(RDF_TYPE).unwrap();
    assert!(types.contains(&Term::from("geo__Feature")));
    assert!(types.contains(&Term::from("bald__Array")));
}

#[test]
fn test_profile_coordinate_bounds() {
    let result = common::load("profile.toml");
    let model = &result.model;
    let time = model.entity(id(model, "time")).unwrap();
    assert_eq!(
        time.attrs.get(BALD_ARRAY_FIRST_VALUE),
        Some(&Value::Scalar(Literal::DateTime(
            "2017-05-01T00:00:00".to_string()
        )))
    );
    assert_eq!(
        time.attrs.get(BALD_ARRAY_LAST_VALUE),
        Some(&Value::Scalar(Literal::DateTime(
            "2017-05-03T00:00:00".to_string()
        )))
    );
    let depth = model.entity(id(model, "depth")).unwrap();
    assert_eq!(
        depth.attrs.get(BALD_ARRAY_LAST_VALUE),
        Some(&Value::Scalar(Literal::Float(40.0)))
    );
}

#[test]
fn test_unreachable_prefix_documents_are_diagnostics() {
    let result = common::load("profile.toml");
    let documents: Vec<&LoadDiagnostic> = result
        .diagnostics
        .iter()
        .filter(|d| d.is_document())
        .collect();
    assert!(!documents.is_empty());
    assert!(documents
        .iter()
        .any(|d| d.to_string().contains("http://def.scitools.org.uk/CFTerms")));
}

#[test]
fn test_config_file_drives_offline_load() {
    let config = BaldConfig::from_path(common::fixture("config.toml")).unwrap();
    assert_eq!(
        config.file_locator.as_deref(),
        Some("http://example.org/download/profile.nc")
    );
    let loader = Loader::offline(config).unwrap();
    let result = loader.load(&common::dataset("profile.toml")).unwrap();
    let model = &result.model;

    assert_eq!(model.base_uri(), "http://example.org/base/");
    assert_eq!(
        model.file_locator(),
        Some("http://example.org/download/profile.nc")
    );
    let root = model.context(model.entity(model.root()).unwrap().context);
    assert_eq!(
        root.aliases.as_map().get("CFTerms").map(String::as_str),
        Some("http://def.scitools.org.uk/CFTerms?_format=ttl")
    );
    assert_eq!(
        root.prefixes.get("dcat").map(String::as_str),
        Some("http://www.w3.org/ns/dcat#")
    );
    assert_eq!(
        root.prefixes.get("cf").map(String::as_str),
        Some("http://def.scitools.org.uk/CFTerms/")
    );
    assert!(model
        .ontology()
        .contains_document("https://www.opengis.net/def/binary-array-ld"));
}

#[test]
fn test_alias_collision_with_file_is_config_error() {
    let dataset = bald_core::source::Dataset::from_toml_str(
        r#"
[attributes]
bald__isAliasedBy = "aliases"

[groups.aliases.attributes]
CFTerms = "http://one.example/cf"
"#,
    )
    .unwrap();
    let config = BaldConfig::default()
        .with_base_uri(common::BASE_URI)
        .with_alias("CFTerms", "http://two.example/cf");
    let loader = common::loader_with(common::fetcher(), config);
    assert!(matches!(
        loader.load(&dataset),
        Err(bald_core::BaldError::Config(_))
    ));
}
