mod common;

use common::{Person, Point, context, person, person_at, address, record, ty};
use pretty_assertions::assert_eq;
use resmeta_meta::MetaError;
use resmeta_model::Constructor;
use resmeta_types::{Object, PopulateSource, TypeName, Value, ValueType};
use std::sync::Arc;

fn source(json: &str) -> PopulateSource {
    PopulateSource::from_json_str(json).expect("valid json")
}

fn point_of(value: &Value) -> (i64, i64, Option<String>) {
    value
        .as_object()
        .and_then(|o| o.with(|p: &Point| (p.x, p.y, p.label.clone())))
        .expect("point state")
}

// ── Metadata ─────────────────────────────────────────────────────

#[test]
fn visible_properties_in_output_order() {
    let ctx = context();
    let metadata = ctx.serialization_metadata(&ty("Person")).expect("metadata");
    let names: Vec<&str> = metadata.properties().iter().map(|p| p.name()).collect();

    assert_eq!(
        names,
        vec!["Name", "Age", "Greeting", "Nickname", "Address", "Badge", "Extra"]
    );
    assert!(!metadata.is_dictionary());
    assert!(!metadata.is_enumerable());
    assert!(matches!(metadata.constructor(), Some(Constructor::Parameterless(_))));
}

#[test]
fn metadata_is_cached_per_type() {
    let ctx = context();
    let first = ctx.serialization_metadata(&ty("Person")).expect("metadata");
    let second = ctx.serialization_metadata(&ty("Person")).expect("metadata");
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn container_shapes() {
    let ctx = context();
    let record = ctx.serialization_metadata(&ty("Record")).expect("metadata");
    let bag = ctx.serialization_metadata(&ty("Bag")).expect("metadata");
    let map = ctx
        .serialization_metadata(&ValueType::map(ValueType::Int))
        .expect("metadata");
    let list = ctx
        .serialization_metadata(&ValueType::list(ty("Person")))
        .expect("metadata");

    assert!(record.is_dictionary());
    assert!(bag.is_dictionary());
    assert!(map.is_dictionary());
    assert!(map.contract().is_none());
    assert!(list.is_enumerable());
    assert!(list.properties().is_empty());
}

#[test]
fn parameters_map_to_declared_properties() {
    let ctx = context();
    let metadata = ctx.serialization_metadata(&ty("Point")).expect("metadata");
    let mapped: Vec<Option<&str>> = metadata
        .parameter_properties()
        .iter()
        .map(|p| p.as_ref().map(|p| p.name()))
        .collect();
    assert_eq!(mapped, vec![Some("X"), Some("Y"), Some("Label")]);
}

// ── Construction ─────────────────────────────────────────────────

#[tokio::test]
async fn parameterized_constructor_takes_source_values() {
    let ctx = context();
    let created = ctx
        .create(&ty("Point"), &source(r#"{"X": 1, "y": 2, "Label": "origin"}"#))
        .await
        .expect("created");
    assert_eq!(point_of(&created), (1, 2, Some("origin".to_string())));
}

#[tokio::test]
async fn optional_parameters_may_be_absent() {
    let ctx = context();
    let created = ctx
        .create(&ty("Point"), &source(r#"{"x": 3, "y": 4}"#))
        .await
        .expect("created");
    assert_eq!(point_of(&created), (3, 4, None));
}

#[tokio::test]
async fn every_missing_parameter_is_reported() {
    let ctx = context();
    let err = ctx
        .create(&ty("Point"), &source(r#"{"label": "nowhere", "y": null}"#))
        .await
        .unwrap_err();

    match err {
        MetaError::MissingConstructorParameters {
            type_name,
            parameters,
        } => {
            assert_eq!(type_name, "Point");
            assert_eq!(parameters, vec!["x".to_string(), "y".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn custom_creator_wins() {
    let ctx = context();
    ctx.types()
        .contract(&TypeName::from("Person"))
        .expect("contract")
        .set_creator(Arc::new(|| {
            Object::new(
                "Person",
                Person {
                    age: 99,
                    ..Person::default()
                },
            )
        }));

    let created = ctx
        .create(&ty("Person"), &source(r#"{"Name": "Ann"}"#))
        .await
        .expect("created");
    let person = created.as_object().expect("object");
    assert_eq!(person.with(|p: &Person| p.age), Some(99));
    assert_eq!(common::name_of(person).as_deref(), Some("Ann"));
}

#[tokio::test]
async fn types_without_constructors_cannot_be_built() {
    let ctx = context();
    let err = ctx
        .create(&ty("Totals"), &source(r#"{"Amount": 1.5}"#))
        .await
        .unwrap_err();
    assert!(matches!(err, MetaError::InvalidOperation(_)));
}

// ── Output ───────────────────────────────────────────────────────

#[tokio::test]
async fn visible_values_skip_hidden_nulls() {
    let ctx = context();
    let target = person_at("Ann", 30, address("Main", "Oslo"));
    target.with_mut(|p: &mut Person| p.secret = Some("hunter2".to_string()));
    let metadata = ctx.serialization_metadata(&ty("Person")).expect("metadata");

    let values = metadata
        .visible_values(ctx.types(), &Value::Object(target))
        .await;
    let keys: Vec<&str> = values.keys().map(String::as_str).collect();

    assert_eq!(keys, vec!["Name", "Age", "Greeting", "Address", "Badge", "Extra"]);
    assert_eq!(values.get("Greeting"), Some(&Value::from("Hello, Ann")));
    assert_eq!(values.get("Badge"), Some(&Value::Null));
}

#[tokio::test]
async fn visible_values_keep_set_nullable_members() {
    let ctx = context();
    let target = person("Ann", 30);
    target.with_mut(|p: &mut Person| p.nickname = Some("Annie".to_string()));
    let metadata = ctx.serialization_metadata(&ty("Person")).expect("metadata");

    let values = metadata
        .visible_values(ctx.types(), &Value::Object(target))
        .await;
    assert_eq!(values.get("Nickname"), Some(&Value::from("Annie")));
}

#[tokio::test]
async fn visible_values_append_the_open_tail() {
    let ctx = context();
    let target = record(5, &[("Color", Value::from("red")), ("Id", Value::from(0))]);
    let metadata = ctx.serialization_metadata(&ty("Record")).expect("metadata");

    let values = metadata
        .visible_values(ctx.types(), &Value::Object(target))
        .await;
    let entries: Vec<(&str, &Value)> = values.iter().map(|(k, v)| (k.as_str(), v)).collect();
    assert_eq!(
        entries,
        vec![("Id", &Value::from(5)), ("Color", &Value::from("red"))]
    );
}
