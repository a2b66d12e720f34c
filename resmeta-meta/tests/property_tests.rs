mod common;

use common::{Document, bag, context, name_of, person, record, ty};
use pretty_assertions::assert_eq;
use resmeta_meta::{
    DynamicProperty, IndexPosition, IndexProperty, Observed, Property, PropertyChanged,
};
use resmeta_types::{Object, SharedList, SharedMap, Value, ValueType};
use std::sync::{Arc, Mutex};

// ── Dynamic lookup ───────────────────────────────────────────────

#[tokio::test]
async fn map_lookup_rebinds_case() {
    let ctx = context();
    let map = SharedMap::new();
    map.insert("FirstName", Value::from("Ann"));

    let resolved = DynamicProperty::new("firstname", false)
        .resolve(ctx.types(), &Value::Map(map))
        .await;
    assert_eq!(resolved, Some(("FirstName".to_string(), Value::from("Ann"))));
}

#[tokio::test]
async fn exact_case_wins_over_case_variants() {
    let ctx = context();
    let map = SharedMap::new();
    map.insert("key", Value::from(1));
    map.insert("KEY", Value::from(2));
    let target = Value::Map(map);

    let upper = DynamicProperty::new("KEY", false).resolve(ctx.types(), &target).await;
    let mixed = DynamicProperty::new("Key", false).resolve(ctx.types(), &target).await;

    assert_eq!(upper, Some(("KEY".to_string(), Value::from(2))));
    assert_eq!(mixed, Some(("key".to_string(), Value::from(1))));
}

#[tokio::test]
async fn dynamic_member_protocol_comes_first() {
    let ctx = context();
    let target = Value::Object(bag(&[("Color", Value::from("red"))]));

    let resolved = DynamicProperty::new("color", true)
        .resolve(ctx.types(), &target)
        .await;
    assert_eq!(resolved, Some(("Color".to_string(), Value::from("red"))));
}

#[tokio::test]
async fn map_tail_is_searched() {
    let ctx = context();
    let target = Value::Object(record(7, &[("Color", Value::from("blue"))]));

    let tail = DynamicProperty::new("COLOR", false)
        .resolve(ctx.types(), &target)
        .await;
    assert_eq!(tail, Some(("Color".to_string(), Value::from("blue"))));
}

#[tokio::test]
async fn declared_fallback_is_opt_in() {
    let ctx = context();
    let target = Value::Object(person("Ann", 30));

    let with = DynamicProperty::new("name", true)
        .resolve(ctx.types(), &target)
        .await;
    let without = DynamicProperty::new("name", false)
        .resolve(ctx.types(), &target)
        .await;

    assert_eq!(with, Some(("Name".to_string(), Value::from("Ann"))));
    assert_eq!(without, None);
}

#[tokio::test]
async fn list_positions() {
    let ctx = context();
    let list = Value::List(SharedList::from_vec(vec![
        Value::from("a"),
        Value::from("b"),
    ]));

    let first = DynamicProperty::new("0", false).resolve(ctx.types(), &list).await;
    let last = DynamicProperty::new("-", false).resolve(ctx.types(), &list).await;
    let out_of_range = DynamicProperty::new("9", false).resolve(ctx.types(), &list).await;

    assert_eq!(first.map(|(_, v)| v), Some(Value::from("a")));
    assert_eq!(last.map(|(_, v)| v), Some(Value::from("b")));
    assert_eq!(out_of_range, None);
}

#[test]
fn scalars_have_no_members() {
    let ctx = context();
    let value = DynamicProperty::new("Length", true).get_value_now(ctx.types(), &Value::from("abc"));
    assert_eq!(value, Some(Value::Null));
}

#[test]
fn async_declared_fallback_cannot_be_read_now() {
    let ctx = context();
    let target = Value::Object(Object::new("Document", Document::default()));
    assert_eq!(
        DynamicProperty::new("body", true).get_value_now(ctx.types(), &target),
        None
    );
}

// ── Dynamic writes ───────────────────────────────────────────────

#[test]
fn map_writes_reuse_the_existing_key() {
    let ctx = context();
    let map = SharedMap::new();
    map.insert("Color", Value::from("red"));
    let target = Value::Map(map.clone());

    DynamicProperty::new("color", false)
        .set_value(ctx.types(), &target, Value::from("green"))
        .expect("maps accept anything");
    DynamicProperty::new("Size", false)
        .set_value(ctx.types(), &target, Value::from(3))
        .expect("maps accept anything");

    assert_eq!(map.keys(), vec!["Color".to_string(), "Size".to_string()]);
    assert_eq!(map.get("Color"), Some(Value::from("green")));
}

#[test]
fn object_writes_prefer_declared_members_over_the_tail() {
    let ctx = context();
    let target = Value::Object(record(1, &[]));

    DynamicProperty::new("id", true)
        .set_value(ctx.types(), &target, Value::from(9))
        .expect("declared");
    DynamicProperty::new("Shade", true)
        .set_value(ctx.types(), &target, Value::from("dark"))
        .expect("tail");

    let (id, extras) = target
        .as_object()
        .and_then(|o| o.with(|r: &common::Record| (r.id, r.extras.clone())))
        .expect("record state");
    assert_eq!(id, 9);
    assert_eq!(extras.get("Shade"), Some(&Value::from("dark")));
}

#[test]
fn object_without_open_members_ignores_unknown_writes() {
    let ctx = context();
    let object = person("Ann", 30);
    DynamicProperty::new("Planet", true)
        .set_value(ctx.types(), &Value::Object(object.clone()), Value::from("Mars"))
        .expect("silently ignored");
    assert_eq!(name_of(&object).as_deref(), Some("Ann"));
}

// ── Indexes ──────────────────────────────────────────────────────

#[test]
fn index_positions_parse() {
    assert_eq!(IndexPosition::parse("3"), Some(IndexPosition::At(3)));
    assert_eq!(IndexPosition::parse("-"), Some(IndexPosition::Last));
    assert_eq!(IndexPosition::parse("*"), Some(IndexPosition::Any));
    assert_eq!(IndexPosition::parse("-1"), None);
    assert_eq!(IndexPosition::parse("first"), None);
}

#[test]
fn index_property_reads_and_writes_lists() {
    let list = SharedList::from_vec(vec![Value::from(1), Value::from(2)]);
    let target = Value::List(list.clone());
    let last = IndexProperty::new(IndexPosition::Last, ValueType::Int);
    let any = IndexProperty::new(IndexPosition::Any, ValueType::Int);

    assert_eq!(last.name(), "-");
    assert_eq!(last.get_value(&target), Value::from(2));
    assert!(last.is_writable_on(&target));
    assert!(!any.is_writable_on(&target));

    last.set_value(&target, Value::from(5));
    any.set_value(&target, Value::from(6));
    assert_eq!(list.snapshot(), vec![Value::from(1), Value::from(5)]);
    assert_eq!(last.get_value(&Value::from("not a list")), Value::Null);
}

// ── Declared properties ──────────────────────────────────────────

#[tokio::test]
async fn read_only_members_ignore_writes() {
    let ctx = context();
    let greeting = ctx
        .types()
        .find_declared(&ty("Person"), "Greeting")
        .expect("declared");
    let target = Value::Object(person("Ann", 30));

    assert!(greeting.is_readable());
    assert!(!greeting.is_writable());
    greeting
        .set_value(&target, Value::from("Bye"))
        .expect("no-op");
    assert_eq!(greeting.get_value(&target).await, Value::from("Hello, Ann"));
}

#[test]
fn writes_are_coerced_to_the_declared_type() {
    let ctx = context();
    let age = ctx
        .types()
        .find_declared(&ty("Person"), "Age")
        .expect("declared");
    let target = Value::Object(person("Ann", 30));

    age.set_value(&target, Value::Float(31.0)).expect("integral float");
    assert_eq!(age.get_value_now(&target), Some(Value::from(31)));
    assert!(age.set_value(&target, Value::from("old")).is_err());
}

#[test]
fn listeners_see_only_observable_changes() {
    let ctx = context();
    let age = ctx
        .types()
        .find_declared(&ty("Person"), "Age")
        .expect("declared");
    let target = Value::Object(person("Ann", 30));
    let seen: Arc<Mutex<Vec<(Observed, Value)>>> = Arc::default();

    let sink = Arc::clone(&seen);
    let id = age.subscribe(Arc::new(move |change: &PropertyChanged<'_>| {
        if let Ok(mut seen) = sink.lock() {
            seen.push((change.old_value.clone(), change.new_value.clone()));
        }
    }));
    age.set_value(&target, Value::from(31)).expect("set");
    age.set_value(&target, Value::from(31)).expect("unchanged");
    assert!(age.unsubscribe(id));
    age.set_value(&target, Value::from(32)).expect("unobserved");

    let seen = seen.lock().expect("lock").clone();
    assert_eq!(seen, vec![(Observed::Known(Value::from(30)), Value::from(31))]);
    assert_eq!(age.listener_count(), 0);
    assert!(!age.unsubscribe(id));
}

#[test]
fn to_dynamic_keeps_the_name() {
    let ctx = context();
    let name = ctx
        .types()
        .find_declared(&ty("Person"), "Name")
        .expect("declared");
    let dynamic = Property::from(name).to_dynamic();

    assert!(dynamic.is_dynamic());
    assert_eq!(dynamic.name(), "Name");
    assert_eq!(dynamic.value_type(), &ValueType::Any);
}

#[test]
fn declared_metadata() {
    let ctx = context();
    let nickname = ctx
        .types()
        .find_declared(&ty("Person"), "Nickname")
        .expect("declared");
    let badge = ctx
        .types()
        .find_declared(&ty("Person"), "Badge")
        .expect("declared");

    assert!(nickname.hidden_if_null());
    assert!(!nickname.hidden());
    assert!(badge.replace_on_update());
    assert_eq!(badge.value_type(), &ty("Badge"));
    assert!(Property::from(nickname).is_nullable());
}
