#![allow(dead_code)]

use indexmap::IndexMap;
use resmeta_meta::{MetaConfig, MetaContext};
use resmeta_model::{
    ConstructorParameter, DynamicMembers, MemberDef, TypeAttributes, TypeDef, TypeRegistry,
};
use resmeta_types::{FromValue, Object, SharedList, SharedMap, TypeName, Value, ValueType};
use std::sync::Arc;

// ── Model states ─────────────────────────────────────────────────

#[derive(Debug, Default, Clone)]
pub struct Person {
    pub name: Option<String>,
    pub age: i64,
    pub nickname: Option<String>,
    pub secret: Option<String>,
    pub address: Option<Object>,
    pub badge: Option<Object>,
    pub extra: Value,
    pub legacy_id: i64,
}

#[derive(Debug, Default)]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
}

#[derive(Debug, Default)]
pub struct Badge {
    pub label: Option<String>,
}

#[derive(Debug, Default)]
pub struct Order {
    pub quantity: i64,
    pub unit_price: f64,
}

#[derive(Debug, Default)]
pub struct Totals {
    pub amount: f64,
}

#[derive(Debug, Default)]
pub struct Node {
    pub name: Option<String>,
    pub children: SharedList,
    pub parent: Option<Object>,
}

/// Open property bag speaking the dynamic-member protocol.
#[derive(Debug, Default)]
pub struct Bag {
    pub values: IndexMap<String, Value>,
}

impl DynamicMembers for Bag {
    fn try_get_member(&self, name: &str) -> Option<(String, Value)> {
        SharedMap::lookup(&self.values, name).map(|(key, value)| (key.clone(), value.clone()))
    }

    fn try_set_member(&mut self, name: &str, value: Value) -> bool {
        let key = SharedMap::lookup(&self.values, name)
            .map(|(key, _)| key.clone())
            .unwrap_or_else(|| name.to_string());
        self.values.insert(key, value);
        true
    }
}

/// Statically typed model with an open tail.
#[derive(Debug, Default)]
pub struct Record {
    pub id: i64,
    pub extras: IndexMap<String, Value>,
}

#[derive(Debug, Default)]
pub struct Widget {
    pub label: Option<String>,
    pub internal: Option<String>,
}

#[derive(Debug, Default)]
pub struct Gadget {
    pub display_name: Option<String>,
}

#[derive(Debug, Default)]
pub struct Resource {
    pub href: Option<String>,
}

#[derive(Debug, Default)]
pub struct Product {
    pub resource: Resource,
    pub title: Option<String>,
    pub price: f64,
}

#[derive(Debug, Default)]
pub struct Employee {
    pub person: Person,
    pub company: Option<String>,
}

#[derive(Debug, Default)]
pub struct Document {
    pub title: Option<String>,
    pub body: String,
}

#[derive(Debug, Default)]
pub struct Point {
    pub x: i64,
    pub y: i64,
    pub label: Option<String>,
}

#[derive(Debug, Default)]
pub struct Account {
    pub number: Option<String>,
    pub owner: Option<Object>,
}

// ── Registration ─────────────────────────────────────────────────

fn person_members(def: TypeDef) -> TypeDef {
    def.member(
        MemberDef::field::<Person, Option<String>>(
            "Name",
            ValueType::String,
            |p| &p.name,
            |p| &mut p.name,
        )
        .order(1)
        .defines(["Greeting"]),
    )
    .member(
        MemberDef::field::<Person, i64>("Age", ValueType::Int, |p| &p.age, |p| &mut p.age).order(2),
    )
    .member(MemberDef::new("Greeting", ValueType::String).getter(|p: &Person| {
        Value::from(p.name.as_ref().map(|name| format!("Hello, {name}")))
    }))
    .member(
        MemberDef::field::<Person, Option<String>>(
            "Nickname",
            ValueType::String,
            |p| &p.nickname,
            |p| &mut p.nickname,
        )
        .hidden_if_null(),
    )
    .member(
        MemberDef::field::<Person, Option<String>>(
            "Secret",
            ValueType::String,
            |p| &p.secret,
            |p| &mut p.secret,
        )
        .hidden(),
    )
    .member(MemberDef::field::<Person, Option<Object>>(
        "Address",
        ValueType::object("Address"),
        |p| &p.address,
        |p| &mut p.address,
    ))
    .member(
        MemberDef::field::<Person, Option<Object>>(
            "Badge",
            ValueType::object("Badge"),
            |p| &p.badge,
            |p| &mut p.badge,
        )
        .replace_on_update(),
    )
    .member(
        MemberDef::field::<Person, Value>("Extra", ValueType::Any, |p| &p.extra, |p| &mut p.extra)
            .skip_conditions(),
    )
    .member(
        MemberDef::field::<Person, i64>(
            "LegacyId",
            ValueType::Int,
            |p| &p.legacy_id,
            |p| &mut p.legacy_id,
        )
        .ignored(),
    )
}

fn point_from(arguments: Vec<Value>) -> resmeta_types::Result<Point> {
    let mut arguments = arguments.into_iter();
    Ok(Point {
        x: i64::from_value(arguments.next().unwrap_or_default())?,
        y: i64::from_value(arguments.next().unwrap_or_default())?,
        label: Option::<String>::from_value(arguments.next().unwrap_or_default())?,
    })
}

pub fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry
        .register(person_members(TypeDef::class("Person").constructor(Person::default)))
        .register(
            TypeDef::class("Address")
                .constructor(Address::default)
                .member(
                    MemberDef::field::<Address, Option<String>>(
                        "Street",
                        ValueType::String,
                        |a| &a.street,
                        |a| &mut a.street,
                    )
                    .order(2),
                )
                .member(
                    MemberDef::field::<Address, Option<String>>(
                        "City",
                        ValueType::String,
                        |a| &a.city,
                        |a| &mut a.city,
                    )
                    .order(1),
                )
                .member(MemberDef::field::<Address, Option<String>>(
                    "Zip",
                    ValueType::String,
                    |a| &a.zip,
                    |a| &mut a.zip,
                )),
        )
        .register(
            TypeDef::class("Badge")
                .constructor(Badge::default)
                .member(MemberDef::field::<Badge, Option<String>>(
                    "Label",
                    ValueType::String,
                    |b| &b.label,
                    |b| &mut b.label,
                )),
        )
        .register(
            TypeDef::class("Order")
                .constructor(Order::default)
                .member(
                    MemberDef::field::<Order, i64>(
                        "Quantity",
                        ValueType::Int,
                        |o| &o.quantity,
                        |o| &mut o.quantity,
                    )
                    .defines(["Totals.Amount"]),
                )
                .member(MemberDef::field::<Order, f64>(
                    "UnitPrice",
                    ValueType::Float,
                    |o| &o.unit_price,
                    |o| &mut o.unit_price,
                ))
                .member(
                    MemberDef::new("Totals", ValueType::object("Totals")).getter(|o: &Order| {
                        let amount = o.quantity as f64 * o.unit_price;
                        Value::Object(Object::new("Totals", Totals { amount }))
                    }),
                ),
        )
        .register(
            TypeDef::class("Totals").member(
                MemberDef::new("Amount", ValueType::Float).getter(|t: &Totals| t.amount.into()),
            ),
        )
        .register(
            TypeDef::class("Node")
                .constructor(Node::default)
                .member(MemberDef::field::<Node, Option<String>>(
                    "Name",
                    ValueType::String,
                    |n| &n.name,
                    |n| &mut n.name,
                ))
                .member(MemberDef::field::<Node, SharedList>(
                    "Children",
                    ValueType::list(ValueType::object("Node")),
                    |n| &n.children,
                    |n| &mut n.children,
                ))
                .member(MemberDef::field::<Node, Option<Object>>(
                    "Parent",
                    ValueType::object("Node"),
                    |n| &n.parent,
                    |n| &mut n.parent,
                )),
        )
        .register(
            TypeDef::class("Bag")
                .constructor(Bag::default)
                .dynamic_members::<Bag>(),
        )
        .register(
            TypeDef::class("Record")
                .constructor(Record::default)
                .member(MemberDef::field::<Record, i64>(
                    "Id",
                    ValueType::Int,
                    |r| &r.id,
                    |r| &mut r.id,
                ))
                .map_tail::<Record>(|r| &r.extras, |r| &mut r.extras),
        )
        .register(
            TypeDef::interface("INamed").member(MemberDef::new("DisplayName", ValueType::String)),
        )
        .register(
            TypeDef::class("Widget")
                .constructor(Widget::default)
                .attributes(TypeAttributes {
                    interface_surface: Some(TypeName::from("INamed")),
                    ..TypeAttributes::default()
                })
                .implements("INamed", [("DisplayName", "Label")])
                .member(MemberDef::field::<Widget, Option<String>>(
                    "Label",
                    ValueType::String,
                    |w| &w.label,
                    |w| &mut w.label,
                ))
                .member(MemberDef::field::<Widget, Option<String>>(
                    "Internal",
                    ValueType::String,
                    |w| &w.internal,
                    |w| &mut w.internal,
                )),
        )
        .register(
            TypeDef::class("Gadget")
                .constructor(Gadget::default)
                .extends("INamed")
                .member(MemberDef::field::<Gadget, Option<String>>(
                    "DisplayName",
                    ValueType::String,
                    |g| &g.display_name,
                    |g| &mut g.display_name,
                )),
        )
        .register(
            TypeDef::class("Resource").member(MemberDef::field::<Resource, Option<String>>(
                "Href",
                ValueType::String,
                |r| &r.href,
                |r| &mut r.href,
            )),
        )
        .register(
            TypeDef::class("Product")
                .constructor(Product::default)
                .base_embedded::<Product, Resource>(
                    "Resource",
                    |p| &p.resource,
                    |p| &mut p.resource,
                )
                .member(MemberDef::field::<Product, Option<String>>(
                    "Title",
                    ValueType::String,
                    |p| &p.title,
                    |p| &mut p.title,
                ))
                .member(MemberDef::field::<Product, f64>(
                    "Price",
                    ValueType::Float,
                    |p| &p.price,
                    |p| &mut p.price,
                ))
                .member(
                    MemberDef::new("Href", ValueType::String)
                        .getter(|p: &Product| Value::from(p.resource.href.clone())),
                ),
        )
        .register(
            TypeDef::class("Employee")
                .constructor(Employee::default)
                .base_embedded::<Employee, Person>("Person", |e| &e.person, |e| &mut e.person)
                .member(MemberDef::field::<Employee, Option<String>>(
                    "Company",
                    ValueType::String,
                    |e| &e.company,
                    |e| &mut e.company,
                )),
        )
        .register(
            TypeDef::class("PersonCard")
                .attributes(TypeAttributes {
                    view_of: Some(TypeName::from("Person")),
                    ..TypeAttributes::default()
                })
                .member(MemberDef::new("Initials", ValueType::String).getter(|p: &Person| {
                    Value::from(
                        p.name
                            .as_ref()
                            .and_then(|name| name.chars().next())
                            .map(String::from),
                    )
                })),
        )
        .register(
            TypeDef::class("Hidden")
                .attributes(TypeAttributes {
                    ignore_members: true,
                    ..TypeAttributes::default()
                })
                .member(MemberDef::new("Anything", ValueType::String)),
        )
        .register(
            TypeDef::class("Document")
                .constructor(Document::default)
                .member(MemberDef::field::<Document, Option<String>>(
                    "Title",
                    ValueType::String,
                    |d| &d.title,
                    |d| &mut d.title,
                ))
                .member(MemberDef::new("Body", ValueType::String).async_getter(
                    |object: Object| async move {
                        tokio::task::yield_now().await;
                        object
                            .with(|d: &Document| Value::from(d.body.clone()))
                            .unwrap_or_default()
                    },
                )),
        )
        .register(
            TypeDef::class("Point")
                .parameterized_constructor::<Point>(
                    vec![
                        ConstructorParameter::required("x", ValueType::Int),
                        ConstructorParameter::required("y", ValueType::Int),
                        ConstructorParameter::optional("label", ValueType::String),
                    ],
                    point_from,
                )
                .member(MemberDef::new("X", ValueType::Int).getter(|p: &Point| p.x.into()))
                .member(MemberDef::new("Y", ValueType::Int).getter(|p: &Point| p.y.into()))
                .member(MemberDef::field::<Point, Option<String>>(
                    "Label",
                    ValueType::String,
                    |p| &p.label,
                    |p| &mut p.label,
                )),
        )
        .register(
            TypeDef::class("Account")
                .constructor(Account::default)
                .member(
                    MemberDef::field::<Account, Option<String>>(
                        "acct_no",
                        ValueType::String,
                        |a| &a.number,
                        |a| &mut a.number,
                    )
                    .rename("Number"),
                )
                .member(
                    MemberDef::field::<Account, Option<Object>>(
                        "Owner",
                        ValueType::object("Person"),
                        |a| &a.owner,
                        |a| &mut a.owner,
                    )
                    .merge_onto_owner(),
                ),
        )
        .terminal_base("Resource");
    registry
}

/// Routes engine logs to the test harness. Set `RUST_LOG=resmeta_meta=trace` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn context() -> Arc<MetaContext> {
    context_with(MetaConfig::default())
}

pub fn context_with(config: MetaConfig) -> Arc<MetaContext> {
    init_tracing();
    MetaContext::new(registry(), config)
}

// ── Instances ────────────────────────────────────────────────────

pub fn person(name: &str, age: i64) -> Object {
    Object::new(
        "Person",
        Person {
            name: Some(name.to_string()),
            age,
            ..Person::default()
        },
    )
}

pub fn address(street: &str, city: &str) -> Object {
    Object::new(
        "Address",
        Address {
            street: Some(street.to_string()),
            city: Some(city.to_string()),
            zip: None,
        },
    )
}

pub fn person_at(name: &str, age: i64, home: Object) -> Object {
    let object = person(name, age);
    object.with_mut(|p: &mut Person| p.address = Some(home));
    object
}

pub fn employee(name: &str, age: i64, company: &str) -> Object {
    Object::new(
        "Employee",
        Employee {
            person: Person {
                name: Some(name.to_string()),
                age,
                ..Person::default()
            },
            company: Some(company.to_string()),
        },
    )
}

pub fn account(number: &str, owner: Option<Object>) -> Object {
    Object::new(
        "Account",
        Account {
            number: Some(number.to_string()),
            owner,
        },
    )
}

pub fn node(name: &str, children: Vec<Object>) -> Object {
    Object::new(
        "Node",
        Node {
            name: Some(name.to_string()),
            children: SharedList::from_vec(children.into_iter().map(Value::Object).collect()),
            parent: None,
        },
    )
}

pub fn bag(entries: &[(&str, Value)]) -> Object {
    Object::new(
        "Bag",
        Bag {
            values: entries
                .iter()
                .map(|(key, value)| ((*key).to_string(), value.clone()))
                .collect(),
        },
    )
}

pub fn record(id: i64, extras: &[(&str, Value)]) -> Object {
    Object::new(
        "Record",
        Record {
            id,
            extras: extras
                .iter()
                .map(|(key, value)| ((*key).to_string(), value.clone()))
                .collect(),
        },
    )
}

pub fn ty(name: &str) -> ValueType {
    ValueType::object(name)
}

pub fn name_of(object: &Object) -> Option<String> {
    object.with(|p: &Person| p.name.clone()).flatten()
}
