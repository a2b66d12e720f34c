//! Term resolution benchmarks.
//!
//! Compares cached and uncached parsing, and measures evaluation of
//! declared and dynamic terms against the same object graph.

#[path = "../tests/common/mod.rs"]
mod common;

use common::{address, context, person_at, ty};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use resmeta_meta::BindingRule;
use resmeta_types::{PopulateSource, Value};

const KEYS: &[&str] = &["Name", "Address.City", "Address.Street"];

fn bench_parse(c: &mut Criterion) {
    let ctx = context();
    let root = ty("Person");
    let mut group = c.benchmark_group("term_parse");

    for key in KEYS {
        group.bench_with_input(BenchmarkId::new("uncached", key), key, |b, key| {
            b.iter(|| {
                ctx.terms()
                    .parse(&root, black_box(key), ".", BindingRule::OnlyDeclared, None)
            });
        });
        group.bench_with_input(BenchmarkId::new("cached", key), key, |b, key| {
            b.iter(|| {
                ctx.terms().make_or_get_cached_term(
                    &root,
                    black_box(key),
                    ".",
                    BindingRule::OnlyDeclared,
                )
            });
        });
    }
    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let ctx = context();
    let root = ty("Person");
    let target = Value::Object(person_at("Ann", 30, address("Main", "Oslo")));
    let mut group = c.benchmark_group("term_evaluate");

    for binding in [BindingRule::OnlyDeclared, BindingRule::DynamicWithDeclaredFallback] {
        let Ok(term) = ctx
            .terms()
            .make_or_get_cached_term(&root, "Address.City", ".", binding)
        else {
            continue;
        };
        group.bench_function(BenchmarkId::new("address_city", format!("{binding:?}")), |b| {
            b.iter(|| term.get_value_now(ctx.types(), black_box(&target)));
        });
    }
    group.finish();
}

fn bench_populate_compile(c: &mut Criterion) {
    let ctx = context();
    let Ok(source) = PopulateSource::from_json_str(
        r#"{"Name": "Ann", "Age": 30, "Address": {"City": "Oslo", "Street": "Main"}}"#,
    ) else {
        return;
    };

    c.bench_function("populator_compile", |b| {
        b.iter(|| ctx.populator(&ty("Person"), black_box(&source)));
    });
}

criterion_group!(benches, bench_parse, bench_evaluate, bench_populate_compile);
criterion_main!(benches);
