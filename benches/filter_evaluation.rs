use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use record_explorer::data::flattener::{all_field_paths, Flattener};
use record_explorer::data::record_set::RecordSet;
use record_explorer::data::value::Value;
use record_explorer::search::{Filter, FilterCache, FilterEngine, FilterOperator};
use std::sync::Arc;

fn create_test_data(rows: usize) -> RecordSet {
    let statuses = ["active", "inactive", "pending", "suspended"];
    let priorities = ["low", "medium", "high", "critical"];
    let cities = ["Lisbon", "Osaka", "Denver", "Nairobi", "Tallinn"];
    let tags = ["vip", "beta", "trial", "enterprise", "churn-risk"];

    let records = (0..rows)
        .map(|i| {
            Value::record([
                ("id", Value::from(format!("rec-{:06}", i))),
                ("status", Value::from(statuses[i % statuses.len()])),
                ("priority", Value::from(priorities[i % priorities.len()])),
                ("score", Value::from((i * 37) % 1000)),
                ("revenue", Value::from(((i * 7919) % 100_000) as f64 / 100.0)),
                (
                    "user",
                    Value::record([
                        ("name", Value::from(format!("User {}", i))),
                        ("email", Value::from(format!("user{}@example.com", i))),
                    ]),
                ),
                (
                    "geolocation",
                    Value::record([
                        ("city", Value::from(cities[i % cities.len()])),
                        (
                            "nearby",
                            Value::Seq(vec![
                                Value::record([("name", Value::from("Cafe"))]),
                                Value::record([("name", Value::from("Park"))]),
                            ]),
                        ),
                    ]),
                ),
                (
                    "tags",
                    Value::from(vec![tags[i % tags.len()], tags[(i / 3) % tags.len()]]),
                ),
                (
                    "preferences",
                    Value::Map(vec![
                        (Value::from("theme"), Value::from(if i % 2 == 0 { "dark" } else { "light" })),
                        (Value::from("locale"), Value::from("en-GB")),
                    ]),
                ),
            ])
        })
        .collect();

    RecordSet::from_values(records)
}

fn bench_structured_filters(c: &mut Criterion) {
    let mut group = c.benchmark_group("structured_filters");

    for size in [10_000, 50_000] {
        let records = create_test_data(size);
        let filters = vec![
            Filter::equals("status", "active"),
            Filter::new("score", FilterOperator::Greater, 500),
            Filter::contains("tags", "vip"),
        ];
        let engine = FilterEngine::compile(&filters, &[]);

        group.bench_with_input(BenchmarkId::from_parameter(size), &records, |b, records| {
            b.iter(|| black_box(engine.apply_indices(records.records())))
        });
    }

    group.finish();
}

fn bench_search_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("search_queries");
    let records = create_test_data(50_000);

    let queries = [
        ("fielded", "status:active score>500"),
        ("global", "osaka"),
        ("mixed", "priority=high dark user.email:example"),
        ("miss", "nothing-matches-this"),
    ];

    for (name, query) in queries {
        group.bench_function(name, |b| {
            b.iter(|| {
                let engine = FilterEngine::from_query(&[], black_box(query));
                black_box(engine.apply_indices(records.records()))
            })
        });
    }

    group.finish();
}

fn bench_cached_results(c: &mut Criterion) {
    let records = Arc::new(create_test_data(50_000));
    let filters = vec![Filter::equals("priority", "critical")];
    let mut cache = FilterCache::new();

    c.bench_function("filter_cache_hit", |b| {
        b.iter(|| black_box(cache.get_or_compute(&records, &filters, "vip")))
    });
}

fn bench_flattening(c: &mut Criterion) {
    let records = create_test_data(10_000);
    let flattener = Flattener::default();

    c.bench_function("flatten_record", |b| {
        let record = &records.records()[0];
        b.iter(|| black_box(flattener.flatten(record).len()))
    });

    c.bench_function("all_field_paths_10k", |b| {
        b.iter(|| black_box(all_field_paths(records.records(), &flattener)))
    });
}

criterion_group!(
    benches,
    bench_structured_filters,
    bench_search_queries,
    bench_cached_results,
    bench_flattening
);
criterion_main!(benches);
