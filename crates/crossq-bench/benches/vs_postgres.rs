//! PostgreSQL target benchmarks.
//!
//! Requires:
//! - `--features postgres` flag
//! - `DATABASE_URL` environment variable
//!
//! Example: DATABASE_URL=postgres://localhost/crossq_bench cargo bench --bench vs_postgres --features postgres

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use crossq_bench::Workbench;
use crossq_core::config::{BenchConfig, Scale};
use crossq_proto::{DatabaseTarget, LogicalQuery, SchemaModel};

fn postgres_workbench() -> Option<Workbench> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let config = BenchConfig::new()
        .with_scale(Scale::Small)
        .with_postgres_url(url);
    let bench = Workbench::open(config).unwrap();
    bench.load_generated().unwrap();
    Some(bench)
}

fn bench_sql_targets(c: &mut Criterion) {
    let Some(mut bench) = postgres_workbench() else {
        eprintln!("DATABASE_URL not set, skipping postgres benchmarks");
        return;
    };

    let sql_targets = [
        DatabaseTarget::SqlJson,
        DatabaseTarget::DualityView,
        DatabaseTarget::Relational,
    ];
    for query in LogicalQuery::all() {
        let Some(params) = bench.sample_parameters(query, 1).unwrap().into_iter().next() else {
            continue;
        };
        let mut group = c.benchmark_group(format!("vs_postgres/{}", query.id));
        for model in SchemaModel::ALL {
            for target in sql_targets {
                let id = BenchmarkId::new(target.to_string(), model);
                group.bench_with_input(id, &params, |b, params| {
                    b.iter(|| {
                        let result = bench.run(query, model, target, params).unwrap();
                        black_box(result.len());
                    });
                });
            }
        }
        group.finish();
    }
}

criterion_group!(benches, bench_sql_targets);
criterion_main!(benches);
