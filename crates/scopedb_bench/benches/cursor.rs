//! Cursor benchmarks: root commits, nested scopes and hooks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use scopedb_bench::{generate_rows, random_value};
use scopedb_core::{Config, Database};

fn memory_db() -> Database {
    Database::open_in_memory_with_config(Config::default().max_savepoints(128)).unwrap()
}

/// Benchmark root commits of a single write.
fn bench_single_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_commit");

    for size in [64, 256, 1024, 4096].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let db = memory_db();
            let value = random_value(size);
            let mut i = 0u64;

            b.iter(|| {
                i += 1;
                db.with_cursor(|cr| cr.put("bench", i.to_string(), black_box(value.clone())))
                    .unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark root commits of many writes.
fn bench_batch_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_commit");

    for batch_size in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &batch_size| {
                let db = memory_db();
                let rows = generate_rows(batch_size, 256);

                b.iter(|| {
                    db.with_cursor(|cr| {
                        for (key, value) in &rows {
                            cr.put("bench", key.as_str(), black_box(value.clone()))?;
                        }
                        Ok::<_, scopedb_core::CoreError>(())
                    })
                    .unwrap();
                });
            },
        );
    }
    group.finish();
}

/// Benchmark opening and releasing nested scopes down to a depth.
fn bench_nested_scopes(c: &mut Criterion) {
    let mut group = c.benchmark_group("nested_scopes");

    for depth in [1, 8, 32, 100].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(depth), depth, |b, &depth| {
            let db = memory_db();

            b.iter(|| {
                let mut root = db.cursor().unwrap();
                let mut stack = Vec::with_capacity(depth);
                for level in 0..depth {
                    let parent = stack.last_mut().unwrap_or(&mut root);
                    let mut child = parent.begin().unwrap();
                    child.put("bench", "k", level as i64).unwrap();
                    stack.push(child);
                }
                while let Some(mut child) = stack.pop() {
                    child.commit().unwrap();
                    child.close().unwrap();
                }
                black_box(root.get("bench", "k").unwrap());
                root.close().unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark reads that fall through several scopes to committed state.
fn bench_scoped_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("scoped_read");

    for depth in [1, 8, 32].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(depth), depth, |b, &depth| {
            let db = memory_db();
            db.with_cursor(|cr| cr.put("bench", "k", random_value(256))).unwrap();

            let mut root = db.cursor().unwrap();
            let mut stack = vec![root.begin().unwrap()];
            for _ in 1..depth {
                let child = stack.last_mut().unwrap().begin().unwrap();
                stack.push(child);
            }

            b.iter(|| {
                let value = stack.last().unwrap().get("bench", black_box("k")).unwrap();
                black_box(value);
            });

            while let Some(mut child) = stack.pop() {
                child.close().unwrap();
            }
            root.close().unwrap();
        });
    }
    group.finish();
}

/// Benchmark hook registration and firing on commit and close.
fn bench_hooks(c: &mut Criterion) {
    let mut group = c.benchmark_group("hooks");

    for count in [1, 16, 256].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let db = memory_db();

            b.iter(|| {
                let mut cr = db.cursor().unwrap();
                for i in 0..count {
                    cr.after("commit", move || {
                        black_box(i);
                    })
                    .unwrap();
                    cr.after("close", move || {
                        black_box(i);
                    })
                    .unwrap();
                }
                cr.commit().unwrap();
                cr.close().unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark statement execution through a cursor.
fn bench_execute(c: &mut Criterion) {
    let mut group = c.benchmark_group("execute");

    group.bench_function("put_get_positional", |b| {
        let db = memory_db();
        let mut cr = db.cursor().unwrap();
        let mut i = 0i64;

        b.iter(|| {
            i += 1;
            cr.execute("PUT res_partner %s %s", vec![i.into(), random_value(32)])
                .unwrap();
            let rows = cr.execute("GET res_partner %s", [i]).unwrap();
            black_box(rows);
        });
        cr.close().unwrap();
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_single_commit,
    bench_batch_commit,
    bench_nested_scopes,
    bench_scoped_read,
    bench_hooks,
    bench_execute,
);
criterion_main!(benches);
