use cachegraph::{
    to_value, value, DecodeContext, EncodeContext, ObjectMiddleware, Registry, Result,
    Serializable, Token, Value,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, PartialEq)]
struct Module {
    id: String,
    size: i64,
    dependencies: Vec<String>,
}

impl Serializable for Module {
    fn serialize(&self, ctx: &mut EncodeContext<'_>) -> Result<()> {
        ctx.write(self.id.as_str())?;
        ctx.write(self.size)?;
        ctx.write(self.dependencies.len())?;
        for dep in &self.dependencies {
            ctx.write(dep.as_str())?;
        }
        Ok(())
    }

    fn deserialize(ctx: &mut DecodeContext<'_>) -> Result<Self> {
        let id = ctx.read()?.expect_type()?;
        let size = ctx.read()?.expect_type()?;
        let len: usize = ctx.read()?.expect_type()?;
        let mut dependencies = Vec::new();
        for _ in 0..len {
            dependencies.push(ctx.read()?.expect_type()?);
        }
        Ok(Module {
            id,
            size,
            dependencies,
        })
    }
}

#[derive(Serialize)]
struct Stats {
    hash: String,
    time: u64,
    assets: Vec<String>,
}

fn middleware() -> ObjectMiddleware {
    let registry = Registry::new();
    registry
        .make_serializable::<Module>("bench", "Module")
        .unwrap_or_else(|e| panic!("register failed: {e}"));
    ObjectMiddleware::new(Arc::new(registry))
}

/// `count` modules that all depend on the same handful of files, so most
/// strings become back-references.
fn modules(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            Value::object(Module {
                id: format!("./src/module_{i}.js"),
                size: i as i64 * 100,
                dependencies: (0..4).map(|d| format!("./src/shared_{d}.js")).collect(),
            })
        })
        .collect()
}

fn encode(middleware: &ObjectMiddleware, values: &[Value]) -> Vec<Token> {
    middleware
        .serialize(values)
        .ok()
        .and_then(|s| s.into_tokens())
        .unwrap_or_default()
}

fn benchmark_serialize_plain(c: &mut Criterion) {
    let middleware = middleware();
    let graph = value!({
        "name": "bundle",
        "entry": ["./src/index.js", "./src/polyfills.js"],
        "output": { "path": "dist", "clean": true },
        "cache": null
    });
    let roots = vec![graph];

    c.bench_function("serialize_plain_record", |b| {
        b.iter(|| middleware.serialize(black_box(&roots)))
    });
}

fn benchmark_deserialize_plain(c: &mut Criterion) {
    let middleware = middleware();
    let roots = vec![value!({
        "name": "bundle",
        "entry": ["./src/index.js", "./src/polyfills.js"],
        "output": { "path": "dist", "clean": true }
    })];
    let tokens = encode(&middleware, &roots);

    c.bench_function("deserialize_plain_record", |b| {
        b.iter(|| middleware.deserialize(black_box(tokens.clone())))
    });
}

fn benchmark_serialize_modules(c: &mut Criterion) {
    let middleware = middleware();
    let mut group = c.benchmark_group("serialize_modules");

    for size in [10, 100, 1000].iter() {
        let roots = modules(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &roots, |b, roots| {
            b.iter(|| middleware.serialize(black_box(roots)))
        });
    }

    group.finish();
}

fn benchmark_deserialize_modules(c: &mut Criterion) {
    let middleware = middleware();
    let mut group = c.benchmark_group("deserialize_modules");

    for size in [10, 100, 1000].iter() {
        let tokens = encode(&middleware, &modules(*size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &tokens, |b, tokens| {
            b.iter(|| middleware.deserialize(black_box(tokens.clone())))
        });
    }

    group.finish();
}

fn benchmark_shared_references(c: &mut Criterion) {
    let middleware = middleware();
    let shared = modules(1).remove(0);
    let roots: Vec<Value> = std::iter::repeat(shared).take(500).collect();

    c.bench_function("serialize_shared_object_x500", |b| {
        b.iter(|| middleware.serialize(black_box(&roots)))
    });
}

fn benchmark_serde_bridge(c: &mut Criterion) {
    let stats = Stats {
        hash: "8f2a1c".to_string(),
        time: 1234,
        assets: (0..50).map(|i| format!("chunk_{i}.js")).collect(),
    };

    c.bench_function("to_value_stats", |b| b.iter(|| to_value(black_box(&stats))));
}

criterion_group!(
    benches,
    benchmark_serialize_plain,
    benchmark_deserialize_plain,
    benchmark_serialize_modules,
    benchmark_deserialize_modules,
    benchmark_shared_references,
    benchmark_serde_bridge
);
criterion_main!(benches);
