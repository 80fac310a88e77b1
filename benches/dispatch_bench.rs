//! 钩子分发与请求处理基准测试
//!
//! 使用 Criterion 框架进行性能测试，包括：
//! - 过滤器分发基准
//! - 重写规则解析基准
//! - 完整请求周期基准

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use plain_routes::router::{listener_fn, EventRegistry, HookRegistry};
use plain_routes::{
    CallbackBundle, PlainRoutes, RewriteRule, RewriteTable, RouterSettings, StaticTemplateLocator,
};
use serde_json::{json, Value};
use std::sync::Arc;

// ============================================================================
// 过滤器分发基准测试
// ============================================================================

fn filter_dispatch_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("filter_dispatch");

    for listeners in [1usize, 10, 100] {
        let registry = rt.block_on(async {
            let registry = HookRegistry::new();
            for i in 0..listeners {
                registry
                    .on(
                        "wp_title",
                        listener_fn(format!("l{}", i), |args| {
                            Ok(json!(format!("{}.", args[0].as_str().unwrap_or(""))))
                        }),
                        (i % 5) as i32,
                        1,
                    )
                    .await
                    .unwrap();
            }
            registry
        });

        group.throughput(Throughput::Elements(listeners as u64));
        group.bench_with_input(BenchmarkId::from_parameter(listeners), &registry, |b, registry| {
            b.to_async(&rt).iter(|| async {
                registry
                    .filter(None, "wp_title", black_box(Value::from("t")), vec![])
                    .await
                    .unwrap()
            });
        });
    }

    group.finish();
}

// ============================================================================
// 重写规则解析基准测试
// ============================================================================

fn rewrite_resolve_benchmark(c: &mut Criterion) {
    let rules: Vec<RewriteRule> = (0..200)
        .map(|i| RewriteRule::new(format!("section{}/([^/]+)/?$", i), format!("index.php?s{}=$matches[1]", i)))
        .collect();
    let table = RewriteTable::compile(rules).unwrap();

    let mut group = c.benchmark_group("rewrite_resolve");
    group.bench_function("first_rule", |b| {
        b.iter(|| table.resolve(black_box("/section0/boots/")))
    });
    group.bench_function("last_rule", |b| {
        b.iter(|| table.resolve(black_box("/section199/boots/")))
    });
    group.bench_function("no_match", |b| {
        b.iter(|| table.resolve(black_box("/elsewhere/a/b")))
    });
    group.finish();
}

// ============================================================================
// 完整请求周期基准测试
// ============================================================================

fn request_cycle_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let routes = rt.block_on(async {
        let settings = RouterSettings::builder().base_rule("^$", "index.php?").build();
        let routes = PlainRoutes::new(settings).await.unwrap();

        for i in 0..20 {
            let bundle = CallbackBundle::builder()
                .rewrite(format!("p={}", i))
                .on("wp_title", |_| Ok(json!("Shop")))
                .build()
                .unwrap();
            routes
                .add_route(&format!("shop{}(/)?", i), bundle, vec![format!("shop{}", i)])
                .await
                .unwrap();
        }

        routes
    });

    let templates = Arc::new(StaticTemplateLocator::new().with_template("stripe.php", "<form/>"));
    let stripe = rt.block_on(async {
        let registry = HookRegistry::new();
        plain_routes::Route::new(
            "stripe(/)?",
            CallbackBundle::builder().template("stripe.php").build().unwrap(),
            vec![],
        )
        .with_templates(templates)
        .register(&registry)
        .await
        .unwrap();
        registry
    });

    let mut group = c.benchmark_group("request_cycle");
    group.bench_function("matched_title_route", |b| {
        b.to_async(&rt)
            .iter(|| async { routes.handle(black_box("/shop7/")).await.unwrap() });
    });
    group.bench_function("unmatched", |b| {
        b.to_async(&rt)
            .iter(|| async { routes.handle(black_box("/")).await.unwrap() });
    });
    group.bench_function("template_halt", |b| {
        b.to_async(&rt).iter(|| async {
            let scope = stripe.fork("bench").await;
            let request = plain_routes::RequestState::new("/stripe", Some("stripe(/)?".to_string()));
            scope
                .emit(Some(&request), "parse_request", vec![json!("stripe(/)?")])
                .await
                .unwrap();
            scope
                .filter(Some(&request), "template", json!("index.php"), vec![])
                .await
                .unwrap()
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    filter_dispatch_benchmark,
    rewrite_resolve_benchmark,
    request_cycle_benchmark
);
criterion_main!(benches);
