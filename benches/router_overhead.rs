//! Benchmarks for routing overhead.
//!
//! Measures the cost of walking the route table, of `next()`-chained middleware,
//! and of streaming a rendered element, relative to a bare axum router.

use axum::{Router as AxumRouter, body::Body, http::Request, routing::get};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use keywork::{Element, Env, Error, FetchEvent, HttpCorsConfig, KeyworkService, Next, Router, middleware};
use std::hint::black_box;
use tower::ServiceExt;

async fn hello(_event: FetchEvent) -> Result<&'static str, Error> {
    Ok("OK")
}

fn test_request(path: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(path)
        .body(Body::empty())
        .unwrap()
}

/// Baseline: a bare axum router with the same handler.
fn bench_bare_axum(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let router = AxumRouter::new().route("/", get(|| async { "OK" }));

    c.bench_function("bare_axum", |b| {
        b.to_async(&rt).iter(|| async {
            let response = router.clone().oneshot(test_request("/")).await.unwrap();
            black_box(response)
        })
    });
}

/// Cost of reaching the last entry of tables of increasing size.
fn bench_route_table_depth(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("route_table_depth");

    for depth in [1usize, 10, 50] {
        let mut router = Router::new();
        for i in 0..depth {
            router = router.get(format!("/route/{i}/:id"), hello);
        }
        let path = format!("/route/{}/42", depth - 1);

        group.bench_with_input(BenchmarkId::from_parameter(depth), &path, |b, path| {
            b.to_async(&rt).iter(|| async {
                let response = router.fetch(test_request(path), Env::default()).await;
                black_box(response)
            })
        });
    }
    group.finish();
}

/// Cost of pass-through middleware in front of a handler.
fn bench_middleware_chain(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("middleware_chain");

    for layers in [0usize, 1, 5] {
        let mut router = Router::new();
        for _ in 0..layers {
            router = router.middleware(|_event: FetchEvent, next: Next| async move { next.run().await });
        }
        let service = KeyworkService::new(router.get("/", hello), Env::default());

        group.bench_with_input(BenchmarkId::from_parameter(layers), &service, |b, service| {
            b.to_async(&rt).iter(|| async {
                let response = service.clone().oneshot(test_request("/")).await.unwrap();
                black_box(response)
            })
        });
    }

    let cors = Router::new()
        .middleware(middleware::cors(HttpCorsConfig::default()))
        .get("/", hello);
    group.bench_function("cors", |b| {
        b.to_async(&rt).iter(|| async {
            let response = cors.fetch(test_request("/"), Env::default()).await;
            black_box(response)
        })
    });
    group.finish();
}

/// Streaming SSR of a small page, body fully consumed.
fn bench_ssr_page(c: &mut Criterion) {
    use http_body_util::BodyExt;

    let rt = tokio::runtime::Runtime::new().unwrap();
    let router = Router::new().get("/", |_event: FetchEvent| async {
        let items = (0..20).map(|i| Element::node("li").child(Element::text(format!("Item {i}"))));
        Ok::<_, Error>(Element::node("ul").children(items))
    });

    c.bench_function("ssr_page", |b| {
        b.to_async(&rt).iter(|| async {
            let response = router.fetch(test_request("/"), Env::default()).await;
            let body = response.into_body().collect().await.unwrap().to_bytes();
            black_box(body)
        })
    });
}

criterion_group!(
    benches,
    bench_bare_axum,
    bench_route_table_depth,
    bench_middleware_chain,
    bench_ssr_page
);
criterion_main!(benches);
