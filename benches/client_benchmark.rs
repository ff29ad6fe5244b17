//! Benchmarks for the client against the in-process mock servers.
//!
//! Run benchmarks:
//! ```bash
//! cargo bench --bench client_benchmark
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kvbridge::testing::{MockCluster, MockServer};
use kvbridge::{key_slot, ClientBuilder, KvClient, TypedCache};
use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;

#[derive(Serialize, Deserialize)]
struct Payload {
    id: u64,
    tags: Vec<String>,
    body: String,
}

fn payload(size: usize) -> Payload {
    Payload {
        id: 42,
        tags: vec!["alpha".to_string(), "beta".to_string()],
        body: "x".repeat(size),
    }
}

fn standalone(rt: &Runtime) -> (MockServer, KvClient) {
    rt.block_on(async {
        let server = MockServer::start().await;
        let client = ClientBuilder::new()
            .servers(server.address())
            .build()
            .await
            .expect("failed to connect to mock server");
        (server, client)
    })
}

fn clustered(rt: &Runtime) -> (MockCluster, KvClient) {
    rt.block_on(async {
        let cluster = MockCluster::start(3).await;
        let client = ClientBuilder::new()
            .servers(cluster.addresses().join(","))
            .cluster(true)
            .build()
            .await
            .expect("failed to connect to mock cluster");
        (cluster, client)
    })
}

/// Benchmark: SET and GET with different value sizes, standalone vs cluster.
fn bench_set_get(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (_server, standalone) = standalone(&rt);
    let (_cluster, clustered) = clustered(&rt);

    let mut group = c.benchmark_group("set_get");
    for size in [64, 1024, 16384].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        for (mode, client) in [("standalone", &standalone), ("cluster", &clustered)] {
            let value = "x".repeat(*size);
            let key = format!("bench:set:{}", size);
            group.bench_with_input(BenchmarkId::new(mode, size), size, |b, _| {
                b.to_async(&rt).iter(|| async {
                    client.set(black_box(&key), black_box(&value)).await.expect("SET failed");
                    client.get(black_box(&key)).await.expect("GET failed");
                });
            });
        }
    }
    group.finish();
}

/// Benchmark: list push and pop round trip.
fn bench_list_queue(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (_server, client) = standalone(&rt);

    c.bench_function("rpush_blpop", |b| {
        b.to_async(&rt).iter(|| async {
            client.rpush("bench:queue", &["job"]).await.expect("RPUSH failed");
            client.blpop("bench:queue", 1).await.expect("BLPOP failed");
        });
    });
}

/// Benchmark: typed cache encode + store + load + decode.
fn bench_typed_cache(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (_server, client) = standalone(&rt);
    let cache = TypedCache::new(client);

    let mut group = c.benchmark_group("typed_cache");
    for size in [64, 4096].iter() {
        let value = payload(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.to_async(&rt).iter(|| async {
                cache.set("bench:typed", black_box(&value)).await.expect("set failed");
                let _: Option<Payload> = cache.get("bench:typed").await.expect("get failed");
            });
        });
    }
    group.finish();
}

/// Benchmark: Slot calculation.
fn bench_slot_calculation(c: &mut Criterion) {
    let mut group = c.benchmark_group("slot_calculation");

    group.bench_function("short_key", |b| {
        b.iter(|| key_slot(black_box("key")));
    });

    group.bench_function("long_key", |b| {
        let key = "a".repeat(100);
        b.iter(|| key_slot(black_box(&key)));
    });

    group.bench_function("hash_tag", |b| {
        b.iter(|| key_slot(black_box("user:{12345}:profile")));
    });

    group.finish();
}

/// Benchmark: Concurrent operations sharing one client.
fn bench_concurrent_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_operations");
    let rt = Runtime::new().unwrap();
    let (_cluster, client) = clustered(&rt);

    for num_tasks in [1, 10, 50].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(num_tasks),
            num_tasks,
            |b, &num_tasks| {
                b.to_async(&rt).iter(|| async {
                    let mut handles = vec![];

                    for i in 0..num_tasks {
                        let client = client.clone();
                        handles.push(tokio::spawn(async move {
                            let key = format!("bench:concurrent:{}", i);
                            client.set(&key, "value").await?;
                            client.get(&key).await?;
                            client.del(&key).await?;
                            Ok::<_, kvbridge::Error>(())
                        }));
                    }

                    for handle in handles {
                        handle.await.unwrap().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_set_get,
    bench_list_queue,
    bench_typed_cache,
    bench_slot_calculation,
    bench_concurrent_operations
);

criterion_main!(benches);
