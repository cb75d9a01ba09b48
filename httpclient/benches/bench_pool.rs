//! Benchmarks for the connection pool and request/response engine.
//!
//! Measures single-request latency against a local fixture server under
//! keep-alive reuse, and throughput as concurrent fan-out scales, matching
//! the workload this client targets: many in-flight requests against a
//! small set of hosts.
//!
//! ## Run
//! ```bash
//! cargo bench --bench bench_pool
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use httpclient::{RequestOptions, Session};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok";

/// Accepts connections in a loop, replying `RESPONSE` to every request read
/// off each connection, so the client's pool can keep reusing sockets for
/// the duration of a benchmark group.
async fn start_fixture() -> (tokio::task::JoinHandle<()>, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let task = tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else { break };
            tokio::spawn(async move {
                let mut raw = Vec::new();
                let mut byte = [0u8; 1];
                loop {
                    raw.clear();
                    loop {
                        match stream.read(&mut byte).await {
                            Ok(0) | Err(_) => return,
                            Ok(_) => raw.push(byte[0]),
                        }
                        if raw.ends_with(b"\r\n\r\n") {
                            break;
                        }
                    }
                    if stream.write_all(RESPONSE).await.is_err() {
                        return;
                    }
                }
            });
        }
    });

    (task, addr)
}

fn bench_sequential_keep_alive(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (fixture_task, addr) = rt.block_on(start_fixture());
    let url = format!("http://{addr}/");
    let session = Arc::new(Session::new());

    let mut group = c.benchmark_group("sequential_keep_alive");
    group.sample_size(50);
    group.measurement_time(Duration::from_secs(10));
    group.throughput(Throughput::Elements(1));

    group.bench_function("single_request_pooled_connection", |b| {
        let session = session.clone();
        let url = url.clone();
        b.iter(|| {
            rt.block_on(async {
                let response = session.get(&url, RequestOptions::new()).await.expect("request failed");
                assert_eq!(response.status_code(), 200);
            })
        })
    });

    group.finish();
    rt.block_on(session.close());
    fixture_task.abort();
}

fn bench_concurrent_fan_out(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (fixture_task, addr) = rt.block_on(start_fixture());
    let url = format!("http://{addr}/");
    let session = Arc::new(Session::new());

    let mut group = c.benchmark_group("concurrent_fan_out");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(10));

    for concurrency in [1usize, 10, 50].iter() {
        group.throughput(Throughput::Elements(*concurrency as u64));
        group.bench_with_input(
            BenchmarkId::new("bulk_get", concurrency),
            concurrency,
            |b, &n| {
                let urls: Vec<&str> = std::iter::repeat(url.as_str()).take(n).collect();
                b.iter(|| {
                    rt.block_on(async {
                        let results = session.bulk_get(&urls).await;
                        assert!(results.iter().all(|r| r.is_ok()));
                    })
                })
            },
        );
    }

    group.finish();
    rt.block_on(session.close());
    fixture_task.abort();
}

criterion_group!(pool_benches, bench_sequential_keep_alive, bench_concurrent_fan_out);
criterion_main!(pool_benches);
