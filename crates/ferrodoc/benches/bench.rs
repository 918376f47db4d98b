use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use ferrodoc::{
    ClientPool, Executor, MessageStream, OutboundStream, RpcClient, Settings,
    ferrodoc_core::{Result, types::Method},
};
use futures::{StreamExt, future::join_all, stream};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::runtime::Builder;
use tonic::Request;

/// Answers every call immediately.
struct Echo;

impl RpcClient for Echo {
    async fn unary(&self, _method: Method, request: Request<Value>) -> Result<Value> {
        Ok(request.into_inner())
    }

    async fn server_streaming(&self, _method: Method, request: Request<Value>) -> Result<MessageStream> {
        Ok(stream::iter(vec![Ok(request.into_inner())]).boxed())
    }

    async fn streaming(&self, _method: Method, _request: Request<OutboundStream>) -> Result<MessageStream> {
        Ok(stream::empty().boxed())
    }
}

fn bench_pool(c: &mut Criterion) {
    let rt = Builder::new_multi_thread().enable_all().build().unwrap();

    for concurrency in [1usize, 100, 1_000] {
        let mut group = c.benchmark_group("pool/run");
        group.throughput(Throughput::Elements(concurrency as u64));
        group.bench_function(format!("conc/{concurrency}"), |b| {
            let pool = Arc::new(ClientPool::new(100, || Echo));
            b.to_async(&rt).iter(|| {
                let pool = Arc::clone(&pool);
                async move {
                    let ops = (0..concurrency).map(|_| {
                        pool.run(|client| async move {
                            client
                                .unary(Method::Commit, Request::new(Value::Null))
                                .await
                        })
                    });
                    black_box(join_all(ops).await);
                }
            });
        });
        group.finish();
    }
}

fn bench_executor(c: &mut Criterion) {
    let rt = Builder::new_multi_thread().enable_all().build().unwrap();
    let executor = Arc::new(
        Executor::new(Settings::default().with_project_id("bench"), || Echo).unwrap(),
    );
    let payload = json!({
        "database": "projects/{{projectId}}/databases/(default)",
        "documents": ["projects/{{projectId}}/databases/(default)/documents/users/alice"],
    });

    let mut group = c.benchmark_group("executor");
    group.throughput(Throughput::Elements(1));
    group.bench_function("request", |b| {
        b.to_async(&rt).iter(|| {
            let executor = Arc::clone(&executor);
            let payload = payload.clone();
            async move {
                black_box(
                    executor
                        .request(Method::Commit, payload, true)
                        .await
                        .unwrap(),
                );
            }
        });
    });
    group.bench_function("read_stream", |b| {
        b.to_async(&rt).iter(|| {
            let executor = Arc::clone(&executor);
            let payload = payload.clone();
            async move {
                let session = executor
                    .read_stream(Method::BatchGetDocuments, payload, true)
                    .await
                    .unwrap();
                black_box(session.collect::<Vec<_>>().await);
            }
        });
    });
    group.finish();
}

criterion_group!(benches, bench_pool, bench_executor);
criterion_main!(benches);
