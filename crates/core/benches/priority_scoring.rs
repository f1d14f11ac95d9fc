use std::sync::Arc;

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use repsync_core::offline_queue::{
    EnqueueOptions, ExecutionError, InMemoryOperationStore, ManualNetworkMonitor, NetworkQuality,
    NetworkRequirement, OfflineQueue, Operation, OperationCategory, OperationDescriptor,
    OperationExecutor, Priority, PriorityScorer, QueueConfig,
};

const NOW_MS: u64 = 1_700_000_000_000;

fn sample_operations(count: usize) -> Vec<Operation> {
    (0..count)
        .map(|idx| {
            let category = OperationCategory::ALL[idx % OperationCategory::ALL.len()];
            let descriptor = OperationDescriptor::new(category, "sync", vec![0_u8; (idx * 37) % 12_000])
                .with_priority([Priority::Low, Priority::Medium, Priority::High][idx % 3])
                .with_network_requirement(NetworkRequirement::Medium)
                .user_initiated(idx % 4 == 0);
            let created_at = NOW_MS - (idx as u64 % 900) * 1_000;
            Operation::new(format!("op-{idx:05}"), descriptor, 3, Vec::new(), created_at)
        })
        .collect()
}

struct NoopExecutor;

#[async_trait]
impl OperationExecutor for NoopExecutor {
    async fn execute(&self, _kind: &str, _payload: &[u8]) -> Result<(), ExecutionError> {
        Ok(())
    }
}

fn priority_scoring_benchmark(c: &mut Criterion) {
    let scorer = PriorityScorer::new();
    let operations = sample_operations(1_000);

    let mut group = c.benchmark_group("priority_scoring");
    group.sample_size(50);

    group.bench_function("score_1000", |b| {
        b.iter(|| {
            for op in &operations {
                black_box(scorer.score(op, NetworkQuality::Fair, NOW_MS));
            }
        });
    });

    group.bench_function("dispatch_order_1000", |b| {
        b.iter(|| {
            let mut batch = operations.clone();
            batch.sort_by(PriorityScorer::dispatch_order);
            black_box(batch);
        });
    });

    group.finish();
}

fn enqueue_and_drain_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("offline_queue");
    group.sample_size(20).measurement_time(std::time::Duration::from_secs(10));

    group.bench_function("enqueue_and_drain_100", |b| {
        let runtime = tokio::runtime::Runtime::new().expect("runtime");

        b.iter(|| {
            runtime.block_on(async {
                let queue = OfflineQueue::builder(
                    Arc::new(InMemoryOperationStore::new()),
                    Arc::new(ManualNetworkMonitor::new(NetworkQuality::Excellent)),
                )
                .config(QueueConfig::fast())
                .executor(OperationCategory::Analytics, Arc::new(NoopExecutor))
                .build()
                .unwrap();

                for idx in 0..100 {
                    let descriptor =
                        OperationDescriptor::new(OperationCategory::Analytics, "event", format!("{{\"n\":{idx}}}"));
                    queue.add_operation(descriptor, EnqueueOptions::default()).await.unwrap();
                }
                while queue.pending_count().await.unwrap() > 0 {
                    queue.run_cycle().await.unwrap();
                }
            });
        });
    });

    group.finish();
}

criterion_group!(core_benchmarks, priority_scoring_benchmark, enqueue_and_drain_benchmark);
criterion_main!(core_benchmarks);
