use common::AggregateId;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{AccountService, CommandService, Money};
use event_store::InMemoryEventStore;

fn account_service(snapshot_interval: u64) -> AccountService<InMemoryEventStore> {
    AccountService::new(
        CommandService::new(InMemoryEventStore::new()).with_snapshot_interval(snapshot_interval),
    )
}

fn bench_open_account(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("domain/open_account", |b| {
        b.iter(|| {
            rt.block_on(async {
                let service = account_service(10);
                service
                    .open(AggregateId::generate(), "Bench", Money::from_cents(1_000), "TWD")
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_deposit(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = account_service(10);
    let id = AggregateId::new("ACC-BENCH");
    rt.block_on(async {
        service
            .open(id.clone(), "Bench", Money::zero(), "TWD")
            .await
            .unwrap()
    });

    c.bench_function("domain/deposit", |b| {
        b.iter(|| {
            rt.block_on(async {
                service
                    .deposit(&id, Money::from_cents(100), "bench")
                    .await
                    .unwrap();
            });
        });
    });
}

/// Loads an account with 100 events, with and without snapshots.
fn bench_load(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    for (name, interval) in [
        ("domain/load_100_events_replay", 0),
        ("domain/load_100_events_snapshot", 10),
    ] {
        let service = account_service(interval);
        let id = AggregateId::new("ACC-LOAD");
        rt.block_on(async {
            service
                .open(id.clone(), "Bench", Money::zero(), "TWD")
                .await
                .unwrap();
            for _ in 1..100 {
                service
                    .deposit(&id, Money::from_cents(100), "seed")
                    .await
                    .unwrap();
            }
        });

        c.bench_function(name, |b| {
            b.iter(|| {
                rt.block_on(async {
                    service.load(&id).await.unwrap();
                });
            });
        });
    }
}

criterion_group!(benches, bench_open_account, bench_deposit, bench_load);
criterion_main!(benches);
