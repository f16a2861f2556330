use std::sync::Arc;

use common::AggregateId;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{ACCOUNT_STREAM, AccountEvent, Event, Money, Projection};
use event_store::{EventEnvelope, EventStore, InMemoryEventStore, Version};
use projections::{AccountSummaryView, ProjectionProcessor, TransactionLedgerView};

fn envelope(id: &AggregateId, version: i64, event: AccountEvent) -> EventEnvelope {
    Event::new(id.clone(), Version::new(version), event)
        .to_envelope("BankAccount")
        .unwrap()
}

/// Populate a store with N accounts, each with an opening and two deposits.
async fn populate_store(store: &InMemoryEventStore, n: usize) {
    for i in 0..n {
        let id = AggregateId::new(format!("ACC-{i:05}"));
        let events = vec![
            envelope(
                &id,
                1,
                AccountEvent::AccountOpened {
                    account_holder: format!("Holder {i}"),
                    initial_balance: Money::from_cents(1_000),
                    currency: "TWD".to_string(),
                },
            ),
            envelope(
                &id,
                2,
                AccountEvent::FundsDeposited {
                    amount: Money::from_cents(i as i64),
                    description: "seed".to_string(),
                },
            ),
            envelope(
                &id,
                3,
                AccountEvent::FundsDeposited {
                    amount: Money::from_cents(250),
                    description: "seed".to_string(),
                },
            ),
        ];
        store.append_all(ACCOUNT_STREAM, events).await.unwrap();
    }
}

fn bench_rebuild(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    for accounts in [100, 1000] {
        let store = InMemoryEventStore::new();
        rt.block_on(populate_store(&store, accounts));

        let processor = ProjectionProcessor::new(store)
            .with_projection(Arc::new(AccountSummaryView::new()))
            .with_projection(Arc::new(TransactionLedgerView::new()));

        c.bench_function(
            &format!("projections/rebuild_{}_events", accounts * 3),
            |b| {
                b.iter(|| {
                    rt.block_on(async {
                        processor.rebuild_all(ACCOUNT_STREAM).await.unwrap();
                    });
                });
            },
        );
    }
}

fn bench_project_single_event(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let view = AccountSummaryView::new();
    let mut next: u64 = 0;

    c.bench_function("projections/project_opening", |b| {
        b.iter(|| {
            next += 1;
            let id = AggregateId::new(format!("ACC-{next}"));
            let event = envelope(
                &id,
                1,
                AccountEvent::AccountOpened {
                    account_holder: "Bench".to_string(),
                    initial_balance: Money::zero(),
                    currency: "TWD".to_string(),
                },
            );
            rt.block_on(async {
                view.project(&event).await.unwrap();
            });
        });
    });
}

fn bench_top_by_balance(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    let view = AccountSummaryView::new();

    rt.block_on(async {
        populate_store(&store, 1000).await;
        ProjectionProcessor::new(store)
            .with_projection(Arc::new(view.clone()))
            .rebuild_all(ACCOUNT_STREAM)
            .await
            .unwrap();
    });

    c.bench_function("projections/top_10_of_1000_accounts", |b| {
        b.iter(|| {
            rt.block_on(async {
                view.top_by_balance(10).await;
            });
        });
    });
}

criterion_group!(
    benches,
    bench_rebuild,
    bench_project_single_event,
    bench_top_by_balance,
);
criterion_main!(benches);
