//! HTTP API server with observability for the event-sourcing system.
//!
//! Provides REST endpoints for the account ledger, insurance claims, orders
//! and the sagas that span them, with structured logging (tracing) and Prometheus
//! metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::{
    ACCOUNT_STREAM, AccountService, CLAIM_STREAM, ClaimService, CommandService,
    InMemoryPolicyStore, ORDER_STREAM, OrderService, PolicyRegistry, PolicyService, Projection,
    ProjectionError,
};
use event_store::{ChangeFeed, CheckpointStore, EventStore, SnapshotStore};
use metrics_exporter_prometheus::PrometheusHandle;
use projections::{
    AccountSummaryView, ChangeFeedListener, ClaimDashboardView, ClaimStatisticsView, Deduplicated,
    ListenerHandle, OrderDashboardView, ProjectionProcessor, SalesStatisticsView,
    TransactionLedgerView, TransferNotificationView,
};
use saga::{
    FulfillmentSaga, InMemoryInventoryService, InMemoryPaymentService, SagaLogRepository,
    SagaOrchestrator, SettlementSaga, TransferSaga,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// Checkpoint name of the transfer notification listener.
pub const NOTIFICATION_CHECKPOINT: &str = "transfer_notifications";

/// Shared application state accessible from all handlers.
pub struct AppState<S: EventStore + SnapshotStore> {
    pub store: S,
    pub accounts: Arc<AccountService<S>>,
    pub claims: Arc<ClaimService<S>>,
    pub orders: Arc<OrderService<S>>,
    pub policies: PolicyService,
    pub inventory: InMemoryInventoryService,
    pub payments: InMemoryPaymentService,
    pub orchestrator: SagaOrchestrator,
    pub transfers: TransferSaga<S>,
    pub settlements: SettlementSaga<S>,
    pub fulfillments: FulfillmentSaga<S>,
    pub account_summary: AccountSummaryView,
    pub ledger: TransactionLedgerView,
    pub transfer_notifications: TransferNotificationView,
    pub claim_dashboard: ClaimDashboardView,
    pub claim_statistics: ClaimStatisticsView,
    pub order_dashboard: OrderDashboardView,
    pub sales_statistics: SalesStatisticsView,
    notification_projector: Arc<dyn Projection>,
    async_projections: bool,
}

/// Events replayed per stream by [`AppState::rebuild_projections`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub account_events: u64,
    pub claim_events: u64,
    pub order_events: u64,
}

impl<S> AppState<S>
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    /// Wires services, views and sagas over one event store.
    ///
    /// Transfer notifications are projected on the command path unless
    /// `config.async_projections` is set, in which case they are left to
    /// [`start_notification_listener`](Self::start_notification_listener).
    pub fn new(store: S, saga_logs: Arc<dyn SagaLogRepository>, config: &Config) -> Self {
        let account_summary = AccountSummaryView::new();
        let ledger = TransactionLedgerView::new();
        let transfer_notifications = TransferNotificationView::new();
        let claim_dashboard = ClaimDashboardView::new();
        let claim_statistics = ClaimStatisticsView::new();
        let order_dashboard = OrderDashboardView::new();
        let sales_statistics = SalesStatisticsView::new();

        let notification_projector: Arc<dyn Projection> =
            Arc::new(Deduplicated::new(transfer_notifications.clone()));

        let mut account_commands = CommandService::new(store.clone())
            .with_snapshot_interval(config.snapshot_interval)
            .with_projection(Arc::new(account_summary.clone()))
            .with_projection(Arc::new(ledger.clone()));
        if !config.async_projections {
            account_commands = account_commands.with_projection(notification_projector.clone());
        }
        let accounts = Arc::new(AccountService::new(account_commands));

        let claims = Arc::new(ClaimService::new(
            CommandService::new(store.clone())
                .with_snapshot_interval(config.snapshot_interval)
                .with_projection(Arc::new(claim_dashboard.clone()))
                .with_projection(Arc::new(claim_statistics.clone())),
        ));

        let orders = Arc::new(OrderService::new(
            CommandService::new(store.clone())
                .with_snapshot_interval(config.snapshot_interval)
                .with_projection(Arc::new(order_dashboard.clone()))
                .with_projection(Arc::new(sales_statistics.clone())),
        ));

        let policies = PolicyService::new(
            Arc::new(InMemoryPolicyStore::new()),
            PolicyRegistry::with_defaults(),
        );

        let orchestrator = SagaOrchestrator::new(saga_logs);
        let transfers = TransferSaga::new(orchestrator.clone(), accounts.clone());
        let settlements = SettlementSaga::new(
            orchestrator.clone(),
            claims.clone(),
            policies.clone(),
            claim_dashboard.clone(),
            claim_statistics.clone(),
        );
        let inventory = InMemoryInventoryService::new();
        let payments = InMemoryPaymentService::new();
        let fulfillments = FulfillmentSaga::new(
            orchestrator.clone(),
            orders.clone(),
            Arc::new(inventory.clone()),
            Arc::new(payments.clone()),
            order_dashboard.clone(),
        );

        Self {
            store,
            accounts,
            claims,
            orders,
            policies,
            inventory,
            payments,
            orchestrator,
            transfers,
            settlements,
            fulfillments,
            account_summary,
            ledger,
            transfer_notifications,
            claim_dashboard,
            claim_statistics,
            order_dashboard,
            sales_statistics,
            notification_projector,
            async_projections: config.async_projections,
        }
    }

    /// Resets every read model and replays every stream from the store.
    pub async fn rebuild_projections(&self) -> Result<RebuildReport, ProjectionError> {
        let account_events = ProjectionProcessor::new(self.store.clone())
            .with_projection(Arc::new(self.account_summary.clone()))
            .with_projection(Arc::new(self.ledger.clone()))
            .with_projection(self.notification_projector.clone())
            .rebuild_all(ACCOUNT_STREAM)
            .await?;

        let claim_events = ProjectionProcessor::new(self.store.clone())
            .with_projection(Arc::new(self.claim_dashboard.clone()))
            .with_projection(Arc::new(self.claim_statistics.clone()))
            .rebuild_all(CLAIM_STREAM)
            .await?;

        let order_events = ProjectionProcessor::new(self.store.clone())
            .with_projection(Arc::new(self.order_dashboard.clone()))
            .with_projection(Arc::new(self.sales_statistics.clone()))
            .rebuild_all(ORDER_STREAM)
            .await?;

        Ok(RebuildReport {
            account_events,
            claim_events,
            order_events,
        })
    }
}

impl<S> AppState<S>
where
    S: EventStore + SnapshotStore + ChangeFeed + CheckpointStore + Clone + 'static,
{
    /// Starts the change-feed listener for transfer notifications when
    /// asynchronous projections are enabled. It resumes after the events it
    /// handled before the last shutdown.
    pub async fn start_notification_listener(
        &self,
    ) -> Result<Option<ListenerHandle>, ProjectionError> {
        if !self.async_projections {
            return Ok(None);
        }

        let handle = ChangeFeedListener::new(self.store.clone(), ACCOUNT_STREAM)
            .with_checkpoint(NOTIFICATION_CHECKPOINT)
            .with_projection(self.notification_projector.clone())
            .start()
            .await?;
        Ok(Some(handle))
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router
where
    S: EventStore + SnapshotStore + Clone + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/accounts", post(routes::accounts::open::<S>))
        .route("/accounts/top", get(routes::accounts::top::<S>))
        .route("/accounts/{id}", get(routes::accounts::get::<S>))
        .route("/accounts/{id}/deposit", post(routes::accounts::deposit::<S>))
        .route("/accounts/{id}/withdraw", post(routes::accounts::withdraw::<S>))
        .route("/accounts/{id}/interest", post(routes::accounts::interest::<S>))
        .route("/accounts/{id}/close", post(routes::accounts::close::<S>))
        .route("/accounts/{id}/ledger", get(routes::accounts::ledger::<S>))
        .route(
            "/accounts/{id}/notifications",
            get(routes::accounts::notifications::<S>),
        )
        .route("/transfers", post(routes::sagas::transfer::<S>))
        .route("/sagas/{id}", get(routes::sagas::get::<S>))
        .route("/claims", post(routes::claims::file::<S>))
        .route("/claims/{id}", get(routes::claims::get::<S>))
        .route(
            "/claims/{id}/investigate",
            post(routes::claims::investigate::<S>),
        )
        .route("/claims/{id}/assess", post(routes::claims::assess::<S>))
        .route("/claims/{id}/reject", post(routes::claims::reject::<S>))
        .route("/claims/{id}/settle", post(routes::claims::settle::<S>))
        .route(
            "/claims/statistics/{category}",
            get(routes::claims::statistics::<S>),
        )
        .route("/products", post(routes::orders::add_product::<S>))
        .route("/products/{id}", get(routes::orders::product::<S>))
        .route("/orders", post(routes::orders::place::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/fulfill", post(routes::orders::fulfill::<S>))
        .route("/orders/{id}/ship", post(routes::orders::ship::<S>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route(
            "/sales/statistics/{category}",
            get(routes::orders::statistics::<S>),
        )
        .route("/policies", post(routes::policies::register::<S>))
        .route("/policies/{id}", get(routes::policies::get::<S>))
        .route(
            "/projections/rebuild",
            post(routes::projections::rebuild::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
