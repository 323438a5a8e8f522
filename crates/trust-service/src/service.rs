//! Service wiring.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::info;

use trust_core::{
    BroadcastPublisher, EventPublisher, HashEngine, LedgerEvent, LedgerStore, MetricRecord,
    MetricsSink, ReputationStore, Result, TrustConfig, WatchdogStore,
};
use trust_reputation::ReputationScorer;
use trust_store::{MemoryStore, SqliteStore, SCHEMA_VERSION};
use trust_vector::{RollupBatcher, VectorLedger};
use trust_watchdog::Snapshotter;

/// Every component, built once over one store.
pub struct TrustService {
    /// Configuration the service was built from.
    config: TrustConfig,

    /// Hashing front-end shared by the ledger and the watchdog.
    engine: HashEngine,

    /// Metric storage, readable through `metric`.
    metrics: Arc<dyn MetricsSink>,

    /// Present when notifications go out over the broadcast bus.
    bus: Option<BroadcastPublisher>,

    ledger: Arc<VectorLedger>,
    rollups: Arc<RollupBatcher>,
    reputation: Arc<ReputationScorer>,
    watchdog: Arc<Snapshotter>,
}

impl TrustService {
    /// Open the SQLite database named in `config`, publishing on a broadcast bus.
    pub fn open(config: TrustConfig) -> Result<Self> {
        let bus = BroadcastPublisher::default();
        let mut service = Self::open_with_publisher(config, Arc::new(bus.clone()))?;
        service.bus = Some(bus);
        Ok(service)
    }

    /// Open the SQLite database named in `config` with a caller-supplied publisher.
    pub fn open_with_publisher(
        config: TrustConfig,
        publisher: Arc<dyn EventPublisher>,
    ) -> Result<Self> {
        info!("Opening trust ledger at {:?}", config.database.path);
        let store = Arc::new(SqliteStore::open_with_config(&config.database)?);
        Self::build(store, config, publisher)
    }

    /// Build over an in-memory store, publishing on a broadcast bus.
    pub fn in_memory(config: TrustConfig) -> Result<Self> {
        info!("Opening in-memory trust ledger");
        let bus = BroadcastPublisher::default();
        let mut service = Self::build(Arc::new(MemoryStore::new()), config, Arc::new(bus.clone()))?;
        service.bus = Some(bus);
        Ok(service)
    }

    fn build<S>(store: Arc<S>, config: TrustConfig, publisher: Arc<dyn EventPublisher>) -> Result<Self>
    where
        S: LedgerStore + ReputationStore + WatchdogStore + MetricsSink + 'static,
    {
        let engine = HashEngine::from_config(&config.hashing);
        let metrics: Arc<dyn MetricsSink> = store.clone();

        let ledger = VectorLedger::new(store.clone(), engine)
            .with_metrics(metrics.clone())
            .with_publisher(publisher.clone())
            .with_history_limit(config.ledger.history_limit);

        let rollups = RollupBatcher::new(store.clone())
            .with_metrics(metrics.clone())
            .with_publisher(publisher.clone());

        let reputation = ReputationScorer::new(store.clone(), config.reputation.clone())
            .with_metrics(metrics.clone())
            .with_publisher(publisher.clone());

        let watchdog = Snapshotter::new(store, engine, &config.watchdog)?
            .with_metrics(metrics.clone())
            .with_publisher(publisher);

        info!(
            "Trust ledger ready (hash {}, watching {:?})",
            engine.default_algorithm(),
            config.watchdog.root
        );

        Ok(Self {
            config,
            engine,
            metrics,
            bus: None,
            ledger: Arc::new(ledger),
            rollups: Arc::new(rollups),
            reputation: Arc::new(reputation),
            watchdog: Arc::new(watchdog),
        })
    }

    /// Get the service info.
    pub fn info(&self) -> ServiceInfo {
        ServiceInfo {
            name: "trust-ledger".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            schema_version: SCHEMA_VERSION,
            default_algorithm: self.engine.default_algorithm().name().to_string(),
            algorithms: HashEngine::supported_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn config(&self) -> &TrustConfig {
        &self.config
    }

    pub fn hash_engine(&self) -> HashEngine {
        self.engine
    }

    pub fn ledger(&self) -> Arc<VectorLedger> {
        self.ledger.clone()
    }

    pub fn rollups(&self) -> Arc<RollupBatcher> {
        self.rollups.clone()
    }

    pub fn reputation(&self) -> Arc<ReputationScorer> {
        self.reputation.clone()
    }

    pub fn watchdog(&self) -> Arc<Snapshotter> {
        self.watchdog.clone()
    }

    /// Subscribe to notifications, if they go out over the broadcast bus.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<LedgerEvent>> {
        self.bus.as_ref().map(BroadcastPublisher::subscribe)
    }

    /// Latest payload recorded under `metric_id`.
    pub async fn metric(&self, metric_id: &str) -> Result<Option<MetricRecord>> {
        self.metrics.get_metric(metric_id).await
    }
}

/// Service info.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub schema_version: u32,
    pub default_algorithm: String,
    pub algorithms: Vec<String>,
}
