//! Application context - dependency injection container

use std::sync::Arc;

use fieldvisit_core::{
    Clock, LocalDurableStore, ManualSyncHandle, RemoteVisitService, SyncObserver,
    SyncOrchestrator, SyncSettings, SystemClock, VisitPorts, VisitService, VisitSettings,
};
use fieldvisit_domain::{
    CheckInRequest, CheckOutRequest, Config, Connectivity, DateRange, FieldVisitError,
    GeofenceAnchor, GpsFix, NewCustomer, NewCustomerDraft, Result, SyncOutcome,
    UnscheduledVisitRequest, VisitRecord,
};
use fieldvisit_infra::scheduling::{
    BackgroundSync, NetworkMonitor, NetworkMonitorConfig, SchedulerError, WatchConnectivity,
};
use fieldvisit_infra::{
    DbManager, HttpRemoteService, RecordLocks, SqliteAnchorRepository, SqliteCustomerRepository,
    SqliteDurableStore, SqliteScheduleCache, SqliteVisitRepository,
};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::adapters::PushedLocation;

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub visit_service: Arc<VisitService>,
    pub sync: Arc<SyncOrchestrator>,
    pub store: Arc<dyn LocalDurableStore>,
    /// Reachability feed the platform layer pushes into
    pub connectivity: Arc<WatchConnectivity>,
    /// Fixes reported by the positioning service
    pub location: Arc<PushedLocation>,
    monitor: Mutex<NetworkMonitor>,
}

impl AppContext {
    /// Create a context from the configuration found in the environment or
    /// on disk.
    pub fn new() -> Result<Self> {
        Self::new_with_config(fieldvisit_infra::config::load()?)
    }

    /// Create a context talking HTTP to `config.remote.base_url`.
    pub fn new_with_config(config: Config) -> Result<Self> {
        let remote =
            HttpRemoteService::from_config(&config.remote, config.sync.request_timeout())?;
        Self::with_remote(config, Arc::new(remote), Arc::new(SystemClock))
    }

    /// Create a context with an explicit remote service and clock.
    ///
    /// Tests and embedding hosts use this to swap the collaborators the
    /// store and state machine depend on.
    pub fn with_remote(
        config: Config,
        remote: Arc<dyn RemoteVisitService>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let db = Arc::new(DbManager::new(&config.database.path, config.database.pool_size)?);
        db.run_migrations()?;
        db.health_check()?;

        // One lock table so every writer of a record serializes on the same guard.
        let locks = RecordLocks::new();
        let schedule = Arc::new(SqliteScheduleCache::new(Arc::clone(&db)));
        let store: Arc<dyn LocalDurableStore> =
            Arc::new(SqliteDurableStore::new(Arc::clone(&db), locks.clone()));
        let location = Arc::new(PushedLocation::default());

        let ports = VisitPorts {
            visits: Arc::new(SqliteVisitRepository::new(Arc::clone(&db), locks.clone())),
            schedule: schedule.clone(),
            anchors: Arc::new(SqliteAnchorRepository::new(Arc::clone(&db), locks)),
            customers: Arc::new(SqliteCustomerRepository::new(Arc::clone(&db))),
            location: location.clone(),
            clock: Arc::clone(&clock),
        };
        let visit_service = Arc::new(VisitService::new(ports, VisitSettings::from_config(&config)));

        let sync = Arc::new(SyncOrchestrator::new(
            Arc::clone(&store),
            schedule,
            remote,
            clock,
            SyncSettings::from_config(&config),
        ));

        let connectivity = Arc::new(WatchConnectivity::new(Connectivity::Disconnected));
        let monitor = NetworkMonitor::new(
            Arc::clone(&sync) as Arc<dyn BackgroundSync>,
            connectivity.clone(),
            NetworkMonitorConfig::from_config(&config),
        );

        info!(db_path = %db.path().display(), "application context ready");

        Ok(Self {
            config,
            db,
            visit_service,
            sync,
            store,
            connectivity,
            location,
            monitor: Mutex::new(monitor),
        })
    }

    /// Run the initial full sync and arm background sync.
    ///
    /// The monitor is started whatever the sync outcome, so records left
    /// pending by a failed initial sync drain on the next reconnect.
    #[instrument(skip(self, observer))]
    pub async fn on_authenticated(
        &self,
        sales_rep_id: &str,
        observer: Arc<dyn SyncObserver>,
    ) -> Result<SyncOutcome> {
        let outcome = self.sync.initial_full_sync(sales_rep_id, observer).await;
        if let Err(err) = &outcome {
            warn!(error = %err, label = err.label(), "initial sync failed");
        }

        self.start_background_sync().await?;
        outcome
    }

    pub async fn get_unified_visit_list(&self, range: &DateRange) -> Result<Vec<VisitRecord>> {
        self.visit_service.unified_visit_list(range).await
    }

    pub async fn check_in(&self, request: CheckInRequest) -> Result<VisitRecord> {
        self.visit_service.check_in(request).await
    }

    pub async fn check_out(&self, request: CheckOutRequest) -> Result<VisitRecord> {
        self.visit_service.check_out(request).await
    }

    pub async fn start_unscheduled_visit(
        &self,
        request: UnscheduledVisitRequest,
    ) -> Result<VisitRecord> {
        self.visit_service.start_unscheduled_visit(request).await
    }

    pub async fn register_customer(&self, draft: NewCustomerDraft) -> Result<NewCustomer> {
        self.visit_service.register_customer(draft).await
    }

    pub async fn save_geofence_anchor(
        &self,
        customer_code: &str,
        fix: Option<GpsFix>,
    ) -> Result<GeofenceAnchor> {
        self.visit_service.save_geofence_anchor(customer_code, fix).await
    }

    /// Start a user-requested drain; progress streams on the handle.
    pub fn trigger_manual_sync(&self) -> ManualSyncHandle {
        self.sync.trigger_manual_sync()
    }

    /// Records not yet acknowledged by the remote, rejected ones included.
    pub async fn pending_count(&self) -> Result<usize> {
        self.store.count_pending().await
    }

    pub fn set_connectivity(&self, state: Connectivity) {
        self.connectivity.set(state);
    }

    pub fn publish_fix(&self, fix: GpsFix) {
        self.location.publish(fix);
    }

    /// Start the network monitor unless background sync is disabled.
    pub async fn start_background_sync(&self) -> Result<()> {
        if !self.config.sync.enabled {
            debug!("background sync disabled by configuration");
            return Ok(());
        }

        match self.monitor.lock().await.start() {
            Ok(()) | Err(SchedulerError::AlreadyRunning) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn stop_background_sync(&self) -> Result<()> {
        match self.monitor.lock().await.stop().await {
            Ok(()) | Err(SchedulerError::NotRunning) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn is_background_sync_running(&self) -> bool {
        self.monitor.lock().await.is_running()
    }

    /// Stop background work.
    ///
    /// A sync session already in flight is left to finish; every record it
    /// acknowledges is committed on its own.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<()> {
        info!("shutdown called on AppContext");
        self.stop_background_sync().await?;

        if self.sync.is_running() {
            info!("sync session still running, it completes on its own");
        }
        Ok(())
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("db_path", &self.db.path())
            .field("sync_running", &self.sync.is_running())
            .finish_non_exhaustive()
    }
}

/// Fail fast with a configuration error when no sales rep is configured.
pub fn require_sales_rep(config: &Config) -> Result<&str> {
    config
        .remote
        .sales_rep_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| FieldVisitError::Config("remote.sales_rep_id is not configured".into()))
}
