//! Wiring shared by every command that touches the queue.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use inventory_db::{Database, DbConfig, PendingQueue};
use inventory_sync::{
    HttpInventoryClient, HttpProber, InventoryRemote, ReachabilityProbe, SubmissionService,
    SyncConfig, SyncEngine,
};

/// Open database plus the services built on it.
pub struct App {
    pub config: SyncConfig,
    pub queue: PendingQueue,
    pub prober: Arc<dyn ReachabilityProbe>,
    pub remote: Arc<dyn InventoryRemote>,
    db: Database,
}

impl App {
    /// Loads config, opens the database and repairs the queue.
    pub async fn open(config_path: Option<PathBuf>) -> Result<Self> {
        let config = SyncConfig::load(config_path).context("loading configuration")?;

        let db_path = config
            .database_path()
            .context("could not determine a data directory; set INVENTORY_DB_PATH")?;
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        info!(?db_path, device_id = %config.device_id(), "Opening capture database");

        let db = Database::new(DbConfig::new(db_path))
            .await
            .context("opening capture database")?;

        let queue = PendingQueue::new(Arc::new(db.kv_store()));

        match queue.repair_duplicates().await {
            Ok(0) => {}
            Ok(removed) => info!(removed, "Startup repair removed duplicate captures"),
            Err(e) => warn!(error = %e, "Startup repair failed"),
        }

        let prober: Arc<dyn ReachabilityProbe> = Arc::new(HttpProber::new(&config.remote)?);
        let remote: Arc<dyn InventoryRemote> = Arc::new(HttpInventoryClient::new(&config.remote)?);

        Ok(App {
            config,
            queue,
            prober,
            remote,
            db,
        })
    }

    pub fn submission(&self) -> SubmissionService {
        SubmissionService::new(self.queue.clone(), self.remote.clone(), self.prober.clone())
    }

    pub fn engine(&self) -> SyncEngine {
        SyncEngine::new(
            self.queue.clone(),
            self.remote.clone(),
            self.prober.clone(),
            self.config.sync.pacing(),
        )
    }

    pub async fn close(&self) {
        self.db.close().await;
    }
}
