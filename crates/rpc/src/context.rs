//! Application context - wires everything together

use std::path::{Path, PathBuf};
use std::sync::Arc;

use kycflow_core::KycConfig;
use kycflow_review::KycService;
use kycflow_store::SqliteStore;
use tracing::debug;

/// Application context - one store, one service, one data directory
pub struct AppContext {
    pub service: KycService,
    store: Arc<SqliteStore>,
    db_path: PathBuf,
    ledger_path: PathBuf,
}

impl AppContext {
    /// Open (or create) the data directory with the default config
    pub async fn new(data_path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        Self::with_config(data_path, KycConfig::default()).await
    }

    pub async fn with_config(
        data_path: impl AsRef<Path>,
        config: KycConfig,
    ) -> Result<Self, anyhow::Error> {
        let data_path = data_path.as_ref();
        let db_path = data_path.join("kyc.db");
        let ledger_path = data_path.join("audit").join("audit.jsonl");

        // Create directories
        std::fs::create_dir_all(data_path)?;

        let store = Arc::new(SqliteStore::open(&db_path).await?);
        let service = KycService::new(store.clone(), config);
        debug!(db = %db_path.display(), "Store opened");

        Ok(Self {
            service,
            store,
            db_path,
            ledger_path,
        })
    }

    /// Load the config file when given, defaults otherwise
    pub fn load_config(path: Option<&Path>) -> Result<KycConfig, anyhow::Error> {
        match path {
            Some(path) => Ok(KycConfig::from_file(path)?),
            None => Ok(KycConfig::default()),
        }
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// JSONL file the audit trail is exported to
    pub fn ledger_path(&self) -> &Path {
        &self.ledger_path
    }

    /// Release the SQLite connection
    pub async fn close(self) {
        self.store.close().await;
    }
}
