use std::sync::Arc;

use sheets::{Ledger, config::StoreConfig};

use super::{auth::SessionKeys, config::Config};

pub struct AppState {
    pub config: Config,
    pub ledger: Ledger,
    pub sessions: SessionKeys,
}

impl AppState {
    pub fn new() -> Arc<Self> {
        let config = Config::load();
        let ledger = StoreConfig::load()
            .ledger()
            .expect("Store misconfigured!");

        Self::with_ledger(config, ledger)
    }

    pub fn with_ledger(config: Config, ledger: Ledger) -> Arc<Self> {
        let sessions = SessionKeys::new(&config.session_secret, config.session_ttl_hours);

        Arc::new(Self {
            config,
            ledger,
            sessions,
        })
    }
}
