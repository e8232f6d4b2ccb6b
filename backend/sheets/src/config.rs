use std::{
    env,
    fmt::Display,
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use tracing::{debug, error, info, warn};

use crate::{
    google::{GoogleSheets, ServiceAccount, SpreadsheetRef},
    ledger::{DEFAULT_ATTENDANCE_SHEET, DEFAULT_PAYMENTS_SHEET, Ledger, LedgerConfig},
    memory::MemoryGrid,
    store::{GridStore, StoreError},
};

pub const DEFAULT_SPREADSHEET_TITLE: &str = "Donz Hockey Main";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Sheets,
    Memory { fixture: Option<PathBuf> },
}

pub struct StoreConfig {
    pub backend: Backend,
    pub spreadsheet: SpreadsheetRef,
    pub credentials: Option<String>,
    pub ledger: LedgerConfig,
}

impl StoreConfig {
    pub fn load() -> Self {
        let backend = match try_load::<String>("STORE_BACKEND", "sheets").as_str() {
            "memory" => Backend::Memory {
                fixture: var("MEMORY_FIXTURE").map(PathBuf::from),
            },
            "sheets" => Backend::Sheets,
            other => {
                warn!("Unknown STORE_BACKEND {other}, using sheets");
                Backend::Sheets
            }
        };

        let spreadsheet = match var("SPREADSHEET_ID") {
            Some(id) => SpreadsheetRef::Id(id),
            None => SpreadsheetRef::Title(try_load("SPREADSHEET_TITLE", DEFAULT_SPREADSHEET_TITLE)),
        };

        Self {
            backend,
            spreadsheet,
            credentials: read_secret("GOOGLE_AUTH"),
            ledger: LedgerConfig {
                payments_sheet: try_load("PAYMENTS_SHEET", DEFAULT_PAYMENTS_SHEET),
                attendance_sheet: try_load("ATTENDANCE_SHEET", DEFAULT_ATTENDANCE_SHEET),
                call_timeout: Duration::from_millis(try_load("STORE_TIMEOUT_MS", "10000")),
            },
        }
    }

    /// Builds the store handle. Credential problems are logged and deferred to call time.
    pub fn connect(&self) -> Result<Arc<dyn GridStore>, StoreError> {
        match &self.backend {
            Backend::Memory { fixture } => {
                info!("Using in-memory grid store");
                let grid = match fixture {
                    Some(path) => MemoryGrid::from_fixture(path)?,
                    None => MemoryGrid::new(),
                };
                Ok(Arc::new(grid))
            }
            Backend::Sheets => {
                let credentials = self.credentials.as_deref().and_then(|raw| {
                    ServiceAccount::from_json(raw)
                        .map_err(|e| warn!("GOOGLE_AUTH unusable: {e}"))
                        .ok()
                });

                info!("Using Google Sheets store {:?}", self.spreadsheet);
                Ok(Arc::new(GoogleSheets::new(
                    credentials,
                    self.spreadsheet.clone(),
                    self.ledger.call_timeout,
                )))
            }
        }
    }

    pub fn ledger(&self) -> Result<Ledger, StoreError> {
        Ok(Ledger::new(self.connect()?, self.ledger.clone()))
    }
}

/// Value of an environment variable, with blank treated as unset.
pub fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Parses `key`, falling back to `default` when it is unset. Startup stops on a value that does not parse.
pub fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|| {
        debug!("{key} unset, defaulting to {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e| {
            error!("{key}={raw:?} rejected: {e}");
        })
        .expect("Rink configuration invalid!")
}

/// Reads `/run/secrets/<name>`, falling back to the environment variable of the same name.
pub fn read_secret(secret_name: &str) -> Option<String> {
    read_secret_from(Path::new("/run/secrets"), secret_name)
}

fn read_secret_from(dir: &Path, secret_name: &str) -> Option<String> {
    let path = dir.join(secret_name);

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| debug!("No secret file for {secret_name} ({e}), checking environment"))
        .ok()
        .filter(|s| !s.is_empty())
        .or_else(|| var(secret_name))
}
