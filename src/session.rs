//! Persisted bearer credential, stored in a local native_db database so it
//! survives restarts.

use native_db::{Builder, Database, Models};
use once_cell::sync::OnceCell;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use crate::error::{MonitorError, Result};
use crate::models::CredentialLocal;

/// Key under which the bearer credential is stored.
pub const CREDENTIAL_KEY: &str = "token";

static MODELS: OnceCell<Models> = OnceCell::new();

fn models() -> Result<&'static Models> {
    MODELS.get_or_try_init(|| {
        let mut models = Models::new();
        models.define::<CredentialLocal>().map_err(storage_err)?;
        Ok(models)
    })
}

fn storage_err(e: impl std::fmt::Display) -> MonitorError {
    MonitorError::Storage(e.to_string())
}

pub struct SessionStore {
    database: Database<'static>,
    location: String,
    // Bumped on every set/clear so callers can tell which credential they used
    generation: AtomicU64,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("location", &self.location)
            .field("generation", &self.generation())
            .finish()
    }
}

impl SessionStore {
    /// Opens (or creates) the session database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let database = Builder::new().create(models()?, path).map_err(storage_err)?;
        info!("Opened session store at {}", path.display());
        Ok(Self {
            database,
            location: path.display().to_string(),
            generation: AtomicU64::new(0),
        })
    }

    /// Non-persistent store, for tests and throwaway sessions
    pub fn in_memory() -> Result<Self> {
        let database = Builder::new().create_in_memory(models()?).map_err(storage_err)?;
        Ok(Self {
            database,
            location: ":memory:".to_string(),
            generation: AtomicU64::new(0),
        })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Identifies the credential currently stored. Changes whenever it is replaced or cleared.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn get_credential(&self) -> Result<Option<String>> {
        let r = self.database.r_transaction().map_err(storage_err)?;
        let entry: Option<CredentialLocal> = r
            .get()
            .primary(CREDENTIAL_KEY.to_string())
            .map_err(storage_err)?;
        Ok(entry.map(|e| e.value).filter(|v| !v.is_empty()))
    }

    /// Replaces any stored credential
    pub fn set_credential(&self, credential: &str) -> Result<()> {
        if credential.trim().is_empty() {
            return Err(MonitorError::InvalidArgument(
                "credential must not be empty".to_string(),
            ));
        }

        let rw = self.database.rw_transaction().map_err(storage_err)?;
        let existing: Option<CredentialLocal> = rw
            .get()
            .primary(CREDENTIAL_KEY.to_string())
            .map_err(storage_err)?;
        if let Some(existing) = existing {
            rw.remove(existing).map_err(storage_err)?;
        }
        rw.insert(CredentialLocal::new(CREDENTIAL_KEY, credential))
            .map_err(storage_err)?;
        rw.commit().map_err(storage_err)?;
        self.generation.fetch_add(1, Ordering::SeqCst);

        debug!("Stored bearer credential");
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        let rw = self.database.rw_transaction().map_err(storage_err)?;
        let existing: Option<CredentialLocal> = rw
            .get()
            .primary(CREDENTIAL_KEY.to_string())
            .map_err(storage_err)?;
        if let Some(existing) = existing {
            rw.remove(existing).map_err(storage_err)?;
        }
        rw.commit().map_err(storage_err)?;
        self.generation.fetch_add(1, Ordering::SeqCst);

        debug!("Cleared bearer credential");
        Ok(())
    }
}
