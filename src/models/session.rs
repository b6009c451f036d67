use native_db::{native_db, ToKey};
use native_model::{native_model, Model};
use serde::{Deserialize, Serialize};

/// Persisted key/value entry of the local session database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[native_model(id = 1, version = 1)]
#[native_db]
pub struct CredentialLocal {
    #[primary_key]
    pub key: String,
    pub value: String,
    pub stored_at: String,
}

impl CredentialLocal {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
