use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A file persisted by the upload store. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StoredFile {
    /// Unique on-disk name, also the retrieval identifier
    pub generated_name: String,
    pub original_name: String,
    pub size_bytes: u64,
    pub storage_path: String,
    pub retrieval_url: String,
}

/// A directory entry under the storage root, as seen by the retention sweep
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub name: String,
    pub size_bytes: u64,
    pub modified: DateTime<Utc>,
}
