use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The single stored OAuth credential set for the storage account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriveConnection {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub account_email: Option<String>,
    /// Parent folder under which project roots are created; `None` means
    /// the provider's own root.
    pub root_folder_id: Option<String>,
}

/// The slice of a project record this service reads and writes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectRecord {
    pub id: String,
    pub job_id: String,
    pub name: String,
    pub client: String,
    /// Nested budget document, stored verbatim as JSON text.
    pub budget: String,
    pub drive_root_folder_id: Option<String>,
}
