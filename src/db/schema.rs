//! SQL DDL for initializing the service storage.
//! SQLite-first design; can be adapted for other RDBMS.

/// SQLite schema with:
/// - `drive_connection`: singleton row (`id` fixed to 1). The CHECK
///   constraints keep the row all-or-nothing: both tokens present and
///   non-empty, or no row at all.
/// - `projects`: the slice of the project record this service owns. The
///   nullable `drive_root_folder_id` is the per-project mapping; NULL means
///   "not yet synchronized".
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS drive_connection (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    access_token TEXT NOT NULL CHECK (length(access_token) > 0),
    refresh_token TEXT NOT NULL CHECK (length(refresh_token) > 0),
    expires_at TEXT NOT NULL, -- RFC3339
    account_email TEXT NULL,
    root_folder_id TEXT NULL
);

CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    job_id TEXT NOT NULL,
    name TEXT NOT NULL,
    client TEXT NOT NULL DEFAULT '',
    budget TEXT NOT NULL DEFAULT '{}', -- JSON document, serialized as text
    drive_root_folder_id TEXT NULL
);
"#;
