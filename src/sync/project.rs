//! Orchestration of one project's remote folder structure.

use std::collections::BTreeMap;

use tracing::info;

use crate::drive::RemoteFolderClient;
use crate::error::SlateError;
use crate::sync::paths;

/// Folders every project root carries regardless of budget contents.
pub const FIXED_FOLDERS: [&str; 5] = ["Contracts", "Call Sheets", "Team", "Cast", "Expenses"];

pub const TEAM_FOLDER: &str = "Team";
pub const CAST_FOLDER: &str = "Cast";
pub const EXPENSES_FOLDER: &str = "Expenses";

/// Everything `synchronize` needs; the caller extracts the member and cost
/// collections from the budget document and supplies the stored root, if
/// any. This component never touches the project store itself.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub job_id: String,
    pub name: String,
    pub client_name: String,
    pub team: Vec<String>,
    pub cast: Vec<String>,
    pub cost_items_by_department: BTreeMap<String, Vec<String>>,
    /// Reuse this root when set; create a fresh one when `None`.
    pub existing_root_id: Option<String>,
    /// Parent for newly created roots; provider root when `None`.
    pub parent_folder_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub root_id: String,
    pub recreated: bool,
}

/// Deterministic root folder name from the project's identifying fields.
pub fn root_folder_name(job_id: &str, name: &str, client_name: &str) -> String {
    [job_id, name, client_name]
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" - ")
}

/// The full set of relative paths the structure must contain. Two members
/// with the same name map to the same path and therefore share a folder;
/// that is ordinary path-segment reuse, not a defect.
fn required_paths(req: &SyncRequest) -> Vec<String> {
    let mut out: Vec<String> = FIXED_FOLDERS.iter().map(|f| f.to_string()).collect();
    for member in &req.team {
        if !member.trim().is_empty() {
            out.push(format!("{TEAM_FOLDER}/{}", member.trim()));
        }
    }
    for member in &req.cast {
        if !member.trim().is_empty() {
            out.push(format!("{CAST_FOLDER}/{}", member.trim()));
        }
    }
    for (department, items) in &req.cost_items_by_department {
        if !department.trim().is_empty() && !items.is_empty() {
            out.push(format!("{EXPENSES_FOLDER}/{}", department.trim()));
        }
    }
    out
}

/// Materialize the project's folder structure.
///
/// With a stored root the run is an additive reconciliation: every required
/// path is resolved (creating only what is missing), and folders for
/// removed members are left alone. Without one, a fresh root is created
/// first and `recreated` is reported back so the caller can persist the new
/// mapping.
///
/// Callers must hold the project's advisory lock for the duration.
pub async fn synchronize<C>(client: &C, req: &SyncRequest) -> Result<SyncOutcome, SlateError>
where
    C: RemoteFolderClient + ?Sized,
{
    let (root_id, recreated) = match &req.existing_root_id {
        Some(root) => (root.clone(), false),
        None => {
            let name = root_folder_name(&req.job_id, &req.name, &req.client_name);
            if name.is_empty() {
                return Err(SlateError::Validation(
                    "project has no usable fields for a root folder name".to_string(),
                ));
            }
            let parent = req.parent_folder_id.as_deref().unwrap_or("root");
            let id = client.create_folder(parent, &name).await?;
            (id, true)
        }
    };

    let paths = required_paths(req);
    for path in &paths {
        paths::resolve_or_create(client, &root_id, path).await?;
    }

    info!(
        root = %root_id,
        recreated,
        folders = paths.len(),
        "project structure synchronized"
    );
    Ok(SyncOutcome { root_id, recreated })
}
