//! Resolution of slash-delimited relative paths to remote folder ids.
//!
//! Resolution walks one segment at a time, reusing an exact-name child
//! (case-sensitive) or creating it. Correct sequential use never creates
//! two same-named siblings; concurrent mutating use must be serialized per
//! project root by the caller (see [`crate::sync::locks`]).

use crate::drive::RemoteFolderClient;
use crate::error::SlateError;

/// Split a relative path into its non-empty segments. Leading, trailing,
/// and doubled slashes are tolerated; an empty path yields no segments and
/// resolves to the root itself.
pub fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Resolve `path` under `root_folder_id`, creating any missing segment.
/// Returns the folder id of the final segment.
pub async fn resolve_or_create<C>(
    client: &C,
    root_folder_id: &str,
    path: &str,
) -> Result<String, SlateError>
where
    C: RemoteFolderClient + ?Sized,
{
    let mut current = root_folder_id.to_string();
    for segment in split_segments(path) {
        let children = client.list_children(&current).await?;
        current = match children
            .iter()
            .find(|c| c.is_folder && c.name == segment)
        {
            Some(child) => child.id.clone(),
            None => client.create_folder(&current, segment).await?,
        };
    }
    Ok(current)
}

/// Same traversal, non-mutating. `None` as soon as any segment is missing.
pub async fn resolve_existing<C>(
    client: &C,
    root_folder_id: &str,
    path: &str,
) -> Result<Option<String>, SlateError>
where
    C: RemoteFolderClient + ?Sized,
{
    let mut current = root_folder_id.to_string();
    for segment in split_segments(path) {
        let children = client.list_children(&current).await?;
        match children
            .iter()
            .find(|c| c.is_folder && c.name == segment)
        {
            Some(child) => current = child.id.clone(),
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

/// Non-mutating existence check for a path under a project root.
pub async fn exists<C>(client: &C, root_folder_id: &str, path: &str) -> Result<bool, SlateError>
where
    C: RemoteFolderClient + ?Sized,
{
    Ok(resolve_existing(client, root_folder_id, path).await?.is_some())
}
