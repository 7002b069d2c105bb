//! Shared test support: an in-memory recording implementation of the
//! remote folder contract.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use slatedrive::drive::{RemoteChild, RemoteFile, RemoteFolderClient, UploadedFile};
use slatedrive::error::SlateError;

#[derive(Default)]
struct Tree {
    children: HashMap<String, Vec<RemoteChild>>,
    next_id: usize,
}

/// Remote folder double that records every create/upload call.
#[derive(Default)]
pub struct RecordingDrive {
    tree: Mutex<Tree>,
    create_calls: AtomicUsize,
    upload_calls: AtomicUsize,
}

impl RecordingDrive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    /// How many same-named children `parent` has; duplicate siblings are
    /// exactly what the advisory lock must prevent.
    pub fn children_named(&self, parent: &str, name: &str) -> usize {
        let tree = self.tree.lock().unwrap();
        tree.children
            .get(parent)
            .map(|entries| entries.iter().filter(|c| c.name == name).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl RemoteFolderClient for RecordingDrive {
    async fn list_children(&self, folder_id: &str) -> Result<Vec<RemoteChild>, SlateError> {
        let tree = self.tree.lock().unwrap();
        Ok(tree.children.get(folder_id).cloned().unwrap_or_default())
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<String, SlateError> {
        // Yield between observe and mutate so an unserialized race would
        // actually manifest as duplicate siblings.
        tokio::task::yield_now().await;
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut tree = self.tree.lock().unwrap();
        tree.next_id += 1;
        let id = format!("folder-{}", tree.next_id);
        tree.children
            .entry(parent_id.to_string())
            .or_default()
            .push(RemoteChild {
                id: id.clone(),
                name: name.to_string(),
                is_folder: true,
            });
        Ok(id)
    }

    async fn upload_file(
        &self,
        parent_id: &str,
        name: &str,
        _mime_type: &str,
        _bytes: Vec<u8>,
    ) -> Result<UploadedFile, SlateError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let mut tree = self.tree.lock().unwrap();
        tree.next_id += 1;
        let id = format!("file-{}", tree.next_id);
        tree.children
            .entry(parent_id.to_string())
            .or_default()
            .push(RemoteChild {
                id: id.clone(),
                name: name.to_string(),
                is_folder: false,
            });
        Ok(UploadedFile {
            id,
            view_url: Some(format!("https://files.example/{name}")),
        })
    }

    async fn list_files(&self, folder_id: &str) -> Result<Vec<RemoteFile>, SlateError> {
        let tree = self.tree.lock().unwrap();
        Ok(tree
            .children
            .get(folder_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|c| !c.is_folder)
                    .map(|c| RemoteFile {
                        id: c.id.clone(),
                        name: c.name.clone(),
                        view_url: None,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}
