pub mod client;
pub mod oauth;

pub use client::{DriveClient, RemoteChild, RemoteFile, RemoteFolderClient, UploadedFile};
pub use oauth::TokenLifecycle;
