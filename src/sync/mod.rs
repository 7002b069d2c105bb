pub mod locks;
pub mod paths;
pub mod project;
pub mod structure;

pub use locks::ProjectLocks;
pub use project::{SyncOutcome, SyncRequest, synchronize};
