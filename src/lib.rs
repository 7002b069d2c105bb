pub mod config;
pub mod db;
pub mod drive;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod share;
pub mod sync;

pub use error::SlateError;
pub use router::{SlateState, slatedrive_router};
pub use share::ShareTokenCodec;
