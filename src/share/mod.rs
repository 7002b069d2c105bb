pub mod token;

pub use token::{SharePayload, ShareTokenCodec, department_slug};
