pub mod authenticity;
pub mod client;
pub mod fields;
pub mod types;

pub use authenticity::*;
pub use client::*;
pub use fields::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("vision engine is not reachable at {0}")]
    Connection(String),

    #[error("vision request timed out after {0}s")]
    Timeout(u64),

    #[error("vision engine returned error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("response stream error: {0}")]
    Stream(String),
}
