//! Gecko SDK operations through the SLC CLI
//!
//! - `ensure_trusted`: one-time SDK signature trust, recorded by a marker file
//! - `regenerate`: export the project configuration for a descriptor

mod generate;
mod trust;

pub use generate::{regenerate, GenerateRequest};
pub use trust::{ensure_trusted, TRUST_MARKER};

use std::path::PathBuf;

use crate::tool::ToolError;

/// SDK operation errors
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
