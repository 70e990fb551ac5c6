//! Run-time error conditions.
//!
//! Only `BodyCountExceeded` is raised by the core itself; the other variants
//! come from building a scenario, the output collaborator and the init-file
//! reader.

use std::path::PathBuf;
use thiserror::Error;

use crate::configuration::validate::ConfigError;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("number of bodies ({live}) exceeded the maximum allowed ({max}); simulation stopped")]
    BodyCountExceeded { live: usize, max: usize },

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}, line {line}: {reason}")]
    InitFile { path: PathBuf, line: usize, reason: String },

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}
