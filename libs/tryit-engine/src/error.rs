use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Infrastructure failures only.
///
/// A user's broken program is never an `EngineError` - compile errors,
/// runtime errors, timeouts, and output overflows are reported as data in
/// the response payloads. These variants cover the cases where the service
/// itself cannot do its job and the HTTP layer must answer with a 5xx.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("language '{0}' is not configured")]
    UnknownLanguage(String),

    #[error("invalid language configuration: {0}")]
    Config(String),

    #[error("failed to prepare workspace at {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no usable Python interpreter found on this host")]
    InterpreterNotFound,

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to supervise child process: {0}")]
    Supervise(#[source] io::Error),

    #[error("trace hook produced invalid JSON: {0}")]
    Trace(#[source] serde_json::Error),
}
