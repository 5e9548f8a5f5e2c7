use std::{io, time::Duration};

use thiserror::Error;

/// Failure of one bounded external command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` timed out after {}s", .timeout.as_secs_f32())]
    Timeout { command: String, timeout: Duration },

    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },
}

#[derive(Debug, Error)]
pub enum ToggleError {
    #[error("no touchscreen device found")]
    NotFound,

    #[error("device query failed for {path}: {source}")]
    Query {
        path: String,
        #[source]
        source: CommandError,
    },

    #[error("listing {path} failed: {source}")]
    Listing {
        path: String,
        #[source]
        source: CommandError,
    },

    #[error("write to {path} failed: {source}")]
    Write {
        path: String,
        #[source]
        source: CommandError,
    },

    #[error("not an input event node: {0}")]
    BadDevicePath(String),
}
