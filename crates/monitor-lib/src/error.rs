//! Error taxonomy for the monitor
//!
//! Each failure class maps to one handling policy in the poll loop:
//! - [`SourceError`] aborts the current tick and is retried next tick
//! - [`DeliveryError`] is logged and dropped
//! - [`CounterError`] degrades a single identity to "no data"
//! - [`InitError`] terminates the process

use std::path::PathBuf;
use thiserror::Error;

/// A metric source could not be queried (SourceUnavailable)
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {detail}")]
    Parse { path: PathBuf, detail: String },

    #[error("container runtime request {path} failed: {detail}")]
    Runtime { path: String, detail: String },

    #[error("container runtime returned HTTP {status} for {path}")]
    RuntimeStatus { path: String, status: u16 },

    #[error("metric source task failed: {0}")]
    Task(String),
}

impl SourceError {
    /// Short name of the source that failed, used as a log and metric label
    pub fn source_name(&self) -> &'static str {
        match self {
            SourceError::Read { .. } | SourceError::Parse { .. } => "procfs",
            SourceError::Runtime { .. } | SourceError::RuntimeStatus { .. } => "container_runtime",
            SourceError::Task(_) => "task",
        }
    }
}

/// Webhook delivery failed (TransientDeliveryFailure)
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to send POST to {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("webhook {url} answered HTTP {status}")]
    Status { url: String, status: u16 },
}

/// A counter moved in a way that makes a rate meaningless (MalformedCounterData)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CounterError {
    #[error("counter {index} of {identity} decreased from {previous} to {current}")]
    Decreased {
        identity: String,
        index: usize,
        previous: u64,
        current: u64,
    },

    #[error("{identity} changed from {previous} to {current} counters")]
    ShapeChanged {
        identity: String,
        previous: usize,
        current: usize,
    },
}

/// A sink failed to consume a report
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("console render failed: {0}")]
    Render(#[from] std::io::Error),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Startup could not complete (FatalInit)
#[derive(Error, Debug)]
pub enum InitError {
    #[error("unsupported DOCKER_HOST {0}: only unix:// sockets are supported")]
    UnsupportedDockerHost(String),

    #[error("cannot reach container runtime at {socket}: {detail}")]
    RuntimeUnreachable { socket: String, detail: String },

    #[error("invalid webhook url {url}: {source}")]
    WebhookUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Reading or writing the values file failed
#[derive(Error, Debug)]
pub enum ValuesFileError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode values: {0}")]
    Encode(#[source] serde_json::Error),
}
