//! Library for host and container resource monitoring
//!
//! This crate provides the core functionality for:
//! - Sampling CPU, memory, network, disk and container metrics
//! - Turning cumulative counters into per-second rates
//! - Rendering reports to the console and posting them to a webhook
//! - Health checks and observability

pub mod api;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod poller;
pub mod rate;
pub mod report;
pub mod sink;
pub mod source;
pub mod values;

pub use error::{CounterError, DeliveryError, InitError, SinkError, SourceError, ValuesFileError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{MonitorMetrics, StructuredLogger};
pub use poller::{PollConfig, PollLoop, PollLoopBuilder};
pub use rate::{compute_rates, cpu_percent, CounterSnapshot, RateEngineState, RateSample};
pub use report::{PollState, ReportAssembler};
