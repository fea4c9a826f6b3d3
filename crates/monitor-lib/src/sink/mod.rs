//! Report consumers
//!
//! Sinks receive each tick's [`Report`] read-only. A failing sink affects only
//! its own output for that tick.

mod console;
mod webhook;

pub use console::{format_bytes, render_report, ConsoleRenderer};
pub use webhook::{encode_payload, WebhookPublisher};

use crate::error::SinkError;
use crate::models::Report;
use async_trait::async_trait;

/// Trait for report consumers
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Short name used in logs, metrics and health components
    fn name(&self) -> &'static str;

    async fn consume(&self, report: &Report) -> Result<(), SinkError>;
}
