//! Orchestrator services.

pub mod email;
pub mod generation;
pub mod report_service;
pub mod task_store;
pub mod telemetry;

pub use email::{EmailDelivery, EmailService, ReportDelivery};
pub use generation::{GenerationEngine, GeminiClient};
pub use report_service::ReportService;
pub use task_store::TaskStore;
pub use telemetry::{InfluxTelemetryClient, QueryScope, TelemetrySource};
