//! Facade wiring the publish pipeline, comment reconciliation, and the
//! live watch loop into one entry point.

pub mod logging;
pub mod report_publisher;

pub use logging::init_tracing;
pub use report_publisher::{ReportPublisher, ReportPublisherConfig};
