pub mod collector;
pub mod diagnostics;
pub mod exporter;
pub mod publisher;
pub mod record;

pub use collector::{Collector, ScrapeReport};
pub use diagnostics::ExporterMetrics;
pub use exporter::PrometheusExporter;
pub use publisher::MetricsPublisher;
pub use record::MetricRecord;
