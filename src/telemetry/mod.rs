pub mod logger;
pub mod logging;
pub mod metrics;

pub use logger::ProviderLogger;
pub use logging::init_logging;
pub use metrics::MetricsCollector;
