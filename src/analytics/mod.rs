//! Event ingestion and dashboard reporting

pub mod device;
pub mod export;
pub mod ip_extractor;
pub mod reporter;
pub mod timeframe;
pub mod tracker;

pub use export::ExportFormat;
pub use ip_extractor::extract_client_ip;
pub use reporter::Reporter;
pub use timeframe::{local_today, DateRange, Timeframe};
pub use tracker::{RequestContext, Tracker};
