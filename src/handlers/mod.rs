mod health;
mod index;
mod ingest;
mod metrics;
mod query;
mod upload;

pub use health::health_handler;
pub use index::{index_clear_handler, index_info_handler};
pub use ingest::ingest_text_handler;
pub use metrics::metrics_handler;
pub use query::query_handler;
pub use upload::ingest_upload_handler;
