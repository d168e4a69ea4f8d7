use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, Histogram, register_counter, register_gauge, register_histogram};


lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("rag_requests_total", "Total number of requests").unwrap();
    pub static ref QUOTA_REJECTIONS: Counter =
        register_counter!("rag_quota_rejections_total", "Requests rejected by the daily quota").unwrap();
    pub static ref QUERY_LATENCY: Histogram = register_histogram!(
        "rag_query_latency_seconds",
        "Query latency in seconds"
    )
    .unwrap();
    pub static ref TRACKED_CLIENTS: Gauge =
        register_gauge!("rag_tracked_clients", "Clients with a live quota record").unwrap();
    pub static ref INDEXED_CHUNKS: Gauge =
        register_gauge!("rag_indexed_chunks", "Current number of chunks in the vector store").unwrap();
}
