pub mod auth;
pub mod chunk;
pub mod config;
pub mod error;
pub mod handlers;
pub mod llm;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod router;
pub mod state;
pub mod store;

pub use error::AppError;
pub use rate_limit::{QuotaConfig, QuotaDecision, QuotaTracker};
pub use router::build_router;
pub use state::AppState;
