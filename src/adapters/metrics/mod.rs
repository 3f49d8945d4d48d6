//! Metrics and Serving Adapters
//!
//! Provides the Prometheus registry for the feed and the axum server
//! that exposes the feed snapshot, the manual refresh trigger, the
//! wallet-session seam, health probes and `/metrics`.

pub mod prometheus;
pub mod server;

pub use self::prometheus::FeedMetrics;
pub use self::server::FeedServer;
