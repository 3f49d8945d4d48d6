//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (HTTP clients, HTTP server, Prometheus).
//!
//! Adapter categories:
//! - `providers`: Birdeye and CoinGecko quote sources
//! - `metrics`: Prometheus metrics and the snapshot/health server

pub mod metrics;
pub mod providers;
