//! Domain layer - Price feed data model.
//!
//! Pure types for the dashboard price feed: symbols, samples, the
//! bounded rolling series, synthetic generation and the per-session
//! feed state. No I/O here (hexagonal architecture inner ring).

pub mod sample;
pub mod series;
pub mod state;
pub mod symbol;
pub mod synthetic;

// Re-export core types for convenience
pub use sample::PriceSample;
pub use series::RollingSeries;
pub use state::{FeedSnapshot, FeedState, Provenance};
pub use symbol::{Symbol, SymbolSpec};
pub use synthetic::{SyntheticGenerator, SyntheticProfile};
