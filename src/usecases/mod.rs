//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces.
//!
//! Use cases:
//! - `PriceFeed`: provider fallback chain + rolling history
//! - `FeedSession`: scheduled refresh lifecycle with explicit start/stop

pub mod price_feed;
pub mod session;

pub use price_feed::{FeedSettings, PriceFeed, RefreshReport};
pub use session::{FeedMode, FeedSession, RefreshTrigger, ScheduleConfig};
