//! Collaborators of the job controllers
//!
//! Snapshot persistence and the analytics side channel.

pub mod analytics;
pub mod store;

// Re-export main types
pub use analytics::{AnalyticsEvent, AnalyticsSink, ChannelAnalytics, NoopAnalytics};
pub use store::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
