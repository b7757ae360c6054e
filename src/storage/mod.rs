// Durable reading sink and retention
pub mod retention;
pub mod store;

pub use retention::{prune_once, run_retention_loop};
pub use store::{BucketRow, ChannelAggregate, ReadingStore};
