// Batched real-time distribution: coalescing buffer, subscriber groups, socket loop
pub mod buffer;
pub mod connection;
pub mod distributor;
pub mod hub;
pub mod protocol;

pub use buffer::CoalescingBuffer;
pub use connection::ConnectionHandler;
pub use distributor::{run_flush_loop, spawn_flush_loop, Distributor, FlushStats};
pub use hub::{ConnectionId, SubscriptionHub};
pub use protocol::{ClientMessage, ServerMessage};
