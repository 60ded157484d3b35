//! Publisher (C5): topic naming, dual encoding, hot-key caching (§4.5).

pub mod codec;
pub mod publisher;
pub mod topics;

pub use publisher::{Publisher, RedisPublisher};
