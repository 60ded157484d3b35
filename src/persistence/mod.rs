//! Persistence layer (C4): idempotent upserts, chunked bounded-lifetime
//! transactions, checkpoint read/update (§4.4).

pub mod batch;
pub mod candles;
pub mod checkpoints;
pub mod pool;
pub mod symbols;
pub mod ticker;
pub mod trades;
