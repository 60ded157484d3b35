//! Rate-limited REST client and multiplexed streaming client (C2, C3).

pub mod client;
pub mod rate_limit;
pub mod stream_names;
pub mod ws_client;
