//! Internal record shapes (SPEC_FULL.md §3). One struct per series, shared
//! by decode, persistence, and publish.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A trading pair enrolled for ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: i64,
    pub symbol: String,
    pub base: String,
    pub quote: String,
    pub status: String,
    pub active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// OHLCV record, primary key `(symbol, interval, open_time)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub interval: String,
    pub open_time: i64,
    pub close_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub quote_volume: Decimal,
    pub trade_count: i64,
    pub taker_buy_base: Decimal,
    pub taker_buy_quote: Decimal,
}

/// Rolling 24h ticker snapshot, primary key `(symbol, timestamp)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub timestamp: i64,
    pub price: Decimal,
    pub bid_price: Option<Decimal>,
    pub bid_qty: Option<Decimal>,
    pub ask_price: Option<Decimal>,
    pub ask_qty: Option<Decimal>,
    pub volume_24h: Option<Decimal>,
    pub quote_volume_24h: Option<Decimal>,
    pub price_change_24h: Option<Decimal>,
    pub price_change_pct_24h: Option<Decimal>,
    pub high_24h: Option<Decimal>,
    pub low_24h: Option<Decimal>,
    pub trade_count_24h: Option<i64>,
}

/// A single resting order-book level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

/// Incremental order-book update. Not persisted by default — see §3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Depth {
    pub id: uuid::Uuid,
    pub symbol: String,
    pub timestamp: i64,
    pub last_update_id: i64,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

/// Aggregated trade event. Unique by `(symbol, trade_id, timestamp)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: uuid::Uuid,
    pub symbol: String,
    pub trade_id: i64,
    pub timestamp: i64,
    pub price: Decimal,
    pub qty: Decimal,
    pub quote_qty: Decimal,
    pub buyer_is_maker: bool,
}

/// Data series discriminant a checkpoint resumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Candle,
    Ticker,
    Depth,
    Trade,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Candle => "candle",
            DataType::Ticker => "ticker",
            DataType::Depth => "depth",
            DataType::Trade => "trade",
        }
    }
}

impl std::str::FromStr for DataType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "candle" => Ok(DataType::Candle),
            "ticker" => Ok(DataType::Ticker),
            "depth" => Ok(DataType::Depth),
            "trade" => Ok(DataType::Trade),
            other => Err(format!("unknown data_type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointStatus {
    Pending,
    Active,
    Error,
}

impl CheckpointStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointStatus::Pending => "pending",
            CheckpointStatus::Active => "active",
            CheckpointStatus::Error => "error",
        }
    }
}

impl std::str::FromStr for CheckpointStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CheckpointStatus::Pending),
            "active" => Ok(CheckpointStatus::Active),
            "error" => Ok(CheckpointStatus::Error),
            other => Err(format!("unknown checkpoint status '{other}'")),
        }
    }
}

/// Per-series resume record, primary key `(symbol, data_type, interval)`.
/// `interval` is the empty string for every data type except `candle`
/// (see SPEC_FULL.md §9, checkpoint primary-key ambiguity).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub symbol: String,
    pub data_type: DataType,
    pub interval: String,
    pub last_sync_time: i64,
    pub last_data_time: i64,
    pub status: CheckpointStatus,
    pub error_message: Option<String>,
}

impl Checkpoint {
    pub fn interval_key(interval: Option<&str>) -> String {
        interval.unwrap_or("").to_string()
    }
}
