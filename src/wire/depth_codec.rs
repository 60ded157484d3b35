//! Stable textual encoding for order-book levels (SPEC_FULL.md §4.4).
//!
//! Depth snapshots are not persisted to Postgres by default, but the
//! publisher's textual codec (for consumers that prefer JSON-over-Redis
//! to the binary envelope) needs a canonical, order-preserving
//! bids/asks representation that round-trips exactly through a string
//! column or log line. This module is that round trip.

use rust_decimal::Decimal;

use crate::error::DecodeError;
use crate::wire::models::PriceLevel;

const LEVEL_SEP: char = ',';
const FIELD_SEP: char = ':';

/// Encode an ordered list of levels as `"price:qty,price:qty,..."`.
/// Order is preserved; Binance already returns levels best-to-worst.
pub fn encode_levels(levels: &[PriceLevel]) -> String {
    levels
        .iter()
        .map(|l| format!("{}{}{}", l.price, FIELD_SEP, l.quantity))
        .collect::<Vec<_>>()
        .join(&LEVEL_SEP.to_string())
}

/// Decode the output of [`encode_levels`] back into [`PriceLevel`]s.
pub fn decode_levels(text: &str) -> Result<Vec<PriceLevel>, DecodeError> {
    if text.is_empty() {
        return Ok(Vec::new());
    }

    text.split(LEVEL_SEP)
        .map(|entry| {
            let (price, qty) = entry.split_once(FIELD_SEP).ok_or_else(|| {
                DecodeError::new("wire::depth_codec", format!("malformed level '{entry}'"))
            })?;
            let price: Decimal = price.parse().map_err(|e| {
                DecodeError::new("wire::depth_codec", format!("bad price '{price}': {e}"))
            })?;
            let quantity: Decimal = qty.parse().map_err(|e| {
                DecodeError::new("wire::depth_codec", format!("bad quantity '{qty}': {e}"))
            })?;
            Ok(PriceLevel { price, quantity })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(p: &str, q: &str) -> PriceLevel {
        PriceLevel {
            price: p.parse().unwrap(),
            quantity: q.parse().unwrap(),
        }
    }

    #[test]
    fn empty_levels_round_trip() {
        let encoded = encode_levels(&[]);
        assert_eq!(encoded, "");
        assert_eq!(decode_levels(&encoded).unwrap(), Vec::new());
    }

    #[test]
    fn levels_round_trip_preserving_order() {
        let levels = vec![level("100.50", "1.25"), level("99.10", "3.0")];
        let encoded = encode_levels(&levels);
        assert_eq!(encoded, "100.50:1.25,99.10:3.0");
        assert_eq!(decode_levels(&encoded).unwrap(), levels);
    }

    #[test]
    fn rejects_malformed_entry() {
        assert!(decode_levels("100.50-1.25").is_err());
    }

    #[test]
    fn rejects_non_decimal_price() {
        assert!(decode_levels("abc:1.25").is_err());
    }
}
