//! The two interchangeable wire codecs a [`super::Publisher`] picks
//! between at construction (§9 Polymorphic publisher).

use crate::error::DecodeError;
use crate::wire::encode::{encode_binary, encode_textual, Envelope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Compact bincode envelope. Default.
    Binary,
    /// JSON fallback carrying the same field names.
    Textual,
}

impl Codec {
    pub fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, DecodeError> {
        match self {
            Codec::Binary => encode_binary(envelope),
            Codec::Textual => encode_textual(envelope).map(String::into_bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::encode::envelope_for_symbol_roster;

    #[test]
    fn both_codecs_produce_nonempty_bytes() {
        let envelope = envelope_for_symbol_roster(&["BTCUSDT".to_string()], 0);
        assert!(!Codec::Binary.encode(&envelope).unwrap().is_empty());
        assert!(!Codec::Textual.encode(&envelope).unwrap().is_empty());
    }
}
