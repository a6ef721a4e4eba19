//! IEEE-754 single-precision hex codec
//!
//! The gauge sends every measurement as 8 hex characters holding a
//! big-endian `f32`.

use std::collections::{HashMap, VecDeque};

use thiserror::Error;

/// Width of one encoded float in characters.
pub const FLOAT_HEX_LEN: usize = 8;

const DEFAULT_CACHE_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("expected 8 hex characters, got {0}")]
    Length(usize),

    #[error("invalid hex: {0}")]
    Hex(String),
}

/// Decode one 8-character hex word into an `f32`.
pub fn decode_be_f32_hex(word: &str) -> Result<f32, CodecError> {
    if word.len() != FLOAT_HEX_LEN {
        return Err(CodecError::Length(word.len()));
    }
    let mut bytes = [0u8; 4];
    hex::decode_to_slice(word, &mut bytes).map_err(|e| CodecError::Hex(e.to_string()))?;
    Ok(f32::from_be_bytes(bytes))
}

/// Decoder with a bounded memo of recently seen words.
///
/// Gauge values change slowly, so most words repeat between polls. When the
/// memo is full the oldest entry is evicted.
#[derive(Debug)]
pub struct FloatDecoder {
    cache: HashMap<String, f32>,
    order: VecDeque<String>,
    capacity: usize,
}

impl FloatDecoder {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: HashMap::with_capacity(capacity.min(DEFAULT_CACHE_CAPACITY)),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn decode(&mut self, word: &str) -> Result<f32, CodecError> {
        if let Some(value) = self.cache.get(word) {
            return Ok(*value);
        }
        let value = decode_be_f32_hex(word)?;
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.cache.remove(&oldest);
            }
        }
        self.cache.insert(word.to_string(), value);
        self.order.push_back(word.to_string());
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn contains(&self, word: &str) -> bool {
        self.cache.contains_key(word)
    }
}

impl Default for FloatDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_known_vectors() {
        let vectors = [
            ("41200000", 10.0),
            ("461C4000", 10000.0),
            ("459C4000", 5000.0),
            ("44BB9000", 1500.5),
            ("41440000", 12.25),
            ("00000000", 0.0),
            ("BFC00000", -1.5),
            ("41cc0000", 25.5),
        ];
        for (word, expected) in vectors {
            assert_eq!(decode_be_f32_hex(word).unwrap(), expected, "{word}");
        }
    }

    #[test]
    fn rejects_bad_words() {
        assert_eq!(decode_be_f32_hex("4120"), Err(CodecError::Length(4)));
        assert!(matches!(decode_be_f32_hex("4120000G"), Err(CodecError::Hex(_))));
    }

    #[test]
    fn cache_evicts_oldest_entry() {
        let mut decoder = FloatDecoder::with_capacity(2);
        decoder.decode("41200000").unwrap();
        decoder.decode("461C4000").unwrap();
        decoder.decode("41200000").unwrap();
        decoder.decode("459C4000").unwrap();

        assert_eq!(decoder.len(), 2);
        assert!(!decoder.contains("41200000"));
        assert!(decoder.contains("461C4000"));
        assert!(decoder.contains("459C4000"));
    }

    #[test]
    fn default_capacity_is_bounded() {
        let mut decoder = FloatDecoder::new();
        for i in 0..1500u32 {
            decoder.decode(&format!("{:08X}", i)).unwrap();
        }
        assert_eq!(decoder.len(), 1000);
        assert!(!decoder.contains("00000000"));
        assert!(decoder.contains(&format!("{:08X}", 1499)));
    }
}
