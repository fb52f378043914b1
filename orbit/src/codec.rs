//! Index codec: bijection between dense state indices and structured states.
//!
//! External transition rules usually act on a structured value (a register
//! vector, a word over a finite alphabet) while the engine partitions and
//! deduplicates over dense integers. An [`IndexCodec`] is the bridge.
//!
//! # Mixed-Radix Layout
//!
//! [`MixedRadixCodec`] maps a vector `d` of width `w` with `d[i] < r[i]` to
//!
//! ```text
//! index = d[0] + r[0]·(d[1] + r[1]·(d[2] + ... ))
//! ```
//!
//! Position 0 is the least significant digit. A fixed alphabet of size `q`
//! is the special case `r[i] = q` for every position.
//!
//! # Example
//!
//! ```
//! use uor_orbit::codec::{IndexCodec, MixedRadixCodec};
//! use uor_orbit::StateIndex;
//!
//! let codec = MixedRadixCodec::uniform(3, 4).unwrap(); // GF(3)^4
//! assert_eq!(codec.state_count(), 81);
//!
//! let index = codec.encode(&vec![2, 0, 1, 0]).unwrap();
//! assert_eq!(index, StateIndex::new(2 + 1 * 9));
//! assert_eq!(codec.decode(index).unwrap(), vec![2, 0, 1, 0]);
//! ```

use alloc::vec;
use alloc::vec::Vec;

use crate::error::CodecError;
use crate::index::StateIndex;

/// A total bijection between `[0, state_count)` and a structured value type.
pub trait IndexCodec {
    /// Structured state consumed by the transition rule.
    type Value;

    /// Number of states, `N`.
    fn state_count(&self) -> u64;

    /// Maps a structured value to its dense index.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if the value is not a member of the state space.
    fn encode(&self, value: &Self::Value) -> Result<StateIndex, CodecError>;

    /// Maps a dense index to its structured value.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::IndexOutOfRange`] for indices outside `[0, N)`.
    fn decode(&self, index: StateIndex) -> Result<Self::Value, CodecError>;
}

/// Mixed-radix codec over fixed-width digit vectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixedRadixCodec {
    radices: Vec<u32>,
    total: u64,
}

impl MixedRadixCodec {
    /// Creates a codec with one radix per position.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::ZeroRadix`] if any radix is zero and
    /// [`CodecError::Overflow`] if the state count does not fit in `u64`.
    pub fn new(radices: Vec<u32>) -> Result<Self, CodecError> {
        let mut total: u64 = 1;
        for (position, &radix) in radices.iter().enumerate() {
            if radix == 0 {
                return Err(CodecError::ZeroRadix { position });
            }
            total = total
                .checked_mul(u64::from(radix))
                .ok_or(CodecError::Overflow)?;
        }
        Ok(Self { radices, total })
    }

    /// Creates a codec for words of `width` symbols over an alphabet of size `radix`.
    ///
    /// # Errors
    ///
    /// Same as [`MixedRadixCodec::new`].
    pub fn uniform(radix: u32, width: usize) -> Result<Self, CodecError> {
        Self::new(vec![radix; width])
    }

    /// Number of positions.
    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        self.radices.len()
    }

    /// Radix of every position, least significant first.
    #[inline]
    #[must_use]
    pub fn radices(&self) -> &[u32] {
        &self.radices
    }

    /// Encodes a digit slice.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Width`] or [`CodecError::Digit`] for malformed input.
    pub fn encode_digits(&self, digits: &[u32]) -> Result<StateIndex, CodecError> {
        if digits.len() != self.radices.len() {
            return Err(CodecError::Width {
                expected: self.radices.len(),
                actual: digits.len(),
            });
        }
        let mut index: u64 = 0;
        // Horner evaluation from the most significant position down.
        for (position, (&digit, &radix)) in digits.iter().zip(&self.radices).enumerate().rev() {
            if digit >= radix {
                return Err(CodecError::Digit {
                    position,
                    digit,
                    radix,
                });
            }
            index = index * u64::from(radix) + u64::from(digit);
        }
        Ok(StateIndex::new(index))
    }

    /// Decodes into a caller-owned buffer without allocating.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::IndexOutOfRange`] or [`CodecError::Width`].
    pub fn decode_into(&self, index: StateIndex, out: &mut [u32]) -> Result<(), CodecError> {
        if !index.is_within(self.total) {
            return Err(CodecError::IndexOutOfRange {
                index,
                total: self.total,
            });
        }
        if out.len() != self.radices.len() {
            return Err(CodecError::Width {
                expected: self.radices.len(),
                actual: out.len(),
            });
        }
        let mut rest = index.value();
        for (slot, &radix) in out.iter_mut().zip(&self.radices) {
            let radix = u64::from(radix);
            // rest % radix < radix <= u32::MAX
            *slot = (rest % radix) as u32;
            rest /= radix;
        }
        Ok(())
    }
}

impl IndexCodec for MixedRadixCodec {
    type Value = Vec<u32>;

    #[inline]
    fn state_count(&self) -> u64 {
        self.total
    }

    fn encode(&self, value: &Self::Value) -> Result<StateIndex, CodecError> {
        self.encode_digits(value)
    }

    fn decode(&self, index: StateIndex) -> Result<Self::Value, CodecError> {
        let mut digits = vec![0; self.radices.len()];
        self.decode_into(index, &mut digits)?;
        Ok(digits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bijection_small() {
        let codec = MixedRadixCodec::new(vec![2, 3, 5]).unwrap();
        assert_eq!(codec.state_count(), 30);
        let mut seen = [false; 30];
        for i in 0..30 {
            let digits = codec.decode(StateIndex::new(i)).unwrap();
            let back = codec.encode(&digits).unwrap();
            assert_eq!(back.value(), i);
            seen[i as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_least_significant_first() {
        let codec = MixedRadixCodec::uniform(10, 3).unwrap();
        assert_eq!(codec.decode(StateIndex::new(472)).unwrap(), vec![2, 7, 4]);
    }

    #[test]
    fn test_zero_width_has_one_state() {
        let codec = MixedRadixCodec::new(Vec::new()).unwrap();
        assert_eq!(codec.state_count(), 1);
        assert_eq!(codec.encode(&Vec::new()).unwrap(), StateIndex::ZERO);
    }

    #[test]
    fn test_zero_radix_rejected() {
        assert_eq!(
            MixedRadixCodec::new(vec![4, 0, 2]),
            Err(CodecError::ZeroRadix { position: 1 })
        );
    }

    #[test]
    fn test_overflow_rejected() {
        assert_eq!(
            MixedRadixCodec::uniform(u32::MAX, 3),
            Err(CodecError::Overflow)
        );
        // 2^64 states is one too many.
        assert_eq!(MixedRadixCodec::uniform(2, 64), Err(CodecError::Overflow));
        assert_eq!(
            MixedRadixCodec::uniform(2, 63).unwrap().state_count(),
            1 << 63
        );
    }

    #[test]
    fn test_invalid_values() {
        let codec = MixedRadixCodec::uniform(3, 2).unwrap();
        assert_eq!(
            codec.encode(&vec![1, 3]),
            Err(CodecError::Digit {
                position: 1,
                digit: 3,
                radix: 3
            })
        );
        assert_eq!(
            codec.encode(&vec![1]),
            Err(CodecError::Width {
                expected: 2,
                actual: 1
            })
        );
        assert_eq!(
            codec.decode(StateIndex::new(9)),
            Err(CodecError::IndexOutOfRange {
                index: StateIndex::new(9),
                total: 9
            })
        );
    }
}
