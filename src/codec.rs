//! 32-bit trait vector and its 8-character hex structural code.
//!
//! Trait 1 maps to the most significant bit of the first hex character,
//! so the packed word printed as `{:08X}` *is* the canonical code:
//! traits 1-8 true and the rest false reads "FF000000". The codec is a
//! bijection: `decode(encode(v)) == v` for every valid vector.

use std::fmt;

use crate::layer::Layer;
use crate::{Error, Result, TRAIT_BITS};

/// Ordered judgments for all 32 canonical traits, one bit each.
///
/// Stored as a single u32 with trait `i` at bit `32 - i` (trait 1 is the
/// MSB). Immutable once created; `with_trait` returns a modified copy.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraitVector(u32);

impl TraitVector {
    /// All traits absent.
    pub const EMPTY: TraitVector = TraitVector(0);

    /// All traits present.
    pub const FULL: TraitVector = TraitVector(u32::MAX);

    /// Create from exactly 32 ordered judgments (index 0 = trait 1).
    pub fn from_judgments(judgments: &[bool]) -> Result<Self> {
        if judgments.len() != TRAIT_BITS {
            return Err(Error::TraitCount {
                expected: TRAIT_BITS,
                got: judgments.len(),
            });
        }

        let mut word = 0u32;
        for (i, &present) in judgments.iter().enumerate() {
            if present {
                word |= 1 << (31 - i);
            }
        }
        Ok(Self(word))
    }

    /// Create from the packed word. Every u32 is a valid vector.
    #[inline]
    pub fn from_raw(word: u32) -> Self {
        Self(word)
    }

    /// Packed word, trait 1 at the MSB.
    #[inline]
    pub fn as_raw(&self) -> u32 {
        self.0
    }

    /// Judgment for a 1-based trait index.
    #[inline]
    pub fn get(&self, index: usize) -> Result<bool> {
        if index < 1 || index > TRAIT_BITS {
            return Err(Error::TraitIndex(index));
        }
        Ok((self.0 >> (TRAIT_BITS - index)) & 1 == 1)
    }

    /// Copy with one trait judgment replaced.
    pub fn with_trait(&self, index: usize, value: bool) -> Result<TraitVector> {
        if index < 1 || index > TRAIT_BITS {
            return Err(Error::TraitIndex(index));
        }
        let mask = 1u32 << (TRAIT_BITS - index);
        Ok(Self(if value { self.0 | mask } else { self.0 & !mask }))
    }

    /// Expand back to the 32 ordered judgments.
    pub fn to_judgments(&self) -> [bool; TRAIT_BITS] {
        let mut out = [false; TRAIT_BITS];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = (self.0 >> (31 - i)) & 1 == 1;
        }
        out
    }

    /// Count present traits (popcount).
    #[inline]
    pub fn popcount(&self) -> u32 {
        self.0.count_ones()
    }

    /// The 8 trait bits a layer owns, as one byte (its two hex characters).
    #[inline]
    pub fn layer_byte(&self, layer: Layer) -> u8 {
        (self.0 >> ((3 - layer.index()) * 8)) as u8
    }

    /// Present traits within one layer.
    #[inline]
    pub fn layer_active(&self, layer: Layer) -> u32 {
        self.layer_byte(layer).count_ones()
    }

    /// Present traits per layer, in code order.
    pub fn layer_activations(&self) -> [u32; 4] {
        let mut out = [0u32; 4];
        for layer in Layer::ALL {
            out[layer.index()] = self.layer_active(layer);
        }
        out
    }

    /// Vector with every judgment flipped.
    pub fn complement(&self) -> TraitVector {
        Self(!self.0)
    }

    /// Canonical structural code for this vector.
    #[inline]
    pub fn code(&self) -> StructuralCode {
        StructuralCode(self.0)
    }
}

impl fmt::Debug for TraitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TraitVector({}, {} set)", self.code(), self.popcount())
    }
}

impl Default for TraitVector {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl From<StructuralCode> for TraitVector {
    fn from(code: StructuralCode) -> Self {
        Self(code.0)
    }
}

/// 8-character uppercase hex rendering of a trait vector, two characters
/// per layer. Same packed word as [`TraitVector`]; `Display` is the
/// canonical form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct StructuralCode(u32);

impl StructuralCode {
    /// Parse a code string. Accepts either case, rejects anything that is
    /// not exactly 8 hex characters.
    pub fn parse(code: &str) -> Result<Self> {
        if code.len() != crate::CODE_CHARS {
            return Err(Error::MalformedCode {
                code: code.to_string(),
                reason: "must be exactly 8 hex characters",
            });
        }
        if !code.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::MalformedCode {
                code: code.to_string(),
                reason: "contains a non-hex character",
            });
        }
        let word = u32::from_str_radix(code, 16).map_err(|_| Error::MalformedCode {
            code: code.to_string(),
            reason: "not a 32-bit hex value",
        })?;
        Ok(Self(word))
    }

    /// The trait vector this code renders.
    #[inline]
    pub fn vector(&self) -> TraitVector {
        TraitVector(self.0)
    }

    /// Packed word, identical to the vector's.
    #[inline]
    pub fn as_raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for StructuralCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

impl fmt::Debug for StructuralCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StructuralCode(\"{}\")", self)
    }
}

impl std::str::FromStr for StructuralCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<TraitVector> for StructuralCode {
    fn from(v: TraitVector) -> Self {
        Self(v.0)
    }
}

impl From<StructuralCode> for String {
    fn from(code: StructuralCode) -> Self {
        code.to_string()
    }
}

impl TryFrom<String> for StructuralCode {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

// === Codec entry points ===

/// Encode exactly 32 ordered judgments into the vector and its code.
pub fn encode(judgments: &[bool]) -> Result<(TraitVector, StructuralCode)> {
    let vector = TraitVector::from_judgments(judgments)?;
    Ok((vector, vector.code()))
}

/// Decode a structural code back into its trait vector.
pub fn decode(code: &str) -> Result<TraitVector> {
    Ok(StructuralCode::parse(code)?.vector())
}

// === Judgment assembly ===

/// Join barrier for the 32 independently produced trait judgments.
///
/// Judgments arrive one at a time, keyed by 1-based trait index; a vector
/// is released only once every slot is filled. Duplicate and out-of-range
/// indices are rejected so a late or confused producer cannot silently
/// overwrite an earlier verdict.
#[derive(Debug, Clone, Copy, Default)]
pub struct JudgmentAssembly {
    bits: u32,
    filled: u32,
}

impl JudgmentAssembly {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one judgment. Errors on out-of-range index or a slot that
    /// already holds a verdict.
    pub fn record(&mut self, index: usize, value: bool) -> Result<()> {
        if index < 1 || index > TRAIT_BITS {
            return Err(Error::TraitIndex(index));
        }
        let mask = 1u32 << (TRAIT_BITS - index);
        if self.filled & mask != 0 {
            return Err(Error::DuplicateJudgment(index));
        }
        self.filled |= mask;
        if value {
            self.bits |= mask;
        }
        Ok(())
    }

    /// Number of judgments recorded so far.
    pub fn recorded(&self) -> usize {
        self.filled.count_ones() as usize
    }

    /// True once all 32 slots hold a verdict.
    pub fn is_complete(&self) -> bool {
        self.filled == u32::MAX
    }

    /// 1-based indices still waiting for a judgment, ascending.
    pub fn missing(&self) -> Vec<usize> {
        (1..=TRAIT_BITS)
            .filter(|&i| self.filled & (1 << (TRAIT_BITS - i)) == 0)
            .collect()
    }

    /// Release the finished vector, or report how many slots were filled.
    pub fn finish(self) -> Result<TraitVector> {
        if !self.is_complete() {
            return Err(Error::TraitCount {
                expected: TRAIT_BITS,
                got: self.recorded(),
            });
        }
        Ok(TraitVector(self.bits))
    }
}
