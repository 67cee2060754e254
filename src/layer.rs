//! The four fixed trait layers.
//!
//! Trait indices 1..=32 partition into four layers of eight: Physical
//! (1-8), Functional (9-16), Abstract (17-24), Social (25-32). Each layer
//! owns exactly two hex characters of the structural code, in this order.

use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::{Error, LAYER_BITS, LAYER_COUNT, Result, TRAIT_BITS};

/// Number of trait layers.
pub const NUM_LAYERS: usize = LAYER_COUNT;

/// Layer names, indexed 0-3.
pub const LAYER_NAMES: [&str; NUM_LAYERS] = ["Physical", "Functional", "Abstract", "Social"];

/// One of the four fixed 8-trait layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Physical,
    Functional,
    Abstract,
    Social,
}

impl Layer {
    /// All layers in structural-code order.
    pub const ALL: [Layer; NUM_LAYERS] = [
        Layer::Physical,
        Layer::Functional,
        Layer::Abstract,
        Layer::Social,
    ];

    /// Zero-based position in the code (Physical = 0).
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        LAYER_NAMES[self.index()]
    }

    /// Inclusive range of 1-based trait indices this layer covers.
    pub fn trait_range(self) -> RangeInclusive<usize> {
        let start = self.index() * LAYER_BITS + 1;
        start..=start + LAYER_BITS - 1
    }

    /// Layer owning a 1-based trait index.
    pub fn of_trait(index: usize) -> Result<Layer> {
        if index < 1 || index > TRAIT_BITS {
            return Err(Error::TraitIndex(index));
        }
        Ok(Self::ALL[(index - 1) / LAYER_BITS])
    }

    /// Layer at a zero-based position, if any.
    pub fn from_index(i: usize) -> Option<Layer> {
        Self::ALL.get(i).copied()
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
