//! Warning-flag bitmask decomposition.

use serde::{Deserialize, Serialize};

/// Individual warning bits carried by `*W`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningBit {
    /// bit value 1
    One,
    /// bit value 2
    Two,
    /// bit value 4
    Four,
    /// bit value 8
    Eight,
}

impl WarningBit {
    const ALL: [WarningBit; 4] = [
        WarningBit::One,
        WarningBit::Two,
        WarningBit::Four,
        WarningBit::Eight,
    ];

    pub fn value(self) -> u8 {
        match self {
            WarningBit::One => 1,
            WarningBit::Two => 2,
            WarningBit::Four => 4,
            WarningBit::Eight => 8,
        }
    }
}

/// Split a bitmask into the powers of two that sum to it, lowest first.
///
/// Bits above 8 are ignored; the classifier already rejects masks over 15.
pub fn decompose(mask: u8) -> Vec<WarningBit> {
    WarningBit::ALL
        .into_iter()
        .filter(|bit| mask & bit.value() != 0)
        .collect()
}

/// Whether the mask reports a removed ball that is no longer sensed
pub fn ball_removed(mask: u8) -> bool {
    !decompose(mask).is_empty()
}
