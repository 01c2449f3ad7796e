//! Flip orientation algebra.
//!
//! The four rigid orientations form a group under composition where each axis
//! toggles independently, so composing two orientations is an axis-wise XOR.

use std::ops::BitXor;

use serde::Serialize;

/// Orientation of a tile relative to its stored canonical image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Flip {
    /// Mirrored left-to-right
    pub h: bool,
    /// Mirrored top-to-bottom
    pub v: bool,
}

impl Flip {
    pub const NONE: Flip = Flip { h: false, v: false };
    pub const H: Flip = Flip { h: true, v: false };
    pub const V: Flip = Flip { h: false, v: true };
    pub const HV: Flip = Flip { h: true, v: true };

    /// All orientations, identity first.
    pub const ALL: [Flip; 4] = [Flip::NONE, Flip::H, Flip::V, Flip::HV];

    pub const fn new(h: bool, v: bool) -> Self {
        Self { h, v }
    }

    /// Orientation reached by applying `self` then `other`.
    pub const fn compose(self, other: Flip) -> Flip {
        Flip { h: self.h ^ other.h, v: self.v ^ other.v }
    }

    pub const fn is_identity(self) -> bool {
        !self.h && !self.v
    }
}

impl BitXor for Flip {
    type Output = Flip;

    fn bitxor(self, rhs: Flip) -> Flip {
        self.compose(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_is_axis_xor() {
        assert_eq!(Flip::H ^ Flip::H, Flip::NONE);
        assert_eq!(Flip::H ^ Flip::V, Flip::HV);
        assert_eq!(Flip::HV ^ Flip::H, Flip::V);
        assert_eq!(Flip::HV ^ Flip::HV, Flip::NONE);
    }

    #[test]
    fn test_identity_is_neutral() {
        for flip in Flip::ALL {
            assert_eq!(flip ^ Flip::NONE, flip);
            assert_eq!(Flip::NONE ^ flip, flip);
        }
    }

    #[test]
    fn test_is_identity() {
        assert!(Flip::NONE.is_identity());
        assert!(!Flip::V.is_identity());
    }
}
