//! Packed global tile identifiers.
//!
//! A GID carries `1 + canonical_id` in its low 28 bits and the orientation of
//! the use site in the top two bits:
//!
//! ```text
//!  31   30   29  28  27 ........................ 0
//! [ H ][ V ][ 0 ][ 0 ][        canonical id + 1      ]
//! ```
//!
//! GID 0 means "no tile" in Tiled and is never produced for a canonical tile.

use std::fmt;

use serde::Serialize;

use crate::dedup::Flip;
use crate::error::DedupError;

/// Horizontal flip flag (bit 31)
pub const FLIP_H_FLAG: u32 = 0x8000_0000;
/// Vertical flip flag (bit 30)
pub const FLIP_V_FLAG: u32 = 0x4000_0000;
/// Mask of the bits holding `canonical_id + 1`
pub const ID_MASK: u32 = 0x0FFF_FFFF;
/// Maximum number of canonical tiles addressable by a GID.
pub const MAX_CANONICAL_TILES: usize = ID_MASK as usize;

/// A packed tile identifier with orientation flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Gid(u32);

impl Gid {
    /// Pack a 0-based canonical id and its use-site orientation.
    ///
    /// Fails if the id does not fit into the 28 id bits.
    pub fn new(canonical_id: usize, flip: Flip) -> Result<Self, DedupError> {
        if canonical_id >= MAX_CANONICAL_TILES {
            return Err(DedupError::TooManyTiles { limit: MAX_CANONICAL_TILES });
        }
        let mut raw = canonical_id as u32 + 1;
        if flip.h {
            raw |= FLIP_H_FLAG;
        }
        if flip.v {
            raw |= FLIP_V_FLAG;
        }
        Ok(Self(raw))
    }

    /// Reinterpret a raw packed value.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The packed 32-bit value.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// `canonical_id + 1`, flip bits removed.
    pub const fn bare(self) -> u32 {
        self.0 & ID_MASK
    }

    /// The same tile without orientation flags.
    pub const fn without_flip(self) -> Self {
        Self(self.bare())
    }

    /// 0-based canonical id, or `None` for the empty GID.
    pub fn local_id(self) -> Option<usize> {
        self.bare().checked_sub(1).map(|id| id as usize)
    }

    pub const fn flip(self) -> Flip {
        Flip { h: self.0 & FLIP_H_FLAG != 0, v: self.0 & FLIP_V_FLAG != 0 }
    }

    pub const fn is_empty(self) -> bool {
        self.bare() == 0
    }
}

impl From<Gid> for u32 {
    fn from(gid: Gid) -> Self {
        gid.raw()
    }
}

impl fmt::Display for Gid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bare())?;
        match (self.flip().h, self.flip().v) {
            (false, false) => Ok(()),
            (true, false) => write!(f, " (flip h)"),
            (false, true) => write!(f, " (flip v)"),
            (true, true) => write!(f, " (flip hv)"),
        }
    }
}
