//! Flip support for rendered RGBA images.

use image::{imageops, RgbaImage};

use super::FlipTile;
use crate::hash::fnv1a_hash;

impl FlipTile for RgbaImage {
    /// Hash over the R, G, B, A bytes of every pixel.
    fn content_hash(&self) -> u64 {
        fnv1a_hash(self.as_raw())
    }

    fn flip_h_in_place(&mut self) {
        imageops::flip_horizontal_in_place(self);
    }

    fn flip_v_in_place(&mut self) {
        imageops::flip_vertical_in_place(self);
    }

    fn same_content(&self, other: &Self) -> bool {
        self.dimensions() == other.dimensions() && self.as_raw() == other.as_raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::{Flip, FlipDeduplicator};
    use image::Rgba;

    fn marked(w: u32, h: u32) -> RgbaImage {
        let mut img = RgbaImage::from_pixel(w, h, Rgba([200, 0, 0, 255]));
        img.put_pixel(0, 0, Rgba([0, 0, 255, 255]));
        img
    }

    #[test]
    fn test_rgba_flip_detection() {
        let mut dedup = FlipDeduplicator::new();
        let base = marked(16, 16);
        dedup.insert(&base).unwrap();

        let flipped = imageops::flip_vertical(&imageops::flip_horizontal(&base));
        let reference = dedup.insert(&flipped).unwrap();
        assert_eq!(reference.canonical_id, 0);
        assert_eq!(reference.flip, Flip::HV);
    }

    #[test]
    fn test_same_content_checks_dimensions() {
        let wide = RgbaImage::new(4, 1);
        let tall = RgbaImage::new(1, 4);
        assert!(!wide.same_content(&tall));
        assert!(wide.same_content(&wide.clone()));
    }
}
