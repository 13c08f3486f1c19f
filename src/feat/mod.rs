// This file is part of the open-source port of facelbp engine, which implements face detection
// using the Multi-scale Block Local Binary Pattern (MB-LBP) cascade algorithm.
//
// Copyright (C) 2013, Keith Mok <ek9852@gmail.com>
//
// As an open-source face detection engine: you can redistribute facelbp source codes
// and/or modify it under the terms of the Apache License, Version 2.0.
//
// You should have received a copy of the Apache License, Version 2.0 along with the software.
// If not, see < https://www.apache.org/licenses/LICENSE-2.0>.

//! Multi-scale block LBP feature extraction.
//!
//! A feature covers a 3x3 grid of equally sized blocks. Its 16 block corners
//! are sampled from the integral image:
//!
//! ```text
//!  0  1  2  3
//!  4  5  6  7
//!  8  9 10 11
//! 12 13 14 15
//! ```
//!
//! and the 9 block sums are compared against the center one:
//!
//! ```text
//! 0 1 2
//! 3 4 5
//! 6 7 8
//! ```

use crate::common::IntegralImage;
use crate::math;
use crate::model::LbpRect;

/// Integral image values at the 4x4 block corners of one feature, row by row.
pub type Corners = [[u32; 4]; 4];

/// Sample the block corners of `rect` placed at (`x`, `y`) and scaled by
/// `scale`, given in sub-pixel units (see [`math::fixed_scale`]).
#[inline]
pub fn sample_corners(
    rect: &LbpRect,
    integral: &IntegralImage,
    x: i32,
    y: i32,
    scale: i32,
) -> Corners {
    let fx = (x << math::SUBPIXEL_BITS) + rect.x * scale;
    let fy = (y << math::SUBPIXEL_BITS) + rect.y * scale;
    let block_w = rect.w * scale;
    let block_h = rect.h * scale;

    let mut corners = [[0u32; 4]; 4];
    for (k, row) in corners.iter_mut().enumerate() {
        let cy = fy + block_h * k as i32;
        for (j, corner) in row.iter_mut().enumerate() {
            *corner = integral.sample(fx + block_w * j as i32, cy);
        }
    }
    corners
}

#[inline]
pub fn block_sums(c: &Corners) -> [u32; 9] {
    let mut sums = [0u32; 9];
    for r in 0..3 {
        for col in 0..3 {
            sums[r * 3 + col] =
                math::block_sum(c[r][col], c[r][col + 1], c[r + 1][col], c[r + 1][col + 1]);
        }
    }
    sums
}

/// 8-bit LBP code: one bit per outer block whose sum is >= the center sum.
#[inline]
pub fn lbp_code(p: &[u32; 9]) -> u8 {
    let center = p[4];
    let mut code = 0u8;
    if p[0] >= center {
        code |= 0x80;
    }
    if p[1] >= center {
        code |= 0x40;
    }
    if p[2] >= center {
        code |= 0x20;
    }
    if p[5] >= center {
        code |= 0x10;
    }
    if p[8] >= center {
        code |= 0x08;
    }
    if p[7] >= center {
        code |= 0x04;
    }
    if p[6] >= center {
        code |= 0x02;
    }
    if p[3] >= center {
        code |= 0x01;
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ImageData;

    #[test]
    fn test_block_sums_of_constant_frame() {
        let pixels = vec![3u8; 32 * 32];
        let mut integral = IntegralImage::new(32, 32).unwrap();
        integral.compute(&ImageData::new(&pixels, 32, 32)).unwrap();

        let rect = LbpRect { x: 1, y: 2, w: 4, h: 3 };
        let corners = sample_corners(&rect, &integral, 5, 5, math::fixed_scale(1.0));
        assert_eq!([3 * 4 * 3; 9], block_sums(&corners));
    }

    #[test]
    fn test_scaled_geometry() {
        let pixels = vec![1u8; 64 * 64];
        let mut integral = IntegralImage::new(64, 64).unwrap();
        integral.compute(&ImageData::new(&pixels, 64, 64)).unwrap();

        let rect = LbpRect { x: 0, y: 0, w: 2, h: 2 };
        let corners = sample_corners(&rect, &integral, 10, 10, math::fixed_scale(2.0));
        assert_eq!(integral.value(10, 10), corners[0][0]);
        assert_eq!(integral.value(22, 10), corners[0][3]);
        assert_eq!(integral.value(22, 22), corners[3][3]);
        assert_eq!([16; 9], block_sums(&corners));
    }

    #[test]
    fn test_fractional_scale() {
        // one bright column at x = 12
        let mut pixels = vec![0u8; 32 * 32];
        for row in pixels.chunks_mut(32) {
            row[12] = 100;
        }
        let mut integral = IntegralImage::new(32, 32).unwrap();
        integral.compute(&ImageData::new(&pixels, 32, 32)).unwrap();

        // blocks 1.5 pixels wide starting at x = 10: corners at 10, 11.5, 13, 14.5
        let rect = LbpRect { x: 0, y: 0, w: 1, h: 1 };
        let corners = sample_corners(&rect, &integral, 10, 10, math::fixed_scale(1.5));
        let column = integral.value(12, 10);
        assert_eq!(1100, column);
        assert_eq!([0, column / 2, column, column], corners[0]);
    }

    #[test]
    fn test_lbp_code_bits() {
        assert_eq!(0xFF, lbp_code(&[5; 9]));
        assert_eq!(0x00, lbp_code(&[0, 0, 0, 0, 1, 0, 0, 0, 0]));
        assert_eq!(0x80, lbp_code(&[1, 0, 0, 0, 1, 0, 0, 0, 0]));
        assert_eq!(0x01, lbp_code(&[0, 0, 0, 1, 1, 0, 0, 0, 0]));
        assert_eq!(0x10, lbp_code(&[0, 0, 0, 0, 1, 1, 0, 0, 0]));
        assert_eq!(0x02, lbp_code(&[0, 0, 0, 0, 1, 0, 1, 0, 0]));
        assert_eq!(0x08, lbp_code(&[0, 0, 0, 0, 1, 0, 0, 0, 2]));
    }
}
