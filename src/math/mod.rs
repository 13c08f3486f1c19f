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

use num::traits::{WrappingAdd, Zero};

/// Row/column prefix sums of `src` into `dest`, both `width * height` long.
///
/// Accumulation wraps on overflow, matching unsigned C arithmetic.
pub fn integral<T>(src: &[u8], dest: &mut [T], width: usize, height: usize)
where
    T: Copy + Zero + WrappingAdd + From<u8>,
{
    assert!(src.len() >= width * height && dest.len() >= width * height);
    if width == 0 || height == 0 {
        return;
    }

    let mut rs = T::zero();
    for (d, &s) in dest[..width].iter_mut().zip(&src[..width]) {
        rs = rs.wrapping_add(&T::from(s));
        *d = rs;
    }

    for row in 1..height {
        let (above, current) = dest[(row - 1) * width..(row + 1) * width].split_at_mut(width);
        let src_row = &src[row * width..(row + 1) * width];
        let mut rs = T::zero();
        for ((d, &a), &s) in current.iter_mut().zip(above.iter()).zip(src_row) {
            rs = rs.wrapping_add(&T::from(s));
            *d = rs.wrapping_add(&a);
        }
    }
}

/// Fractional bits of sub-pixel sample positions.
pub const SUBPIXEL_BITS: u32 = 8;
/// One pixel in sub-pixel units.
pub const SUBPIXEL_ONE: i32 = 1 << SUBPIXEL_BITS;

/// `scale` in sub-pixel units, rounded to nearest.
#[inline]
pub fn fixed_scale(scale: f32) -> i32 {
    (scale * SUBPIXEL_ONE as f32).round() as i32
}

/// Bilinear interpolation between the four cells `pt` = [top-left, top-right,
/// bottom-left, bottom-right], at sub-pixel offsets `a` (right) and `b` (down),
/// both in `0..=SUBPIXEL_ONE`.
///
/// Evaluates `floor(p0 + a*dx + b*dy + a*b*dxy)` exactly in `u32`, with every
/// product small enough for 32-bit hardware, so all backends agree bit for bit.
#[inline]
pub fn bilinear(pt: [u32; 4], a: u32, b: u32) -> u32 {
    let dx = pt[1].wrapping_sub(pt[0]);
    let dy = pt[2].wrapping_sub(pt[0]);
    let dxy = pt[3]
        .wrapping_sub(pt[2])
        .wrapping_sub(pt[1])
        .wrapping_add(pt[0]);

    let linear = a.wrapping_mul(dx).wrapping_add(b.wrapping_mul(dy));
    let whole = linear >> SUBPIXEL_BITS;
    let frac = (linear & (SUBPIXEL_ONE as u32 - 1)) << SUBPIXEL_BITS;
    let rest = frac.wrapping_add(a.wrapping_mul(b).wrapping_mul(dxy)) >> (2 * SUBPIXEL_BITS);
    pt[0].wrapping_add(whole).wrapping_add(rest)
}

/// Round half away from zero.
#[inline]
pub fn round(value: f32) -> i32 {
    (value + if value >= 0.0 { 0.5 } else { -0.5 }) as i32
}

/// Sum of the block between four integral image corners, with wrapping arithmetic.
#[inline]
pub fn block_sum(top_left: u32, top_right: u32, bottom_left: u32, bottom_right: u32) -> u32 {
    top_left
        .wrapping_sub(top_right)
        .wrapping_sub(bottom_left)
        .wrapping_add(bottom_right)
}
