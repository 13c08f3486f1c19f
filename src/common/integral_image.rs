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

use std::cmp;

use crate::error::{Error, Result};
use crate::math;

/// Borrowed single-channel (grayscale) frame.
#[derive(Debug, Clone, Copy)]
pub struct ImageData<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
}

impl<'a> ImageData<'a> {
    pub fn new(data: &'a [u8], width: u32, height: u32) -> Self {
        ImageData {
            data,
            width,
            height,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}

/// Row/column prefix sums of a frame.
///
/// Cell (i, j) holds the sum of all pixels with row <= i and column <= j.
/// The buffer is reused from frame to frame.
pub struct IntegralImage {
    width: u32,
    height: u32,
    data: Vec<u32>,
}

impl IntegralImage {
    /// Buffer for `width` x `height` frames; both must be at least 2, since
    /// sampling interpolates between a cell and its right and lower neighbours.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width < 2 || height < 2 {
            return Err(Error::InvalidParameter(format!(
                "illegal frame size: {}x{}",
                width, height
            )));
        }
        Ok(IntegralImage {
            width,
            height,
            data: vec![0; width as usize * height as usize],
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn data(&self) -> &[u32] {
        &self.data
    }

    /// Overwrite the buffer with the prefix sums of `image`, which must have
    /// the buffer's dimensions and exactly `width * height` bytes.
    pub fn compute(&mut self, image: &ImageData) -> Result<()> {
        if image.width() != self.width
            || image.height() != self.height
            || image.data().len() != self.data.len()
        {
            return Err(Error::InvalidImage {
                width: image.width(),
                height: image.height(),
                len: image.data().len(),
            });
        }
        math::integral(
            image.data(),
            &mut self.data,
            self.width as usize,
            self.height as usize,
        );
        Ok(())
    }

    #[inline]
    pub fn value(&self, x: u32, y: u32) -> u32 {
        self.data[(y * self.width + x) as usize]
    }

    /// Bilinearly interpolated value at a position given in sub-pixel units
    /// (`math::SUBPIXEL_ONE` per pixel).
    ///
    /// Positions outside the buffer are clamped to its border.
    #[inline]
    pub fn sample(&self, x: i32, y: i32) -> u32 {
        let (ix, a) = base_cell(x, self.width);
        let (iy, b) = base_cell(y, self.height);

        let width = self.width as usize;
        let i = iy * width + ix;
        let pt = [
            self.data[i],
            self.data[i + 1],
            self.data[i + width],
            self.data[i + width + 1],
        ];
        math::bilinear(pt, a, b)
    }
}

/// Top-left cell of the 2x2 interpolation patch around `pos`, kept inside
/// `[0, size-2]`, and the sub-pixel offset of `pos` from it.
#[inline]
fn base_cell(pos: i32, size: u32) -> (usize, u32) {
    let last = size as i32 - 1;
    let pos = pos.clamp(0, last << math::SUBPIXEL_BITS);
    let cell = cmp::min(pos >> math::SUBPIXEL_BITS, last - 1);
    (cell as usize, (pos - (cell << math::SUBPIXEL_BITS)) as u32)
}
