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

mod integral_image;

use std::mem;

pub use self::integral_image::{ImageData, IntegralImage};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Rectangle {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
}

impl Rectangle {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Rectangle {
            x,
            y,
            width,
            height,
        }
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether `self` lies inside `other` grown by `dx` and `dy` on every side.
    pub fn is_inside(&self, other: &Rectangle, dx: i32, dy: i32) -> bool {
        self.x >= other.x - dx
            && self.y >= other.y - dy
            && self.x + self.width as i32 <= other.x + other.width as i32 + dx
            && self.y + self.height as i32 <= other.y + other.height as i32 + dy
    }
}

/// Detected face: a merged bounding box and its confidence.
///
/// The confidence is the number of overlapping raw detections
/// that were merged into the box.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct FaceInfo {
    bbox: Rectangle,
    confidence: u32,
}

impl FaceInfo {
    pub fn new(bbox: Rectangle, confidence: u32) -> Self {
        FaceInfo { bbox, confidence }
    }

    pub fn bbox(&self) -> &Rectangle {
        &self.bbox
    }

    pub fn confidence(&self) -> u32 {
        self.confidence
    }
}

pub struct Seq<T, G>
where
    G: Fn(&T) -> T + Sized,
{
    generator: G,
    next: T,
}

impl<T, G> Seq<T, G>
where
    G: Fn(&T) -> T + Sized,
{
    pub fn new(first_element: T, generator: G) -> Self {
        Seq {
            generator,
            next: first_element,
        }
    }
}

impl<T, G> Iterator for Seq<T, G>
where
    G: Fn(&T) -> T + Sized,
{
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        let next = (self.generator)(&self.next);
        let current = mem::replace(&mut self.next, next);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::{Rectangle, Seq};

    #[test]
    pub fn test_seq_take() {
        let seq = Seq::new(0, |x| x + 1);
        assert_eq!(vec![0, 1, 2, 3, 4], seq.take(5).collect::<Vec<i32>>());
    }

    #[test]
    pub fn test_seq_geometric() {
        let seq = Seq::new(1.0f32, |s| s * 2.0);
        assert_eq!(
            vec![1.0, 2.0, 4.0],
            seq.take_while(|s| *s < 5.0).collect::<Vec<f32>>()
        );
    }

    #[test]
    pub fn test_is_inside() {
        let outer = Rectangle::new(10, 10, 100, 100);
        assert!(Rectangle::new(20, 20, 10, 10).is_inside(&outer, 0, 0));
        assert!(!Rectangle::new(5, 20, 10, 10).is_inside(&outer, 0, 0));
        assert!(Rectangle::new(5, 20, 10, 10).is_inside(&outer, 5, 0));
        assert!(!Rectangle::new(100, 100, 20, 20).is_inside(&outer, 5, 5));
        assert!(Rectangle::new(100, 100, 20, 20).is_inside(&outer, 10, 10));
    }
}
