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

//! Synthetic models and frames shared by the integration tests.

#![allow(dead_code)]

use lbpface::model::{LbpRect, Stage, WeakClassifier};
use lbpface::Model;
use rand::rngs::StdRng;
use rand::Rng;

pub const FEATURE_SIZE: i32 = 24;

/// Every LBP code votes positive.
pub fn always_pass_model() -> Model {
    let stages = vec![Stage::new(0.0, vec![WeakClassifier::new(0, [0; 8], 1.0, -1.0)])];
    Model::new(
        FEATURE_SIZE,
        FEATURE_SIZE,
        stages,
        vec![LbpRect { x: 0, y: 0, w: 8, h: 8 }],
    )
    .unwrap()
}

/// Passes windows whose central 8x8 block is strictly brighter than the
/// eight blocks around it, i.e. whose LBP code is 0.
pub fn bright_square_model() -> Model {
    let mut map = [!0u32; 8];
    map[0] = !1;
    let stages = vec![Stage::new(0.0, vec![WeakClassifier::new(0, map, 1.0, -1.0)])];
    Model::new(
        FEATURE_SIZE,
        FEATURE_SIZE,
        stages,
        vec![LbpRect { x: 0, y: 0, w: 8, h: 8 }],
    )
    .unwrap()
}

/// Same cascade as [`bright_square_model`], in the text model format.
pub const BRIGHT_SQUARE_MODEL_TEXT: &str = "24 24 1
1 0.0
0 -2 -1 -1 -1 -1 -1 -1 -1 -1.0 1.0
1
0 0 8 8
";

/// Black frame with an 8x8 white square at offset (8, 8) from each origin.
pub fn frame_with_squares(width: u32, height: u32, origins: &[(u32, u32)]) -> Vec<u8> {
    let mut pixels = vec![0u8; (width * height) as usize];
    for &(ox, oy) in origins {
        for y in (oy + 8)..(oy + 16) {
            for x in (ox + 8)..(ox + 16) {
                pixels[(y * width + x) as usize] = 255;
            }
        }
    }
    pixels
}

/// Cascade of `num_stages` stages with random rects, bitmaps, votes and thresholds.
pub fn random_model(rng: &mut StdRng, num_stages: usize, classifiers_per_stage: usize) -> Model {
    let num_rects = 16;
    let rects: Vec<LbpRect> = (0..num_rects)
        .map(|_| {
            let w = rng.gen_range(1..=FEATURE_SIZE / 3);
            let h = rng.gen_range(1..=FEATURE_SIZE / 3);
            LbpRect {
                x: rng.gen_range(0..=FEATURE_SIZE - 3 * w),
                y: rng.gen_range(0..=FEATURE_SIZE - 3 * h),
                w,
                h,
            }
        })
        .collect();

    let stages = (0..num_stages)
        .map(|_| {
            let classifiers = (0..classifiers_per_stage)
                .map(|_| {
                    let mut map = [0u32; 8];
                    rng.fill(&mut map[..]);
                    WeakClassifier::new(
                        rng.gen_range(0..num_rects),
                        map,
                        rng.gen_range(-1.0..1.0),
                        rng.gen_range(-1.0..1.0),
                    )
                })
                .collect();
            Stage::new(rng.gen_range(-1.5..0.5), classifiers)
        })
        .collect();

    Model::new(FEATURE_SIZE, FEATURE_SIZE, stages, rects).unwrap()
}

/// Noisy frame with a smooth gradient underneath.
pub fn random_frame(rng: &mut StdRng, width: u32, height: u32) -> Vec<u8> {
    (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .map(|(x, y)| {
            let base = (x * 255 / width + y * 255 / height) / 2;
            (base as i32 + rng.gen_range(-40..=40)).clamp(0, 255) as u8
        })
        .collect()
}
