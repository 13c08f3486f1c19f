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

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::{FromStr, SplitWhitespace};

use tracing::debug;

use crate::error::{Error, Result};

/// Rectangle of a MB-LBP feature, in feature window units.
///
/// The feature covers a 3x3 grid of blocks, each `w` x `h` in size,
/// with the top-left block starting at (`x`, `y`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LbpRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

/// Single LBP-code-indexed vote of a stage.
#[derive(Clone, Debug, PartialEq)]
pub struct WeakClassifier {
    rect_idx: usize,
    lbp_map: [u32; 8],
    pos: f32,
    neg: f32,
}

impl WeakClassifier {
    pub fn new(rect_idx: usize, lbp_map: [u32; 8], pos: f32, neg: f32) -> Self {
        WeakClassifier {
            rect_idx,
            lbp_map,
            pos,
            neg,
        }
    }

    #[inline]
    pub fn rect_idx(&self) -> usize {
        self.rect_idx
    }

    #[inline]
    pub fn lbp_map(&self) -> &[u32; 8] {
        &self.lbp_map
    }

    #[inline]
    pub fn pos(&self) -> f32 {
        self.pos
    }

    #[inline]
    pub fn neg(&self) -> f32 {
        self.neg
    }

    /// Vote for the given LBP code: codes marked in the bitmap vote `neg`.
    #[inline]
    pub fn vote(&self, lbp_code: u8) -> f32 {
        if self.lbp_map[(lbp_code >> 5) as usize] & (1 << (lbp_code & 31)) != 0 {
            self.neg
        } else {
            self.pos
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stage {
    threshold: f32,
    classifiers: Vec<WeakClassifier>,
}

impl Stage {
    pub fn new(threshold: f32, classifiers: Vec<WeakClassifier>) -> Self {
        Stage {
            threshold,
            classifiers,
        }
    }

    #[inline]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }

    #[inline]
    pub fn classifiers(&self) -> &[WeakClassifier] {
        &self.classifiers
    }
}

/// Boosted cascade of MB-LBP weak classifiers.
#[derive(Clone, Debug, PartialEq)]
pub struct Model {
    feature_width: i32,
    feature_height: i32,
    stages: Vec<Stage>,
    rects: Vec<LbpRect>,
}

impl Model {
    /// Build a model from its parts, checking the same invariants as the model reader.
    pub fn new(
        feature_width: i32,
        feature_height: i32,
        stages: Vec<Stage>,
        rects: Vec<LbpRect>,
    ) -> Result<Self> {
        let model = Model {
            feature_width,
            feature_height,
            stages,
            rects,
        };
        model.validate()?;
        Ok(model)
    }

    #[inline]
    pub fn feature_width(&self) -> i32 {
        self.feature_width
    }

    #[inline]
    pub fn feature_height(&self) -> i32 {
        self.feature_height
    }

    #[inline]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stages_mut(&mut self) -> &mut [Stage] {
        &mut self.stages
    }

    #[inline]
    pub fn rects(&self) -> &[LbpRect] {
        &self.rects
    }

    pub fn num_weak_classifiers(&self) -> usize {
        self.stages.iter().map(|s| s.classifiers.len()).sum()
    }

    fn validate(&self) -> Result<()> {
        if self.feature_width <= 0 || self.feature_height <= 0 {
            return Err(Error::InvalidModel(format!(
                "illegal feature size {}x{}",
                self.feature_width, self.feature_height
            )));
        }
        if self.stages.is_empty() {
            return Err(Error::InvalidModel("no stages".into()));
        }
        if self.rects.is_empty() {
            return Err(Error::InvalidModel("no rects".into()));
        }
        for (i, stage) in self.stages.iter().enumerate() {
            if stage.classifiers.is_empty() {
                return Err(Error::InvalidModel(format!(
                    "stage {} has no weak classifiers",
                    i + 1
                )));
            }
            if let Some(c) = stage
                .classifiers
                .iter()
                .find(|c| c.rect_idx >= self.rects.len())
            {
                return Err(Error::InvalidModel(format!(
                    "stage {}: rect index {} out of range ({} rects)",
                    i + 1,
                    c.rect_idx,
                    self.rects.len()
                )));
            }
        }
        if let Some(r) = self
            .rects
            .iter()
            .find(|r| r.x < 0 || r.y < 0 || r.w <= 0 || r.h <= 0)
        {
            return Err(Error::InvalidModel(format!("illegal rect: {:?}", r)));
        }
        Ok(())
    }
}

/// Load a cascade from a text model file.
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<Model> {
    let file = File::open(path)?;
    read_model(BufReader::new(file))
}

/// Read a cascade in the whitespace-delimited text format:
///
/// ```text
/// feature_height feature_width num_stages
/// (num_weak_classifiers stage_threshold
///     (rect_idx lbpmap[0] .. lbpmap[7] neg pos){num_weak_classifiers}){num_stages}
/// num_rects
/// (x y w h){num_rects}
/// ```
pub fn read_model<R: Read>(mut reader: R) -> Result<Model> {
    let mut buf = String::new();
    reader.read_to_string(&mut buf)?;
    ModelReader::new(&buf).read()
}

struct ModelReader<'a> {
    tokens: SplitWhitespace<'a>,
}

impl<'a> ModelReader<'a> {
    fn new(buf: &'a str) -> Self {
        ModelReader {
            tokens: buf.split_whitespace(),
        }
    }

    fn read(mut self) -> Result<Model> {
        let feature_height = self.read_i32("model header")?;
        let feature_width = self.read_i32("model header")?;
        let num_stages = self.read_count("model header", "stages")?;

        let mut stages = Vec::with_capacity(num_stages);
        for _ in 0..num_stages {
            stages.push(self.read_stage()?);
        }

        let num_rects = self.read_count("rect count", "rects")?;
        let mut rects = Vec::with_capacity(num_rects);
        for _ in 0..num_rects {
            rects.push(LbpRect {
                x: self.read_i32("rect")?,
                y: self.read_i32("rect")?,
                w: self.read_i32("rect")?,
                h: self.read_i32("rect")?,
            });
        }

        let model = Model::new(feature_width, feature_height, stages, rects)?;
        debug!(
            "Loaded model {}x{}: {} stages, {} weak classifiers, {} rects",
            model.feature_width(),
            model.feature_height(),
            model.stages().len(),
            model.num_weak_classifiers(),
            model.rects().len()
        );
        Ok(model)
    }

    fn read_stage(&mut self) -> Result<Stage> {
        let num_weak_classifiers = self.read_count("stage header", "weak classifiers")?;
        let threshold = self.read_f32("stage header")?;

        let mut classifiers = Vec::with_capacity(num_weak_classifiers);
        for _ in 0..num_weak_classifiers {
            let rect_idx = self.read_i32("weak classifier")?;
            if rect_idx < 0 {
                return Err(Error::InvalidModel(format!(
                    "negative rect index {}",
                    rect_idx
                )));
            }
            let mut lbp_map = [0u32; 8];
            for word in lbp_map.iter_mut() {
                // stored as signed decimal, only the bit pattern matters
                *word = self.read_i32("weak classifier")? as u32;
            }
            let neg = self.read_f32("weak classifier")?;
            let pos = self.read_f32("weak classifier")?;
            classifiers.push(WeakClassifier::new(rect_idx as usize, lbp_map, pos, neg));
        }

        Ok(Stage::new(threshold, classifiers))
    }

    fn read_count(&mut self, context: &'static str, what: &str) -> Result<usize> {
        let count = self.read_i32(context)?;
        if count <= 0 {
            return Err(Error::InvalidModel(format!(
                "expected a positive number of {}, found {}",
                what, count
            )));
        }
        Ok(count as usize)
    }

    fn read_i32(&mut self, context: &'static str) -> Result<i32> {
        self.read_token(context, "an integer")
    }

    fn read_f32(&mut self, context: &'static str) -> Result<f32> {
        self.read_token(context, "a number")
    }

    fn read_token<T: FromStr>(&mut self, context: &'static str, expected: &'static str) -> Result<T> {
        let token = self.tokens.next().ok_or(Error::UnexpectedEof(context))?;
        token.parse().map_err(|_| Error::Parse {
            token: token.to_owned(),
            expected,
        })
    }
}
