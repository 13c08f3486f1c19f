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

use crate::common::{FaceInfo, ImageData};
use crate::error::{Error, Result};
use crate::Detector;

/// Video loop helper alternating full scans and tracking scans.
///
/// A frame is tracked when the previous frame produced faces, except every
/// `skip`-th frame, which always gets a full scan to pick up new faces.
pub struct FaceTracker<D: Detector> {
    detector: D,
    skip: u64,
    frame_index: u64,
    faces: Vec<FaceInfo>,
}

impl<D: Detector> FaceTracker<D> {
    pub const DEFAULT_SKIP: u64 = 10;

    pub fn new(detector: D) -> Self {
        FaceTracker {
            detector,
            skip: Self::DEFAULT_SKIP,
            frame_index: 0,
            faces: Vec::new(),
        }
    }

    pub fn with_skip(detector: D, skip: u64) -> Result<Self> {
        if skip == 0 {
            return Err(Error::InvalidParameter("tracker skip must be positive".into()));
        }
        Ok(FaceTracker {
            skip,
            ..Self::new(detector)
        })
    }

    /// Process the next frame and return the faces found in it.
    ///
    /// On error the frame still counts, and the previous faces are forgotten.
    pub fn process(&mut self, image: &ImageData) -> Result<&[FaceInfo]> {
        let index = self.frame_index;
        self.frame_index += 1;

        let previous = std::mem::take(&mut self.faces);
        self.faces = if !previous.is_empty() && index % self.skip != 0 {
            self.detector.track(image, &previous)?
        } else {
            self.detector.detect(image)?
        };
        Ok(&self.faces)
    }

    /// Faces found in the last processed frame.
    pub fn faces(&self) -> &[FaceInfo] {
        &self.faces
    }

    /// Number of frames processed so far.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn into_inner(self) -> D {
        self.detector
    }
}
