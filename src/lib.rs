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

mod classifier;
mod common;
mod detector;
mod error;
mod feat;
mod math;
pub mod model;

pub use crate::classifier::{CascadeEvaluator, KernelKind, LbpKernel};
pub use crate::common::{FaceInfo, ImageData, IntegralImage, Rectangle};
#[cfg(feature = "gpu")]
pub use crate::detector::GpuEvaluator;
pub use crate::detector::{
    full_scan_tasks, group_rectangles, tracking_tasks, Backend, Capped, DetectionParams,
    DisjointSet, FaceTracker, LbpDetector, ScanGeometry, Task, Truncation,
};
pub use crate::error::{Error, Result};
pub use crate::model::{load_model, read_model, Model};

use std::path::Path;

/// Create a face detector for `width` x `height` frames, based on a file with model description.
pub fn create_detector<P: AsRef<Path>>(
    path_to_model: P,
    width: u32,
    height: u32,
    min_face_width: u32,
) -> Result<Box<dyn Detector>> {
    let model = load_model(path_to_model)?;
    create_detector_with_model(model, width, height, min_face_width)
}

/// Create a face detector for `width` x `height` frames, based on the provided model.
///
/// Cascade evaluation runs on the CPU with the best LBP kernel it supports.
pub fn create_detector_with_model(
    model: Model,
    width: u32,
    height: u32,
    min_face_width: u32,
) -> Result<Box<dyn Detector>> {
    let detector = LbpDetector::new(
        width,
        height,
        model,
        DetectionParams::new(min_face_width),
        Backend::default(),
    )?;
    Ok(Box::new(detector))
}

/// Face detector.
///
/// # Examples
///
/// ```rust,no_run
/// use lbpface::{Detector, ImageData};
///
/// let (width, height) = (640, 480);
/// let mut detector = lbpface::create_detector("/path/to/model", width, height, 40).unwrap();
///
/// let bytes = vec![0u8; (width * height) as usize];
/// let image = ImageData::new(&bytes, width, height);
/// let faces = detector.detect(&image).unwrap();
/// for face in &faces {
///     // print confidence and coordinates
///     println!("found face: {:?}", face);
/// }
///
/// // next frame: only look around the faces found so far
/// let faces = detector.track(&image, &faces).unwrap();
/// ```
pub trait Detector {
    /// Scan the whole frame for faces.
    ///
    /// The input image must be gray-scale, with exactly the frame size the
    /// detector was created for.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidImage`] if the image does not match the frame
    /// size, and with [`Error::Transfer`] if the compute device fails. The
    /// detector remains usable in both cases.
    fn detect(&mut self, image: &ImageData) -> Result<Vec<FaceInfo>>;

    /// Scan only around `previous` faces, typically those found in the preceding frame.
    ///
    /// Falls back to a full scan when `previous` is empty.
    fn track(&mut self, image: &ImageData, previous: &[FaceInfo]) -> Result<Vec<FaceInfo>>;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn detect(&mut self, image: &ImageData) -> Result<Vec<FaceInfo>> {
        (**self).detect(image)
    }

    fn track(&mut self, image: &ImageData, previous: &[FaceInfo]) -> Result<Vec<FaceInfo>> {
        (**self).track(image, previous)
    }
}
