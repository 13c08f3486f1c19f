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

#[cfg(feature = "gpu")]
mod gpu;
mod grouping;
mod tasks;
mod tracker;

use std::cmp::Reverse;

use tracing::{debug, warn};

use crate::classifier::{CascadeEvaluator, LbpKernel};
use crate::common::{FaceInfo, ImageData, IntegralImage, Rectangle};
use crate::error::{Error, Result};
use crate::model::Model;
use crate::Detector;

#[cfg(feature = "gpu")]
pub use self::gpu::GpuEvaluator;
pub use self::grouping::{group_rectangles, DisjointSet};
pub use self::tasks::{full_scan_tasks, tracking_tasks, ScanGeometry, Task};
pub use self::tracker::FaceTracker;

/// Scan and grouping parameters, fixed for the lifetime of a detector.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionParams {
    min_face_width: u32,
    scaling_factor: f32,
    step_scale_x: f32,
    step_scale_y: f32,
    tracking_scale_down: f32,
    tracking_scale_up: f32,
    tracking_offset: f32,
    group_threshold: i32,
    eps: f32,
}

impl Default for DetectionParams {
    fn default() -> Self {
        DetectionParams::new(24)
    }
}

impl DetectionParams {
    pub fn new(min_face_width: u32) -> Self {
        DetectionParams {
            min_face_width,
            scaling_factor: 1.125,
            step_scale_x: 8.0,
            step_scale_y: 8.0,
            tracking_scale_down: 0.5,
            tracking_scale_up: 1.5,
            tracking_offset: 0.5,
            group_threshold: 2,
            eps: 0.2,
        }
    }

    #[inline]
    pub fn min_face_width(&self) -> u32 {
        self.min_face_width
    }

    /// Set the smallest face width to look for, in pixels.
    pub fn set_min_face_width(mut self, min_face_width: u32) -> Self {
        self.min_face_width = min_face_width;
        self
    }

    #[inline]
    pub fn scaling_factor(&self) -> f32 {
        self.scaling_factor
    }

    /// Set the ratio between adjacent scan scales. Must be greater than 1.
    pub fn set_scaling_factor(mut self, scaling_factor: f32) -> Self {
        self.scaling_factor = scaling_factor;
        self
    }

    #[inline]
    pub fn step_scale_x(&self) -> f32 {
        self.step_scale_x
    }

    #[inline]
    pub fn step_scale_y(&self) -> f32 {
        self.step_scale_y
    }

    /// Set how many window steps fit into one window, horizontally and vertically.
    ///
    /// The sliding step at a given scale is the scaled window size divided by
    /// these values, and never less than one pixel.
    pub fn set_step_scale(mut self, step_scale_x: f32, step_scale_y: f32) -> Self {
        self.step_scale_x = step_scale_x;
        self.step_scale_y = step_scale_y;
        self
    }

    #[inline]
    pub fn tracking_scale_down(&self) -> f32 {
        self.tracking_scale_down
    }

    #[inline]
    pub fn tracking_scale_up(&self) -> f32 {
        self.tracking_scale_up
    }

    /// Set the band of scales searched around a tracked face, relative to its size.
    pub fn set_tracking_scales(mut self, down: f32, up: f32) -> Self {
        self.tracking_scale_down = down;
        self.tracking_scale_up = up;
        self
    }

    #[inline]
    pub fn tracking_offset(&self) -> f32 {
        self.tracking_offset
    }

    /// Set how far around a tracked face to search, as a fraction of its size.
    pub fn set_tracking_offset(mut self, tracking_offset: f32) -> Self {
        self.tracking_offset = tracking_offset;
        self
    }

    #[inline]
    pub fn group_threshold(&self) -> i32 {
        self.group_threshold
    }

    /// Set the number of raw hits a cluster must exceed to be reported.
    /// Zero or less disables grouping.
    pub fn set_group_threshold(mut self, group_threshold: i32) -> Self {
        self.group_threshold = group_threshold;
        self
    }

    #[inline]
    pub fn eps(&self) -> f32 {
        self.eps
    }

    /// Set the relative distance under which two raw hits belong to the same cluster.
    pub fn set_eps(mut self, eps: f32) -> Self {
        self.eps = eps;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_face_width == 0 {
            return Err(Error::InvalidParameter("min face width must be positive".into()));
        }
        if !(self.scaling_factor > 1.0) || !self.scaling_factor.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "illegal scaling factor: {}",
                self.scaling_factor
            )));
        }
        if !(self.step_scale_x > 0.0) || !(self.step_scale_y > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "illegal step scale: {}x{}",
                self.step_scale_x, self.step_scale_y
            )));
        }
        if !(self.tracking_scale_down > 0.0) || !(self.tracking_scale_up >= self.tracking_scale_down)
        {
            return Err(Error::InvalidParameter(format!(
                "illegal tracking scales: {} .. {}",
                self.tracking_scale_down, self.tracking_scale_up
            )));
        }
        if !(self.tracking_offset >= 0.0) {
            return Err(Error::InvalidParameter(format!(
                "illegal tracking offset: {}",
                self.tracking_offset
            )));
        }
        if !(self.eps >= 0.0) {
            return Err(Error::InvalidParameter(format!("illegal eps: {}", self.eps)));
        }
        Ok(())
    }
}

/// Where cascade evaluation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// On the CPU, with the given LBP kernel.
    Host(LbpKernel),
    /// On a compute device. Construction fails if none is usable.
    #[cfg(feature = "gpu")]
    Gpu,
}

impl Default for Backend {
    fn default() -> Self {
        Backend::Host(LbpKernel::global())
    }
}

enum Evaluator {
    Host(LbpKernel),
    #[cfg(feature = "gpu")]
    Gpu(Box<GpuEvaluator>),
}

/// Order in which faces are kept when a result is capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Truncation {
    /// Keep the first faces in the order the clusters were found.
    #[default]
    DiscoveryOrder,
    /// Keep the faces with the highest confidence.
    ByConfidence,
}

/// Faces capped to a caller-provided capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capped {
    pub faces: Vec<FaceInfo>,
    /// Whether faces were dropped to fit the capacity.
    pub truncated: bool,
}

/// MB-LBP cascade detector for frames of a fixed size.
///
/// The integral image and raw hit buffers are owned by the detector and
/// overwritten on every call.
pub struct LbpDetector {
    evaluator: Evaluator,
    model: Model,
    params: DetectionParams,
    geometry: ScanGeometry,
    integral: IntegralImage,
    tasks: Vec<Task>,
    raw_hits: Vec<Rectangle>,
}

impl LbpDetector {
    pub fn new(
        width: u32,
        height: u32,
        model: Model,
        params: DetectionParams,
        backend: Backend,
    ) -> Result<Self> {
        params.validate()?;
        let integral = IntegralImage::new(width, height)?;

        let geometry = ScanGeometry {
            width,
            height,
            feature_width: model.feature_width() as u32,
            feature_height: model.feature_height() as u32,
        };
        let tasks = full_scan_tasks(&geometry, &params);
        debug!(
            "{}x{} frame, min face {}: {} full scan tasks",
            width,
            height,
            params.min_face_width(),
            tasks.len()
        );

        let evaluator = match backend {
            Backend::Host(kernel) => Evaluator::Host(kernel),
            #[cfg(feature = "gpu")]
            Backend::Gpu => Evaluator::Gpu(Box::new(GpuEvaluator::new(
                &model, &tasks, width, height,
            )?)),
        };

        Ok(LbpDetector {
            evaluator,
            model,
            params,
            geometry,
            integral,
            tasks,
            raw_hits: Vec::new(),
        })
    }

    /// Host detector with an explicit LBP kernel.
    pub fn with_kernel(
        width: u32,
        height: u32,
        model: Model,
        params: DetectionParams,
        kernel: LbpKernel,
    ) -> Result<Self> {
        Self::new(width, height, model, params, Backend::Host(kernel))
    }

    pub fn width(&self) -> u32 {
        self.geometry.width
    }

    pub fn height(&self) -> u32 {
        self.geometry.height
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn params(&self) -> &DetectionParams {
        &self.params
    }

    /// Windows evaluated by a full scan.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Backend in use; `None` when running on a compute device.
    pub fn kernel(&self) -> Option<LbpKernel> {
        match self.evaluator {
            Evaluator::Host(kernel) => Some(kernel),
            #[cfg(feature = "gpu")]
            Evaluator::Gpu(_) => None,
        }
    }

    /// Full scan, capped to `capacity` faces.
    pub fn detect_with_capacity(
        &mut self,
        image: &ImageData,
        capacity: usize,
        order: Truncation,
    ) -> Result<Capped> {
        let faces = self.detect(image)?;
        Ok(cap(faces, capacity, order))
    }

    /// Tracking scan, capped to `capacity` faces.
    pub fn track_with_capacity(
        &mut self,
        image: &ImageData,
        previous: &[FaceInfo],
        capacity: usize,
        order: Truncation,
    ) -> Result<Capped> {
        let faces = self.track(image, previous)?;
        Ok(cap(faces, capacity, order))
    }

    fn load_frame(&mut self, image: &ImageData) -> Result<()> {
        self.integral.compute(image)
    }

    fn scan(&mut self, tasks: Option<&[Task]>) -> Result<Vec<FaceInfo>> {
        self.raw_hits.clear();
        let scanned = tasks.unwrap_or(&self.tasks);

        match self.evaluator {
            Evaluator::Host(kernel) => {
                let evaluator = CascadeEvaluator::new(&self.model, kernel);
                let (fw, fh) = (self.geometry.feature_width, self.geometry.feature_height);
                host_scan(&evaluator, scanned, &self.integral, fw, fh, &mut self.raw_hits);
            }
            #[cfg(feature = "gpu")]
            Evaluator::Gpu(ref mut gpu) => {
                gpu.scan(&self.integral, tasks, &mut self.raw_hits)?;
            }
        }

        debug!(
            "{} LBP tasks tested, {} raw hits",
            scanned.len(),
            self.raw_hits.len()
        );

        Ok(group_rectangles(
            &self.raw_hits,
            self.params.group_threshold(),
            self.params.eps(),
        )
        .into_iter()
        .map(|(bbox, weight)| FaceInfo::new(bbox, weight))
        .collect())
    }
}

impl Detector for LbpDetector {
    fn detect(&mut self, image: &ImageData) -> Result<Vec<FaceInfo>> {
        self.load_frame(image)?;
        self.scan(None)
    }

    fn track(&mut self, image: &ImageData, previous: &[FaceInfo]) -> Result<Vec<FaceInfo>> {
        if previous.is_empty() {
            return self.detect(image);
        }
        self.load_frame(image)?;
        let tasks = tracking_tasks(&self.geometry, &self.params, previous);
        self.scan(Some(tasks.as_slice()))
    }
}

#[cfg(feature = "rayon")]
fn host_scan(
    evaluator: &CascadeEvaluator,
    tasks: &[Task],
    integral: &IntegralImage,
    feature_width: u32,
    feature_height: u32,
    hits: &mut Vec<Rectangle>,
) {
    use rayon::prelude::*;

    hits.par_extend(
        tasks
            .par_iter()
            .filter(|task| evaluator.evaluate(task, integral))
            .map(|task| task.window(feature_width, feature_height)),
    );
}

#[cfg(not(feature = "rayon"))]
fn host_scan(
    evaluator: &CascadeEvaluator,
    tasks: &[Task],
    integral: &IntegralImage,
    feature_width: u32,
    feature_height: u32,
    hits: &mut Vec<Rectangle>,
) {
    hits.extend(
        tasks
            .iter()
            .filter(|task| evaluator.evaluate(task, integral))
            .map(|task| task.window(feature_width, feature_height)),
    );
}

fn cap(mut faces: Vec<FaceInfo>, capacity: usize, order: Truncation) -> Capped {
    if faces.len() <= capacity {
        return Capped {
            faces,
            truncated: false,
        };
    }

    warn!(
        "Capacity of {} faces not large enough for {} faces found",
        capacity,
        faces.len()
    );
    if order == Truncation::ByConfidence {
        faces.sort_by_key(|face| Reverse(face.confidence()));
    }
    faces.truncate(capacity);
    Capped {
        faces,
        truncated: true,
    }
}
