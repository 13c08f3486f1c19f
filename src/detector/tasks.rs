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

use crate::common::{FaceInfo, Rectangle, Seq};
use crate::detector::DetectionParams;
use crate::math;

/// Candidate window: top-left corner and the scale of the model feature window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Task {
    pub x: i32,
    pub y: i32,
    pub scale: f32,
}

impl Task {
    pub fn new(x: i32, y: i32, scale: f32) -> Self {
        Task { x, y, scale }
    }

    /// Scale in the sub-pixel units used to place feature corners.
    #[inline]
    pub fn fixed_scale(&self) -> i32 {
        math::fixed_scale(self.scale)
    }

    /// Window covered by this task for a model of `feature_width` x `feature_height`.
    pub fn window(&self, feature_width: u32, feature_height: u32) -> Rectangle {
        Rectangle::new(
            self.x,
            self.y,
            (feature_width as f32 * self.scale) as u32,
            (feature_height as f32 * self.scale) as u32,
        )
    }
}

/// Frame and model geometry shared by both task generators.
#[derive(Debug, Clone, Copy)]
pub struct ScanGeometry {
    pub width: u32,
    pub height: u32,
    pub feature_width: u32,
    pub feature_height: u32,
}

impl ScanGeometry {
    fn min_scale(&self, params: &DetectionParams) -> f32 {
        params.min_face_width() as f32 / self.feature_width as f32
    }

    fn max_scale(&self) -> f32 {
        f32::min(
            self.width as f32 / self.feature_width as f32,
            self.height as f32 / self.feature_height as f32,
        )
    }
}

/// Every window of the full frame, scale by scale.
pub fn full_scan_tasks(geometry: &ScanGeometry, params: &DetectionParams) -> Vec<Task> {
    let mut tasks = Vec::new();
    let region = Region {
        min_x: 0,
        min_y: 0,
        max_x: geometry.width as i32 - 1,
        max_y: geometry.height as i32 - 1,
    };

    let max_scale = geometry.max_scale();
    for scale in Seq::new(geometry.min_scale(params), |s| s * params.scaling_factor())
        .take_while(|s| *s < max_scale)
    {
        push_region_tasks(&mut tasks, geometry, params, &region, scale);
    }
    tasks
}

/// Windows around each of the `faces` found in a previous frame.
///
/// Scales are limited to a band around the previous face size and positions to
/// the face box grown by the tracking offset on every side.
pub fn tracking_tasks(
    geometry: &ScanGeometry,
    params: &DetectionParams,
    faces: &[FaceInfo],
) -> Vec<Task> {
    let mut tasks = Vec::new();
    let fw = geometry.feature_width as f32;

    for face in faces {
        let bbox = face.bbox();
        let face_scale = bbox.width() as f32 / fw;
        let scale_min = f32::max(
            geometry.min_scale(params),
            face_scale * params.tracking_scale_down(),
        );
        let scale_max = f32::min(geometry.max_scale(), face_scale * params.tracking_scale_up());

        let region = Region::around(bbox, params.tracking_offset()).clip(geometry);
        for scale in Seq::new(scale_min, |s| s * params.scaling_factor())
            .take_while(|s| *s < scale_max)
        {
            push_region_tasks(&mut tasks, geometry, params, &region, scale);
        }
    }
    tasks
}

struct Region {
    min_x: i32,
    min_y: i32,
    max_x: i32,
    max_y: i32,
}

impl Region {
    fn around(bbox: &Rectangle, offset: f32) -> Self {
        let (x, y) = (bbox.x() as f32, bbox.y() as f32);
        let (w, h) = (bbox.width() as f32, bbox.height() as f32);
        Region {
            min_x: (x - w * offset) as i32,
            min_y: (y - h * offset) as i32,
            max_x: (x + w * (1.0 + offset)) as i32,
            max_y: (y + h * (1.0 + offset)) as i32,
        }
    }

    fn clip(self, geometry: &ScanGeometry) -> Self {
        Region {
            min_x: cmp::max(self.min_x, 0),
            min_y: cmp::max(self.min_y, 0),
            max_x: cmp::min(self.max_x, geometry.width as i32 - 1),
            max_y: cmp::min(self.max_y, geometry.height as i32 - 1),
        }
    }
}

fn push_region_tasks(
    tasks: &mut Vec<Task>,
    geometry: &ScanGeometry,
    params: &DetectionParams,
    region: &Region,
    scale: f32,
) {
    let scaled_width = geometry.feature_width as f32 * scale;
    let scaled_height = geometry.feature_height as f32 * scale;
    let step_x = cmp::max(1, (scaled_width / params.step_scale_x()) as i32);
    let step_y = cmp::max(1, (scaled_height / params.step_scale_y()) as i32);

    let mut x = region.min_x;
    while (x as f32 + scaled_width) < region.max_x as f32 {
        let mut y = region.min_y;
        while (y as f32 + scaled_height) < region.max_y as f32 {
            tasks.push(Task::new(x, y, scale));
            y += step_y;
        }
        x += step_x;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(width: u32, height: u32) -> ScanGeometry {
        ScanGeometry {
            width,
            height,
            feature_width: 24,
            feature_height: 24,
        }
    }

    #[test]
    fn test_full_scan_covers_frame() {
        let geometry = geometry(320, 240);
        let params = DetectionParams::new(24);
        let tasks = full_scan_tasks(&geometry, &params);

        assert!(!tasks.is_empty());
        assert_eq!(Task::new(0, 0, 1.0), tasks[0]);
        // x is the outer loop
        assert_eq!(Task::new(0, 3, 1.0), tasks[1]);
        for task in &tasks {
            let size = 24.0 * task.scale;
            assert!(task.x >= 0 && task.y >= 0);
            assert!(task.x as f32 + size < 319.0);
            assert!(task.y as f32 + size < 239.0);
            assert!(task.scale >= 1.0 && task.scale < 10.0);
        }
    }

    #[test]
    fn test_full_scan_scales() {
        let geometry = geometry(100, 100);
        let params = DetectionParams::new(24).set_scaling_factor(2.0);
        let mut scales: Vec<f32> = full_scan_tasks(&geometry, &params)
            .iter()
            .map(|t| t.scale)
            .collect();
        scales.dedup();
        assert_eq!(vec![1.0, 2.0, 4.0], scales);
    }

    #[test]
    fn test_full_scan_min_face_too_large() {
        let geometry = geometry(64, 64);
        let params = DetectionParams::new(64);
        assert!(full_scan_tasks(&geometry, &params).is_empty());
    }

    #[test]
    fn test_small_scale_step_is_at_least_one() {
        let geometry = geometry(40, 40);
        let params = DetectionParams::new(4);
        let tasks = full_scan_tasks(&geometry, &params);
        assert_eq!(Task::new(0, 1, 1.0 / 6.0), tasks[1]);
    }

    #[test]
    fn test_tracking_bounds() {
        let geometry = geometry(320, 240);
        let params = DetectionParams::new(24);
        let faces = [FaceInfo::new(Rectangle::new(100, 80, 48, 48), 5)];
        let tasks = tracking_tasks(&geometry, &params, &faces);

        assert!(!tasks.is_empty());
        for task in &tasks {
            assert!(task.x >= 76 && task.y >= 56, "{:?}", task);
            let size = 24.0 * task.scale;
            assert!(task.x as f32 + size < 172.0, "{:?}", task);
            assert!(task.y as f32 + size < 152.0, "{:?}", task);
            assert!(task.scale >= 1.0 && task.scale < 3.0, "{:?}", task);
        }
    }

    #[test]
    fn test_tracking_region_is_clipped() {
        let geometry = geometry(100, 100);
        let params = DetectionParams::new(24);
        let faces = [FaceInfo::new(Rectangle::new(-10, 70, 30, 30), 3)];
        let tasks = tracking_tasks(&geometry, &params, &faces);

        assert!(!tasks.is_empty());
        for task in &tasks {
            let size = 24.0 * task.scale;
            assert!(task.x >= 0 && task.y >= 55, "{:?}", task);
            assert!(task.x as f32 + size < 35.0, "{:?}", task);
            assert!(task.y as f32 + size < 99.0, "{:?}", task);
        }
    }

    #[test]
    fn test_tracking_without_faces() {
        let geometry = geometry(100, 100);
        let params = DetectionParams::new(24);
        assert!(tracking_tasks(&geometry, &params, &[]).is_empty());
    }

    #[test]
    fn test_task_window() {
        let task = Task::new(3, 4, 1.5);
        assert_eq!(Rectangle::new(3, 4, 36, 30), task.window(24, 20));
    }
}
