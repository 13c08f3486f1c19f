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

//! Merging of overlapping raw detections, in the manner of OpenCV `groupRectangles`.

use std::cmp;

use crate::common::Rectangle;
use crate::math;

/// Union-find forest with union by rank and path compression.
#[derive(Debug, Clone)]
pub struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u32>,
}

impl DisjointSet {
    pub fn new(size: usize) -> Self {
        DisjointSet {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    pub fn find(&mut self, node: usize) -> usize {
        let mut root = node;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        let mut current = node;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    /// Merge the sets of `a` and `b`. Returns false if they were already joined.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return false;
        }

        match self.rank[root_a].cmp(&self.rank[root_b]) {
            cmp::Ordering::Greater => self.parent[root_b] = root_a,
            cmp::Ordering::Less => self.parent[root_a] = root_b,
            cmp::Ordering::Equal => {
                self.parent[root_a] = root_b;
                self.rank[root_b] += 1;
            }
        }
        true
    }

    /// Component label of every node, labels numbered in order of first appearance.
    ///
    /// Returns the labels and the number of components.
    pub fn components(&mut self) -> (Vec<usize>, usize) {
        let mut root_labels = vec![usize::MAX; self.len()];
        let mut labels = Vec::with_capacity(self.len());
        let mut count = 0;

        for node in 0..self.len() {
            let root = self.find(node);
            if root_labels[root] == usize::MAX {
                root_labels[root] = count;
                count += 1;
            }
            labels.push(root_labels[root]);
        }
        (labels, count)
    }
}

fn is_similar(eps: f32, r1: &Rectangle, r2: &Rectangle) -> bool {
    let delta = eps
        * (cmp::min(r1.width(), r2.width()) + cmp::min(r1.height(), r2.height())) as f32
        * 0.5;
    let (w1, h1) = (r1.width() as i32, r1.height() as i32);
    let (w2, h2) = (r2.width() as i32, r2.height() as i32);

    (r1.x() - r2.x()).abs() as f32 <= delta
        && (r1.y() - r2.y()).abs() as f32 <= delta
        && (r1.x() + w1 - r2.x() - w2).abs() as f32 <= delta
        && (r1.y() + h1 - r2.y() - h2).abs() as f32 <= delta
}

/// Cluster `rects` and return the averaged rectangle and member count of each
/// surviving cluster, in order of first member.
///
/// Clusters with no more than `group_threshold` members are dropped, as are
/// clusters lying inside a stronger one. A `group_threshold` of 0 or less
/// disables grouping: every rectangle comes back on its own with a count of 1.
pub fn group_rectangles(
    rects: &[Rectangle],
    group_threshold: i32,
    eps: f32,
) -> Vec<(Rectangle, u32)> {
    if group_threshold <= 0 || rects.is_empty() {
        return rects.iter().map(|r| (*r, 1)).collect();
    }

    let mut set = DisjointSet::new(rects.len());
    for i in 0..rects.len() {
        for j in (i + 1)..rects.len() {
            if is_similar(eps, &rects[i], &rects[j]) {
                set.union(i, j);
            }
        }
    }
    let (labels, count) = set.components();

    let mut sums = vec![[0i64; 4]; count];
    let mut weights = vec![0u32; count];
    for (rect, &label) in rects.iter().zip(labels.iter()) {
        let sum = &mut sums[label];
        sum[0] += i64::from(rect.x());
        sum[1] += i64::from(rect.y());
        sum[2] += i64::from(rect.width());
        sum[3] += i64::from(rect.height());
        weights[label] += 1;
    }

    let averaged: Vec<Rectangle> = sums
        .iter()
        .zip(weights.iter())
        .map(|(sum, &weight)| {
            let s = 1.0 / weight as f32;
            Rectangle::new(
                math::round(sum[0] as f32 * s),
                math::round(sum[1] as f32 * s),
                math::round(sum[2] as f32 * s) as u32,
                math::round(sum[3] as f32 * s) as u32,
            )
        })
        .collect();

    let threshold = group_threshold as u32;
    let mut grouped = Vec::new();
    for (i, (r1, &n1)) in averaged.iter().zip(weights.iter()).enumerate() {
        if n1 <= threshold {
            continue;
        }

        let nested = averaged
            .iter()
            .zip(weights.iter())
            .enumerate()
            .filter(|&(j, (_, &n2))| j != i && n2 > threshold)
            .any(|(_, (r2, &n2))| {
                let dx = math::round(r2.width() as f32 * eps);
                let dy = math::round(r2.height() as f32 * eps);
                r1.is_inside(r2, dx, dy) && (n2 > cmp::max(3, n1) || n1 < 3)
            });

        if !nested {
            grouped.push((*r1, n1));
        }
    }
    grouped
}
