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

mod simd;

use std::fmt;
use std::sync::OnceLock;

use tracing::debug;

use crate::common::IntegralImage;
use crate::detector::Task;
use crate::feat::{self, Corners};
use crate::model::{Model, Stage};

#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub enum KernelKind {
    Scalar,
    Sse2,
    Neon,
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            KernelKind::Scalar => "scalar",
            KernelKind::Sse2 => "sse2",
            KernelKind::Neon => "neon",
        };
        f.write_str(name)
    }
}

/// Strategy computing the LBP code of a feature from its block corners.
///
/// A vector kernel can only be obtained when the running CPU supports it,
/// so every `LbpKernel` value is safe to use.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct LbpKernel {
    kind: KernelKind,
}

static GLOBAL_KERNEL: OnceLock<LbpKernel> = OnceLock::new();

impl LbpKernel {
    pub fn scalar() -> Self {
        LbpKernel {
            kind: KernelKind::Scalar,
        }
    }

    #[allow(unreachable_code)]
    pub fn sse2() -> Option<Self> {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        {
            if is_x86_feature_detected!("sse2") {
                return Some(LbpKernel {
                    kind: KernelKind::Sse2,
                });
            }
        }
        None
    }

    #[allow(unreachable_code)]
    pub fn neon() -> Option<Self> {
        #[cfg(target_arch = "aarch64")]
        {
            if std::arch::is_aarch64_feature_detected!("neon") {
                return Some(LbpKernel {
                    kind: KernelKind::Neon,
                });
            }
        }
        None
    }

    /// Best kernel supported by the running CPU.
    pub fn detect() -> Self {
        Self::sse2()
            .or_else(Self::neon)
            .unwrap_or_else(Self::scalar)
    }

    /// Process-wide kernel, probed on first use and fixed afterwards.
    pub fn global() -> Self {
        *GLOBAL_KERNEL.get_or_init(|| {
            let kernel = Self::detect();
            debug!("Using {} LBP kernel", kernel.kind);
            kernel
        })
    }

    #[inline]
    pub fn kind(&self) -> KernelKind {
        self.kind
    }

    #[inline]
    pub fn lbp_code(&self, corners: &Corners) -> u8 {
        match self.kind {
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            KernelKind::Sse2 => unsafe { simd::lbp_code_sse2(corners) },
            #[cfg(target_arch = "aarch64")]
            KernelKind::Neon => unsafe { simd::lbp_code_neon(corners) },
            _ => feat::lbp_code(&feat::block_sums(corners)),
        }
    }
}

/// Boosted cascade evaluation of single candidate windows.
#[derive(Clone, Copy)]
pub struct CascadeEvaluator<'a> {
    model: &'a Model,
    kernel: LbpKernel,
}

impl<'a> CascadeEvaluator<'a> {
    pub fn new(model: &'a Model, kernel: LbpKernel) -> Self {
        CascadeEvaluator { model, kernel }
    }

    /// Whether `task` passes every stage of the cascade.
    ///
    /// Evaluation stops at the first stage whose vote sum is below its threshold.
    pub fn evaluate(&self, task: &Task, integral: &IntegralImage) -> bool {
        self.model
            .stages()
            .iter()
            .all(|stage| self.stage_sum(stage, task, integral) >= stage.threshold())
    }

    pub fn stage_sum(&self, stage: &Stage, task: &Task, integral: &IntegralImage) -> f32 {
        let rects = self.model.rects();
        let scale = task.fixed_scale();
        let mut sum = 0.0f32;
        for classifier in stage.classifiers() {
            let corners = feat::sample_corners(
                &rects[classifier.rect_idx()],
                integral,
                task.x,
                task.y,
                scale,
            );
            sum += classifier.vote(self.kernel.lbp_code(&corners));
        }
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_corners(rng: &mut StdRng) -> Corners {
        let mut corners = [[0u32; 4]; 4];
        for row in corners.iter_mut() {
            for c in row.iter_mut() {
                *c = if rng.gen_bool(0.1) {
                    rng.gen()
                } else {
                    rng.gen_range(0..1000)
                };
            }
        }
        corners
    }

    #[test]
    fn test_detect_is_supported() {
        let kernel = LbpKernel::detect();
        match kernel.kind() {
            KernelKind::Scalar => {}
            KernelKind::Sse2 => assert!(LbpKernel::sse2().is_some()),
            KernelKind::Neon => assert!(LbpKernel::neon().is_some()),
        }
    }

    #[test]
    fn test_global_is_stable() {
        assert_eq!(LbpKernel::global(), LbpKernel::global());
        assert_eq!(LbpKernel::detect(), LbpKernel::global());
    }

    #[test]
    fn test_vector_kernel_matches_scalar() {
        let scalar = LbpKernel::scalar();
        let vector = LbpKernel::detect();
        let mut rng = StdRng::seed_from_u64(0x1bf);

        for _ in 0..10_000 {
            let corners = random_corners(&mut rng);
            assert_eq!(
                scalar.lbp_code(&corners),
                vector.lbp_code(&corners),
                "corners: {:?}",
                corners
            );
        }
    }

    #[test]
    fn test_vector_kernel_ties() {
        // all blocks equal: every comparison is >=
        let corners = [[40, 30, 20, 10], [30, 20, 10, 0], [20, 10, 0, 0], [10, 0, 0, 0]];
        let blocks = feat::block_sums(&corners);
        assert_eq!(0xFF, feat::lbp_code(&blocks));
        assert_eq!(0xFF, LbpKernel::detect().lbp_code(&corners));
    }
}
