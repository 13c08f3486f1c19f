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

mod common;

use lbpface::{
    CascadeEvaluator, DetectionParams, Detector, ImageData, IntegralImage, LbpDetector,
    LbpKernel, Task,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const WIDTH: u32 = 160;
const HEIGHT: u32 = 120;

#[test]
fn scalar_and_vector_kernels_agree_on_random_tasks() {
    let mut rng = StdRng::seed_from_u64(20130521);
    let model = common::random_model(&mut rng, 6, 8);
    let pixels = common::random_frame(&mut rng, WIDTH, HEIGHT);
    let mut integral = IntegralImage::new(WIDTH, HEIGHT).unwrap();
    integral
        .compute(&ImageData::new(&pixels, WIDTH, HEIGHT))
        .unwrap();

    let scalar = CascadeEvaluator::new(&model, LbpKernel::scalar());
    let vector = CascadeEvaluator::new(&model, LbpKernel::detect());

    let mut passed = 0;
    for _ in 0..1000 {
        let scale = rng.gen_range(0.5f32..4.0);
        let size = (24.0 * scale) as i32;
        // some windows hang over the frame border to exercise clamping
        let task = Task::new(
            rng.gen_range(-4..WIDTH as i32 - size / 2),
            rng.gen_range(-4..HEIGHT as i32 - size / 2),
            scale,
        );

        for stage in model.stages() {
            assert_eq!(
                scalar.stage_sum(stage, &task, &integral).to_bits(),
                vector.stage_sum(stage, &task, &integral).to_bits(),
                "{:?}",
                task
            );
        }
        let decision = scalar.evaluate(&task, &integral);
        assert_eq!(decision, vector.evaluate(&task, &integral), "{:?}", task);
        if decision {
            passed += 1;
        }
    }
    println!("{} of 1000 random tasks passed", passed);
}

#[test]
fn detectors_agree_across_kernels() {
    let mut rng = StdRng::seed_from_u64(7);
    let model = common::random_model(&mut rng, 3, 4);
    let pixels = common::random_frame(&mut rng, WIDTH, HEIGHT);
    let image = ImageData::new(&pixels, WIDTH, HEIGHT);
    let params = DetectionParams::new(24).set_group_threshold(0);

    let mut scalar =
        LbpDetector::with_kernel(WIDTH, HEIGHT, model.clone(), params.clone(), LbpKernel::scalar())
            .unwrap();
    let mut vector =
        LbpDetector::with_kernel(WIDTH, HEIGHT, model, params, LbpKernel::detect()).unwrap();

    assert_eq!(scalar.detect(&image).unwrap(), vector.detect(&image).unwrap());
}

// Needs a compute adapter; skipped when none is present.
#[cfg(feature = "gpu")]
#[test]
fn device_and_host_agree_on_every_window() {
    use lbpface::{Backend, Error, FaceInfo, Rectangle};

    const WIDTH: u32 = 320;
    const HEIGHT: u32 = 240;
    let previous = vec![
        FaceInfo::new(Rectangle::new(40, 30, 48, 48), 3),
        FaceInfo::new(Rectangle::new(150, 80, 30, 30), 5),
        FaceInfo::new(Rectangle::new(290, 200, 60, 60), 4),
    ];

    for seed in 0..5 {
        let mut rng = StdRng::seed_from_u64(seed);
        let model = common::random_model(&mut rng, 4, 6);
        let pixels = common::random_frame(&mut rng, WIDTH, HEIGHT);
        let image = ImageData::new(&pixels, WIDTH, HEIGHT);
        let params = DetectionParams::new(24).set_group_threshold(0);

        let mut device =
            match LbpDetector::new(WIDTH, HEIGHT, model.clone(), params.clone(), Backend::Gpu) {
                Ok(detector) => detector,
                Err(Error::Gpu(message)) => {
                    println!("skipping device comparison: {}", message);
                    return;
                }
                Err(e) => panic!("{}", e),
            };
        let mut host =
            LbpDetector::with_kernel(WIDTH, HEIGHT, model, params, LbpKernel::scalar()).unwrap();

        let expected = host.detect(&image).unwrap();
        assert_eq!(expected, device.detect(&image).unwrap(), "seed {}", seed);

        let expected = host.track(&image, &previous).unwrap();
        assert_eq!(expected, device.track(&image, &previous).unwrap(), "seed {}", seed);
    }
}
