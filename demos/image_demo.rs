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

use std::env::Args;
use std::time::Instant;

use image::{DynamicImage, GrayImage, Rgb};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use lbpface::{Detector, FaceInfo, ImageData};

const OUTPUT_FILE: &str = "test.png";
const DEFAULT_MIN_FACE_WIDTH: u32 = 24;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let options = match Options::parse(std::env::args()) {
        Ok(options) => options,
        Err(message) => {
            println!("Failed to parse program arguments: {}", message);
            std::process::exit(1)
        }
    };

    let image: DynamicImage = match image::open(options.image_path()) {
        Ok(image) => image,
        Err(message) => {
            println!("Failed to read image: {}", message);
            std::process::exit(1)
        }
    };
    let gray = image.to_luma();
    let (width, height) = gray.dimensions();

    let mut detector = match lbpface::create_detector(
        options.model_path(),
        width,
        height,
        options.min_face_width,
    ) {
        Ok(detector) => detector,
        Err(error) => {
            println!("Failed to create detector: {}", error);
            std::process::exit(1)
        }
    };

    let faces = match detect_faces(&mut *detector, &gray) {
        Ok(faces) => faces,
        Err(error) => {
            println!("Detection failed: {}", error);
            std::process::exit(1)
        }
    };

    let mut rgb = image.to_rgb();
    for face in faces {
        let bbox = face.bbox();
        let rect = Rect::at(bbox.x(), bbox.y()).of_size(bbox.width(), bbox.height());

        draw_hollow_rect_mut(&mut rgb, rect, Rgb([255, 0, 0]));
    }

    match rgb.save(OUTPUT_FILE) {
        Ok(_) => println!("Saved result to {}", OUTPUT_FILE),
        Err(message) => println!("Failed to save result to a file. Reason: {}", message),
    }
}

fn detect_faces(detector: &mut dyn Detector, gray: &GrayImage) -> lbpface::Result<Vec<FaceInfo>> {
    let (width, height) = gray.dimensions();
    let image = ImageData::new(gray.as_raw(), width, height);
    let now = Instant::now();
    let faces = detector.detect(&image)?;
    println!(
        "Found {} faces in {} ms",
        faces.len(),
        now.elapsed().as_millis()
    );
    Ok(faces)
}

struct Options {
    image_path: String,
    model_path: String,
    min_face_width: u32,
}

impl Options {
    fn parse(args: Args) -> Result<Self, String> {
        let args: Vec<String> = args.collect();
        if args.len() != 3 && args.len() != 4 {
            return Err(format!(
                "Usage: {} <model-path> <image-path> [min-face-width]",
                args.first().map(String::as_str).unwrap_or("image_demo")
            ));
        }

        let min_face_width = match args.get(3) {
            Some(value) => value
                .parse()
                .map_err(|_| format!("min face width invalid: {}", value))?,
            None => DEFAULT_MIN_FACE_WIDTH,
        };

        Ok(Options {
            image_path: args[2].clone(),
            model_path: args[1].clone(),
            min_face_width,
        })
    }

    fn image_path(&self) -> &str {
        &self.image_path[..]
    }

    fn model_path(&self) -> &str {
        &self.model_path[..]
    }
}
