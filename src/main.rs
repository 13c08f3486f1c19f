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
use std::fs;

use tracing_subscriber::EnvFilter;

use lbpface::{Backend, DetectionParams, ImageData, LbpDetector, Truncation};

const DEFAULT_MIN_FACE_WIDTH: u32 = 24;
const MAX_FACES: usize = 30;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let options = match Options::parse(std::env::args()) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("Failed to parse program arguments: {}", message);
            std::process::exit(1);
        }
    };

    let model = match lbpface::load_model(&options.model_path) {
        Ok(model) => model,
        Err(error) => {
            eprintln!("Failed to load model: {}", error);
            std::process::exit(1);
        }
    };

    let mut detector = match LbpDetector::new(
        options.width,
        options.height,
        model,
        DetectionParams::new(options.min_face_width),
        Backend::default(),
    ) {
        Ok(detector) => detector,
        Err(error) => {
            eprintln!("Failed to create detector: {}", error);
            std::process::exit(1);
        }
    };

    let frame_len = options.width as usize * options.height as usize;
    let bytes = match fs::read(&options.frame_path) {
        Ok(bytes) if bytes.len() >= frame_len => bytes,
        Ok(bytes) => {
            eprintln!(
                "Error reading file: {} ({} bytes, expected {})",
                options.frame_path,
                bytes.len(),
                frame_len
            );
            std::process::exit(1);
        }
        Err(error) => {
            eprintln!("Cannot open file: {} ({})", options.frame_path, error);
            std::process::exit(1);
        }
    };

    // the frame may be the Y plane of a larger YUV buffer
    let image = ImageData::new(&bytes[..frame_len], options.width, options.height);
    let capped = match detector.detect_with_capacity(&image, MAX_FACES, Truncation::DiscoveryOrder)
    {
        Ok(capped) => capped,
        Err(error) => {
            eprintln!("Detection failed: {}", error);
            std::process::exit(1);
        }
    };

    for face in &capped.faces {
        let bbox = face.bbox();
        println!(
            "Face: {} {} {} {}",
            bbox.x(),
            bbox.y(),
            bbox.width(),
            bbox.height()
        );
    }
    println!("Total: {}", capped.faces.len());
}

struct Options {
    model_path: String,
    width: u32,
    height: u32,
    frame_path: String,
    min_face_width: u32,
}

impl Options {
    fn parse(args: Args) -> Result<Self, String> {
        let args: Vec<String> = args.collect();
        if args.len() != 5 && args.len() != 6 {
            return Err(format!(
                "Usage: {} <model-path> <width> <height> <image.y> [min-face-width]",
                args.first().map(String::as_str).unwrap_or("lbpface")
            ));
        }

        let width = parse_dimension(&args[2], "width")?;
        let height = parse_dimension(&args[3], "height")?;
        let min_face_width = match args.get(5) {
            Some(value) => parse_dimension(value, "min face width")?,
            None => DEFAULT_MIN_FACE_WIDTH,
        };

        Ok(Options {
            model_path: args[1].clone(),
            width,
            height,
            frame_path: args[4].clone(),
            min_face_width,
        })
    }
}

fn parse_dimension(value: &str, name: &str) -> Result<u32, String> {
    match value.parse::<u32>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(format!("{} invalid: {}", name, value)),
    }
}
