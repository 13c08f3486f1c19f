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

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed model: expected {expected}, found {token:?}")]
    Parse { token: String, expected: &'static str },

    #[error("Unexpected end of model data while reading {0}")]
    UnexpectedEof(&'static str),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Invalid detection parameter: {0}")]
    InvalidParameter(String),

    #[error("Illegal image: {len} bytes for a {width}x{height} detector (single channel expected)")]
    InvalidImage { width: u32, height: u32, len: usize },

    #[error("GPU backend unavailable: {0}")]
    Gpu(String),

    #[error("GPU transfer failed: {0}")]
    Transfer(String),
}

pub type Result<T> = std::result::Result<T, Error>;
