// Copyright 2025 Clustra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Engine-wide error taxonomy.
//!
//! Local, recoverable conditions (a dimension mismatch on one stored
//! centroid, a corrupt blob on one member) are swallowed and logged at the
//! iteration site and never surface as these variants. Global conditions
//! (zero query vector, solver failure, storage failure) abort the whole
//! operation. Below-threshold classification is `Ok(None)`, not an error.

use thiserror::Error;

use crate::core::types::ClusterId;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Zero vector: cosine similarity is undefined")]
    ZeroVector,

    #[error("Cluster not found: {0}")]
    ClusterNotFound(ClusterId),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}
