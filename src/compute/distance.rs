// Copyright 2025 Clustra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Cosine similarity and magnitude primitives.
//!
//! Pure numeric functions, no I/O. A zero vector makes cosine similarity
//! undefined; it is always reported as an error, never silently mapped
//! to 0.0.

use crate::core::error::{EngineError, Result};

/// Euclidean magnitude of a vector.
pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity between two vectors of equal dimension, range [-1, 1].
///
/// Fails with `DimensionMismatch` when lengths differ and with `ZeroVector`
/// when either magnitude is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EngineError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(EngineError::ZeroVector);
    }

    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// True when every component is exactly zero.
pub fn is_zero(v: &[f32]) -> bool {
    v.iter().all(|x| *x == 0.0)
}
