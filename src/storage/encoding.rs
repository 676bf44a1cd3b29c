// Copyright 2025 Clustra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Vector blob encoding for the persistence boundary.
//!
//! Centroids cross the storage contract as serialized numeric arrays. A
//! malformed blob decodes to "absent": the caller logs it and skips, the
//! scan continues.

use anyhow::Context;
use tracing::warn;

use crate::core::error::Result;
use crate::core::types::Vector;

/// Encode a vector into its storage blob representation.
pub fn encode_vector(values: &[f32]) -> Result<Vec<u8>> {
    let blob = bincode::serialize(values).context("Failed to encode vector blob")?;
    Ok(blob)
}

/// Decode a stored vector blob. Returns `None` for corrupt data.
pub fn decode_vector(blob: &[u8]) -> Option<Vector> {
    match bincode::deserialize::<Vector>(blob) {
        Ok(values) => Some(values),
        Err(e) => {
            warn!(
                "Corrupt vector blob ({} bytes), treating as absent: {}",
                blob.len(),
                e
            );
            None
        }
    }
}
