// Copyright 2025 Clustra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! External feature extractor interface.
//!
//! The embedding model is a collaborator. It accepts one or more product
//! images and returns a single vector of fixed dimension D; D is assumed
//! stable across calls within a generation.

use async_trait::async_trait;

use crate::core::error::Result;
use crate::core::types::Vector;

pub type ImageData = Vec<u8>;

#[async_trait]
pub trait FeatureExtractor: Send + Sync {
    async fn extract(&self, images: &[ImageData]) -> Result<Vector>;
}
