// Copyright 2025 Clustra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Feature ingestion: extractor call plus feature-store upsert.
//!
//! Extraction failure never silently turns into "no match": the failure
//! policy is explicit configuration. With `Propagate` (the default) the
//! error surfaces to the caller and nothing downstream ever sees the
//! product; with `SkipProduct` the product is logged and skipped.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::config::ExtractionFailurePolicy;
use crate::core::error::{EngineError, Result};
use crate::core::types::{FeatureVector, ProductId};
use crate::external::extractor::{FeatureExtractor, ImageData};
use crate::storage::FeatureStore;

/// Outcome of ingesting one product's images.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// A feature vector was extracted and stored.
    Stored(FeatureVector),
    /// Extraction failed and policy said to skip the product.
    Skipped,
}

pub struct IngestionService {
    extractor: Arc<dyn FeatureExtractor>,
    features: Arc<dyn FeatureStore>,
    dimension: usize,
    policy: ExtractionFailurePolicy,
}

impl IngestionService {
    pub fn new(
        extractor: Arc<dyn FeatureExtractor>,
        features: Arc<dyn FeatureStore>,
        dimension: usize,
        policy: ExtractionFailurePolicy,
    ) -> Self {
        Self {
            extractor,
            features,
            dimension,
            policy,
        }
    }

    /// Extract a feature vector for the product and upsert it.
    ///
    /// A vector whose dimension does not match the configured D is
    /// rejected rather than stored, so it can never poison similarity
    /// scores later.
    pub async fn ingest(
        &self,
        product_id: ProductId,
        images: &[ImageData],
    ) -> Result<IngestOutcome> {
        let values = match self.extractor.extract(images).await {
            Ok(values) => values,
            Err(e) => match self.policy {
                ExtractionFailurePolicy::Propagate => {
                    return Err(EngineError::ExternalService(format!(
                        "Feature extraction failed for product {}: {}",
                        product_id, e
                    )));
                }
                ExtractionFailurePolicy::SkipProduct => {
                    warn!(product_id, "Feature extraction failed, skipping product: {}", e);
                    return Ok(IngestOutcome::Skipped);
                }
            },
        };

        if values.len() != self.dimension {
            return Err(EngineError::DimensionMismatch {
                expected: self.dimension,
                actual: values.len(),
            });
        }

        self.features.upsert(product_id, values).await?;
        debug!(product_id, "Feature vector ingested");
        let stored = self
            .features
            .get(product_id)
            .await?
            .ok_or_else(|| EngineError::Storage(anyhow::anyhow!("Upserted vector not readable")))?;
        Ok(IngestOutcome::Stored(stored))
    }
}
