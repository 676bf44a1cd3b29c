// Copyright 2025 Clustra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::error::{EngineError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Expected feature-vector dimension D. All vectors and centroids within
    /// one generation must share this dimension.
    pub dimension: usize,
    pub classification: ClassificationConfig,
    pub solver: SolverConfig,
    pub ingestion: IngestionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationConfig {
    /// Minimum cosine similarity for a query to match a cluster.
    pub min_similarity: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Endpoint of the external k-means solver.
    pub endpoint: String,
    /// Request timeout. A timeout is a total failure of the enclosing
    /// batch operation, never a partial commit.
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    pub on_extraction_failure: ExtractionFailurePolicy,
}

/// What ingestion does when the external feature extractor fails.
///
/// The upstream system treated a transient extraction failure as "no match"
/// and grew a fresh singleton cluster, which fragments the catalog over
/// time. Whether that self-healing is wanted depends on the deployment, so
/// it is a policy here, never an implicit fallback.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionFailurePolicy {
    /// Surface the extractor error to the caller; nothing is stored.
    Propagate,
    /// Log and skip the product; nothing is stored, no error.
    SkipProduct,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dimension: 512,
            classification: ClassificationConfig {
                min_similarity: 0.60,
            },
            solver: SolverConfig {
                endpoint: "http://127.0.0.1:9090/solve".to_string(),
                timeout_seconds: 30,
            },
            ingestion: IngestionConfig {
                on_extraction_failure: ExtractionFailurePolicy::Propagate,
            },
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;
        let config: EngineConfig = toml::from_str(&raw)
            .map_err(|e| EngineError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(EngineError::Config("Dimension must be positive".to_string()));
        }
        if !(self.classification.min_similarity > 0.0 && self.classification.min_similarity <= 1.0)
        {
            return Err(EngineError::Config(
                "min_similarity must be in (0, 1]".to_string(),
            ));
        }
        if self.solver.timeout_seconds == 0 {
            return Err(EngineError::Config(
                "Solver timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
