// Copyright 2025 Clustra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! External k-means solver interface and HTTP client.
//!
//! The solver is a collaborator, not part of this engine. A timeout or
//! non-success response is a total failure of the enclosing batch
//! operation; no fallback answer is ever substituted.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::core::config::SolverConfig;
use crate::core::error::{EngineError, Result};

#[derive(Debug, Clone, Serialize)]
pub struct SolveRequest {
    pub vectors: Vec<Vec<f32>>,
    pub k: usize,
}

/// Solver response: one label per input vector, values in `[0, k)`, and up
/// to `k` centroids indexed by label.
#[derive(Debug, Clone, Deserialize)]
pub struct SolveResponse {
    pub labels: Vec<usize>,
    pub centroids: Vec<Vec<f32>>,
}

/// Narrow interface over the external k-means solver, injected into the
/// batch clusterer so tests can substitute deterministic fakes.
#[async_trait]
pub trait ClusterSolver: Send + Sync {
    async fn solve(&self, request: SolveRequest) -> Result<SolveResponse>;
}

/// JSON-over-HTTP solver client.
pub struct HttpKMeansSolver {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpKMeansSolver {
    pub fn new(config: &SolverConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| {
                EngineError::ExternalService(format!("Failed to build solver client: {}", e))
            })?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl ClusterSolver for HttpKMeansSolver {
    async fn solve(&self, request: SolveRequest) -> Result<SolveResponse> {
        info!(
            vectors = request.vectors.len(),
            k = request.k,
            "Calling external k-means solver"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::ExternalService(format!("Solver request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::ExternalService(format!(
                "Solver returned status {}",
                status
            )));
        }

        let solved: SolveResponse = response.json().await.map_err(|e| {
            EngineError::ExternalService(format!("Undecodable solver response: {}", e))
        })?;

        debug!(
            labels = solved.labels.len(),
            centroids = solved.centroids.len(),
            "Solver response received"
        );
        Ok(solved)
    }
}
