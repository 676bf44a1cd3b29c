// Copyright 2025 Clustra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Shared helpers for integration tests: deterministic solver fakes and an
//! engine fixture wired to the in-memory backends.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::Mutex;

use clustra::core::config::EngineConfig;
use clustra::core::error::{EngineError, Result};
use clustra::external::solver::{ClusterSolver, SolveRequest, SolveResponse};
use clustra::ClusterEngine;

/// Solver fake returning a fixed response regardless of input.
pub struct StaticSolver {
    pub labels: Vec<usize>,
    pub centroids: Vec<Vec<f32>>,
}

#[async_trait]
impl ClusterSolver for StaticSolver {
    async fn solve(&self, _request: SolveRequest) -> Result<SolveResponse> {
        Ok(SolveResponse {
            labels: self.labels.clone(),
            centroids: self.centroids.clone(),
        })
    }
}

/// Solver fake that records requests and always fails.
pub struct FailingSolver {
    pub calls: Mutex<usize>,
}

impl FailingSolver {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(0),
        }
    }
}

#[async_trait]
impl ClusterSolver for FailingSolver {
    async fn solve(&self, _request: SolveRequest) -> Result<SolveResponse> {
        *self.calls.lock().unwrap() += 1;
        Err(EngineError::ExternalService(
            "solver unreachable".to_string(),
        ))
    }
}

/// Route engine tracing through the test harness. Honors `RUST_LOG`; safe
/// to call from every test, only the first call installs the subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Two-dimensional test config with the default 0.60 threshold.
pub fn test_config() -> EngineConfig {
    init_tracing();
    let mut config = EngineConfig::default();
    config.dimension = 2;
    config
}

pub fn engine_with_solver(solver: Arc<dyn ClusterSolver>) -> ClusterEngine {
    ClusterEngine::builder(test_config())
        .with_solver(solver)
        .build()
        .unwrap()
}

pub fn engine() -> ClusterEngine {
    engine_with_solver(Arc::new(FailingSolver::new()))
}
