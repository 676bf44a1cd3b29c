// Copyright 2025 Clustra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! # Clustra - Product Similarity & Incremental Clustering Engine
//!
//! Clustra maintains a versioned set of product clusters ("visual
//! categories") over image feature vectors:
//!
//! - **Classification**: find the nearest cluster in the active generation
//!   for a query vector, with a configurable similarity threshold.
//! - **Incremental assignment**: matched products join the cluster; misses
//!   grow a new singleton cluster, so categories emerge organically.
//! - **Batch re-clustering**: a full re-cluster mints a fresh, atomically
//!   committed generation via an external k-means solver; older generations
//!   stay frozen but queryable.
//! - **Cluster splitting**: one cluster is split in place, the original id
//!   is kept for the lowest solver label.
//! - **Top-K ranking**: members of a cluster ranked by similarity to a
//!   target vector.
//!
//! Feature extraction, the k-means solver, and durable persistence are
//! collaborators behind narrow traits (`FeatureExtractor`, `ClusterSolver`,
//! `FeatureStore`, `ClusterRegistry`); in-memory reference backends are
//! provided.

pub mod compute;
pub mod core;
pub mod external;
pub mod services;
pub mod storage;

use std::collections::HashSet;
use std::sync::Arc;

pub use crate::core::config::{EngineConfig, ExtractionFailurePolicy};
pub use crate::core::error::{EngineError, Result};
pub use crate::core::types::{
    AssignmentOutcome, Classification, Cluster, ClusterId, FeatureVector, Generation, Membership,
    ProductId, SplitOutcome, Vector,
};
pub use crate::external::{ClusterSolver, FeatureExtractor, HttpKMeansSolver, ImageData};
pub use crate::services::IngestOutcome;
pub use crate::storage::{ClusterRegistry, FeatureStore};

use crate::services::{
    AssignmentCoordinator, BatchClusterer, Classifier, IngestionService, SimilarityRanker,
};
use crate::storage::{InMemoryClusterRegistry, InMemoryFeatureStore};

/// Engine facade wiring storage backends, the external solver, and the
/// similarity/clustering services.
pub struct ClusterEngine {
    config: EngineConfig,
    features: Arc<dyn FeatureStore>,
    registry: Arc<dyn ClusterRegistry>,
    classifier: Classifier,
    coordinator: AssignmentCoordinator,
    clusterer: BatchClusterer,
    ranker: SimilarityRanker,
    ingestion: Option<IngestionService>,
}

impl ClusterEngine {
    pub fn builder(config: EngineConfig) -> ClusterEngineBuilder {
        ClusterEngineBuilder::new(config)
    }

    /// Store or overwrite the feature vector for a product.
    ///
    /// Vectors whose dimension does not match the configured D are
    /// rejected rather than silently producing wrong similarity scores
    /// later.
    pub async fn upsert_feature(&self, product_id: ProductId, values: Vector) -> Result<()> {
        if values.len() != self.config.dimension {
            return Err(EngineError::DimensionMismatch {
                expected: self.config.dimension,
                actual: values.len(),
            });
        }
        self.features.upsert(product_id, values).await
    }

    /// Classify a vector against the active generation. `Ok(None)` is the
    /// normal "no match" outcome, distinct from a system error.
    pub async fn classify(&self, vector: &[f32]) -> Result<Option<Classification>> {
        self.check_query_dimension(vector)?;
        let matched = self
            .classifier
            .find_nearest_cluster(vector, self.config.classification.min_similarity)
            .await?;
        Ok(matched.map(|m| Classification {
            cluster_id: m.cluster.cluster_id,
            display_name: m.cluster.display_name,
            generation: m.cluster.generation,
            similarity: m.similarity,
        }))
    }

    /// Classify and persist the resulting membership, creating a singleton
    /// cluster when nothing matches.
    pub async fn classify_and_assign(
        &self,
        product_id: ProductId,
        vector: &[f32],
    ) -> Result<AssignmentOutcome> {
        self.check_query_dimension(vector)?;
        self.coordinator.classify_and_assign(product_id, vector).await
    }

    /// Rank a cluster's members by similarity to the target vector.
    pub async fn top_similar(
        &self,
        cluster_id: ClusterId,
        vector: &[f32],
        scope: Option<&HashSet<ProductId>>,
        k: usize,
    ) -> Result<Vec<ProductId>> {
        self.check_query_dimension(vector)?;
        self.ranker.top_similar(cluster_id, vector, scope, k).await
    }

    /// Re-cluster the whole catalog into a new generation. `Ok(None)` when
    /// the feature store is empty.
    pub async fn run_clustering(&self, k: usize) -> Result<Option<Generation>> {
        self.clusterer.run_clustering(k).await
    }

    /// Split one cluster via the external solver.
    pub async fn split_cluster(&self, cluster_id: ClusterId, k: usize) -> Result<SplitOutcome> {
        self.clusterer.split_cluster(cluster_id, k).await
    }

    /// Extract and store a feature vector for a product. Requires a
    /// `FeatureExtractor` to have been injected at build time.
    pub async fn ingest(
        &self,
        product_id: ProductId,
        images: &[ImageData],
    ) -> Result<IngestOutcome> {
        let ingestion = self.ingestion.as_ref().ok_or_else(|| {
            EngineError::Config("No feature extractor configured".to_string())
        })?;
        ingestion.ingest(product_id, images).await
    }

    /// Ingest and, when a vector was stored, classify and assign it.
    pub async fn ingest_and_assign(
        &self,
        product_id: ProductId,
        images: &[ImageData],
    ) -> Result<Option<AssignmentOutcome>> {
        match self.ingest(product_id, images).await? {
            IngestOutcome::Stored(feature) => {
                let outcome = self
                    .coordinator
                    .classify_and_assign(product_id, &feature.values)
                    .await?;
                Ok(Some(outcome))
            }
            IngestOutcome::Skipped => Ok(None),
        }
    }

    pub async fn latest_generation(&self) -> Result<Generation> {
        self.registry.latest_generation().await
    }

    pub fn registry(&self) -> &Arc<dyn ClusterRegistry> {
        &self.registry
    }

    pub fn features(&self) -> &Arc<dyn FeatureStore> {
        &self.features
    }

    fn check_query_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.config.dimension {
            return Err(EngineError::DimensionMismatch {
                expected: self.config.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

/// Builder with injectable collaborators; storage defaults to the
/// in-memory backends and the solver to the HTTP client from config.
pub struct ClusterEngineBuilder {
    config: EngineConfig,
    features: Option<Arc<dyn FeatureStore>>,
    registry: Option<Arc<dyn ClusterRegistry>>,
    solver: Option<Arc<dyn ClusterSolver>>,
    extractor: Option<Arc<dyn FeatureExtractor>>,
}

impl ClusterEngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            features: None,
            registry: None,
            solver: None,
            extractor: None,
        }
    }

    pub fn with_feature_store(mut self, features: Arc<dyn FeatureStore>) -> Self {
        self.features = Some(features);
        self
    }

    pub fn with_cluster_registry(mut self, registry: Arc<dyn ClusterRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_solver(mut self, solver: Arc<dyn ClusterSolver>) -> Self {
        self.solver = Some(solver);
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn FeatureExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn build(self) -> Result<ClusterEngine> {
        self.config.validate()?;

        let features = self
            .features
            .unwrap_or_else(|| Arc::new(InMemoryFeatureStore::new()));
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(InMemoryClusterRegistry::new()));
        let solver: Arc<dyn ClusterSolver> = match self.solver {
            Some(solver) => solver,
            None => Arc::new(HttpKMeansSolver::new(&self.config.solver)?),
        };

        let classifier = Classifier::new(registry.clone());
        let coordinator = AssignmentCoordinator::new(
            registry.clone(),
            Classifier::new(registry.clone()),
            self.config.classification.min_similarity,
        );
        let clusterer = BatchClusterer::new(features.clone(), registry.clone(), solver);
        let ranker = SimilarityRanker::new(features.clone(), registry.clone());
        let ingestion = self.extractor.map(|extractor| {
            IngestionService::new(
                extractor,
                features.clone(),
                self.config.dimension,
                self.config.ingestion.on_extraction_failure,
            )
        });

        Ok(ClusterEngine {
            config: self.config,
            features,
            registry,
            classifier,
            coordinator,
            clusterer,
            ranker,
            ingestion,
        })
    }
}
