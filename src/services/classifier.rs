// Copyright 2025 Clustra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Nearest-cluster classification against the active generation.

use std::sync::Arc;
use tracing::debug;

use crate::compute::{cosine_similarity, is_zero};
use crate::core::error::{EngineError, Result};
use crate::core::types::Cluster;
use crate::storage::ClusterRegistry;

/// A cluster that cleared the similarity threshold.
#[derive(Debug, Clone)]
pub struct ClassifierMatch {
    pub cluster: Cluster,
    pub similarity: f32,
}

/// Read-only classifier. Finds the nearest cluster in the latest
/// generation, or nothing when no cluster clears the threshold.
pub struct Classifier {
    registry: Arc<dyn ClusterRegistry>,
}

impl Classifier {
    pub fn new(registry: Arc<dyn ClusterRegistry>) -> Self {
        Self { registry }
    }

    /// Nearest cluster by cosine similarity, or `None` below threshold.
    ///
    /// An all-zero query vector is a hard precondition failure. Clusters
    /// with an absent, corrupt, or dimension-mismatched centroid are
    /// skipped. Ties go to the first-seen cluster, i.e. the lowest cluster
    /// id in the generation's stable iteration order.
    pub async fn find_nearest_cluster(
        &self,
        vector: &[f32],
        min_similarity: f32,
    ) -> Result<Option<ClassifierMatch>> {
        if is_zero(vector) {
            return Err(EngineError::ZeroVector);
        }

        let generation = self.registry.latest_generation().await?;
        if generation == 0 {
            return Ok(None);
        }

        let mut best: Option<ClassifierMatch> = None;
        for cluster in self.registry.clusters_in(generation).await? {
            let centroid = match &cluster.centroid {
                Some(centroid) => centroid,
                None => continue,
            };
            if centroid.len() != vector.len() {
                debug!(
                    cluster_id = cluster.cluster_id,
                    centroid_dim = centroid.len(),
                    query_dim = vector.len(),
                    "Skipping cluster with mismatched centroid dimension"
                );
                continue;
            }
            // A degenerate (zero) centroid is a per-cluster condition, not
            // a query failure: skip it.
            let similarity = match cosine_similarity(vector, centroid) {
                Ok(similarity) => similarity,
                Err(_) => {
                    debug!(
                        cluster_id = cluster.cluster_id,
                        "Skipping cluster with degenerate centroid"
                    );
                    continue;
                }
            };

            let better = match &best {
                Some(current) => similarity > current.similarity,
                None => true,
            };
            if better {
                best = Some(ClassifierMatch {
                    cluster,
                    similarity,
                });
            }
        }

        match best {
            Some(m) if m.similarity >= min_similarity => Ok(Some(m)),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryClusterRegistry;

    async fn registry_with_centroids(centroids: &[Vec<f32>]) -> Arc<InMemoryClusterRegistry> {
        let registry = Arc::new(InMemoryClusterRegistry::new());
        for (i, centroid) in centroids.iter().enumerate() {
            registry
                .create_cluster(1, format!("Cluster {}", i + 1), Some(centroid.clone()))
                .await
                .unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn test_no_clusters_means_no_match() {
        let registry = Arc::new(InMemoryClusterRegistry::new());
        let classifier = Classifier::new(registry);
        let result = classifier
            .find_nearest_cluster(&[1.0, 0.0], 0.60)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_matches_above_threshold_and_misses_below() {
        let registry = registry_with_centroids(&[vec![1.0, 0.0]]).await;
        let classifier = Classifier::new(registry);

        let hit = classifier
            .find_nearest_cluster(&[1.0, 0.0], 0.60)
            .await
            .unwrap()
            .unwrap();
        assert!((hit.similarity - 1.0).abs() < 1e-6);

        let miss = classifier
            .find_nearest_cluster(&[0.0, 1.0], 0.60)
            .await
            .unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_zero_query_vector_fails() {
        let registry = registry_with_centroids(&[vec![1.0, 0.0]]).await;
        let classifier = Classifier::new(registry);
        let err = classifier
            .find_nearest_cluster(&[0.0, 0.0], 0.60)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ZeroVector));
    }

    #[tokio::test]
    async fn test_ties_go_to_lowest_cluster_id() {
        let registry =
            registry_with_centroids(&[vec![1.0, 0.0], vec![1.0, 0.0], vec![1.0, 0.0]]).await;
        let classifier = Classifier::new(registry);
        let hit = classifier
            .find_nearest_cluster(&[2.0, 0.0], 0.60)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.cluster.cluster_id, 1);
    }

    #[tokio::test]
    async fn test_mismatched_centroid_dimension_is_skipped() {
        let registry =
            registry_with_centroids(&[vec![1.0, 0.0, 0.0], vec![0.8, 0.6]]).await;
        let classifier = Classifier::new(registry);
        let hit = classifier
            .find_nearest_cluster(&[0.8, 0.6], 0.60)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.cluster.cluster_id, 2);
    }

    #[tokio::test]
    async fn test_only_latest_generation_is_consulted() {
        let registry = Arc::new(InMemoryClusterRegistry::new());
        registry
            .create_cluster(1, "old".to_string(), Some(vec![1.0, 0.0]))
            .await
            .unwrap();
        registry
            .create_cluster(2, "new".to_string(), Some(vec![0.0, 1.0]))
            .await
            .unwrap();

        let classifier = Classifier::new(registry);
        // [1,0] only matches the generation-1 cluster, which is frozen.
        let result = classifier
            .find_nearest_cluster(&[1.0, 0.0], 0.60)
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
