// Copyright 2025 Clustra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Top-K similarity ranking of a cluster's members.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::compute::{cosine_similarity, is_zero};
use crate::core::error::{EngineError, Result};
use crate::core::types::{ClusterId, ProductId};
use crate::storage::{ClusterRegistry, FeatureStore};

pub struct SimilarityRanker {
    features: Arc<dyn FeatureStore>,
    registry: Arc<dyn ClusterRegistry>,
}

impl SimilarityRanker {
    pub fn new(features: Arc<dyn FeatureStore>, registry: Arc<dyn ClusterRegistry>) -> Self {
        Self { features, registry }
    }

    /// Member product ids of the cluster, ranked by descending cosine
    /// similarity to the target vector, ties broken by ascending product
    /// id. Members with a missing, dimension-mismatched, or degenerate
    /// vector are skipped. A zero target vector fails rather than
    /// returning an arbitrary order.
    pub async fn top_similar(
        &self,
        cluster_id: ClusterId,
        target: &[f32],
        scope: Option<&HashSet<ProductId>>,
        k: usize,
    ) -> Result<Vec<ProductId>> {
        if is_zero(target) {
            return Err(EngineError::ZeroVector);
        }
        if self.registry.get_cluster(cluster_id).await?.is_none() {
            return Err(EngineError::ClusterNotFound(cluster_id));
        }

        let members = self.registry.members_of(cluster_id).await?;
        let mut scored: Vec<(ProductId, f32)> = Vec::with_capacity(members.len());
        for product_id in members {
            if let Some(scope) = scope {
                if !scope.contains(&product_id) {
                    continue;
                }
            }
            let feature = match self.features.get(product_id).await? {
                Some(feature) => feature,
                None => {
                    debug!(product_id, cluster_id, "Member has no feature vector, skipping");
                    continue;
                }
            };
            if feature.values.len() != target.len() {
                debug!(
                    product_id,
                    member_dim = feature.values.len(),
                    target_dim = target.len(),
                    "Skipping member with mismatched vector dimension"
                );
                continue;
            }
            match cosine_similarity(target, &feature.values) {
                Ok(similarity) => scored.push((product_id, similarity)),
                Err(_) => {
                    debug!(product_id, "Skipping member with degenerate vector");
                }
            }
        }

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(product_id, _)| product_id)
            .collect())
    }
}
