// Copyright 2025 Clustra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Classify-and-assign: turn a classification result into a membership.
//!
//! This is how the catalog grows categories organically: a single
//! classification call may create a brand-new singleton cluster when no
//! existing cluster clears the threshold.
//!
//! Known race, accepted: two concurrent calls that both miss the threshold
//! can each create a near-duplicate singleton. Deployments that cannot
//! tolerate that should serialize assignment per generation or merge
//! duplicates out of band; this coordinator does neither.

use std::sync::Arc;
use tracing::{debug, info};

use crate::core::error::Result;
use crate::core::types::{AssignmentOutcome, ProductId};
use crate::services::classifier::Classifier;
use crate::storage::ClusterRegistry;

pub struct AssignmentCoordinator {
    registry: Arc<dyn ClusterRegistry>,
    classifier: Classifier,
    min_similarity: f32,
}

impl AssignmentCoordinator {
    pub fn new(
        registry: Arc<dyn ClusterRegistry>,
        classifier: Classifier,
        min_similarity: f32,
    ) -> Self {
        Self {
            registry,
            classifier,
            min_similarity,
        }
    }

    /// Assign the product to the nearest matching cluster, or create a
    /// singleton cluster for it. Idempotent: repeating the call with the
    /// same inputs leaves exactly one membership for the product.
    pub async fn classify_and_assign(
        &self,
        product_id: ProductId,
        vector: &[f32],
    ) -> Result<AssignmentOutcome> {
        if let Some(matched) = self
            .classifier
            .find_nearest_cluster(vector, self.min_similarity)
            .await?
        {
            debug!(
                product_id,
                cluster_id = matched.cluster.cluster_id,
                similarity = matched.similarity,
                "Assigning product to matched cluster"
            );
            self.registry
                .add_membership(matched.cluster.cluster_id, product_id)
                .await?;
            return Ok(AssignmentOutcome {
                cluster_id: matched.cluster.cluster_id,
                generation: matched.cluster.generation,
                created_cluster: false,
            });
        }

        // No match: grow a singleton in the current generation (the first
        // generation when none exists yet).
        let generation = self.registry.latest_generation().await?.max(1);
        let ordinal = self.registry.cluster_count(generation).await? + 1;
        let display_name = format!("Cluster {} (Auto-Created)", ordinal);
        let cluster_id = self
            .registry
            .create_cluster(generation, display_name, Some(vector.to_vec()))
            .await?;
        self.registry.add_membership(cluster_id, product_id).await?;

        info!(
            product_id,
            cluster_id, generation, "No match above threshold, created singleton cluster"
        );
        Ok(AssignmentOutcome {
            cluster_id,
            generation,
            created_cluster: true,
        })
    }
}
