// Copyright 2025 Clustra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Batch clustering: full re-clustering into a new generation, and
//! single-cluster splitting, both delegating label and centroid computation
//! to the external solver.
//!
//! Both operations are retry-safe at the generation level: a failed run
//! persists nothing and a retried `run_clustering` simply mints another
//! generation from the current feature set.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::error::{EngineError, Result};
use crate::core::types::{ClusterId, Generation, ProductId, SplitOutcome, Vector};
use crate::external::solver::{ClusterSolver, SolveRequest, SolveResponse};
use crate::storage::{ClusterRegistry, ClusterSpec, FeatureStore, SplitCommit};

pub struct BatchClusterer {
    features: Arc<dyn FeatureStore>,
    registry: Arc<dyn ClusterRegistry>,
    solver: Arc<dyn ClusterSolver>,
}

impl BatchClusterer {
    pub fn new(
        features: Arc<dyn FeatureStore>,
        registry: Arc<dyn ClusterRegistry>,
        solver: Arc<dyn ClusterSolver>,
    ) -> Self {
        Self {
            features,
            registry,
            solver,
        }
    }

    /// Re-cluster the whole catalog into a fresh generation.
    ///
    /// Returns the new generation, or `None` when the feature store is
    /// empty (a no-op: the previous generation stays authoritative).
    pub async fn run_clustering(&self, k: usize) -> Result<Option<Generation>> {
        if k == 0 {
            return Err(EngineError::InvalidArgument(
                "k must be at least 1".to_string(),
            ));
        }

        let all = self.features.scan_all().await?;
        if all.is_empty() {
            info!("No feature vectors stored, skipping re-clustering");
            return Ok(None);
        }

        let product_ids: Vec<ProductId> = all.iter().map(|fv| fv.product_id).collect();
        let vectors: Vec<Vector> = all.into_iter().map(|fv| fv.values).collect();
        let count = vectors.len();

        let response = self.solver.solve(SolveRequest { vectors, k }).await?;
        validate_solver_response(&response, count, k)?;

        // Group products by label; labels ascend, so display names are
        // stable across identical solver outputs.
        let mut by_label: BTreeMap<usize, Vec<ProductId>> = BTreeMap::new();
        for (product_id, label) in product_ids.iter().zip(response.labels.iter()) {
            by_label.entry(*label).or_default().push(*product_id);
        }

        let mut specs = Vec::with_capacity(by_label.len());
        let mut memberships = Vec::with_capacity(count);
        for (ordinal, (label, products)) in by_label.iter().enumerate() {
            specs.push(ClusterSpec {
                display_name: format!("Cluster {}", ordinal + 1),
                centroid: response.centroids.get(*label).cloned(),
            });
            for product_id in products {
                memberships.push((ordinal, *product_id));
            }
        }

        let generation = self.registry.create_generation(specs, memberships).await?;
        info!(
            generation,
            clusters = by_label.len(),
            products = count,
            "Re-clustering complete"
        );
        Ok(Some(generation))
    }

    /// Split one cluster into at least two, keeping the original cluster id
    /// for the lowest solver label and creating siblings in the same
    /// generation for every other label.
    pub async fn split_cluster(&self, cluster_id: ClusterId, k: usize) -> Result<SplitOutcome> {
        let cluster = self
            .registry
            .get_cluster(cluster_id)
            .await?
            .ok_or(EngineError::ClusterNotFound(cluster_id))?;

        let members = self.registry.members_of(cluster_id).await?;
        let mut product_ids = Vec::with_capacity(members.len());
        let mut vectors = Vec::with_capacity(members.len());
        for product_id in members {
            match self.features.get(product_id).await? {
                Some(fv) => {
                    product_ids.push(product_id);
                    vectors.push(fv.values);
                }
                None => {
                    // Data integrity gap, not fatal.
                    warn!(
                        product_id,
                        cluster_id, "Member has no feature vector, excluding from split"
                    );
                }
            }
        }

        if product_ids.len() < 2 {
            info!(
                cluster_id,
                usable = product_ids.len(),
                "Not enough members with vectors to split"
            );
            return Ok(SplitOutcome::NotEnoughMembers);
        }

        let k = k.max(2);
        let count = vectors.len();
        let response = self.solver.solve(SolveRequest { vectors, k }).await?;
        validate_solver_response(&response, count, k)?;

        // Distinct labels in ascending order; the lowest keeps the
        // original cluster id.
        let mut distinct: Vec<usize> = response.labels.clone();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.len() < 2 {
            info!(cluster_id, "Solver did not separate the member set, aborting split");
            return Ok(SplitOutcome::NotSeparable);
        }

        let mut target_of_label: BTreeMap<usize, usize> = BTreeMap::new();
        let mut new_clusters = Vec::with_capacity(distinct.len() - 1);
        for (target, label) in distinct.iter().enumerate() {
            target_of_label.insert(*label, target);
            if target > 0 {
                new_clusters.push(ClusterSpec {
                    display_name: format!("{} (Split {})", cluster.display_name, target + 1),
                    centroid: response.centroids.get(*label).cloned(),
                });
            }
        }

        let reassignments: Vec<(ProductId, usize)> = product_ids
            .iter()
            .zip(response.labels.iter())
            .map(|(product_id, label)| (*product_id, target_of_label[label]))
            .collect();

        let commit = SplitCommit {
            cluster_id,
            display_name: format!("{} (Split 1)", cluster.display_name),
            centroid: response.centroids.get(distinct[0]).cloned(),
            new_clusters,
            reassignments,
        };
        let new_ids = self.registry.commit_split(commit).await?;

        info!(
            cluster_id,
            siblings = new_ids.len(),
            "Cluster split committed"
        );
        Ok(SplitOutcome::Split {
            original: cluster_id,
            new_clusters: new_ids,
        })
    }
}

/// A malformed solver response aborts the whole operation; nothing has
/// been persisted at this point.
fn validate_solver_response(response: &SolveResponse, expected: usize, k: usize) -> Result<()> {
    if response.labels.len() != expected {
        return Err(EngineError::ExternalService(format!(
            "Solver returned {} labels for {} vectors",
            response.labels.len(),
            expected
        )));
    }
    if let Some(bad) = response.labels.iter().find(|label| **label >= k) {
        return Err(EngineError::ExternalService(format!(
            "Solver label {} out of range for k={}",
            bad, k
        )));
    }
    if response.centroids.len() > k {
        return Err(EngineError::ExternalService(format!(
            "Solver returned {} centroids for k={}",
            response.centroids.len(),
            k
        )));
    }
    Ok(())
}
