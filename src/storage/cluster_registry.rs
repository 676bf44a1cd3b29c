// Copyright 2025 Clustra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Cluster and membership storage, grouped by generation.
//!
//! Generation commits are transaction boundaries: `create_generation` and
//! `commit_split` apply all of their cluster and membership writes together
//! or not at all, and are serialized against `latest_generation` reads and
//! singleton creation. The in-memory backend realizes this with a single
//! registry-wide write lock.
//!
//! Centroids are stored as serialized blobs per the persistence contract;
//! an undecodable blob reads back as an absent centroid (logged, not fatal).

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::core::error::{EngineError, Result};
use crate::core::types::{Cluster, ClusterId, Generation, Membership, ProductId, Vector};
use crate::storage::encoding::{decode_vector, encode_vector};

/// Definition of one cluster to be created by a generation or split commit.
#[derive(Debug, Clone)]
pub struct ClusterSpec {
    pub display_name: String,
    pub centroid: Option<Vector>,
}

/// Atomic description of a cluster split.
///
/// The original cluster keeps its id and generation but is renamed and
/// recentroided; `new_clusters` are created in the same generation.
/// Reassignment targets index the resulting clusters: 0 is the original,
/// `i > 0` is `new_clusters[i - 1]`.
#[derive(Debug, Clone)]
pub struct SplitCommit {
    pub cluster_id: ClusterId,
    pub display_name: String,
    pub centroid: Option<Vector>,
    pub new_clusters: Vec<ClusterSpec>,
    pub reassignments: Vec<(ProductId, usize)>,
}

/// Storage contract for the versioned cluster set.
#[async_trait]
pub trait ClusterRegistry: Send + Sync {
    /// Highest generation number present, 0 when no clusters exist.
    async fn latest_generation(&self) -> Result<Generation>;

    /// All clusters of a generation, ordered by ascending cluster id.
    async fn clusters_in(&self, generation: Generation) -> Result<Vec<Cluster>>;

    async fn get_cluster(&self, cluster_id: ClusterId) -> Result<Option<Cluster>>;

    async fn cluster_count(&self, generation: Generation) -> Result<usize>;

    /// Atomically create a new generation (latest + 1) from cluster specs
    /// and memberships given as (spec index, product id) pairs. Either the
    /// whole generation commits or nothing does.
    async fn create_generation(
        &self,
        clusters: Vec<ClusterSpec>,
        memberships: Vec<(usize, ProductId)>,
    ) -> Result<Generation>;

    /// Create a single cluster in an existing (or first) generation. Used
    /// for singleton creation by the assignment coordinator.
    async fn create_cluster(
        &self,
        generation: Generation,
        display_name: String,
        centroid: Option<Vector>,
    ) -> Result<ClusterId>;

    /// Idempotent: adding an existing membership is a no-op.
    async fn add_membership(&self, cluster_id: ClusterId, product_id: ProductId) -> Result<()>;

    /// Member product ids, ordered ascending.
    async fn members_of(&self, cluster_id: ClusterId) -> Result<Vec<ProductId>>;

    /// Every membership held by a generation's clusters, ordered by
    /// ascending (cluster id, product id).
    async fn memberships_in(&self, generation: Generation) -> Result<Vec<Membership>>;

    async fn update_centroid(&self, cluster_id: ClusterId, centroid: Vector) -> Result<()>;

    /// Atomically apply a split. On error nothing is changed.
    async fn commit_split(&self, commit: SplitCommit) -> Result<Vec<ClusterId>>;
}

struct StoredCluster {
    cluster_id: ClusterId,
    generation: Generation,
    display_name: String,
    centroid_blob: Option<Vec<u8>>,
    created_at: DateTime<Utc>,
}

impl StoredCluster {
    fn to_cluster(&self) -> Cluster {
        // Corrupt blobs read back as "no centroid"; the classifier skips
        // such clusters instead of failing the scan.
        let centroid = match &self.centroid_blob {
            Some(blob) => decode_vector(blob),
            None => None,
        };
        Cluster {
            cluster_id: self.cluster_id,
            generation: self.generation,
            display_name: self.display_name.clone(),
            centroid,
            created_at: self.created_at,
        }
    }
}

#[derive(Default)]
struct RegistryState {
    next_cluster_id: ClusterId,
    clusters: BTreeMap<ClusterId, StoredCluster>,
    memberships: BTreeMap<ClusterId, BTreeSet<ProductId>>,
}

impl RegistryState {
    fn allocate_id(&mut self) -> ClusterId {
        self.next_cluster_id += 1;
        self.next_cluster_id
    }

    fn latest_generation(&self) -> Generation {
        self.clusters
            .values()
            .map(|c| c.generation)
            .max()
            .unwrap_or(0)
    }

    fn insert_cluster(
        &mut self,
        generation: Generation,
        spec: ClusterSpec,
    ) -> Result<ClusterId> {
        let cluster_id = self.allocate_id();
        let centroid_blob = match &spec.centroid {
            Some(values) => Some(encode_vector(values)?),
            None => None,
        };
        self.clusters.insert(
            cluster_id,
            StoredCluster {
                cluster_id,
                generation,
                display_name: spec.display_name,
                centroid_blob,
                created_at: Utc::now(),
            },
        );
        self.memberships.insert(cluster_id, BTreeSet::new());
        Ok(cluster_id)
    }
}

/// In-memory reference backend. One `RwLock` over the whole registry state
/// makes every atomic contract a single write critical section.
pub struct InMemoryClusterRegistry {
    state: RwLock<RegistryState>,
}

impl InMemoryClusterRegistry {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
        }
    }
}

impl Default for InMemoryClusterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClusterRegistry for InMemoryClusterRegistry {
    async fn latest_generation(&self) -> Result<Generation> {
        Ok(self.state.read().await.latest_generation())
    }

    async fn clusters_in(&self, generation: Generation) -> Result<Vec<Cluster>> {
        let state = self.state.read().await;
        // BTreeMap iteration gives the ascending-id order the classifier
        // tie-break relies on.
        Ok(state
            .clusters
            .values()
            .filter(|c| c.generation == generation)
            .map(StoredCluster::to_cluster)
            .collect())
    }

    async fn get_cluster(&self, cluster_id: ClusterId) -> Result<Option<Cluster>> {
        let state = self.state.read().await;
        Ok(state.clusters.get(&cluster_id).map(StoredCluster::to_cluster))
    }

    async fn cluster_count(&self, generation: Generation) -> Result<usize> {
        let state = self.state.read().await;
        Ok(state
            .clusters
            .values()
            .filter(|c| c.generation == generation)
            .count())
    }

    async fn create_generation(
        &self,
        clusters: Vec<ClusterSpec>,
        memberships: Vec<(usize, ProductId)>,
    ) -> Result<Generation> {
        if clusters.is_empty() {
            return Err(EngineError::InvalidArgument(
                "Cannot create an empty generation".to_string(),
            ));
        }
        for (spec_index, product_id) in &memberships {
            if *spec_index >= clusters.len() {
                return Err(EngineError::Storage(anyhow!(
                    "Membership for product {} references cluster spec {} of {}",
                    product_id,
                    spec_index,
                    clusters.len()
                )));
            }
        }

        let mut state = self.state.write().await;
        let generation = state.latest_generation() + 1;

        let mut ids = Vec::with_capacity(clusters.len());
        for spec in clusters {
            ids.push(state.insert_cluster(generation, spec)?);
        }
        for (spec_index, product_id) in memberships {
            let cluster_id = ids[spec_index];
            if let Some(members) = state.memberships.get_mut(&cluster_id) {
                members.insert(product_id);
            }
        }

        info!(
            generation,
            clusters = ids.len(),
            "Committed new cluster generation"
        );
        Ok(generation)
    }

    async fn create_cluster(
        &self,
        generation: Generation,
        display_name: String,
        centroid: Option<Vector>,
    ) -> Result<ClusterId> {
        if generation == 0 {
            return Err(EngineError::InvalidArgument(
                "Generation numbers start at 1".to_string(),
            ));
        }
        let mut state = self.state.write().await;
        let cluster_id = state.insert_cluster(
            generation,
            ClusterSpec {
                display_name,
                centroid,
            },
        )?;
        debug!(cluster_id, generation, "Created cluster");
        Ok(cluster_id)
    }

    async fn add_membership(&self, cluster_id: ClusterId, product_id: ProductId) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.clusters.contains_key(&cluster_id) {
            return Err(EngineError::ClusterNotFound(cluster_id));
        }
        state
            .memberships
            .entry(cluster_id)
            .or_default()
            .insert(product_id);
        Ok(())
    }

    async fn members_of(&self, cluster_id: ClusterId) -> Result<Vec<ProductId>> {
        let state = self.state.read().await;
        Ok(state
            .memberships
            .get(&cluster_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn memberships_in(&self, generation: Generation) -> Result<Vec<Membership>> {
        let state = self.state.read().await;
        let mut memberships = Vec::new();
        for cluster in state.clusters.values() {
            if cluster.generation != generation {
                continue;
            }
            if let Some(members) = state.memberships.get(&cluster.cluster_id) {
                memberships.extend(members.iter().map(|&product_id| Membership {
                    cluster_id: cluster.cluster_id,
                    product_id,
                }));
            }
        }
        Ok(memberships)
    }

    async fn update_centroid(&self, cluster_id: ClusterId, centroid: Vector) -> Result<()> {
        let blob = encode_vector(&centroid)?;
        let mut state = self.state.write().await;
        let cluster = state
            .clusters
            .get_mut(&cluster_id)
            .ok_or(EngineError::ClusterNotFound(cluster_id))?;
        cluster.centroid_blob = Some(blob);
        Ok(())
    }

    async fn commit_split(&self, commit: SplitCommit) -> Result<Vec<ClusterId>> {
        let target_count = commit.new_clusters.len() + 1;
        for (product_id, target) in &commit.reassignments {
            if *target >= target_count {
                return Err(EngineError::Storage(anyhow!(
                    "Split reassignment for product {} references target {} of {}",
                    product_id,
                    target,
                    target_count
                )));
            }
        }

        // Pre-encode outside the mutation path so an encoding failure
        // leaves the registry untouched.
        let original_blob = match &commit.centroid {
            Some(values) => Some(encode_vector(values)?),
            None => None,
        };

        let mut state = self.state.write().await;
        let generation = state
            .clusters
            .get(&commit.cluster_id)
            .ok_or(EngineError::ClusterNotFound(commit.cluster_id))?
            .generation;

        let mut new_ids = Vec::with_capacity(commit.new_clusters.len());
        for spec in commit.new_clusters {
            new_ids.push(state.insert_cluster(generation, spec)?);
        }

        {
            let original = state
                .clusters
                .get_mut(&commit.cluster_id)
                .ok_or(EngineError::ClusterNotFound(commit.cluster_id))?;
            original.display_name = commit.display_name;
            if original_blob.is_some() {
                original.centroid_blob = original_blob;
            }
        }

        for (product_id, target) in commit.reassignments {
            let target_id = if target == 0 {
                commit.cluster_id
            } else {
                new_ids[target - 1]
            };
            if target_id != commit.cluster_id {
                if let Some(members) = state.memberships.get_mut(&commit.cluster_id) {
                    members.remove(&product_id);
                }
                state
                    .memberships
                    .entry(target_id)
                    .or_default()
                    .insert(product_id);
            }
        }

        info!(
            original = commit.cluster_id,
            siblings = new_ids.len(),
            generation,
            "Committed cluster split"
        );
        Ok(new_ids)
    }
}
