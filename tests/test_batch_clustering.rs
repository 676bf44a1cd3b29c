// Copyright 2025 Clustra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Full re-clustering through the engine facade: generation minting,
//! atomic commit semantics, and solver failure handling.

mod common;

use std::sync::Arc;

use clustra::core::error::EngineError;
use clustra::ClusterRegistry;
use common::{FailingSolver, StaticSolver};

#[tokio::test]
async fn test_empty_feature_store_is_a_noop() {
    let engine = common::engine_with_solver(Arc::new(StaticSolver {
        labels: vec![],
        centroids: vec![],
    }));

    let result = engine.run_clustering(3).await.unwrap();
    assert!(result.is_none());
    assert_eq!(engine.latest_generation().await.unwrap(), 0);
}

#[tokio::test]
async fn test_clustering_mints_next_generation_with_full_coverage() {
    let engine = common::engine_with_solver(Arc::new(StaticSolver {
        labels: vec![0, 0, 1, 1],
        centroids: vec![vec![1.0, 0.0], vec![0.0, 1.0]],
    }));

    for (product, vector) in [
        (10u64, vec![1.0, 0.1]),
        (11, vec![0.9, 0.0]),
        (12, vec![0.0, 1.0]),
        (13, vec![0.1, 0.9]),
    ] {
        engine.upsert_feature(product, vector).await.unwrap();
    }

    let generation = engine.run_clustering(2).await.unwrap().unwrap();
    assert_eq!(generation, 1);

    let clusters = engine.registry().clusters_in(generation).await.unwrap();
    assert_eq!(clusters.len(), 2);
    assert_eq!(clusters[0].display_name, "Cluster 1");
    assert_eq!(clusters[1].display_name, "Cluster 2");

    // Every product with a feature vector holds exactly one membership in
    // the new generation.
    let memberships = engine.registry().memberships_in(generation).await.unwrap();
    let mut seen: Vec<u64> = memberships.iter().map(|m| m.product_id).collect();
    let total = seen.len();
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen.len(), total, "a product holds more than one membership");
    assert_eq!(seen, vec![10, 11, 12, 13]);
}

#[tokio::test]
async fn test_reclustering_again_mints_another_generation() {
    let engine = common::engine_with_solver(Arc::new(StaticSolver {
        labels: vec![0, 1],
        centroids: vec![vec![1.0, 0.0], vec![0.0, 1.0]],
    }));
    engine.upsert_feature(1, vec![1.0, 0.0]).await.unwrap();
    engine.upsert_feature(2, vec![0.0, 1.0]).await.unwrap();

    let g1 = engine.run_clustering(2).await.unwrap().unwrap();
    let g2 = engine.run_clustering(2).await.unwrap().unwrap();

    assert_eq!(g1, 1);
    assert_eq!(g2, 2);
    // The older generation stays frozen and queryable.
    assert_eq!(engine.registry().clusters_in(g1).await.unwrap().len(), 2);
    assert_eq!(engine.latest_generation().await.unwrap(), 2);
}

#[tokio::test]
async fn test_solver_failure_leaves_previous_generation_authoritative() {
    let solver = Arc::new(FailingSolver::new());
    let engine = common::engine_with_solver(solver.clone());
    engine.upsert_feature(1, vec![1.0, 0.0]).await.unwrap();

    // Seed generation 1 through assignment so there is prior state.
    engine.classify_and_assign(1, &[1.0, 0.0]).await.unwrap();
    assert_eq!(engine.latest_generation().await.unwrap(), 1);

    let err = engine.run_clustering(2).await.unwrap_err();
    assert!(matches!(err, EngineError::ExternalService(_)));
    assert_eq!(*solver.calls.lock().unwrap(), 1);
    assert_eq!(engine.latest_generation().await.unwrap(), 1);
    assert_eq!(engine.registry().clusters_in(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_at_most_k_clusters_are_created() {
    let engine = common::engine_with_solver(Arc::new(StaticSolver {
        labels: vec![0, 1, 2],
        centroids: vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]],
    }));
    engine.upsert_feature(1, vec![1.0, 0.0]).await.unwrap();
    engine.upsert_feature(2, vec![0.0, 1.0]).await.unwrap();
    engine.upsert_feature(3, vec![0.5, 0.5]).await.unwrap();

    let generation = engine.run_clustering(3).await.unwrap().unwrap();
    assert!(engine.registry().clusters_in(generation).await.unwrap().len() <= 3);
}

#[tokio::test]
async fn test_classification_follows_the_new_generation() {
    let engine = common::engine_with_solver(Arc::new(StaticSolver {
        labels: vec![0, 1],
        centroids: vec![vec![1.0, 0.0], vec![0.0, 1.0]],
    }));
    engine.upsert_feature(1, vec![1.0, 0.0]).await.unwrap();
    engine.upsert_feature(2, vec![0.0, 1.0]).await.unwrap();

    let generation = engine.run_clustering(2).await.unwrap().unwrap();

    let hit = engine.classify(&[0.0, 1.0]).await.unwrap().unwrap();
    assert_eq!(hit.generation, generation);
    assert_eq!(hit.display_name, "Cluster 2");
}
