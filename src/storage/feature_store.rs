// Copyright 2025 Clustra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Feature vector storage: one vector per product.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;

use crate::core::error::Result;
use crate::core::types::{FeatureVector, ProductId, Vector};

/// Storage contract for product feature vectors.
///
/// `upsert` is idempotent and overwrites any prior vector for the product.
/// `scan_all` is a finite, restartable bulk read used by the batch
/// clusterer; it is not a streaming interface.
#[async_trait]
pub trait FeatureStore: Send + Sync {
    async fn upsert(&self, product_id: ProductId, values: Vector) -> Result<()>;

    async fn get(&self, product_id: ProductId) -> Result<Option<FeatureVector>>;

    /// All stored feature vectors, ordered by ascending product id.
    async fn scan_all(&self) -> Result<Vec<FeatureVector>>;

    async fn count(&self) -> Result<usize>;
}

/// In-memory reference backend over a concurrent map.
#[derive(Default)]
pub struct InMemoryFeatureStore {
    vectors: DashMap<ProductId, FeatureVector>,
}

impl InMemoryFeatureStore {
    pub fn new() -> Self {
        Self {
            vectors: DashMap::new(),
        }
    }
}

#[async_trait]
impl FeatureStore for InMemoryFeatureStore {
    async fn upsert(&self, product_id: ProductId, values: Vector) -> Result<()> {
        debug!(product_id, dimension = values.len(), "Upserting feature vector");
        self.vectors.insert(
            product_id,
            FeatureVector {
                product_id,
                values,
                last_updated: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get(&self, product_id: ProductId) -> Result<Option<FeatureVector>> {
        Ok(self.vectors.get(&product_id).map(|entry| entry.value().clone()))
    }

    async fn scan_all(&self) -> Result<Vec<FeatureVector>> {
        let mut all: Vec<FeatureVector> =
            self.vectors.iter().map(|entry| entry.value().clone()).collect();
        all.sort_by_key(|fv| fv.product_id);
        Ok(all)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.vectors.len())
    }
}
