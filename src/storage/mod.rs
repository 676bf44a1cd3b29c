// Copyright 2025 Clustra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Storage contracts and in-memory reference backends.
//!
//! Persistence itself is a collaborator: any backend providing these traits
//! with the atomicity guarantees documented on `ClusterRegistry` can be
//! plugged into the engine.

pub mod cluster_registry;
pub mod encoding;
pub mod feature_store;

pub use cluster_registry::{
    ClusterRegistry, ClusterSpec, InMemoryClusterRegistry, SplitCommit,
};
pub use feature_store::{FeatureStore, InMemoryFeatureStore};
