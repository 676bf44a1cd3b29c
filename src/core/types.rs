// Copyright 2025 Clustra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Core domain types shared across the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ProductId = u64;
pub type ClusterId = u64;
/// Monotonically increasing cluster-set version. 0 means "no clusters yet".
pub type Generation = u64;
pub type Vector = Vec<f32>;

/// One feature vector per product, overwritten on re-extraction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureVector {
    pub product_id: ProductId,
    pub values: Vector,
    pub last_updated: DateTime<Utc>,
}

impl FeatureVector {
    pub fn dimension(&self) -> usize {
        self.values.len()
    }
}

/// A visual category within one generation of the cluster set.
///
/// The generation never changes after creation. A split may replace the
/// display name and centroid of the original cluster, but its id and
/// generation are kept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cluster {
    pub cluster_id: ClusterId,
    pub generation: Generation,
    pub display_name: String,
    pub centroid: Option<Vector>,
    pub created_at: DateTime<Utc>,
}

/// Many-to-many product/cluster association with no extra attributes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Membership {
    pub cluster_id: ClusterId,
    pub product_id: ProductId,
}

/// Result of a successful classification against the active generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Classification {
    pub cluster_id: ClusterId,
    pub display_name: String,
    pub generation: Generation,
    pub similarity: f32,
}

/// Outcome of classify-and-assign for one product.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentOutcome {
    pub cluster_id: ClusterId,
    pub generation: Generation,
    /// True when no cluster cleared the threshold and a singleton was
    /// created for this product.
    pub created_cluster: bool,
}

/// Outcome of a cluster split request.
#[derive(Debug, Clone, PartialEq)]
pub enum SplitOutcome {
    /// Fewer than two members had usable feature vectors.
    NotEnoughMembers,
    /// The solver did not actually separate the member set.
    NotSeparable,
    /// The split was committed. The original cluster keeps its id; every
    /// other solver label became a sibling cluster in the same generation.
    Split {
        original: ClusterId,
        new_clusters: Vec<ClusterId>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_cluster_json_round_trip() {
        let cluster = Cluster {
            cluster_id: 3,
            generation: 2,
            display_name: "Cluster 3".to_string(),
            centroid: Some(vec![0.5, -0.25]),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&cluster).unwrap();
        let decoded: Cluster = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, cluster);
    }

    #[test]
    fn test_classification_json_shape() {
        let classification = Classification {
            cluster_id: 7,
            display_name: "shoes".to_string(),
            generation: 1,
            similarity: 0.92,
        };
        let json = serde_json::to_value(&classification).unwrap();
        assert_eq!(json["cluster_id"], 7);
        assert_eq!(json["display_name"], "shoes");
        assert_eq!(json["generation"], 1);
    }

    #[test]
    fn test_membership_json_round_trip() {
        let membership = Membership {
            cluster_id: 4,
            product_id: 19,
        };
        let json = serde_json::to_string(&membership).unwrap();
        let decoded: Membership = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, membership);
    }
}
