// Copyright 2025 Clustra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Narrow interfaces for out-of-scope collaborators.

pub mod extractor;
pub mod solver;

pub use extractor::{FeatureExtractor, ImageData};
pub use solver::{ClusterSolver, HttpKMeansSolver, SolveRequest, SolveResponse};
