// Copyright 2025 Clustra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Business-logic layer over the storage contracts.

pub mod assignment;
pub mod classifier;
pub mod clustering;
pub mod ingestion;
pub mod ranker;

pub use assignment::AssignmentCoordinator;
pub use classifier::{Classifier, ClassifierMatch};
pub use clustering::BatchClusterer;
pub use ingestion::{IngestOutcome, IngestionService};
pub use ranker::SimilarityRanker;
