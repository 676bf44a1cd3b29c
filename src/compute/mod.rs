// Copyright 2025 Clustra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

//! Pure vector math primitives used by classification and ranking.

pub mod distance;

pub use distance::{cosine_similarity, is_zero, magnitude};
