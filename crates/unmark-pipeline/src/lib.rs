// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// unmark-pipeline: job orchestration over the document engine.

pub mod engine;
pub mod job;

pub use engine::{Engine, ProcessOutput};
pub use job::{Budget, Job};
