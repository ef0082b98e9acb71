// src/recall/mod.rs

//! Multi-source recall.
//!
//! Each `RecallSource` wraps one retrieval mechanism and never fails outward: errors are
//! logged and turned into an empty hit list. `RecallOrchestrator` queries every registered
//! source concurrently and fuses the hits into one ranked list.

pub mod orchestrator;
pub mod source;
pub mod sources;
pub mod types;

pub use orchestrator::RecallOrchestrator;
pub use source::RecallSource;
pub use sources::{FaqRecallSource, HistoryRecallSource, VectorRecallSource};
pub use types::{RecallHit, RecallRequest};
