// src/recall/sources/mod.rs

//! Recall source adapters over the vector repositories.

mod faq;
mod history;
mod vector;

pub use faq::FaqRecallSource;
pub use history::HistoryRecallSource;
pub use vector::VectorRecallSource;
