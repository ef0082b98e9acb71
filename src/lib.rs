// src/lib.rs

pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod recall;
pub mod repository;
pub mod schema;
pub mod state;

pub use error::{RecallError, Result};
