//! Core module - Business logic
//!
//! Fact model, extraction, topic resolution, persistence and the
//! orchestrator that ties them together.

pub mod canonical;
pub mod error;
pub mod extract;
pub mod fact;
pub mod hit;
pub mod orchestrator;
pub mod resolver;
pub mod storage;
pub mod store;
