//! viva-core — Exam session engine, traits, and scoring.
//!
//! This crate defines the data model, service traits, and the session
//! pipeline (generate → ask → capture → evaluate → aggregate) that the
//! rest of viva builds on.

pub mod aggregate;
pub mod capture;
pub mod content;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod generator;
pub mod model;
pub mod report;
pub mod speech;
pub mod traits;

#[cfg(test)]
mod testing;
