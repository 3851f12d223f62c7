//! Data pipeline for the WhatsApp image-share analysis.
//!
//! Loads the tab-separated event log in batches, normalizes timestamps,
//! derives the aggregate views, persists them and runs the top-level
//! analysis pipeline.

pub mod aggregator;
pub mod analysis;
pub mod images;
pub mod normalizer;
pub mod reader;
pub mod writer;

pub use eda_core as core;
