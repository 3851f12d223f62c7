//! Core types for the WhatsApp image-share analysis pipeline.
//!
//! Holds the event model, the error taxonomy shared by every stage, the CLI
//! settings and the calendar helpers used by the normalizer.

pub mod error;
pub mod models;
pub mod settings;
pub mod time_utils;
