//! # Regalo Common Library
//!
//! Shared code for the gift reveal service and its tools:
//! - Database schema, initialization and runtime settings
//! - Phrase catalog, assignment and identity tables
//! - Reveal event types (phases, countdown, effects)
//! - Configuration loading and root folder resolution
//! - Clock abstraction

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
pub use events::{RevealEvent, RevealPhase};
