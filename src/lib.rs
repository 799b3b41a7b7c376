//! Batch loader for KoboToolbox conflict-event exports.
//!
//! One run fetches the CSV export, derives the soldier-casualty total for
//! every row, and replaces `war_data.russian_ukrain_conflict` in Postgres.
//! Only one run may target a given table at a time.

pub mod error;
pub mod fetcher;
pub mod loader;
pub mod pipeline;
pub mod record;
pub mod settings;
pub mod transform;

pub use error::{EtlError, Result};
