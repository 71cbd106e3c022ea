//! email-cleaner library
//!
//! Bulk email list cleaning: upload intake and normalization, submission to a
//! validation service with progress tracking, categorization of the result,
//! and a paginated, searchable, exportable report over it.

pub mod categorizer;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod normalizer;
pub mod progress;
pub mod report;
pub mod server;
pub mod upload;

pub use client::{ClientBackend, FixtureValidationClient, HttpValidationClient, ValidationClient};
pub use config::{Backend, Config, build_config};
pub use error::{AppError, Result};
pub use models::{CategoryType, JobState, ValidationResult};
pub use normalizer::normalize;
pub use progress::{JobSnapshot, ProgressTracker, TickPolicy};
pub use report::{ReportBrowser, export_category, visible_rows};
