//! Common utilities and shared types for civiccare.
//!
//! This crate provides foundational components used across all civiccare crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID record ids and bearer tokens via [`IdGenerator`]
//!
//! # Example
//!
//! ```no_run
//! use civiccare_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id = IdGenerator::new().generate();
//!     println!("{} listening on {}: {id}", config.server.url, config.server.port);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;

pub use config::{
    Config, DatabaseConfig, ScreeningConfig, ScreeningFailureMode, SqlLogLevel, UploadConfig,
};
pub use error::{AppError, AppResult, ScreeningReason};
pub use id::IdGenerator;
