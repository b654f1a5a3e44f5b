//! Business logic services.

#![allow(missing_docs)]

pub mod account;
pub mod complaint;
pub mod screening;
pub mod stats;
pub mod storage;
pub mod upload;

pub use account::{AccountService, LoginInput, RegisterInput};
pub use complaint::{
    ComplaintQuery, ComplaintService, ComplaintView, Coordinates, CreateComplaintInput,
    OwnerSummary, UpdateComplaintInput, require_role,
};
pub use screening::{
    HiveScreener, ImageScreener, NoOpScreener, ScreeningGate, ScreeningPolicy, ScreeningScores,
    parse_hive_response,
};
pub use stats::ComplaintStats;
pub use storage::{
    LocalStorage, MemoryStorage, StorageBackend, StorageService, discard_files,
    stored_file_name, validate_file_name,
};
pub use upload::{UploadLimits, UploadedImage};

#[cfg(any(test, feature = "test-utils"))]
pub use upload::PNG_SIGNATURE;
