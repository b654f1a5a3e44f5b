//! Core business logic for civiccare.
//!
//! The complaint workflow lives in [`ComplaintService`]; it leans on
//! [`ScreeningGate`] to vet uploads and on a [`StorageBackend`] for the
//! image files themselves.

pub mod services;

pub use services::*;
