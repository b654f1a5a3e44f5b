//! Repositories wrapping sea-orm queries.

pub mod complaint;
pub mod user;

pub use complaint::{ComplaintFilter, ComplaintRepository};
pub use user::UserRepository;
