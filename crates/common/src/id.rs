//! ID generation utilities.

use ulid::Ulid;
use uuid::Uuid;

/// Generates record ids and bearer tokens.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new ULID-based record ID.
    ///
    /// ULIDs sort by creation time, so ids double as a coarse creation order.
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Generate an opaque bearer token.
    #[must_use]
    pub fn generate_token(&self) -> String {
        format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
    }

    /// Generate a short random suffix for stored file names.
    #[must_use]
    pub fn generate_suffix(&self) -> String {
        let mut simple = Uuid::new_v4().simple().to_string();
        simple.truncate(12);
        simple
    }
}
