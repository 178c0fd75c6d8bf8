// Error types for the Booking Engine
// Separates contract violations and store failures from expected emptiness,
// which never surfaces as an error.

use thiserror::Error;

/// Main error type for the Booking Engine
///
/// Missing overrides (pricing rows, content rows) are not represented here:
/// they degrade to documented defaults inside each component.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Database operation errors
    /// Automatically converted from sqlx::Error
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// JSON serialization/deserialization errors
    /// Occurs when decoding JSONB columns (content fields, combination maps)
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Store could not be reached or refused the query
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Product not found in the store
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// A row arrived from the store in a shape the engine cannot use
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A price or availability query was issued before a date was chosen
    #[error("No travel date selected")]
    DateNotSelected,

    /// Booking session data has not finished loading
    #[error("Booking session is not loaded")]
    SessionNotLoaded,
}

/// Result type alias for Booking Engine operations
pub type EngineResult<T> = Result<T, EngineError>;
