use thiserror::Error;

/// Main error type for ProfileGraph
#[derive(Error, Debug)]
pub enum ProfileGraphError {
    /// The fact/edge store could not be reached or rejected the operation
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A stored JSON attribute blob failed to parse
    #[error("Malformed attribute data for contact {contact_id} ({field}): {message}")]
    MalformedAttributeData {
        contact_id: i64,
        field: &'static str,
        message: String,
    },

    /// Contact not found
    #[error("Contact not found: {0}")]
    ContactNotFound(i64),

    /// Provider payload could not be normalized
    #[error("Adapter error: {0}")]
    Adapter(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ProfileGraphError {
    /// True for failures of the storage layer, which callers may degrade on.
    pub fn is_storage(&self) -> bool {
        matches!(self, ProfileGraphError::StorageUnavailable(_))
    }
}

/// Convenient Result type using ProfileGraphError
pub type Result<T> = std::result::Result<T, ProfileGraphError>;
