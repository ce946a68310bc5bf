use thiserror::Error;

#[derive(Error, Debug)]
pub enum FieldmarkError {
    #[error("Unsupported file type: {0} (expected application/pdf)")]
    InvalidFileType(String),

    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Failed to render PDF: {0}")]
    RenderFailed(String),

    #[error("No document loaded")]
    NoDocument,

    #[error("An export is already in progress")]
    ExportInProgress,

    #[error("Page {page} is out of range (document has {page_count} pages)")]
    PageOutOfRange { page: u32, page_count: u32 },

    #[error("Image error: {0}")]
    Image(String),

    #[error("Signature capture error: {0}")]
    Signature(String),

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Failed to deliver exported file: {0}")]
    Delivery(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for FieldmarkError {
    fn from(e: serde_json::Error) -> Self {
        FieldmarkError::SerializationError(e.to_string())
    }
}

impl From<lopdf::Error> for FieldmarkError {
    fn from(e: lopdf::Error) -> Self {
        FieldmarkError::OperationError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FieldmarkError>;
