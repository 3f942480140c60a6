#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Image processing failed: {0}")]
    Image(#[from] ::image::ImageError),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}
