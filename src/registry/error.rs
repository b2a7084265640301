/// Errors that can occur during registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("endpoint already exists: {0}")]
    DuplicateEndpoint(String),

    #[error("endpoint not found: {0}")]
    EndpointNotFound(String),

    /// `field` is the camelCase path inside the endpoint record.
    #[error("invalid endpoint '{id}': {field} {message}")]
    InvalidEndpoint {
        id: String,
        field: String,
        message: String,
    },
}
