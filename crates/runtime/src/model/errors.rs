use thiserror::Error;

/// Failure of a completion request.
///
/// Always escalated: a turn cannot continue without the model's reply.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// The endpoint could not be reached or the connection dropped.
    #[error("model endpoint unreachable: {0}")]
    Network(String),

    /// The endpoint answered with a non-success status.
    #[error("model api error: {0}")]
    Api(String),

    /// The body did not contain a completion.
    #[error("malformed completion: {0}")]
    InvalidResponse(String),
}
