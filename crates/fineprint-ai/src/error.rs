use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("no API key configured (set API_KEY)")]
    MissingCredential,

    #[error("HTTP request failed: {0}")]
    Service(#[from] reqwest::Error),

    #[error("service returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("service returned no text")]
    EmptyResponse,

    #[error("response does not match the analysis schema: {0}")]
    MalformedResponse(#[source] serde_json::Error),

    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("letter generation failed: {0}")]
    GenerationFailure(#[source] Box<ModelError>),
}

impl ModelError {
    /// Transport or provider-level failure, as opposed to a bad payload.
    pub fn is_service_error(&self) -> bool {
        match self {
            Self::MissingCredential | Self::Service(_) | Self::Provider { .. } => true,
            Self::GenerationFailure(inner) => inner.is_service_error(),
            _ => false,
        }
    }
}
