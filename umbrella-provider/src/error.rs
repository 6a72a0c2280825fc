use thiserror::Error;
use umbrella_core::provider::{ProviderError, ProviderErrorKind};

/// Error type of the Umbrella REST client.
#[derive(Debug, Error)]
pub enum Error {
    /// Token request rejected, or 401/403 on an API call
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Connection refused, DNS failure, timeout, ...
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Not found: {path}")]
    NotFound { path: String },

    /// Any other non-success response
    #[error("Umbrella API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// JSON body could not be decoded, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// Missing or invalid provider settings
    #[error("Invalid provider configuration: {0}")]
    Configuration(String),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    fn kind(&self) -> ProviderErrorKind {
        match self {
            Self::Authentication { .. } => ProviderErrorKind::Authentication,
            Self::NotFound { .. } => ProviderErrorKind::NotFound,
            Self::Api { .. } | Self::Deserialization { .. } => ProviderErrorKind::Api,
            Self::Configuration(_) | Self::InvalidUrl(_) => ProviderErrorKind::Configuration,
            Self::Transport(_) => ProviderErrorKind::Other,
        }
    }
}

impl From<Error> for ProviderError {
    fn from(err: Error) -> Self {
        let kind = err.kind();
        ProviderError::new(err.to_string())
            .with_kind(kind)
            .with_cause(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_to_provider_error_kind() {
        let err: ProviderError = Error::NotFound {
            path: "/deployments/v2/sites/1".to_string(),
        }
        .into();
        assert!(err.is_not_found());

        let err: ProviderError = Error::Api {
            status: 400,
            message: "name is required".to_string(),
        }
        .into();
        assert_eq!(err.kind, ProviderErrorKind::Api);
        assert_eq!(
            err.message,
            "Umbrella API error (HTTP 400): name is required"
        );

        let err: ProviderError = Error::Authentication {
            message: "invalid_client".to_string(),
        }
        .into();
        assert_eq!(err.kind, ProviderErrorKind::Authentication);
    }
}
