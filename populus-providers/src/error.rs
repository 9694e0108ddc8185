use populus_common::{PopulusError, ProviderKind};
use populus_http::HttpError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error("malformed {service} response: {message}")]
    Malformed {
        service: &'static str,
        message: String,
    },
    #[error("missing credential `{0}`")]
    MissingCredential(&'static str),
}

impl ProviderError {
    pub(crate) fn malformed(service: &'static str, message: impl Into<String>) -> Self {
        Self::Malformed {
            service,
            message: message.into(),
        }
    }

    /// Attribute the failure to a search provider.
    pub fn into_populus(self, provider: ProviderKind) -> PopulusError {
        match self {
            Self::MissingCredential(name) => {
                PopulusError::Config(format!("{provider} needs `{name}`"))
            }
            other => PopulusError::Provider {
                provider,
                message: other.to_string(),
            },
        }
    }
}
