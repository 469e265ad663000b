use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every failure the access layer reports. Serialized with a `kind` tag so a
/// consumer can route on the variant (for example `NotInitialized` → login)
/// without inspecting the message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum AccessError {
    #[error("Kubernetes client not initialized. Please login first.")]
    NotInitialized,
    #[error("invalid kubeconfig: {message}")]
    InvalidCredential { message: String },
    #[error("{message}")]
    InvalidInput { message: String },
    #[error("{message}")]
    NotFound { message: String },
    #[error("{message}")]
    Conflict { message: String },
    #[error("Resource {resource} not supported")]
    UnsupportedResource { resource: String },
    #[error("{message}")]
    Auth { status: u16, message: String },
    #[error("{message}")]
    Transport { message: String },
}

impl AccessError {
    pub fn invalid_credential(message: impl Into<String>) -> Self {
        Self::InvalidCredential {
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn unsupported(resource: impl Into<String>) -> Self {
        Self::UnsupportedResource {
            resource: resource.into(),
        }
    }

    /// HTTP status of the cluster response behind this error, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. } => Some(*status),
            Self::NotFound { .. } => Some(404),
            Self::Conflict { .. } => Some(409),
            _ => None,
        }
    }

    pub fn requires_login(&self) -> bool {
        matches!(self, Self::NotInitialized | Self::Auth { .. })
    }
}

impl From<kube::Error> for AccessError {
    fn from(error: kube::Error) -> Self {
        let message = error.to_string();
        match &error {
            kube::Error::Api(response) => match response.code {
                404 => Self::NotFound { message },
                401 | 403 => Self::Auth {
                    status: response.code,
                    message,
                },
                409 => Self::Conflict { message },
                _ => Self::Transport { message },
            },
            _ => Self::Transport { message },
        }
    }
}

/// `{success, data|error}` wrapper returned across the operations boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<AccessError>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn fail(error: AccessError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }

    pub fn into_result(self) -> Result<T, AccessError> {
        match (self.success, self.data, self.error) {
            (true, Some(data), _) => Ok(data),
            (_, _, Some(error)) => Err(error),
            _ => Err(AccessError::transport("malformed response envelope")),
        }
    }
}

impl<T> From<Result<T, AccessError>> for Envelope<T> {
    fn from(result: Result<T, AccessError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(error) => Self::fail(error),
        }
    }
}
