use serde::Deserialize;

/// Errors surfaced by the client SDK.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API answered with a non-2xx status.
    #[error("API error ({status} {code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// A 2xx body that does not match the expected shape.
    #[error("Unexpected API response: {0}")]
    Decode(String),

    #[error("Token store error: {0}")]
    Io(#[from] std::io::Error),
}

/// The `{ error, code }` body every API error carries.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    code: String,
}

impl ClientError {
    /// Build an [`ClientError::Api`] from a status and raw body.
    pub fn from_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => ClientError::Api {
                status,
                code: parsed.code,
                message: parsed.error,
            },
            Err(_) => ClientError::Api {
                status,
                code: "UNKNOWN".to_string(),
                message: body.to_string(),
            },
        }
    }

    /// The API error code, if this is an API error.
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    /// The payment was confirmed but access is still being set up.
    pub fn is_activation_pending(&self) -> bool {
        self.code() == Some("ACTIVATION_PENDING")
    }
}
