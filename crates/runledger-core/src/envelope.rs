use serde::{Deserialize, Serialize};

/// Success body shared by every endpoint: the endpoint-specific payload plus
/// optional server `message` and `warnings`.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub warnings: Option<Vec<String>>,
    #[serde(flatten)]
    pub data: T,
}

/// Envelope with no payload of interest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Empty {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
}

/// Structured failure result for callers that prefer a value over an error.
///
/// `status_code` is `None` when no HTTP response was received at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEnvelope {
    pub success: bool,
    pub message: Option<String>,
    pub error: ErrorDetail,
    pub warnings: Option<Vec<String>>,
    pub status_code: Option<u16>,
}

impl FailureEnvelope {
    pub fn new(
        message: impl Into<String>,
        warnings: Option<Vec<String>>,
        status_code: Option<u16>,
    ) -> Self {
        Self {
            success: false,
            message: None,
            error: ErrorDetail {
                message: message.into(),
            },
            warnings,
            status_code,
        }
    }
}

/// Error body as the server sends it. Every field is optional because 5xx
/// pages from proxies are rarely JSON at all.
#[derive(Debug, Default, Deserialize)]
pub struct ServerErrorBody {
    #[serde(default)]
    pub error: Option<ErrorDetail>,
    #[serde(default)]
    pub warnings: Option<Vec<String>>,
}

impl ServerErrorBody {
    /// Extract `error.message` from a JSON body, falling back to the raw text.
    pub fn message_from(body: &str) -> (String, Option<Vec<String>>) {
        match serde_json::from_str::<ServerErrorBody>(body) {
            Ok(ServerErrorBody {
                error: Some(detail),
                warnings,
            }) => (detail.message, warnings),
            Ok(parsed) => (body.to_string(), parsed.warnings),
            Err(_) => (body.to_string(), None),
        }
    }
}
