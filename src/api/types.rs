use crate::relay::{RelayError, RelayResult};
use axum::http::{HeaderMap, HeaderName};
use serde::{Deserialize, Serialize};

/// The single static credential the trusted client must present
#[derive(Debug, Clone)]
pub struct InboundAuth {
    header: HeaderName,
    value: String,
}

impl InboundAuth {
    pub fn new(header: &str, value: impl Into<String>) -> RelayResult<Self> {
        let header = HeaderName::from_bytes(header.as_bytes()).map_err(|e| {
            RelayError::InvalidConfig(format!("invalid credential header name {header:?}: {e}"))
        })?;

        Ok(Self {
            header,
            value: value.into(),
        })
    }

    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    /// Exact match of the first value of the credential header
    pub fn is_authorized(&self, headers: &HeaderMap) -> bool {
        headers
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == self.value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}
