// Transport-level error types shared by every HTTP collaborator of the booking client

use serde::Deserialize;
use thiserror::Error;

use crate::config::ClientConfig;

// Errors produced while talking to the booking server
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    #[error("API error: {status_code} - {message}")]
    ApiResponseError { status_code: u16, message: String },

    // The server answered with its structured {error, message} failure body
    #[error("Rejected by server ({status_code}): {error} - {message}")]
    Rejected {
        status_code: u16,
        error: String,
        message: String,
    },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Client error: {0}")]
    ClientError(String),
}

impl ApiError {
    // Map a reqwest failure, keeping timeouts and decode failures distinguishable
    pub fn from_reqwest(err: reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            ApiError::Timeout(timeout_ms)
        } else if err.is_decode() {
            ApiError::MalformedResponse(err.to_string())
        } else if err.is_builder() {
            ApiError::ClientError(err.to_string())
        } else {
            ApiError::NetworkError(err.to_string())
        }
    }

    // Build the error for a non-success status, preferring the server's structured body
    pub fn from_status(status_code: u16, body: &[u8]) -> Self {
        match serde_json::from_slice::<FailureBody>(body) {
            Ok(failure) => ApiError::Rejected {
                status_code,
                error: failure.error,
                message: failure.message,
            },
            Err(_) => ApiError::ApiResponseError {
                status_code,
                message: String::from_utf8_lossy(body).trim().to_string(),
            },
        }
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Initialization error: {0}")]
    InitError(String),
}

// Failure body the server sends alongside non-success statuses
#[derive(Debug, Deserialize)]
pub struct FailureBody {
    pub error: String,
    pub message: String,
}

pub(crate) fn build_http_client(config: &ClientConfig) -> Result<reqwest::Client, ClientError> {
    let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
    if let Some(timeout) = config.timeout() {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| ClientError::InitError(e.to_string()))
}
