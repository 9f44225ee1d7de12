// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for Polain
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Main error type for Polain operations
#[derive(Error, Debug)]
pub enum PolainError {
    /// The model listing could not be fetched or parsed
    #[error("Model listing unavailable: {0}")]
    Fetch(String),

    /// Transport-level errors (request construction, connection, HTTP status)
    #[error("Transport error: {0}")]
    Api(#[from] ApiError),

    /// A single server-sent event could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// The stream closed without any visible content
    #[error("The model returned an empty response")]
    EmptyResponse,

    /// A second turn was started while one is still streaming
    #[error("A turn is already in progress for this conversation")]
    TurnInProgress,

    /// The turn was cancelled before it could be finalized
    #[error("The turn was abandoned before completion")]
    TurnAbandoned,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Transport-specific error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Network connectivity error
    #[error("Network error: {0}")]
    Network(String),

    /// API returned an error status
    #[error("API error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Timeout waiting for response
    #[error("Request timed out")]
    Timeout,

    /// The byte stream failed after the response started
    #[error("Streaming error: {0}")]
    StreamError(String),
}

/// Coarse classification of a [`PolainError`], for callers that branch on
/// the kind of failure rather than its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Fetch,
    Transport,
    Decode,
    EmptyResponse,
    Session,
    Config,
    Io,
}

impl PolainError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PolainError::Fetch(_) => ErrorKind::Fetch,
            PolainError::Api(_) => ErrorKind::Transport,
            PolainError::Decode(_) | PolainError::Json(_) => ErrorKind::Decode,
            PolainError::EmptyResponse => ErrorKind::EmptyResponse,
            PolainError::TurnInProgress | PolainError::TurnAbandoned => ErrorKind::Session,
            PolainError::Config(_) | PolainError::InvalidInput(_) => ErrorKind::Config,
            PolainError::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if let Some(status) = err.status() {
            ApiError::ServerError {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_body() || err.is_decode() {
            ApiError::StreamError(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Result type alias for Polain operations
pub type Result<T> = std::result::Result<T, PolainError>;
