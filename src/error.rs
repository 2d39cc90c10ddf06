// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when talking to the remote API
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {path}{}", detail_suffix(.detail))]
    Status {
        path: String,
        status: u16,
        detail: Option<String>,
    },

    #[error("Failed to decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode request body for {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Not logged in")]
    NotAuthenticated,

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ApiError {
    /// HTTP status of a rejected request, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|d| format!(": {d}"))
        .unwrap_or_default()
}

/// Form input rejected before any request is sent
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("An audio file is required")]
    MissingAudioFile,

    #[error("Invalid {field} '{value}'")]
    InvalidIdentifier { field: &'static str, value: String },

    #[error("Audio file {filename} is empty")]
    EmptyAudioFile { filename: String },

    #[error("Unsupported audio format '{extension}' (only MP3, WAV, and OGG files are supported)")]
    UnsupportedAudioFormat { extension: String },
}

/// Errors surfaced by the session controller's login and register operations
#[derive(Error, Debug)]
pub enum AuthError {
    /// The server answered with an error status
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The server could not be reached or its answer could not be used
    #[error("{fallback}: {source}")]
    Unavailable {
        fallback: &'static str,
        #[source]
        source: ApiError,
    },

    #[error("Login response carried no access token")]
    MissingToken,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to persist session: {0}")]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// Human-readable message suitable for showing next to the form
    pub fn message(&self) -> String {
        match self {
            AuthError::Rejected { message, .. } => message.clone(),
            AuthError::Unavailable { fallback, .. } => (*fallback).to_string(),
            AuthError::MissingToken => "Login failed".to_string(),
            AuthError::Validation(e) => e.to_string(),
            AuthError::Storage(e) => e.to_string(),
        }
    }

    /// Classify an API failure, keeping the server's detail when one was sent
    pub(crate) fn from_api(error: ApiError, fallback: &'static str) -> Self {
        match error {
            ApiError::Status { status, detail, .. } => AuthError::Rejected {
                status,
                message: detail.unwrap_or_else(|| fallback.to_string()),
            },
            ApiError::Validation(e) => AuthError::Validation(e),
            other => AuthError::Unavailable {
                fallback,
                source: other,
            },
        }
    }
}

/// Errors that can occur when reading or writing the persisted token
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to read session file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write session file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove session file {path}: {source}")]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse session file {path}: {source}")]
    JsonParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize session: {0}")]
    JsonSerializeFailed(#[from] serde_json::Error),
}

/// Errors that can occur while downloading episode audio
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Invalid audio URL: {0}")]
    InvalidUrl(#[from] ApiError),

    #[error("Failed to create file {path}: {source}")]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move {from} into place at {to}: {source}")]
    FileRenameFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}
