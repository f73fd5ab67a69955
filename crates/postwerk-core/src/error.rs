// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Postwerk.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Top-level error type for all Postwerk operations.
#[derive(Debug, Error)]
pub enum PostwerkError {
    // -- Startup --
    #[error("{0}")]
    Configuration(#[from] ConfigError),

    // -- Document errors --
    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("template has no form field named '{field}'")]
    FormField { field: String },

    // -- Storage --
    #[error("{operation} failed for {}: {source}", path.display())]
    FileOperation {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Watching and dispatch --
    #[error("folder watch failed: {0}")]
    Watch(String),

    #[error("viewer launch failed: {0}")]
    Viewer(String),
}

impl PostwerkError {
    /// Wrap an I/O error with the operation and path it happened on.
    pub fn file(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileOperation {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Whether the error should stop the whole process rather than just the
    /// current pipeline run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Watch(_))
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PostwerkError>;
