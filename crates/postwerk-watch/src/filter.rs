// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Watched-file events and the name convention that makes a file eligible.

use std::path::{Path, PathBuf};

use postwerk_core::Settings;
use tracing::info;

/// A file that appeared in the watched folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub path: PathBuf,
}

impl FileEvent {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Final path component, if it is valid UTF-8.
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The event's file name when it follows the watched naming convention.
///
/// Everything else is logged and skipped.
pub fn eligible_file_name<'e>(settings: &Settings, event: &'e FileEvent) -> Option<&'e str> {
    match event.file_name() {
        Some(name) if settings.accepts_file_name(name) => Some(name),
        Some(name) => {
            info!(file = name, prefix = %settings.watch_prefix, "Ignoring file, name does not match");
            None
        }
        None => {
            info!(path = %event.path.display(), "Ignoring file without a readable name");
            None
        }
    }
}
