// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Postwerk — Core types, configuration and error definitions shared across
// all crates.

pub mod config;
pub mod error;
pub mod filename;
pub mod integrity;
pub mod types;

pub use config::{BeforeRun, ConfigError, ConfigProblem, Settings};
pub use error::PostwerkError;
pub use filename::{FilenameGenerator, SequenceNumbers};
pub use types::*;
