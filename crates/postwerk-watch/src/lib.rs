// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// postwerk-watch — Folder watching and per-file orchestration.
//
// Turns raw "file appeared" notifications into settled, name-filtered
// candidates, runs the document pipeline for each one in turn and hands the
// generated documents to the configured viewer commands.

pub mod dispatch;
pub mod filter;
pub mod pipeline;
pub mod prompt;
pub mod settle;
pub mod viewer;
pub mod watcher;

#[cfg(test)]
mod testing;

pub use dispatch::{WatchLoop, WatchOutcome, watch};
pub use filter::FileEvent;
pub use pipeline::{Pipeline, RunOutcome, RunReport};
pub use prompt::{AlwaysCreate, Prompter, ScriptedPrompter};
pub use settle::SettleQueue;
pub use viewer::{LaunchOutcome, ViewerHandle, ViewerLauncher};
pub use watcher::FolderWatcher;
