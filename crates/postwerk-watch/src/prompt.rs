// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Confirmation seam between the watch loop and whichever front end is
// attached.

use std::collections::VecDeque;
use std::sync::Mutex;

use postwerk_core::RunChoice;

/// Asks the operator what to do with a matching file.
///
/// Called from a blocking thread, so implementations may block on input.
pub trait Prompter: Send + Sync {
    /// `print_available` says whether "create & print" may be offered.
    fn ask(&self, file_name: &str, print_available: bool) -> RunChoice;
}

/// Answers "create" without asking.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysCreate;

impl Prompter for AlwaysCreate {
    fn ask(&self, _file_name: &str, _print_available: bool) -> RunChoice {
        RunChoice::Create
    }
}

/// Replays a fixed list of answers, then ignores everything.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<RunChoice>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = RunChoice>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// File names asked about so far, in order.
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().map(|asked| asked.clone()).unwrap_or_default()
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&self, file_name: &str, _print_available: bool) -> RunChoice {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(file_name.to_string());
        }
        self.answers
            .lock()
            .ok()
            .and_then(|mut answers| answers.pop_front())
            .unwrap_or(RunChoice::Ignore)
    }
}
