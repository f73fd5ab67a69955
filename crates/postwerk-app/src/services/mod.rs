// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer — everything the binary does around the watch loop: config
// file handling, the console front end and the startup banner.

pub mod banner;
pub mod config_file;
pub mod console;
