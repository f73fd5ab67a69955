// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Startup banner: what this run will and will not produce.

use postwerk_core::{BeforeRun, Settings};
use tracing::info;

pub fn lines(settings: &Settings) -> Vec<String> {
    let will = |enabled: bool, what: &str| {
        if enabled {
            format!("Will create {what}")
        } else {
            format!("Will NOT create {what}")
        }
    };
    let mut lines = vec![
        will(settings.create_proof_of_postage, "proof of postage"),
        will(settings.create_qrs, "QR codes"),
        will(settings.create_packing_slips, "packing slips"),
        will(settings.create_labels, "labels"),
        format!("Storing documents in {}", settings.store_folder.display()),
        format!(
            "Watching {} for {}*.pdf",
            settings.watch_folder.display(),
            settings.watch_prefix
        ),
    ];
    lines.push(match settings.before_run {
        BeforeRun::Prompt if settings.print_available() => "Will ask before each file (print available)".to_string(),
        BeforeRun::Prompt => "Will ask before each file".to_string(),
        BeforeRun::Stop => "Will stop after the first file".to_string(),
        BeforeRun::Proceed => "Will process every matching file".to_string(),
    });
    lines.push("Type 'exit' to quit".to_string());
    lines
}

pub fn log(settings: &Settings) {
    for line in lines(settings) {
        info!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn disabled_stages_are_called_out() {
        let mut settings =
            Settings::from_map(&Settings::default_map(Path::new("/home/shop"))).expect("defaults");
        settings.create_labels = false;
        let lines = lines(&settings);
        assert!(lines.contains(&"Will NOT create labels".to_string()));
        assert!(lines.contains(&"Will create proof of postage".to_string()));
        assert!(lines.iter().any(|line| line.contains("order*.pdf")));
    }
}
