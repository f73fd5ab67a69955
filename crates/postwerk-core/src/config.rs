// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.
//
// The persisted form is a flat string map (edited by hand or by a front end).
// It is validated exactly once at startup into an immutable `Settings` value;
// validation reports every problem at once instead of failing mid-pipeline.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{DocumentKind, RunChoice};

/// Raw key/value configuration as stored on disk.
pub type RawConfig = BTreeMap<String, String>;

/// Extension every watched input must carry (case-sensitive).
pub const WATCH_EXTENSION: &str = ".pdf";

/// Filename prefix used when `WatchPrefix` is not configured.
pub const DEFAULT_WATCH_PREFIX: &str = "order";

/// Template location used when `ProofOfPostageTemplate` is not configured.
pub const DEFAULT_TEMPLATE: &str = "Proof Of Postage Template.pdf";

pub mod keys {
    pub const WATCH_FOLDER: &str = "WatchFolder";
    pub const STORE_FOLDER: &str = "StoreFolder";
    pub const CREATE_PROOF_OF_POSTAGE: &str = "CreateProofOfPostage";
    pub const CREATE_LABELS: &str = "CreateLabels";
    pub const CREATE_PACKING_SLIPS: &str = "CreatePackingSlips";
    pub const CREATE_QRS: &str = "CreateQRs";
    pub const PACKING_SLIP_HEADER_IMAGE: &str = "PackingSlipHeaderImage";
    pub const PACKING_SLIP_FOOTER_IMAGE: &str = "PackingSlipFooterImage";
    pub const VIEWER_DELAY: &str = "ViewerDelay";
    pub const BEFORE_RUN: &str = "BeforeRun";
    pub const PROOF_OF_POSTAGE_TEMPLATE: &str = "ProofOfPostageTemplate";
    pub const WATCH_PREFIX: &str = "WatchPrefix";
    pub const VIEWER_EXECUTE: &str = "ViewerExecute";
    pub const VIEWER_EXECUTE_PRINT: &str = "ViewerExecutePrint";
}

/// A single problem found while validating the raw configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigProblem {
    Missing(String),
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

impl std::fmt::Display for ConfigProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(key) => write!(f, "property '{key}' not found"),
            Self::Invalid { key, value, reason } => {
                write!(f, "property '{key}' has invalid value '{value}': {reason}")
            }
        }
    }
}

/// Every problem found in one validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid configuration: {}", summary(.problems))]
pub struct ConfigError {
    pub problems: Vec<ConfigProblem>,
}

impl ConfigError {
    pub fn new(problems: Vec<ConfigProblem>) -> Self {
        Self { problems }
    }
}

fn summary(problems: &[ConfigProblem]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// What to do before (and after) processing a matching file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BeforeRun {
    /// Process every matching file without asking.
    Proceed,
    /// Ask the operator: ignore / create / create & print.
    Prompt,
    /// Process the first matching file, then terminate the watcher.
    Stop,
}

/// Viewer command templates, one per generated document kind.
///
/// A `%filename%` token is replaced with the quoted absolute path of the
/// generated document; without the token the quoted path is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerTemplates {
    pub proof_of_postage: String,
    pub packing_slip: String,
    pub labels: String,
}

impl ViewerTemplates {
    pub fn for_kind(&self, kind: DocumentKind) -> &str {
        match kind {
            DocumentKind::ProofOfPostage => &self.proof_of_postage,
            DocumentKind::PackingSlip => &self.packing_slip,
            DocumentKind::Labels => &self.labels,
        }
    }
}

/// Validated, immutable settings for one watcher process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub watch_folder: PathBuf,
    pub store_folder: PathBuf,
    pub create_proof_of_postage: bool,
    pub create_labels: bool,
    pub create_packing_slips: bool,
    pub create_qrs: bool,
    pub packing_slip_header_image: PathBuf,
    pub packing_slip_footer_image: PathBuf,
    /// Seconds to wait before launching a viewer.
    pub viewer_delay_secs: u64,
    pub before_run: BeforeRun,
    pub viewers: ViewerTemplates,
    /// Present only when every print template is configured and non-empty.
    pub print_viewers: Option<ViewerTemplates>,
    pub template_path: PathBuf,
    pub watch_prefix: String,
}

impl Settings {
    /// Validate a raw key/value map, collecting every problem.
    pub fn from_map(raw: &RawConfig) -> Result<Self, ConfigError> {
        let mut problems = Vec::new();
        let mut required = |key: &str| -> String {
            match raw.get(key) {
                Some(value) => value.clone(),
                None => {
                    problems.push(ConfigProblem::Missing(key.to_string()));
                    String::new()
                }
            }
        };

        let watch_folder = PathBuf::from(required(keys::WATCH_FOLDER));
        let store_folder = PathBuf::from(required(keys::STORE_FOLDER));
        let create_proof_of_postage = is_yes(&required(keys::CREATE_PROOF_OF_POSTAGE));
        let create_labels = is_yes(&required(keys::CREATE_LABELS));
        let create_packing_slips = is_yes(&required(keys::CREATE_PACKING_SLIPS));
        let create_qrs = is_yes(&required(keys::CREATE_QRS));
        let packing_slip_header_image = PathBuf::from(required(keys::PACKING_SLIP_HEADER_IMAGE));
        let packing_slip_footer_image = PathBuf::from(required(keys::PACKING_SLIP_FOOTER_IMAGE));
        let viewer_delay_raw = required(keys::VIEWER_DELAY);
        let viewers = ViewerTemplates {
            proof_of_postage: required(&viewer_key(keys::VIEWER_EXECUTE, DocumentKind::ProofOfPostage)),
            packing_slip: required(&viewer_key(keys::VIEWER_EXECUTE, DocumentKind::PackingSlip)),
            labels: required(&viewer_key(keys::VIEWER_EXECUTE, DocumentKind::Labels)),
        };

        let viewer_delay_secs = match viewer_delay_raw.trim().parse::<u64>() {
            Ok(secs) => secs,
            Err(err) => {
                if raw.contains_key(keys::VIEWER_DELAY) {
                    problems.push(ConfigProblem::Invalid {
                        key: keys::VIEWER_DELAY.to_string(),
                        value: viewer_delay_raw.clone(),
                        reason: err.to_string(),
                    });
                }
                0
            }
        };

        let before_run = match raw.get(keys::BEFORE_RUN).map(|v| v.trim()) {
            None | Some("") => BeforeRun::Proceed,
            Some("prompt") => BeforeRun::Prompt,
            Some("stop") => BeforeRun::Stop,
            Some(other) => {
                problems.push(ConfigProblem::Invalid {
                    key: keys::BEFORE_RUN.to_string(),
                    value: other.to_string(),
                    reason: "expected 'stop', 'prompt' or nothing".to_string(),
                });
                BeforeRun::Proceed
            }
        };

        let print_viewers = {
            let lookup = |kind| {
                raw.get(&viewer_key(keys::VIEWER_EXECUTE_PRINT, kind))
                    .filter(|v| !v.trim().is_empty())
                    .cloned()
            };
            match (
                lookup(DocumentKind::ProofOfPostage),
                lookup(DocumentKind::PackingSlip),
                lookup(DocumentKind::Labels),
            ) {
                (Some(proof_of_postage), Some(packing_slip), Some(labels)) => Some(ViewerTemplates {
                    proof_of_postage,
                    packing_slip,
                    labels,
                }),
                _ => None,
            }
        };

        let template_path = raw
            .get(keys::PROOF_OF_POSTAGE_TEMPLATE)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATE));

        let watch_prefix = raw
            .get(keys::WATCH_PREFIX)
            .filter(|v| !v.is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_WATCH_PREFIX.to_string());

        if !problems.is_empty() {
            return Err(ConfigError::new(problems));
        }

        Ok(Self {
            watch_folder,
            store_folder,
            create_proof_of_postage,
            create_labels,
            create_packing_slips,
            create_qrs,
            packing_slip_header_image,
            packing_slip_footer_image,
            viewer_delay_secs,
            before_run,
            viewers,
            print_viewers,
            template_path,
            watch_prefix,
        })
    }

    /// Resolve the relative template, header and footer paths against the
    /// config file's directory.
    pub fn with_base_dir(mut self, base: &Path) -> Self {
        for path in [
            &mut self.template_path,
            &mut self.packing_slip_header_image,
            &mut self.packing_slip_footer_image,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        self
    }

    pub fn viewer_delay(&self) -> Duration {
        Duration::from_secs(self.viewer_delay_secs)
    }

    /// Whether the "create & print" choice can be offered.
    pub fn print_available(&self) -> bool {
        self.print_viewers.is_some()
    }

    /// Viewer template for a document kind under the operator's choice.
    ///
    /// Falls back to the plain viewer when printing was chosen but no print
    /// templates are configured.
    pub fn viewer_template(&self, kind: DocumentKind, choice: RunChoice) -> &str {
        match (choice, &self.print_viewers) {
            (RunChoice::CreateAndPrint, Some(print)) => print.for_kind(kind),
            _ => self.viewers.for_kind(kind),
        }
    }

    /// Whether a watched file name is eligible for processing.
    pub fn accepts_file_name(&self, file_name: &str) -> bool {
        file_name.starts_with(&self.watch_prefix) && file_name.ends_with(WATCH_EXTENSION)
    }

    /// A fresh raw configuration with the defaults written on first launch.
    pub fn default_map(home: &Path) -> RawConfig {
        let folder = home.display().to_string();
        let (view, print) = default_viewer_commands();
        let mut raw = RawConfig::new();
        raw.insert(keys::WATCH_FOLDER.into(), folder.clone());
        raw.insert(keys::STORE_FOLDER.into(), folder);
        raw.insert(keys::CREATE_PROOF_OF_POSTAGE.into(), "yes".into());
        raw.insert(keys::CREATE_LABELS.into(), "yes".into());
        raw.insert(keys::CREATE_PACKING_SLIPS.into(), "yes".into());
        raw.insert(keys::CREATE_QRS.into(), "yes".into());
        raw.insert(keys::PACKING_SLIP_HEADER_IMAGE.into(), "Packing Slip Header.png".into());
        raw.insert(keys::PACKING_SLIP_FOOTER_IMAGE.into(), "Packing Slip Footer.png".into());
        raw.insert(keys::VIEWER_DELAY.into(), "2".into());
        raw.insert(keys::BEFORE_RUN.into(), String::new());
        raw.insert(keys::PROOF_OF_POSTAGE_TEMPLATE.into(), DEFAULT_TEMPLATE.into());
        for kind in [
            DocumentKind::ProofOfPostage,
            DocumentKind::PackingSlip,
            DocumentKind::Labels,
        ] {
            raw.insert(viewer_key(keys::VIEWER_EXECUTE, kind), view.to_string());
            raw.insert(viewer_key(keys::VIEWER_EXECUTE_PRINT, kind), print.to_string());
        }
        raw
    }
}

/// `ViewerExecute` + `ProofOfPostage` and friends.
pub fn viewer_key(prefix: &str, kind: DocumentKind) -> String {
    format!("{prefix}{}", kind.viewer_key_suffix())
}

fn is_yes(value: &str) -> bool {
    value == "yes"
}

fn default_viewer_commands() -> (&'static str, &'static str) {
    if cfg!(windows) {
        (
            r#"start "" %filename%"#,
            r#""C:\Program Files\Adobe\Acrobat DC\Acrobat\Acrobat.exe" /t %filename%"#,
        )
    } else if cfg!(target_os = "macos") {
        ("open %filename%", "lp %filename%")
    } else {
        ("xdg-open %filename%", "lp %filename%")
    }
}
