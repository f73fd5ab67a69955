// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Temporary watch/store folders and a pipeline wired to them.

use std::sync::Arc;
use std::time::Duration;

use postwerk_core::config::ViewerTemplates;
use postwerk_core::{FilenameGenerator, SequenceNumbers, Settings};
use postwerk_document::ProofOfPostageTemplate;
use postwerk_document::fixtures::template_bytes;
use tokio::runtime::Handle;

use crate::pipeline::Pipeline;

pub(crate) struct Workspace {
    _dir: tempfile::TempDir,
    pub settings: Settings,
}

impl Workspace {
    /// Default settings pointed at fresh folders, with viewers switched off.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let watch = dir.path().join("downloads");
        std::fs::create_dir_all(&watch).expect("watch folder");
        let mut settings =
            Settings::from_map(&Settings::default_map(dir.path())).expect("defaults validate");
        settings.watch_folder = watch;
        settings.store_folder = dir.path().join("store");
        settings.packing_slip_header_image = dir.path().join("header.png");
        settings.packing_slip_footer_image = dir.path().join("footer.png");
        settings.viewers = ViewerTemplates {
            proof_of_postage: String::new(),
            packing_slip: String::new(),
            labels: String::new(),
        };
        settings.print_viewers = None;
        Self { _dir: dir, settings }
    }

    pub fn drop_file(&self, name: &str, bytes: &[u8]) {
        std::fs::write(self.settings.watch_folder.join(name), bytes).expect("write source");
    }

    /// Must be called inside a tokio runtime.
    pub fn pipeline(&self) -> Pipeline {
        let template = ProofOfPostageTemplate::from_bytes(template_bytes()).expect("template");
        let names = FilenameGenerator::new(Arc::new(SequenceNumbers::new()));
        let viewers = crate::viewer::ViewerLauncher::new(Handle::current(), Duration::from_secs(3600));
        Pipeline::new(Arc::new(self.settings.clone()), template, names, viewers)
    }

    pub fn stored_names(&self) -> Vec<String> {
        std::fs::read_dir(&self.settings.store_folder)
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn stored_files(&self) -> usize {
        self.stored_names().len()
    }
}
