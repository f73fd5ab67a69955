// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-file pipeline — runs extraction, batch assembly, QR overlay and page
// splitting for one watched file, strictly one stage after another, and
// hands every generated document to the viewer launcher.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use postwerk_core::error::{PostwerkError, Result};
use postwerk_core::integrity::{hash_bytes, short_hash};
use postwerk_core::{
    Batch, DocumentKind, FilenameGenerator, GeneratedDocument, RunChoice, RunId, SequenceNumbers,
    Settings,
};
use postwerk_document::classify::{create_labels, create_packing_slips, remove_first_page};
use postwerk_document::{
    BatchAssembler, Extraction, OverlayEngine, PageDecorations, ProofOfPostageTemplate,
    SourceDocument, extract_records,
};
use tokio::runtime::Handle;
use tracing::{debug, info, info_span};

use crate::viewer::ViewerLauncher;

/// What processing one file produced.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Processed(RunReport),
    /// No shipping records; nothing was written.
    Unrecognized,
}

/// Summary of one processed file.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: RunId,
    pub source: PathBuf,
    /// SHA-256 of the source bytes as read.
    pub source_sha256: String,
    pub started_at: DateTime<Local>,
    pub batches: Vec<Batch>,
    /// Documents left in the store folder, in creation order.
    pub outputs: Vec<GeneratedDocument>,
    /// Outputs for which a viewer launch was scheduled.
    pub opened: Vec<GeneratedDocument>,
}

impl RunReport {
    pub fn outputs_of(&self, kind: DocumentKind) -> impl Iterator<Item = &Path> {
        self.outputs
            .iter()
            .filter(move |output| output.kind == kind)
            .map(|output| output.path.as_path())
    }
}

pub struct Pipeline {
    settings: Arc<Settings>,
    template: ProofOfPostageTemplate,
    names: FilenameGenerator,
    viewers: ViewerLauncher,
}

impl Pipeline {
    pub fn new(
        settings: Arc<Settings>,
        template: ProofOfPostageTemplate,
        names: FilenameGenerator,
        viewers: ViewerLauncher,
    ) -> Self {
        Self {
            settings,
            template,
            names,
            viewers,
        }
    }

    /// Load the configured template and wire up a fresh sequence counter.
    pub fn from_settings(settings: Arc<Settings>, runtime: Handle) -> Result<Self> {
        let template = ProofOfPostageTemplate::open(&settings.template_path)?;
        let names = FilenameGenerator::new(Arc::new(SequenceNumbers::new()));
        let viewers = ViewerLauncher::new(runtime, settings.viewer_delay());
        Ok(Self::new(settings, template, names, viewers))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Process `file_name` from the watched folder.
    ///
    /// A failure part-way leaves already written outputs on disk.
    pub fn process(&self, file_name: &str, choice: RunChoice) -> Result<RunOutcome> {
        let run_id = RunId::new();
        let span = info_span!("run", %run_id, file = file_name);
        let _entered = span.enter();
        self.run(run_id, file_name, choice)
    }

    fn run(&self, run_id: RunId, file_name: &str, choice: RunChoice) -> Result<RunOutcome> {
        let started_at = Local::now();
        let source_path = self.settings.watch_folder.join(file_name);
        let bytes = std::fs::read(&source_path)
            .map_err(|err| PostwerkError::file("read source document", &source_path, err))?;
        let source_sha256 = hash_bytes(&bytes);
        info!(
            sha256 = short_hash(&source_sha256),
            bytes = bytes.len(),
            ?choice,
            "Processing source document"
        );

        let source = SourceDocument::from_bytes(&bytes)?;
        let records = match extract_records(&source.full_text()) {
            Extraction::Records(records) => records,
            Extraction::Unrecognized => {
                info!("Not a label document, skipping");
                return Ok(RunOutcome::Unrecognized);
            }
        };

        let store = &self.settings.store_folder;
        std::fs::create_dir_all(store)
            .map_err(|err| PostwerkError::file("create store folder", store, err))?;

        let batches =
            BatchAssembler::new(&self.template, &self.names, store).assemble(file_name, &records)?;
        let overlay = if self.settings.create_qrs {
            Some(OverlayEngine::new(&source)?)
        } else {
            None
        };

        let mut report = RunReport {
            run_id,
            source: source_path.clone(),
            source_sha256,
            started_at,
            batches: batches.clone(),
            outputs: Vec::new(),
            opened: Vec::new(),
        };

        for batch in &batches {
            self.finish_proof(batch, overlay.as_ref(), choice, &mut report)?;
            if batch.is_first() {
                self.split_source(&bytes, file_name, choice, &mut report)?;
            }
        }

        info!(
            records = records.len(),
            batches = report.batches.len(),
            outputs = report.outputs.len(),
            "Run complete"
        );
        Ok(RunOutcome::Processed(report))
    }

    /// QR page first, then first-page removal or deletion, then the viewer.
    fn finish_proof(
        &self,
        batch: &Batch,
        overlay: Option<&OverlayEngine<'_>>,
        choice: RunChoice,
        report: &mut RunReport,
    ) -> Result<()> {
        let path = self.settings.store_folder.join(&batch.output_filename);
        if let Some(engine) = overlay {
            engine.apply_to_file(batch, &path)?;
        }

        if !self.settings.create_proof_of_postage {
            if overlay.is_some() {
                remove_first_page(&path)?;
                debug!(file = %batch.output_filename, "Kept only the QR page");
            } else {
                std::fs::remove_file(&path)
                    .map_err(|err| PostwerkError::file("delete unwanted proof of postage", &path, err))?;
                debug!(file = %batch.output_filename, "Proof of postage not wanted, deleted");
                return Ok(());
            }
        }

        self.publish(DocumentKind::ProofOfPostage, path, choice, report);
        Ok(())
    }

    /// Packing slips then labels, each parsed afresh from the source bytes
    /// read at the start of the run.
    fn split_source(
        &self,
        source: &[u8],
        file_name: &str,
        choice: RunChoice,
        report: &mut RunReport,
    ) -> Result<()> {
        if self.settings.create_packing_slips {
            let path = self.output_path(file_name, DocumentKind::PackingSlip);
            let decorations = PageDecorations::new(
                &self.settings.packing_slip_header_image,
                &self.settings.packing_slip_footer_image,
            );
            create_packing_slips(source, &path, &decorations)?;
            self.publish(DocumentKind::PackingSlip, path, choice, report);
        }
        if self.settings.create_labels {
            let path = self.output_path(file_name, DocumentKind::Labels);
            create_labels(source, &path)?;
            self.publish(DocumentKind::Labels, path, choice, report);
        }
        Ok(())
    }

    fn output_path(&self, file_name: &str, kind: DocumentKind) -> PathBuf {
        self.settings
            .store_folder
            .join(self.names.generate(file_name, kind))
    }

    fn publish(&self, kind: DocumentKind, path: PathBuf, choice: RunChoice, report: &mut RunReport) {
        let path = std::path::absolute(&path).unwrap_or(path);
        let document = GeneratedDocument { kind, path };
        let template = self.settings.viewer_template(kind, choice);
        if self.viewers.launch(kind, template, &document.path).is_some() {
            report.opened.push(document.clone());
        }
        report.outputs.push(document);
    }
}

#[cfg(test)]
mod tests {
    use postwerk_core::config::ViewerTemplates;
    use postwerk_document::fixtures::{FixtureLayout, FixturePage, document_bytes, source_bytes};

    use super::*;
    use crate::testing::Workspace;

    fn processed(outcome: RunOutcome) -> RunReport {
        match outcome {
            RunOutcome::Processed(report) => report,
            RunOutcome::Unrecognized => panic!("expected a processed run"),
        }
    }

    fn open(path: &Path) -> SourceDocument {
        SourceDocument::open(path).expect("open output")
    }

    #[tokio::test]
    async fn forty_seven_labels_make_two_batches() {
        let workspace = Workspace::new();
        workspace.drop_file("order-47.pdf", &source_bytes(47, 2));

        let report = processed(
            workspace
                .pipeline()
                .process("order-47.pdf", RunChoice::Create)
                .expect("process"),
        );

        let sizes: Vec<usize> = report.batches.iter().map(|b| b.records.len()).collect();
        assert_eq!(sizes, vec![30, 17]);
        assert_eq!(report.source_sha256.len(), 64);

        let proofs: Vec<&Path> = report.outputs_of(DocumentKind::ProofOfPostage).collect();
        assert_eq!(proofs.len(), 2);
        let second = open(proofs[1]);
        assert_eq!(second.page_count(), 2, "form page plus QR page");
        let qr_text = second.page_text(1).expect("QR page text");
        assert!(qr_text.contains("TT003056789GB"));
        assert!(qr_text.contains("TT004656789GB"));
        assert!(!qr_text.contains("TT002956789GB"));

        let packing: Vec<&Path> = report.outputs_of(DocumentKind::PackingSlip).collect();
        assert_eq!(packing.len(), 1);
        assert_eq!(open(packing[0]).page_count(), 2);
        let labels: Vec<&Path> = report.outputs_of(DocumentKind::Labels).collect();
        assert_eq!(labels.len(), 1);
        assert_eq!(open(labels[0]).page_count(), 47);

        // Empty viewer templates open nothing.
        assert!(report.opened.is_empty());
        assert_eq!(workspace.stored_files(), 4);
    }

    #[tokio::test]
    async fn labels_written_as_one_text_object_are_processed() {
        let workspace = Workspace::new();
        let mut pages: Vec<FixturePage> = (0..3)
            .map(|n| FixturePage::label(n).with_layout(FixtureLayout::SingleObject))
            .collect();
        pages.push(FixturePage::packing(3).with_layout(FixtureLayout::SingleObject));
        workspace.drop_file("order-6.pdf", &document_bytes(&pages));

        let report = processed(
            workspace
                .pipeline()
                .process("order-6.pdf", RunChoice::Create)
                .expect("process"),
        );
        let records = &report.batches[0].records;
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].name, "Customer 1");
        assert_eq!(records[1].address, "1 High Street Sometown AB1 1CD");
        assert_eq!(records[1].tracking_number, "Tracked 48 TT000156789GB");

        let labels: Vec<&Path> = report.outputs_of(DocumentKind::Labels).collect();
        assert_eq!(open(labels[0]).page_count(), 3);
        let packing: Vec<&Path> = report.outputs_of(DocumentKind::PackingSlip).collect();
        assert_eq!(open(packing[0]).page_count(), 1);
    }

    #[tokio::test]
    async fn packing_slip_only_document_is_unrecognized() {
        let workspace = Workspace::new();
        let pages: Vec<FixturePage> = (0..3).map(FixturePage::packing).collect();
        workspace.drop_file("order-2.pdf", &document_bytes(&pages));

        let outcome = workspace
            .pipeline()
            .process("order-2.pdf", RunChoice::Create)
            .expect("process");
        assert!(matches!(outcome, RunOutcome::Unrecognized));
        assert_eq!(workspace.stored_files(), 0);
    }

    #[tokio::test]
    async fn unwanted_proof_keeps_only_the_qr_page() {
        let mut workspace = Workspace::new();
        workspace.settings.create_proof_of_postage = false;
        workspace.settings.create_packing_slips = false;
        workspace.settings.create_labels = false;
        workspace.drop_file("order-3.pdf", &source_bytes(3, 0));

        let report = processed(
            workspace
                .pipeline()
                .process("order-3.pdf", RunChoice::Create)
                .expect("process"),
        );
        let proofs: Vec<&Path> = report.outputs_of(DocumentKind::ProofOfPostage).collect();
        assert_eq!(proofs.len(), 1);
        let document = open(proofs[0]);
        assert_eq!(document.page_count(), 1);
        assert!(document.page_text(0).expect("text").contains("Customer 2"));
    }

    #[tokio::test]
    async fn nothing_wanted_deletes_the_proof_but_not_the_source() {
        let mut workspace = Workspace::new();
        workspace.settings.create_proof_of_postage = false;
        workspace.settings.create_qrs = false;
        workspace.settings.create_packing_slips = false;
        workspace.settings.create_labels = false;
        workspace.drop_file("order-4.pdf", &source_bytes(2, 1));

        let report = processed(
            workspace
                .pipeline()
                .process("order-4.pdf", RunChoice::Create)
                .expect("process"),
        );
        assert_eq!(report.batches.len(), 1);
        assert!(report.outputs.is_empty());
        assert_eq!(workspace.stored_files(), 0);
        assert!(workspace.settings.watch_folder.join("order-4.pdf").exists());
    }

    #[tokio::test]
    async fn print_choice_uses_the_print_commands() {
        let mut workspace = Workspace::new();
        workspace.settings.create_packing_slips = false;
        workspace.settings.create_labels = false;
        workspace.settings.print_viewers = Some(ViewerTemplates {
            proof_of_postage: "lp".into(),
            packing_slip: "lp".into(),
            labels: "lp".into(),
        });
        workspace.drop_file("order-5.pdf", &source_bytes(1, 0));
        let pipeline = workspace.pipeline();

        let viewed = processed(pipeline.process("order-5.pdf", RunChoice::Create).expect("process"));
        assert!(viewed.opened.is_empty());

        let printed = processed(
            pipeline
                .process("order-5.pdf", RunChoice::CreateAndPrint)
                .expect("process"),
        );
        assert_eq!(printed.opened.len(), 1);
        assert_ne!(viewed.outputs[0].path, printed.outputs[0].path);
    }

    #[tokio::test]
    async fn missing_source_is_a_file_error() {
        let workspace = Workspace::new();
        let result = workspace.pipeline().process("order-gone.pdf", RunChoice::Create);
        assert!(matches!(result, Err(PostwerkError::FileOperation { .. })));
    }
}
