// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Overlay engine — appends a page of QR codes to a proof-of-postage sheet.
//
// QR codes are recognised only by pixel width. Every candidate in the source
// document advances one running occurrence counter; a batch draws exactly the
// occurrences in its own index range, so the counter must never be reset per
// page or skipped for candidates outside the batch.

use std::path::Path;

use lopdf::{Document, ObjectId};
use postwerk_core::error::Result;
use postwerk_core::{Batch, ShippingRecord};
use tracing::{debug, info, instrument, warn};

use crate::image::ImageProcessor;
use crate::pdf::canvas::Canvas;
use crate::pdf::pages::{append_page, import_object};
use crate::pdf::reader::{EmbeddedImage, SourceDocument};
use crate::pdf::{A4_HEIGHT_PT, A4_WIDTH_PT, load_document, save_document};

/// Pixel width of the small QR rendering.
pub const COMPACT_QR_WIDTH: u32 = 128;
/// Pixel width of the full label artwork that contains a QR code.
pub const LARGE_QR_WIDTH: u32 = 1050;

/// Region of the large artwork holding the QR code: x, y, width, height.
const LARGE_QR_CROP: (u32, u32, u32, u32) = (70, 450, 280, 280);
const LARGE_QR_DOWNSCALE: u32 = 5;
const COMPACT_DRAW_SIZE: f32 = 60.0;

const FIRST_CELL: (f32, f32) = (40.0, 750.0);
const CELL_PITCH_X: f32 = 110.0;
const CELL_PITCH_Y: f32 = 135.0;
const RIGHT_MARGIN: f32 = 500.0;
const TEXT_SIZE: f32 = 9.0;

/// Characters of carrier/service name in front of the tracking code.
const CARRIER_PREFIX_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QrVariant {
    Compact,
    Large,
}

impl QrVariant {
    pub fn from_width(width: u32) -> Option<Self> {
        match width {
            COMPACT_QR_WIDTH => Some(Self::Compact),
            LARGE_QR_WIDTH => Some(Self::Large),
            _ => None,
        }
    }
}

/// An embedded image that looks like a tracking QR code.
#[derive(Debug, Clone)]
pub struct QrCandidate {
    /// Position in the source-wide sequence of candidates.
    pub occurrence: usize,
    pub variant: QrVariant,
    pub image: EmbeddedImage,
}

/// Every QR candidate of `source`, numbered in page order.
pub fn find_qr_candidates(source: &SourceDocument) -> Result<Vec<QrCandidate>> {
    let mut candidates = Vec::new();
    for image in source.images()? {
        if let Some(variant) = QrVariant::from_width(image.width) {
            candidates.push(QrCandidate {
                occurrence: candidates.len(),
                variant,
                image,
            });
        }
    }
    debug!(candidates = candidates.len(), "QR candidates found");
    Ok(candidates)
}

/// Where one QR code goes on the overlay page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub occurrence: usize,
    /// Index into the batch's records.
    pub record_index: usize,
    /// Lower-left corner of the image.
    pub x: f32,
    pub y: f32,
}

/// Grid cells for the candidates that belong to `batch`, in drawing order.
pub fn plan_cells(candidates: &[QrCandidate], batch: &Batch) -> Vec<Cell> {
    let range = batch.index_range();
    let (mut x, mut y) = FIRST_CELL;
    let mut cells = Vec::new();

    for candidate in candidates {
        if !range.contains(&candidate.occurrence) {
            continue;
        }
        let record_index = candidate.occurrence - batch.start_index;
        if record_index >= batch.records.len() {
            warn!(
                occurrence = candidate.occurrence,
                records = batch.records.len(),
                "More QR codes than records in batch, skipping"
            );
            continue;
        }
        cells.push(Cell {
            occurrence: candidate.occurrence,
            record_index,
            x,
            y,
        });
        x += CELL_PITCH_X;
        if x > RIGHT_MARGIN {
            x = FIRST_CELL.0;
            y -= CELL_PITCH_Y;
        }
    }
    cells
}

/// Tracking number without its carrier/service prefix.
pub fn strip_carrier_prefix(tracking_number: &str) -> String {
    tracking_number
        .trim()
        .chars()
        .skip(CARRIER_PREFIX_LEN)
        .collect::<String>()
        .trim()
        .to_string()
}

/// What an overlay run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlayReport {
    /// QR candidates in the whole source document.
    pub candidates: usize,
    /// Cells drawn for this batch.
    pub drawn: usize,
}

/// Draws QR overlay pages for batches of one source document.
pub struct OverlayEngine<'a> {
    source: &'a SourceDocument,
    candidates: Vec<QrCandidate>,
}

impl<'a> OverlayEngine<'a> {
    /// Scan `source` for QR candidates once; the scan is shared by every batch.
    pub fn new(source: &'a SourceDocument) -> Result<Self> {
        let candidates = find_qr_candidates(source)?;
        Ok(Self { source, candidates })
    }

    pub fn candidates(&self) -> &[QrCandidate] {
        &self.candidates
    }

    /// Append the QR page for `batch` to `target`.
    pub fn apply(&self, batch: &Batch, target: &mut Document) -> Result<OverlayReport> {
        let cells = plan_cells(&self.candidates, batch);
        let mut canvas = Canvas::new();

        for cell in &cells {
            let candidate = &self.candidates[cell.occurrence];
            let record = &batch.records[cell.record_index];
            self.draw_cell(&mut canvas, target, candidate, record, cell)?;
        }

        let (content, resources) = canvas.finish(target)?;
        append_page(target, A4_WIDTH_PT, A4_HEIGHT_PT, content, resources)?;

        let report = OverlayReport {
            candidates: self.candidates.len(),
            drawn: cells.len(),
        };
        info!(
            file = %batch.output_filename,
            drawn = report.drawn,
            candidates = report.candidates,
            "Added QR codes"
        );
        Ok(report)
    }

    /// Load the batch document from `path`, append its QR page and save it
    /// back under the same name.
    #[instrument(skip(self, batch), fields(path = %path.display(), start = batch.start_index))]
    pub fn apply_to_file(&self, batch: &Batch, path: &Path) -> Result<OverlayReport> {
        let mut target = load_document(path)?;
        let report = self.apply(batch, &mut target)?;
        save_document(&mut target, path)?;
        Ok(report)
    }

    fn draw_cell(
        &self,
        canvas: &mut Canvas,
        target: &mut Document,
        candidate: &QrCandidate,
        record: &ShippingRecord,
        cell: &Cell,
    ) -> Result<()> {
        canvas.text(
            cell.x - 5.0,
            cell.y - 15.0,
            TEXT_SIZE,
            &strip_carrier_prefix(&record.tracking_number),
        );
        canvas.text(cell.x, cell.y - 30.0, TEXT_SIZE, &record.name);

        let (image, size) = match candidate.variant {
            QrVariant::Compact => (self.import(target, candidate)?, COMPACT_DRAW_SIZE),
            QrVariant::Large => self.large_thumbnail(target, candidate)?,
        };
        canvas.image(image, cell.x, cell.y, size, size);
        debug!(
            occurrence = cell.occurrence,
            record = cell.record_index,
            x = cell.x,
            y = cell.y,
            "Drew QR cell"
        );
        Ok(())
    }

    fn import(&self, target: &mut Document, candidate: &QrCandidate) -> Result<ObjectId> {
        import_object(self.source.document(), target, candidate.image.object_id)
    }

    /// Cropped, downscaled QR code of a large artwork image. Falls back to
    /// the whole artwork when the image cannot be decoded.
    fn large_thumbnail(
        &self,
        target: &mut Document,
        candidate: &QrCandidate,
    ) -> Result<(ObjectId, f32)> {
        let (x, y, width, height) = LARGE_QR_CROP;
        let size = (width / LARGE_QR_DOWNSCALE) as f32;
        let decoded = self
            .source
            .stream(candidate.image.object_id)
            .and_then(|stream| ImageProcessor::from_pdf_stream(self.source.document(), stream));

        match decoded {
            Ok(image) => {
                let thumbnail = image.crop(x, y, width, height).downscale(LARGE_QR_DOWNSCALE);
                Ok((thumbnail.add_to_document(target)?, size))
            }
            Err(err) => {
                warn!(
                    occurrence = candidate.occurrence,
                    %err,
                    "Cannot decode large QR image, drawing it whole"
                );
                Ok((self.import(target, candidate)?, size))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use lopdf::Object;

    use super::*;
    use crate::fixtures::{FixturePage, LARGE_QR_HEIGHT, document_bytes, label_lines, source_bytes};

    fn batch(start_index: usize, count: usize) -> Batch {
        Batch {
            output_filename: "proof.pdf".into(),
            records: (0..count)
                .map(|n| {
                    let i = start_index + n;
                    ShippingRecord::new(format!("Customer {i}"), "addr", format!("Tracked 48 TT{i:04}"))
                })
                .collect(),
            source_document: "order.pdf".into(),
            start_index,
        }
    }

    fn candidates(count: usize) -> Vec<QrCandidate> {
        (0..count)
            .map(|occurrence| QrCandidate {
                occurrence,
                variant: QrVariant::Compact,
                image: EmbeddedImage {
                    page_index: occurrence,
                    name: "Im0".into(),
                    object_id: (occurrence as u32 + 1, 0),
                    width: COMPACT_QR_WIDTH,
                    height: COMPACT_QR_WIDTH,
                },
            })
            .collect()
    }

    #[test]
    fn only_known_widths_are_candidates() {
        assert_eq!(QrVariant::from_width(128), Some(QrVariant::Compact));
        assert_eq!(QrVariant::from_width(1050), Some(QrVariant::Large));
        assert_eq!(QrVariant::from_width(127), None);
        assert_eq!(QrVariant::from_width(300), None);
    }

    #[test]
    fn second_batch_draws_only_its_occurrences() {
        let cells = plan_cells(&candidates(47), &batch(30, 17));
        let occurrences: Vec<usize> = cells.iter().map(|c| c.occurrence).collect();
        assert_eq!(occurrences, (30..47).collect::<Vec<_>>());
        for cell in &cells {
            assert_eq!(cell.record_index, cell.occurrence - 30);
        }
    }

    #[test]
    fn first_batch_stops_at_thirty() {
        let cells = plan_cells(&candidates(47), &batch(0, 30));
        assert_eq!(cells.len(), 30);
        assert_eq!(cells.last().map(|c| c.occurrence), Some(29));
    }

    #[test]
    fn surplus_candidates_in_range_are_skipped() {
        let cells = plan_cells(&candidates(10), &batch(0, 4));
        assert_eq!(cells.len(), 4);
    }

    #[test]
    fn grid_wraps_after_right_margin() {
        let cells = plan_cells(&candidates(7), &batch(0, 7));
        let positions: Vec<(f32, f32)> = cells.iter().map(|c| (c.x, c.y)).collect();
        assert_eq!(
            positions,
            vec![
                (40.0, 750.0),
                (150.0, 750.0),
                (260.0, 750.0),
                (370.0, 750.0),
                (480.0, 750.0),
                (40.0, 615.0),
                (150.0, 615.0),
            ]
        );
    }

    #[test]
    fn carrier_prefix_is_removed() {
        assert_eq!(strip_carrier_prefix("Tracked 48 TT000056789GB"), "TT000056789GB");
        assert_eq!(strip_carrier_prefix("short"), "");
    }

    #[test]
    fn occurrences_run_across_pages() {
        let bytes = document_bytes(&[
            FixturePage::text(vec!["a".into()]).with_image(128, 128).with_image(64, 64),
            FixturePage::text(vec!["b".into()]),
            FixturePage::text(vec!["c".into()])
                .with_image(1050, LARGE_QR_HEIGHT)
                .with_image(128, 128),
        ]);
        let source = SourceDocument::from_bytes(&bytes).expect("source");
        let found = find_qr_candidates(&source).expect("candidates");
        let summary: Vec<(usize, usize, QrVariant)> = found
            .iter()
            .map(|c| (c.occurrence, c.image.page_index, c.variant))
            .collect();
        assert_eq!(
            summary,
            vec![
                (0, 0, QrVariant::Compact),
                (1, 2, QrVariant::Large),
                (2, 2, QrVariant::Compact),
            ]
        );
    }

    #[test]
    fn apply_appends_one_page_with_names_and_codes() {
        let source = SourceDocument::from_bytes(&source_bytes(3, 1)).expect("source");
        let engine = OverlayEngine::new(&source).expect("engine");
        let mut target = crate::fixtures::build_document(&[FixturePage::text(vec!["sheet".into()])]);

        let report = engine.apply(&batch(0, 3), &mut target).expect("apply");
        assert_eq!(report, OverlayReport { candidates: 3, drawn: 3 });

        let result = SourceDocument::from_document(target);
        assert_eq!(result.page_count(), 2);
        let text = result.page_text(1).expect("text");
        assert!(text.contains("Customer 2"), "{text}");
        assert!(text.contains("TT0002"), "{text}");
        assert_eq!(result.page_images(1).expect("images").len(), 3);
    }

    #[test]
    fn large_variant_is_cropped_and_downscaled() {
        let mut lines = label_lines(0);
        lines.push("large".into());
        let bytes = document_bytes(&[FixturePage::text(lines).with_image(1050, LARGE_QR_HEIGHT)]);
        let source = SourceDocument::from_bytes(&bytes).expect("source");
        let engine = OverlayEngine::new(&source).expect("engine");
        let mut target = crate::fixtures::build_document(&[FixturePage::text(vec![])]);

        engine.apply(&batch(0, 1), &mut target).expect("apply");
        let result = SourceDocument::from_document(target);
        let images = result.page_images(1).expect("images");
        assert_eq!(images.len(), 1);
        assert_eq!((images[0].width, images[0].height), (56, 56));
        let stream = result.stream(images[0].object_id).expect("stream");
        assert_eq!(
            stream.dict.get(b"ColorSpace").and_then(Object::as_name).expect("cs"),
            b"DeviceRGB"
        );
    }

    #[test]
    fn apply_to_file_saves_in_place() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("proof.pdf");
        std::fs::write(&path, document_bytes(&[FixturePage::text(vec!["sheet".into()])])).expect("write");

        let source = SourceDocument::from_bytes(&source_bytes(2, 0)).expect("source");
        OverlayEngine::new(&source)
            .expect("engine")
            .apply_to_file(&batch(0, 2), &path)
            .expect("apply");

        let saved = SourceDocument::open(&path).expect("reopen");
        assert_eq!(saved.page_count(), 2);
    }
}
