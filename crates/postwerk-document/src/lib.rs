// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// postwerk-document — Document processing for the Postwerk pipeline.
//
// Reads carrier label PDFs, extracts shipping records from their text, fills
// proof-of-postage templates in batches of thirty, overlays tracking QR codes
// onto the matching batch, and splits the source into packing-slip and label
// documents.

pub mod batch;
pub mod classify;
pub mod extract;
pub mod image;
pub mod overlay;
pub mod pdf;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

// Re-export the primary types so callers can use `postwerk_document::SourceDocument` etc.
pub use batch::{BatchAssembler, ProofOfPostageTemplate};
pub use classify::{PageDecorations, find_packing_slips};
pub use extract::{Extraction, extract_records};
pub use image::processor::ImageProcessor;
pub use overlay::{OverlayEngine, OverlayReport};
pub use pdf::reader::SourceDocument;
pub use pdf::writer::TemplateWriter;
