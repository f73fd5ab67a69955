// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Postwerk shipping-paperwork pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of shipping records on one proof-of-postage sheet.
pub const BATCH_SIZE: usize = 30;

/// Unique identifier for one pipeline run (one watched file).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One shipment found in the carrier's label document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingRecord {
    pub name: String,
    pub address: String,
    pub tracking_number: String,
}

impl ShippingRecord {
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        tracking_number: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            tracking_number: tracking_number.into(),
        }
    }
}

/// One proof-of-postage output and the slice of records it lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Generated filename of the proof-of-postage document (inside the store folder).
    pub output_filename: String,
    /// Records on this sheet, at most [`BATCH_SIZE`].
    pub records: Vec<ShippingRecord>,
    /// Filename of the watched source document the records came from.
    pub source_document: String,
    /// Offset of `records[0]` within the full record sequence of the source.
    /// Always a multiple of [`BATCH_SIZE`].
    pub start_index: usize,
}

impl Batch {
    /// Half-open range of record (and QR occurrence) indices this batch owns.
    pub fn index_range(&self) -> std::ops::Range<usize> {
        self.start_index..self.start_index + BATCH_SIZE
    }

    /// Whether this is the first batch of its source document.
    pub fn is_first(&self) -> bool {
        self.start_index == 0
    }
}

/// Kinds of generated document, used in filenames and viewer selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    ProofOfPostage,
    PackingSlip,
    Labels,
}

impl DocumentKind {
    /// Tag used inside generated filenames.
    pub fn filename_tag(&self) -> &'static str {
        match self {
            Self::ProofOfPostage => "proof",
            Self::PackingSlip => "packing",
            Self::Labels => "labels",
        }
    }

    /// Suffix of the `ViewerExecute{..}` / `ViewerExecutePrint{..}` config keys.
    pub fn viewer_key_suffix(&self) -> &'static str {
        match self {
            Self::ProofOfPostage => "ProofOfPostage",
            Self::PackingSlip => "PackingSlip",
            Self::Labels => "Labels",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::ProofOfPostage => "proof of postage",
            Self::PackingSlip => "packing slips",
            Self::Labels => "labels",
        };
        f.write_str(label)
    }
}

/// What the operator asked for when a matching file was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunChoice {
    /// Leave the file alone.
    Ignore,
    /// Generate the documents and open them in the viewer.
    Create,
    /// Generate the documents and send them to the print command.
    CreateAndPrint,
}

/// A document written to the store folder during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedDocument {
    pub kind: DocumentKind,
    pub path: PathBuf,
}
