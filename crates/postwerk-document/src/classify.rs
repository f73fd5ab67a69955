// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page classifier / splitter — tells label pages from packing slips by their
// text and derives a packing-slip document and a labels document from the
// source bytes already read for the run.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use lopdf::Document;
use postwerk_core::error::Result;
use regex::Regex;
use tracing::{debug, info, instrument, warn};

use crate::image::ImageProcessor;
use crate::pdf::canvas::Canvas;
use crate::pdf::pages::{append_to_page, page_size, remove_pages_descending};
use crate::pdf::reader::SourceDocument;
use crate::pdf::page_id;

/// "Shipping Address" on the first line, or on the second after any one line.
static LABEL_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

/// Whether a page's text marks it as a carrier label.
pub fn is_label_page(page_text: &str) -> bool {
    LABEL_PATTERN
        .get_or_init(|| Regex::new(r"(?i)^(.*\r?\n)?Shipping Address").ok())
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(page_text.trim()))
}

/// Indices of the pages whose label classification equals `select_labels`.
pub fn select_pages(page_texts: &[String], select_labels: bool) -> Vec<usize> {
    page_texts
        .iter()
        .enumerate()
        .filter(|(_, text)| is_label_page(text) == select_labels)
        .map(|(index, _)| index)
        .collect()
}

/// `select_labels == true`: label pages. `false`: every other page.
///
/// The two calls partition the document's pages.
pub fn find_packing_slips(select_labels: bool, source: &SourceDocument) -> Vec<usize> {
    let pages = select_pages(&source.page_texts(), select_labels);
    debug!(select_labels, pages = ?pages, "Classified pages");
    pages
}

/// Artwork drawn on every packing slip page, each only if its file exists.
#[derive(Debug, Clone, Default)]
pub struct PageDecorations {
    pub header: Option<PathBuf>,
    pub footer: Option<PathBuf>,
}

impl PageDecorations {
    pub fn new(header: impl Into<PathBuf>, footer: impl Into<PathBuf>) -> Self {
        Self {
            header: Some(header.into()),
            footer: Some(footer.into()),
        }
    }
}

/// Write the non-label pages of `source` to `destination`, decorated with
/// the configured header and footer.
#[instrument(skip(source, decorations), fields(source_len = source.len(), destination = %destination.display()))]
pub fn create_packing_slips(
    source: &[u8],
    destination: &Path,
    decorations: &PageDecorations,
) -> Result<usize> {
    let mut document = SourceDocument::from_bytes(source)?;
    let labels = find_packing_slips(true, &document);
    document.remove_pages(&labels)?;

    let remaining = document.page_count();
    if remaining > 0 {
        decorate(document.document_mut(), decorations)?;
    } else {
        warn!("Source has no packing slip pages");
    }
    document.save(destination)?;
    info!(pages = remaining, "Created packing slips");
    Ok(remaining)
}

/// Write the label pages of `source` to `destination`.
#[instrument(skip(source), fields(source_len = source.len(), destination = %destination.display()))]
pub fn create_labels(source: &[u8], destination: &Path) -> Result<usize> {
    let mut document = SourceDocument::from_bytes(source)?;
    let others = find_packing_slips(false, &document);
    document.remove_pages(&others)?;

    let remaining = document.page_count();
    document.save(destination)?;
    info!(pages = remaining, "Created labels");
    Ok(remaining)
}

/// Drop page 0 of the document at `path`, saving in place.
#[instrument(fields(path = %path.display()))]
pub fn remove_first_page(path: &Path) -> Result<()> {
    let mut document = SourceDocument::open(path)?;
    remove_pages_descending(document.document_mut(), &[0])?;
    document.save(path)?;
    Ok(())
}

/// Header anchored to the top and footer to the bottom of every page, each
/// scaled to the width of the first page.
fn decorate(doc: &mut Document, decorations: &PageDecorations) -> Result<()> {
    let header = load_artwork(decorations.header.as_deref())?;
    let footer = load_artwork(decorations.footer.as_deref())?;
    if header.is_none() && footer.is_none() {
        return Ok(());
    }

    let (page_width, page_height) = page_size(doc, page_id(doc, 0)?)?;
    let header = header.map(|image| embed(doc, image, page_width)).transpose()?;
    let footer = footer.map(|image| embed(doc, image, page_width)).transpose()?;

    let page_ids: Vec<_> = doc.get_pages().into_values().collect();
    for page in page_ids {
        let mut canvas = Canvas::new();
        if let Some((id, height)) = header {
            canvas.image(id, 0.0, page_height - height, page_width, height);
        }
        if let Some((id, height)) = footer {
            canvas.image(id, 0.0, 0.0, page_width, height);
        }
        let (content, resources) = canvas.finish(doc)?;
        append_to_page(doc, page, content, &resources)?;
    }
    debug!(
        header = header.is_some(),
        footer = footer.is_some(),
        "Decorated packing slips"
    );
    Ok(())
}

fn load_artwork(path: Option<&Path>) -> Result<Option<ImageProcessor>> {
    match path {
        Some(path) if path.is_file() => ImageProcessor::open(path).map(Some),
        Some(path) => {
            debug!(path = %path.display(), "Decoration image not found, skipping");
            Ok(None)
        }
        None => Ok(None),
    }
}

/// Add the image once and return its id with the height that keeps its
/// aspect ratio at `width`.
fn embed(doc: &mut Document, image: ImageProcessor, width: f32) -> Result<(lopdf::ObjectId, f32)> {
    let height = image.height() as f32 * width / image.width().max(1) as f32;
    Ok((image.add_to_document(doc)?, height))
}
