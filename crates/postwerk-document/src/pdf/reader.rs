// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Source document reader — open a carrier label PDF, extract its text page by
// page and enumerate the images embedded on each page, using the `lopdf`
// crate.

use std::path::{Path, PathBuf};

use lopdf::{Document, Object, ObjectId, Stream};
use postwerk_core::error::Result;
use tracing::{debug, info, instrument, warn};

use super::pages::{self, page_resources};
use super::text;
use super::{number, page_id, pdf_err, resolve};

/// An image XObject referenced from a page's resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    /// 0-based index of the page whose resources name the image.
    pub page_index: usize,
    /// Resource name (e.g. `Im3`).
    pub name: String,
    pub object_id: ObjectId,
    /// Pixel dimensions from the image dictionary.
    pub width: u32,
    pub height: u32,
}

/// A PDF opened for reading (and, for derivative copies, for page removal).
///
/// Wraps `lopdf::Document`; every page index taken or returned is 0-based.
pub struct SourceDocument {
    /// The underlying lopdf document.
    document: Document,
    /// Source path, if opened from a file (useful for diagnostics).
    source_path: Option<PathBuf>,
}

impl SourceDocument {
    // -- Construction ---------------------------------------------------------

    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        info!("Opening PDF: {}", path_ref.display());

        let document = super::load_document(path_ref)?;
        debug!(pages = document.get_pages().len(), "PDF loaded");

        Ok(Self {
            document,
            source_path: Some(path_ref.to_path_buf()),
        })
    }

    /// Create a reader from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data)
            .map_err(|err| pdf_err("failed to load PDF from memory", err))?;

        debug!(pages = document.get_pages().len(), "PDF loaded from bytes");

        Ok(Self {
            document,
            source_path: None,
        })
    }

    /// Wrap an already-parsed document.
    pub fn from_document(document: Document) -> Self {
        Self {
            document,
            source_path: None,
        }
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Return the source path if the reader was created via [`SourceDocument::open`].
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    // -- Text -----------------------------------------------------------------

    /// Plain text of one page, one visual line per line; see [`text::page_text`].
    pub fn page_text(&self, index: usize) -> Result<String> {
        let page = page_id(&self.document, index)?;
        text::page_text(&self.document, page)
    }

    /// Text of every page in order.
    ///
    /// A page whose text cannot be extracted reads as empty so one damaged
    /// page does not hide the rest of the document.
    pub fn page_texts(&self) -> Vec<String> {
        (0..self.page_count())
            .map(|index| {
                self.page_text(index).unwrap_or_else(|err| {
                    warn!(page = index, %err, "Treating page as empty");
                    String::new()
                })
            })
            .collect()
    }

    /// Text of the whole document, pages joined in order.
    pub fn full_text(&self) -> String {
        let mut text = String::new();
        for page in self.page_texts() {
            text.push_str(&page);
            if !text.ends_with('\n') {
                text.push('\n');
            }
        }
        text
    }

    // -- Images ---------------------------------------------------------------

    /// Image XObjects named in a page's resources, in resource dictionary order.
    pub fn page_images(&self, index: usize) -> Result<Vec<EmbeddedImage>> {
        let page = page_id(&self.document, index)?;
        let Some(resources) = page_resources(&self.document, page)? else {
            return Ok(Vec::new());
        };
        let Ok(xobjects) = resources.get(b"XObject") else {
            return Ok(Vec::new());
        };
        let xobjects = resolve(&self.document, xobjects)?
            .as_dict()
            .map_err(|err| pdf_err("/XObject is not a dictionary", err))?;

        let mut images = Vec::new();
        for (name, value) in xobjects.iter() {
            let Object::Reference(object_id) = value else {
                continue;
            };
            let Ok(stream) = self.stream(*object_id) else {
                warn!(page = index, ?object_id, "XObject is not a stream, skipping");
                continue;
            };
            let is_image = stream
                .dict
                .get(b"Subtype")
                .and_then(Object::as_name)
                .map(|subtype| subtype == b"Image")
                .unwrap_or(false);
            if !is_image {
                continue;
            }
            images.push(EmbeddedImage {
                page_index: index,
                name: String::from_utf8_lossy(name).into_owned(),
                object_id: *object_id,
                width: dimension(&stream.dict, b"Width"),
                height: dimension(&stream.dict, b"Height"),
            });
        }
        Ok(images)
    }

    /// Every image of every page, in page order.
    pub fn images(&self) -> Result<Vec<EmbeddedImage>> {
        let mut all = Vec::new();
        for index in 0..self.page_count() {
            all.extend(self.page_images(index)?);
        }
        Ok(all)
    }

    /// The stream object behind an object id.
    pub fn stream(&self, id: ObjectId) -> Result<&Stream> {
        self.document
            .get_object(id)
            .and_then(Object::as_stream)
            .map_err(|err| pdf_err(&format!("object {id:?} is not a stream"), err))
    }

    // -- Editing --------------------------------------------------------------

    /// Remove pages by 0-based index; see [`pages::remove_pages_descending`].
    pub fn remove_pages(&mut self, indices: &[usize]) -> Result<usize> {
        pages::remove_pages_descending(&mut self.document, indices)
    }

    /// Write the document to `path`.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn save(&mut self, path: &Path) -> Result<()> {
        super::save_document(&mut self.document, path)?;
        info!(pages = self.page_count(), "Saved PDF");
        Ok(())
    }
}

fn dimension(dict: &lopdf::Dictionary, key: &[u8]) -> u32 {
    dict.get(key)
        .ok()
        .and_then(number)
        .map(|value| value.max(0.0) as u32)
        .unwrap_or(0)
}
