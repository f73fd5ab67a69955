// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — reading source documents, editing page trees, filling forms,
// drawing onto pages and creating the blank template.

pub mod canvas;
pub mod form;
pub mod pages;
pub mod reader;
pub mod text;
pub mod writer;

use std::path::Path;

use lopdf::{Document, Object, ObjectId};
use postwerk_core::error::{PostwerkError, Result};

pub use canvas::Canvas;
pub use reader::SourceDocument;
pub use writer::TemplateWriter;

/// A4 in PDF points, rounded the way page boxes are usually written.
pub const A4_WIDTH_PT: f32 = 595.0;
pub const A4_HEIGHT_PT: f32 = 842.0;

/// Build a `PdfError` from a context phrase and the underlying error.
pub(crate) fn pdf_err(context: &str, err: impl std::fmt::Display) -> PostwerkError {
    PostwerkError::PdfError(format!("{context}: {err}"))
}

/// Follow a single level of indirection.
pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Result<&'a Object> {
    match object {
        Object::Reference(id) => doc
            .get_object(*id)
            .map_err(|err| pdf_err(&format!("cannot resolve {id:?}"), err)),
        other => Ok(other),
    }
}

/// Numeric value of an Integer or Real object.
pub(crate) fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

/// Object id of the document's root `/Pages` node.
pub(crate) fn pages_root(doc: &Document) -> Result<ObjectId> {
    catalog_id(doc).and_then(|catalog_id| {
        doc.get_object(catalog_id)
            .and_then(Object::as_dict)
            .and_then(|catalog| catalog.get(b"Pages"))
            .and_then(Object::as_reference)
            .map_err(|err| pdf_err("no /Pages reference in catalog", err))
    })
}

/// Object id of the document catalog.
pub(crate) fn catalog_id(doc: &Document) -> Result<ObjectId> {
    doc.trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|err| pdf_err("trailer has no /Root reference", err))
}

/// Object id of the page at 0-based `index`.
pub(crate) fn page_id(doc: &Document, index: usize) -> Result<ObjectId> {
    let pages = doc.get_pages();
    pages.get(&(index as u32 + 1)).copied().ok_or_else(|| {
        PostwerkError::PdfError(format!(
            "page index {} out of range (document has {} pages)",
            index,
            pages.len()
        ))
    })
}

/// Serialise and write a document, creating or replacing `path`.
pub fn save_document(doc: &mut Document, path: &Path) -> Result<()> {
    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|err| pdf_err(&format!("failed to serialise {}", path.display()), err))?;
    std::fs::write(path, &output).map_err(|err| PostwerkError::file("write PDF", path, err))?;
    Ok(())
}

/// Load a document from disk with I/O context on failure.
pub fn load_document(path: &Path) -> Result<Document> {
    let bytes = std::fs::read(path).map_err(|err| PostwerkError::file("read PDF", path, err))?;
    Document::load_mem(&bytes)
        .map_err(|err| pdf_err(&format!("failed to parse {}", path.display()), err))
}

/// Encode text for a PDF text string: literal when ASCII, UTF-16BE with BOM otherwise.
pub(crate) fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        Object::string_literal(text)
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes, lopdf::StringFormat::Hexadecimal)
    }
}

/// Encode text for a `Tj` operand under a single-byte standard font.
///
/// Characters outside Latin-1 have no glyph in the standard encodings and
/// are replaced with `?`.
pub(crate) fn single_byte_text(text: &str) -> Object {
    let bytes: Vec<u8> = text
        .chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect();
    Object::String(bytes, lopdf::StringFormat::Literal)
}
