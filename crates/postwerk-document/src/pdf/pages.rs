// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page tree editing — removing pages, appending new pages, appending content
// to existing pages and copying objects between documents.
//
// Page indices are 0-based throughout; lopdf's page map is 1-based.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use postwerk_core::error::{PostwerkError, Result};
use tracing::{debug, warn};

use super::{pages_root, pdf_err, resolve};

/// Remove the pages at `indices`, highest index first.
///
/// Every removal renumbers the pages after it, so removing in ascending
/// order would delete the wrong pages. Duplicates are ignored. All indices
/// are checked before the document is touched, and objects only the removed
/// pages used are pruned afterwards.
pub fn remove_pages_descending(doc: &mut Document, indices: &[usize]) -> Result<usize> {
    let page_count = doc.get_pages().len();
    let mut ordered: Vec<usize> = indices.to_vec();
    ordered.sort_unstable();
    ordered.dedup();

    if let Some(&last) = ordered.last().filter(|&&last| last >= page_count) {
        return Err(PostwerkError::PdfError(format!(
            "cannot remove page index {last}: document has {page_count} pages"
        )));
    }

    for &index in ordered.iter().rev() {
        doc.delete_pages(&[index as u32 + 1]);
    }
    if !ordered.is_empty() {
        let pruned = doc.prune_objects();
        debug!(pruned = pruned.len(), "Pruned objects of removed pages");
    }

    debug!(removed = ordered.len(), remaining = page_count - ordered.len(), "Pages removed");
    Ok(ordered.len())
}

/// Append a page with the given size, content and resources as the last page.
pub fn append_page(
    doc: &mut Document,
    width: f32,
    height: f32,
    content: Vec<u8>,
    resources: Dictionary,
) -> Result<ObjectId> {
    let pages_id = pages_root(doc)?;
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content));
    let page = dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Real(width), Object::Real(height)],
        "Contents" => content_id,
        "Resources" => resources,
    };
    let new_page = doc.add_object(page);

    // Add page reference to the /Kids array and increment /Count.
    if let Ok(Object::Dictionary(pages_dict)) = doc.get_object_mut(pages_id) {
        if let Ok(Object::Array(kids)) = pages_dict.get_mut(b"Kids") {
            kids.push(Object::Reference(new_page));
        }
        if let Ok(Object::Integer(count)) = pages_dict.get_mut(b"Count") {
            *count += 1;
        }
    }

    Ok(new_page)
}

/// Draw extra content on top of an existing page.
///
/// The existing content is wrapped in `q`/`Q` so a graphics state it leaves
/// behind cannot shift the appended drawing. `resources` entries are merged
/// into the page's own resource dictionary, category by category.
pub fn append_to_page(
    doc: &mut Document,
    page: ObjectId,
    content: Vec<u8>,
    resources: &Dictionary,
) -> Result<()> {
    let mut existing_contents = page_contents(doc, page)?;
    let mut merged = effective_resources(doc, page)?;
    for (category, entries) in resources.iter() {
        let Ok(entries) = entries.as_dict() else {
            continue;
        };
        let mut target = match merged.get(category) {
            Ok(current) => resolve(doc, current)?
                .as_dict()
                .cloned()
                .unwrap_or_else(|_| Dictionary::new()),
            Err(_) => Dictionary::new(),
        };
        for (name, value) in entries.iter() {
            target.set(name.clone(), value.clone());
        }
        merged.set(category.clone(), Object::Dictionary(target));
    }

    let open = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let mut closing = b"\nQ\n".to_vec();
    closing.extend_from_slice(&content);
    let close = doc.add_object(Stream::new(Dictionary::new(), closing));

    let mut contents = Vec::with_capacity(existing_contents.len() + 2);
    contents.push(Object::Reference(open));
    contents.append(&mut existing_contents);
    contents.push(Object::Reference(close));

    let page_dict = doc
        .get_object_mut(page)
        .and_then(Object::as_dict_mut)
        .map_err(|err| pdf_err("page object is not a dictionary", err))?;
    page_dict.set("Contents", Object::Array(contents));
    page_dict.set("Resources", Object::Dictionary(merged));
    Ok(())
}

/// Media box width and height of a page, following inheritance.
pub fn page_size(doc: &Document, page: ObjectId) -> Result<(f32, f32)> {
    let media_box = inherited(doc, page, b"MediaBox")?
        .ok_or_else(|| PostwerkError::PdfError(format!("page {page:?} has no /MediaBox")))?;
    let values: Vec<f32> = resolve(doc, media_box)?
        .as_array()
        .map_err(|err| pdf_err("/MediaBox is not an array", err))?
        .iter()
        .filter_map(|item| resolve(doc, item).ok().and_then(super::number))
        .collect();
    match values.as_slice() {
        [x0, y0, x1, y1] => Ok(((x1 - x0).abs(), (y1 - y0).abs())),
        _ => Err(PostwerkError::PdfError(format!(
            "/MediaBox of page {page:?} has {} numbers",
            values.len()
        ))),
    }
}

/// The resource dictionary that applies to a page, following inheritance.
pub fn page_resources(doc: &Document, page: ObjectId) -> Result<Option<&Dictionary>> {
    match inherited(doc, page, b"Resources")? {
        Some(resources) => resolve(doc, resources)?
            .as_dict()
            .map(Some)
            .map_err(|err| pdf_err("/Resources is not a dictionary", err)),
        None => Ok(None),
    }
}

/// Deep-copy an object (and everything it references) from `source` into
/// `target`, returning the new id.
///
/// `/Parent` back-references are not followed, so copying an image or a
/// font never drags a page tree along with it. An object reachable along
/// several paths is copied once.
pub fn import_object(source: &Document, target: &mut Document, id: ObjectId) -> Result<ObjectId> {
    let mut importer = Importer {
        source,
        target,
        copied: BTreeMap::new(),
    };
    importer.import(id)
}

/// Owned copy of a page's effective resources.
fn effective_resources(doc: &Document, page: ObjectId) -> Result<Dictionary> {
    Ok(page_resources(doc, page)?
        .cloned()
        .unwrap_or_else(Dictionary::new))
}

/// The page's content streams as a flat list of references.
fn page_contents(doc: &Document, page: ObjectId) -> Result<Vec<Object>> {
    let page_dict = doc
        .get_object(page)
        .and_then(Object::as_dict)
        .map_err(|err| pdf_err("page object is not a dictionary", err))?;
    let Ok(contents) = page_dict.get(b"Contents") else {
        return Ok(Vec::new());
    };
    match contents {
        Object::Reference(id) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => Ok(items.clone()),
            Ok(_) => Ok(vec![Object::Reference(*id)]),
            Err(err) => Err(pdf_err("cannot resolve /Contents", err)),
        },
        Object::Array(items) => Ok(items.clone()),
        other => {
            warn!(?other, "Unexpected /Contents value, replacing it");
            Ok(Vec::new())
        }
    }
}

/// Look up a page attribute, walking up `/Parent` links until found.
fn inherited<'a>(doc: &'a Document, page: ObjectId, key: &[u8]) -> Result<Option<&'a Object>> {
    let mut current = Some(page);
    let mut depth = 0;
    while let Some(node_id) = current {
        let node = doc
            .get_object(node_id)
            .and_then(Object::as_dict)
            .map_err(|err| pdf_err(&format!("page tree node {node_id:?}"), err))?;
        if let Ok(value) = node.get(key) {
            return Ok(Some(value));
        }
        depth += 1;
        if depth > 64 {
            warn!(?page, "Page tree deeper than 64 levels, giving up on inheritance");
            break;
        }
        current = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    Ok(None)
}

/// Copies objects between documents, remembering the id each source object
/// received in the target.
struct Importer<'a> {
    source: &'a Document,
    target: &'a mut Document,
    copied: BTreeMap<ObjectId, ObjectId>,
}

impl Importer<'_> {
    fn import(&mut self, id: ObjectId) -> Result<ObjectId> {
        if let Some(&done) = self.copied.get(&id) {
            return Ok(done);
        }
        let source = self.source;
        let object = source
            .get_object(id)
            .map_err(|err| pdf_err(&format!("cannot read object {id:?}"), err))?;
        // Reserve the id first so reference cycles resolve to it.
        let new_id = self.target.new_object_id();
        self.copied.insert(id, new_id);
        let cloned = self.clone_object(object)?;
        self.target.objects.insert(new_id, cloned);
        Ok(new_id)
    }

    fn clone_object(&mut self, object: &Object) -> Result<Object> {
        match object {
            Object::Dictionary(dict) => Ok(Object::Dictionary(self.clone_dictionary(dict)?)),
            Object::Array(items) => items
                .iter()
                .map(|item| self.clone_object(item))
                .collect::<Result<Vec<_>>>()
                .map(Object::Array),
            Object::Reference(id) => {
                if self.source.get_object(*id).is_err() {
                    warn!(?id, "Cannot resolve reference, using Null");
                    return Ok(Object::Null);
                }
                self.import(*id).map(Object::Reference)
            }
            Object::Stream(stream) => Ok(Object::Stream(Stream::new(
                self.clone_dictionary(&stream.dict)?,
                stream.content.clone(),
            ))),
            other => Ok(other.clone()),
        }
    }

    fn clone_dictionary(&mut self, dict: &Dictionary) -> Result<Dictionary> {
        let mut new_dict = Dictionary::new();
        for (key, value) in dict.iter() {
            if key == b"Parent" {
                continue;
            }
            new_dict.set(key.clone(), self.clone_object(value)?);
        }
        Ok(new_dict)
    }
}
