// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// AcroForm text fields — locate fields by fully qualified name and set their
// values.
//
// Every widget gets a plain `/AP /N` appearance showing the new value, and
// `/NeedAppearances` is set as well so viewers that regenerate appearances
// can still do so.

use std::collections::BTreeMap;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use postwerk_core::error::{PostwerkError, Result};
use tracing::{debug, warn};

use super::{catalog_id, number, pdf_err, resolve, single_byte_text, text_string};

/// Resource name of the appearance font, shared with the template's `/DA`.
const APPEARANCE_FONT: &[u8] = b"Helv";
const APPEARANCE_FONT_SIZE: f32 = 8.0;
/// Left padding of the value inside the widget rectangle.
const APPEARANCE_PADDING: f32 = 2.0;

/// Terminal form fields of a document, keyed by fully qualified name.
#[derive(Debug, Default)]
pub struct FormFields {
    fields: BTreeMap<String, ObjectId>,
}

impl FormFields {
    /// Walk the `/AcroForm` field tree.
    pub fn collect(doc: &Document) -> Result<Self> {
        let mut fields = BTreeMap::new();
        let Some(acro_form) = acro_form(doc)? else {
            return Ok(Self { fields });
        };
        let roots = match acro_form.get(b"Fields") {
            Ok(object) => resolve(doc, object)?
                .as_array()
                .map_err(|err| pdf_err("/Fields is not an array", err))?
                .clone(),
            Err(_) => Vec::new(),
        };
        for root in &roots {
            if let Ok(id) = root.as_reference() {
                walk(doc, id, "", &mut fields, 0);
            }
        }
        debug!(fields = fields.len(), "Form fields collected");
        Ok(Self { fields })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Object id of the field `name`.
    pub fn get(&self, name: &str) -> Option<ObjectId> {
        self.fields.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Set the value of the text field `name`.
    pub fn set_text(&self, doc: &mut Document, name: &str, value: &str) -> Result<()> {
        let id = *self.fields.get(name).ok_or_else(|| PostwerkError::FormField {
            field: name.to_string(),
        })?;

        let widgets = widgets(doc, id);
        let field = doc
            .get_object_mut(id)
            .and_then(Object::as_dict_mut)
            .map_err(|err| pdf_err(&format!("field {name:?}"), err))?;
        field.set("V", text_string(value));

        if widgets.is_empty() {
            warn!(field = name, "Field has no widget, value will not be visible");
            return Ok(());
        }
        let font = appearance_font(doc)?;
        for widget in widgets {
            write_appearance(doc, widget, font, value)?;
        }
        Ok(())
    }
}

/// Replace a widget's normal appearance with one showing `value` on a
/// single line, vertically centred in its `/Rect`.
fn write_appearance(doc: &mut Document, widget: ObjectId, font: ObjectId, value: &str) -> Result<()> {
    let (width, height) = widget_size(doc, widget)?;
    let baseline = ((height - APPEARANCE_FONT_SIZE) / 2.0 + 1.5).max(1.0);
    let operations = vec![
        Operation::new("BMC", vec![Object::Name(b"Tx".to_vec())]),
        Operation::new("q", vec![]),
        Operation::new(
            "re",
            vec![Object::Integer(0), Object::Integer(0), Object::Real(width), Object::Real(height)],
        ),
        Operation::new("W", vec![]),
        Operation::new("n", vec![]),
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(APPEARANCE_FONT.to_vec()), Object::Real(APPEARANCE_FONT_SIZE)],
        ),
        Operation::new("g", vec![Object::Integer(0)]),
        Operation::new("Td", vec![Object::Real(APPEARANCE_PADDING), Object::Real(baseline)]),
        Operation::new("Tj", vec![single_byte_text(value)]),
        Operation::new("ET", vec![]),
        Operation::new("Q", vec![]),
        Operation::new("EMC", vec![]),
    ];
    let content = Content { operations }
        .encode()
        .map_err(|err| pdf_err("cannot encode field appearance", err))?;

    let mut fonts = Dictionary::new();
    fonts.set(APPEARANCE_FONT.to_vec(), font);
    let appearance = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![Object::Integer(0), Object::Integer(0), Object::Real(width), Object::Real(height)],
            "Resources" => dictionary! { "Font" => fonts },
        },
        content,
    ));

    let widget_dict = doc
        .get_object_mut(widget)
        .and_then(Object::as_dict_mut)
        .map_err(|err| pdf_err(&format!("widget {widget:?}"), err))?;
    widget_dict.set("AP", dictionary! { "N" => appearance });
    Ok(())
}

/// Width and height of a widget's `/Rect`.
fn widget_size(doc: &Document, widget: ObjectId) -> Result<(f32, f32)> {
    let rect = doc
        .get_object(widget)
        .and_then(Object::as_dict)
        .and_then(|dict| dict.get(b"Rect"))
        .map_err(|err| pdf_err(&format!("widget {widget:?} has no /Rect"), err))?;
    let values: Vec<f32> = resolve(doc, rect)?
        .as_array()
        .map_err(|err| pdf_err("/Rect is not an array", err))?
        .iter()
        .filter_map(|item| resolve(doc, item).ok().and_then(number))
        .collect();
    match values.as_slice() {
        [x0, y0, x1, y1] => Ok(((x1 - x0).abs(), (y1 - y0).abs())),
        _ => Err(PostwerkError::PdfError(format!(
            "/Rect of widget {widget:?} has {} numbers",
            values.len()
        ))),
    }
}

/// The form's default `/Helv` font, or a new Helvetica font object when the
/// form's resources do not name one.
fn appearance_font(doc: &mut Document) -> Result<ObjectId> {
    let existing = acro_form(doc)?
        .and_then(|form| form.get(b"DR").ok())
        .and_then(|resources| resolve(doc, resources).ok())
        .and_then(|resources| resources.as_dict().ok())
        .and_then(|resources| resources.get(b"Font").ok())
        .and_then(|fonts| resolve(doc, fonts).ok())
        .and_then(|fonts| fonts.as_dict().ok())
        .and_then(|fonts| fonts.get(APPEARANCE_FONT).ok())
        .and_then(|font| font.as_reference().ok());
    if let Some(font) = existing {
        return Ok(font);
    }
    Ok(doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    }))
}

/// Ask viewers to regenerate field appearances.
pub fn mark_need_appearances(doc: &mut Document) -> Result<()> {
    let catalog = catalog_id(doc)?;
    let reference = doc
        .get_object(catalog)
        .and_then(Object::as_dict)
        .and_then(|catalog| catalog.get(b"AcroForm"))
        .and_then(Object::as_reference)
        .ok();

    let target = match reference {
        Some(id) => id,
        None => catalog,
    };
    let dict = doc
        .get_object_mut(target)
        .and_then(Object::as_dict_mut)
        .map_err(|err| pdf_err("cannot update /AcroForm", err))?;

    if reference.is_some() {
        dict.set("NeedAppearances", true);
    } else if let Ok(Object::Dictionary(inline)) = dict.get_mut(b"AcroForm") {
        inline.set("NeedAppearances", true);
    } else {
        warn!("Document has no /AcroForm, nothing to mark");
    }
    Ok(())
}

fn acro_form(doc: &Document) -> Result<Option<&lopdf::Dictionary>> {
    let catalog = doc
        .get_object(catalog_id(doc)?)
        .and_then(Object::as_dict)
        .map_err(|err| pdf_err("catalog is not a dictionary", err))?;
    match catalog.get(b"AcroForm") {
        Ok(object) => resolve(doc, object)?
            .as_dict()
            .map(Some)
            .map_err(|err| pdf_err("/AcroForm is not a dictionary", err)),
        Err(_) => Ok(None),
    }
}

fn walk(
    doc: &Document,
    id: ObjectId,
    parent_name: &str,
    out: &mut BTreeMap<String, ObjectId>,
    depth: usize,
) {
    if depth > 32 {
        warn!(?id, "Form field tree too deep, ignoring the rest");
        return;
    }
    let Ok(dict) = doc.get_object(id).and_then(Object::as_dict) else {
        warn!(?id, "Form field is not a dictionary");
        return;
    };

    let partial = dict.get(b"T").ok().and_then(decode_text);
    let name = match (&partial, parent_name.is_empty()) {
        (Some(partial), true) => partial.clone(),
        (Some(partial), false) => format!("{parent_name}.{partial}"),
        (None, _) => parent_name.to_string(),
    };

    let named_kids: Vec<ObjectId> = kids(dict)
        .into_iter()
        .filter(|kid| {
            doc.get_object(*kid)
                .and_then(Object::as_dict)
                .map(|kid| kid.has(b"T"))
                .unwrap_or(false)
        })
        .collect();

    if named_kids.is_empty() {
        if partial.is_some() {
            out.insert(name, id);
        }
        return;
    }
    for kid in named_kids {
        walk(doc, kid, &name, out, depth + 1);
    }
}

fn kids(dict: &lopdf::Dictionary) -> Vec<ObjectId> {
    dict.get(b"Kids")
        .and_then(Object::as_array)
        .map(|kids| kids.iter().filter_map(|kid| kid.as_reference().ok()).collect())
        .unwrap_or_default()
}

/// Widget annotations of a field: the field itself when it carries a
/// `/Rect`, then its unnamed kids.
fn widgets(doc: &Document, field: ObjectId) -> Vec<ObjectId> {
    let Ok(dict) = doc.get_object(field).and_then(Object::as_dict) else {
        return Vec::new();
    };
    let merged = dict.has(b"Rect").then_some(field);
    let kids = kids(dict).into_iter().filter(|kid| {
        doc.get_object(*kid)
            .and_then(Object::as_dict)
            .map(|kid| !kid.has(b"T") && kid.has(b"Rect"))
            .unwrap_or(false)
    });
    merged.into_iter().chain(kids).collect()
}

/// Decode a PDF text string (UTF-16BE with BOM, otherwise byte-per-char).
fn decode_text(object: &Object) -> Option<String> {
    let Object::String(bytes, _) = object else {
        return None;
    };
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return Some(String::from_utf16_lossy(&units));
    }
    Some(bytes.iter().map(|&byte| char::from(byte)).collect())
}
