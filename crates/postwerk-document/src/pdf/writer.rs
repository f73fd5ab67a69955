// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Template writer — create a blank, fillable proof-of-postage sheet.
//
// The printed artwork (title, column headings, row numbers) is laid out with
// `printpdf` 0.8; the fillable text fields are then added with `lopdf`, since
// the form fields must carry the exact names the batch assembler fills.

use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};
use postwerk_core::BATCH_SIZE;
use postwerk_core::error::{PostwerkError, Result};
use printpdf::{BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, TextItem};
use tracing::{debug, info, instrument};

use super::{catalog_id, page_id, pdf_err};
use crate::batch::{SUMMARY_COUNT_FIELD, SUMMARY_DATE_FIELD, address_field, name_field, service_field};

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;

const TOP_ROW_Y: f32 = 730.0;
const ROW_HEIGHT: f32 = 20.0;
const FIELD_HEIGHT: f32 = 16.0;

/// Column x positions (left edge, right edge) in points.
const NUMBER_X: f32 = 36.0;
const NAME_COLUMN: (f32, f32) = (56.0, 186.0);
const ADDRESS_COLUMN: (f32, f32) = (190.0, 430.0);
const SERVICE_COLUMN: (f32, f32) = (434.0, 560.0);

/// Creates the blank proof-of-postage template.
pub struct TemplateWriter {
    /// Title printed at the top of the sheet and stored in the /Info dictionary.
    title: String,
}

impl Default for TemplateWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateWriter {
    pub fn new() -> Self {
        Self {
            title: "Certificate of Posting".to_string(),
        }
    }

    /// Set the printed title.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Build the template and return the serialised PDF.
    #[instrument(skip(self))]
    pub fn create(&self) -> Result<Vec<u8>> {
        info!(title = %self.title, rows = BATCH_SIZE, "Creating proof-of-postage template");

        let artwork = self.artwork();
        let mut doc = Document::load_mem(&artwork)
            .map_err(|err| pdf_err("failed to reload template artwork", err))?;

        let page = page_id(&doc, 0)?;
        let helvetica = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });

        let mut fields = Vec::new();
        for position in 1..=BATCH_SIZE {
            let y = row_baseline(position) - 4.0;
            fields.push(add_field(&mut doc, page, &name_field(position), NAME_COLUMN, y));
            fields.push(add_field(&mut doc, page, &address_field(position), ADDRESS_COLUMN, y));
            fields.push(add_field(&mut doc, page, &service_field(position), SERVICE_COLUMN, y));
        }
        fields.push(add_field(&mut doc, page, SUMMARY_COUNT_FIELD, (120.0, 260.0), 56.0));
        fields.push(add_field(&mut doc, page, SUMMARY_DATE_FIELD, (380.0, 520.0), 56.0));

        let annotations: Vec<Object> = fields.iter().copied().map(Object::Reference).collect();
        doc.get_object_mut(page)
            .and_then(Object::as_dict_mut)
            .map_err(|err| pdf_err("template page is not a dictionary", err))?
            .set("Annots", annotations.clone());

        let acro_form = doc.add_object(dictionary! {
            "Fields" => annotations,
            "NeedAppearances" => true,
            "DA" => Object::string_literal("/Helv 8 Tf 0 g"),
            "DR" => dictionary! {
                "Font" => dictionary! { "Helv" => helvetica },
            },
        });
        let catalog = catalog_id(&doc)?;
        doc.get_object_mut(catalog)
            .and_then(Object::as_dict_mut)
            .map_err(|err| pdf_err("catalog is not a dictionary", err))?
            .set("AcroForm", acro_form);

        let mut output = Vec::new();
        doc.save_to(&mut output)
            .map_err(|err| pdf_err("failed to serialise template", err))?;
        debug!(fields = fields.len(), bytes = output.len(), "Template complete");
        Ok(output)
    }

    /// Create the template and write it to `path`.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let bytes = self.create()?;
        std::fs::write(path, bytes).map_err(|err| PostwerkError::file("write template", path, err))?;
        info!("Template written");
        Ok(())
    }

    /// Printed page content: title, column headings, row numbers and the
    /// summary labels.
    fn artwork(&self) -> Vec<u8> {
        let page_h_pt = Mm(PAGE_HEIGHT_MM).into_pt().0;
        let mut ops: Vec<Op> = Vec::new();

        text(&mut ops, 36.0, page_h_pt - 48.0, 16.0, BuiltinFont::HelveticaBold, &self.title);
        text(&mut ops, NAME_COLUMN.0, TOP_ROW_Y + 20.0, 9.0, BuiltinFont::HelveticaBold, "Name");
        text(
            &mut ops,
            ADDRESS_COLUMN.0,
            TOP_ROW_Y + 20.0,
            9.0,
            BuiltinFont::HelveticaBold,
            "Address and postcode",
        );
        text(
            &mut ops,
            SERVICE_COLUMN.0,
            TOP_ROW_Y + 20.0,
            9.0,
            BuiltinFont::HelveticaBold,
            "Service used",
        );
        for position in 1..=BATCH_SIZE {
            text(
                &mut ops,
                NUMBER_X,
                row_baseline(position),
                8.0,
                BuiltinFont::Helvetica,
                &position.to_string(),
            );
        }
        text(&mut ops, 36.0, 60.0, 9.0, BuiltinFont::HelveticaBold, "Total:");
        text(&mut ops, 330.0, 60.0, 9.0, BuiltinFont::HelveticaBold, "Date:");

        let mut doc = PdfDocument::new(&self.title);
        doc.with_pages(vec![PdfPage::new(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), ops)]);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        doc.save(&PdfSaveOptions::default(), &mut warnings)
    }
}

/// Baseline of row `position` (1-based).
fn row_baseline(position: usize) -> f32 {
    TOP_ROW_Y - (position as f32 - 1.0) * ROW_HEIGHT
}

fn text(ops: &mut Vec<Op>, x: f32, y: f32, size: f32, font: BuiltinFont, line: &str) {
    ops.push(Op::StartTextSection);
    ops.push(Op::SetTextCursor {
        pos: Point { x: Pt(x), y: Pt(y) },
    });
    ops.push(Op::SetFontSizeBuiltinFont {
        size: Pt(size),
        font: font.clone(),
    });
    ops.push(Op::WriteTextBuiltinFont {
        items: vec![TextItem::Text(line.to_string())],
        font,
    });
    ops.push(Op::EndTextSection);
}

/// Add a merged field/widget dictionary for a single-line text field.
fn add_field(doc: &mut Document, page: ObjectId, name: &str, column: (f32, f32), y: f32) -> ObjectId {
    let rect = vec![
        Object::Real(column.0),
        Object::Real(y),
        Object::Real(column.1),
        Object::Real(y + FIELD_HEIGHT),
    ];
    let field: Dictionary = dictionary! {
        "Type" => "Annot",
        "Subtype" => "Widget",
        "FT" => "Tx",
        "T" => Object::string_literal(name),
        "Rect" => rect,
        "F" => 4,
        "P" => page,
        "DA" => Object::string_literal("/Helv 8 Tf 0 g"),
    };
    doc.add_object(field)
}
