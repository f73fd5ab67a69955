// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page text in reading lines — walk a page's content stream and start a new
// line whenever the text baseline moves, whether the generator used one text
// object per line or a single object with `Td`, `T*`, `'` or `Tm`.

use std::collections::BTreeMap;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Encoding, Object, ObjectId};
use postwerk_core::error::Result;
use tracing::{trace, warn};

use super::{number, pdf_err};

/// Baseline moves smaller than this (in text space units) stay on one line.
const SAME_LINE_TOLERANCE: f32 = 0.5;

/// `TJ` adjustments below this many thousandths of an em read as a word gap.
const WORD_GAP: f32 = -100.0;

/// Text of one page, one visual line per `\n`-terminated line.
pub fn page_text(doc: &Document, page: ObjectId) -> Result<String> {
    let encodings = font_encodings(doc, page);
    let data = doc
        .get_page_content(page)
        .map_err(|err| pdf_err(&format!("cannot read content of page {page:?}"), err))?;
    let content = Content::decode(&data)
        .map_err(|err| pdf_err(&format!("cannot decode content of page {page:?}"), err))?;

    let mut lines = LineCollector::default();
    let mut state = TextState::default();
    let mut font: Option<Vec<u8>> = None;

    for Operation { operator, operands } in &content.operations {
        match operator.as_str() {
            "BT" => state.begin(),
            "Tf" => font = operands.first().and_then(|name| name.as_name().ok()).map(<[u8]>::to_vec),
            "TL" => {
                if let Some(leading) = operands.first().and_then(number) {
                    state.leading = leading;
                }
            }
            "Td" => {
                if let [tx, ty] = operands.as_slice() {
                    state.translate(number(tx).unwrap_or(0.0), number(ty).unwrap_or(0.0));
                }
            }
            "TD" => {
                if let [tx, ty] = operands.as_slice() {
                    let ty = number(ty).unwrap_or(0.0);
                    state.leading = -ty;
                    state.translate(number(tx).unwrap_or(0.0), ty);
                }
            }
            "Tm" => {
                let values: Vec<f32> = operands.iter().filter_map(number).collect();
                if let [a, b, c, d, e, f] = values.as_slice() {
                    state.line_matrix = [*a, *b, *c, *d, *e, *f];
                }
            }
            "T*" => state.next_line(),
            "Tj" | "TJ" => {
                let encoding = font.as_ref().and_then(|name| encodings.get(name));
                lines.show(state.baseline(), &decode_operands(encoding, operands));
            }
            "'" => {
                state.next_line();
                lines.force_break();
                let encoding = font.as_ref().and_then(|name| encodings.get(name));
                lines.show(state.baseline(), &decode_operands(encoding, operands));
            }
            "\"" => {
                state.next_line();
                lines.force_break();
                let encoding = font.as_ref().and_then(|name| encodings.get(name));
                let shown = operands.get(2).map(std::slice::from_ref).unwrap_or_default();
                lines.show(state.baseline(), &decode_operands(encoding, shown));
            }
            _ => {}
        }
    }

    trace!(?page, lines = lines.count, "Page text extracted");
    Ok(lines.finish())
}

/// Encoding of every font named in the page's resources.
fn font_encodings(doc: &Document, page: ObjectId) -> BTreeMap<Vec<u8>, Encoding<'_>> {
    let fonts = match doc.get_page_fonts(page) {
        Ok(fonts) => fonts,
        Err(err) => {
            warn!(?page, %err, "Cannot list page fonts, decoding text as Latin-1");
            return BTreeMap::new();
        }
    };
    fonts
        .into_iter()
        .filter_map(|(name, font)| match font.get_font_encoding(doc) {
            Ok(encoding) => Some((name, encoding)),
            Err(err) => {
                warn!(font = %String::from_utf8_lossy(&name), %err, "Unknown font encoding");
                None
            }
        })
        .collect()
}

/// Text of the string operands of `Tj`, `TJ`, `'` and `"`.
fn decode_operands(encoding: Option<&Encoding<'_>>, operands: &[Object]) -> String {
    let mut text = String::new();
    for operand in operands {
        match operand {
            Object::String(bytes, _) => text.push_str(&decode_bytes(encoding, bytes)),
            Object::Array(items) => {
                for item in items {
                    match item {
                        Object::String(bytes, _) => text.push_str(&decode_bytes(encoding, bytes)),
                        other => {
                            if number(other).is_some_and(|adjust| adjust < WORD_GAP)
                                && !text.ends_with(' ')
                            {
                                text.push(' ');
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
    text
}

/// Decode shown bytes. Single-byte encodings have no glyph for CR and LF,
/// so those bytes are kept as line breaks rather than dropped.
fn decode_bytes(encoding: Option<&Encoding<'_>>, bytes: &[u8]) -> String {
    if !matches!(encoding, None | Some(Encoding::OneByteEncoding(_))) {
        return decode_run(encoding, bytes);
    }
    let mut text = String::new();
    let mut run_start = 0;
    for (offset, &byte) in bytes.iter().enumerate() {
        if byte == b'\r' || byte == b'\n' {
            text.push_str(&decode_run(encoding, &bytes[run_start..offset]));
            text.push(char::from(byte));
            run_start = offset + 1;
        }
    }
    text.push_str(&decode_run(encoding, &bytes[run_start..]));
    text
}

fn decode_run(encoding: Option<&Encoding<'_>>, bytes: &[u8]) -> String {
    encoding
        .and_then(|encoding| Document::decode_text(encoding, bytes).ok())
        .unwrap_or_else(|| bytes.iter().map(|&byte| char::from(byte)).collect())
}

/// The parts of the text state that decide where a line starts.
struct TextState {
    /// Text line matrix `[a b c d e f]`.
    line_matrix: [f32; 6],
    leading: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            line_matrix: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
            leading: 0.0,
        }
    }
}

impl TextState {
    fn begin(&mut self) {
        self.line_matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];
    }

    fn translate(&mut self, tx: f32, ty: f32) {
        let [a, b, c, d, e, f] = self.line_matrix;
        self.line_matrix = [a, b, c, d, tx * a + ty * c + e, tx * b + ty * d + f];
    }

    fn next_line(&mut self) {
        self.translate(0.0, -self.leading);
    }

    fn baseline(&self) -> f32 {
        self.line_matrix[5]
    }
}

/// Accumulates shown text, breaking lines when the baseline moves.
#[derive(Default)]
struct LineCollector {
    text: String,
    baseline: Option<f32>,
    pending_break: bool,
    count: usize,
}

impl LineCollector {
    fn show(&mut self, baseline: f32, shown: &str) {
        if shown.is_empty() {
            return;
        }
        let moved = self
            .baseline
            .is_some_and(|previous| (previous - baseline).abs() > SAME_LINE_TOLERANCE);
        if (moved || self.pending_break) && !self.text.is_empty() && !self.text.ends_with('\n') {
            self.text.push('\n');
            self.count += 1;
        }
        self.pending_break = false;
        self.baseline = Some(baseline);
        self.text.push_str(shown);
    }

    fn force_break(&mut self) {
        self.pending_break = true;
    }

    fn finish(mut self) -> String {
        if !self.text.is_empty() && !self.text.ends_with('\n') {
            self.text.push('\n');
        }
        self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{FixtureLayout, FixturePage, build_document, label_lines};
    use crate::pdf::page_id;

    fn lines_of(page: FixturePage) -> Vec<String> {
        let doc = build_document(&[page]);
        let text = page_text(&doc, page_id(&doc, 0).expect("page")).expect("text");
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn one_object_per_line_keeps_lines() {
        assert_eq!(lines_of(FixturePage::text(label_lines(3))), label_lines(3));
    }

    #[test]
    fn single_object_with_next_line_operator_keeps_lines() {
        let page = FixturePage::text(label_lines(1)).with_layout(FixtureLayout::SingleObject);
        assert_eq!(lines_of(page), label_lines(1));
    }

    #[test]
    fn quote_operators_start_new_lines() {
        let page = FixturePage::text(label_lines(2)).with_layout(FixtureLayout::QuoteOperators);
        assert_eq!(lines_of(page), label_lines(2));
    }

    #[test]
    fn text_matrix_jumps_start_new_lines() {
        let page = FixturePage::text(label_lines(4)).with_layout(FixtureLayout::TextMatrix);
        assert_eq!(lines_of(page), label_lines(4));
    }

    #[test]
    fn crlf_inside_a_string_splits_lines() {
        let page = FixturePage::text(label_lines(5)).with_layout(FixtureLayout::CrlfString);
        assert_eq!(lines_of(page), label_lines(5));
    }

    #[test]
    fn same_baseline_pieces_join() {
        let page = FixturePage::text(vec!["TT 0001".into(), " 5678 9GB".into()])
            .with_layout(FixtureLayout::SameBaseline);
        assert_eq!(lines_of(page), vec!["TT 0001 5678 9GB".to_string()]);
    }

    #[test]
    fn wide_kerning_reads_as_space() {
        let encoding = None;
        let operands = vec![Object::Array(vec![
            Object::string_literal("Royal"),
            Object::Integer(-250),
            Object::string_literal("Mail"),
            Object::Integer(-20),
            Object::string_literal("!"),
        ])];
        assert_eq!(decode_operands(encoding, &operands), "Royal Mail!");
    }

    #[test]
    fn empty_page_has_no_text() {
        assert_eq!(lines_of(FixturePage::text(vec![])), Vec::<String>::new());
    }
}
