// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Drawing canvas — collects text and image operations for one page and turns
// them into a content stream plus the resources it refers to.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};
use postwerk_core::error::Result;

use super::{pdf_err, single_byte_text};

/// Resource name of the fixed-width font. Prefixed so it cannot collide with
/// names already used by a page the canvas is appended to.
const FONT_NAME: &str = "PwF1";

/// Operations for one page, in drawing order.
///
/// Coordinates are PDF user space: points, origin bottom-left.
#[derive(Default)]
pub struct Canvas {
    operations: Vec<Operation>,
    xobjects: Dictionary,
    uses_font: bool,
    next_image: usize,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one line of Courier text with its baseline starting at (`x`, `y`).
    pub fn text(&mut self, x: f32, y: f32, size: f32, text: &str) {
        self.uses_font = true;
        self.operations.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(FONT_NAME.into()), Object::Real(size)]),
            Operation::new("Td", vec![Object::Real(x), Object::Real(y)]),
            Operation::new("Tj", vec![single_byte_text(text)]),
            Operation::new("ET", vec![]),
        ]);
    }

    /// Paint the image XObject `image` into the rectangle with lower-left
    /// corner (`x`, `y`).
    pub fn image(&mut self, image: ObjectId, x: f32, y: f32, width: f32, height: f32) {
        let name = format!("PwIm{}", self.next_image);
        self.next_image += 1;
        self.xobjects.set(name.as_bytes().to_vec(), Object::Reference(image));
        self.operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(width),
                    Object::Real(0.0),
                    Object::Real(0.0),
                    Object::Real(height),
                    Object::Real(x),
                    Object::Real(y),
                ],
            ),
            Operation::new("Do", vec![Object::Name(name.into_bytes())]),
            Operation::new("Q", vec![]),
        ]);
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Encode the content stream and build the matching resource dictionary.
    ///
    /// The font object is added to `doc` only when text was drawn.
    pub fn finish(self, doc: &mut Document) -> Result<(Vec<u8>, Dictionary)> {
        let mut resources = Dictionary::new();
        if self.uses_font {
            let font = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Courier",
                "Encoding" => "WinAnsiEncoding",
            });
            resources.set("Font", dictionary! { FONT_NAME => font });
        }
        if !self.xobjects.is_empty() {
            resources.set("XObject", Object::Dictionary(self.xobjects));
        }

        let content = Content {
            operations: self.operations,
        }
        .encode()
        .map_err(|err| pdf_err("failed to encode content stream", err))?;
        Ok((content, resources))
    }
}

#[cfg(test)]
mod tests {
    use lopdf::Stream;

    use super::*;

    #[test]
    fn finish_lists_only_used_resources() {
        let mut doc = Document::with_version("1.5");
        let image = doc.add_object(Stream::new(Dictionary::new(), Vec::new()));

        let mut canvas = Canvas::new();
        canvas.image(image, 10.0, 20.0, 60.0, 60.0);
        let (content, resources) = canvas.finish(&mut doc).expect("finish");

        assert!(resources.get(b"Font").is_err());
        let xobjects = resources.get(b"XObject").and_then(Object::as_dict).expect("xobjects");
        assert_eq!(xobjects.get(b"PwIm0").and_then(Object::as_reference).ok(), Some(image));
        let text = String::from_utf8_lossy(&content);
        assert!(text.contains("/PwIm0 Do"));
    }

    #[test]
    fn text_adds_courier_font() {
        let mut doc = Document::with_version("1.5");
        let mut canvas = Canvas::new();
        canvas.text(35.0, 735.0, 9.0, "AB123456789GB");
        let (content, resources) = canvas.finish(&mut doc).expect("finish");

        let fonts = resources.get(b"Font").and_then(Object::as_dict).expect("fonts");
        let font_id = fonts.get(b"PwF1").and_then(Object::as_reference).expect("font ref");
        let base = doc
            .get_object(font_id)
            .and_then(Object::as_dict)
            .and_then(|font| font.get(b"BaseFont"))
            .and_then(Object::as_name)
            .expect("base font");
        assert_eq!(base, b"Courier");
        assert!(String::from_utf8_lossy(&content).contains("(AB123456789GB) Tj"));
    }
}
