// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory PDF builders for tests and benchmarks.
//
// Pages carry text laid out the way different generators write it (one text
// object per line by default) and optional grayscale image XObjects standing
// in for the carrier's QR codes.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream, dictionary};

use crate::pdf::writer::TemplateWriter;

/// Width of the compact QR rendering.
pub const COMPACT_QR_WIDTH: u32 = 128;
/// Width and minimum height of the large QR rendering.
pub const LARGE_QR_WIDTH: u32 = 1050;
pub const LARGE_QR_HEIGHT: u32 = 740;

/// Line height of fixture text, in points.
const LEADING: i64 = 14;
/// Baseline of the first fixture line.
const TOP: i64 = 800;

/// How a fixture page writes its lines into the content stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FixtureLayout {
    /// `BT … Td … Tj ET` for every line.
    #[default]
    LinePerObject,
    /// One text object: `TL`, then `Tj` and `T*` per line.
    SingleObject,
    /// One text object; lines shown with `'` and `"`.
    QuoteOperators,
    /// One text object; every line placed with an absolute `Tm`.
    TextMatrix,
    /// One text object; a single `Tj` whose string holds CRLF line breaks.
    CrlfString,
    /// Every line its own text object on the same baseline.
    SameBaseline,
}

/// One page to build: text lines top to bottom, then images.
#[derive(Debug, Clone, Default)]
pub struct FixturePage {
    pub lines: Vec<String>,
    /// (width, height) in pixels.
    pub images: Vec<(u32, u32)>,
    pub layout: FixtureLayout,
}

impl FixturePage {
    pub fn text(lines: Vec<String>) -> Self {
        Self {
            lines,
            images: Vec::new(),
            layout: FixtureLayout::default(),
        }
    }

    pub fn with_layout(mut self, layout: FixtureLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_image(mut self, width: u32, height: u32) -> Self {
        self.images.push((width, height));
        self
    }

    /// A carrier label for customer `n` with one compact QR code.
    pub fn label(n: usize) -> Self {
        Self::text(label_lines(n)).with_image(COMPACT_QR_WIDTH, COMPACT_QR_WIDTH)
    }

    /// A packing slip page: no address marker near the top.
    pub fn packing(n: usize) -> Self {
        Self::text(vec![
            "Packing Slip".to_string(),
            format!("Order {n}"),
            "Item: Widget x 1".to_string(),
        ])
    }
}

/// Text lines of a label for customer `n`.
pub fn label_lines(n: usize) -> Vec<String> {
    vec![
        "Shipping Address".to_string(),
        format!("Customer {n}"),
        format!("{n} High Street"),
        "Sometown".to_string(),
        format!("AB{n} 1CD"),
        "Tracked 48 No Signature".to_string(),
        "Royal Mail".to_string(),
        "Postage Paid GB".to_string(),
        "Despatched".to_string(),
        "Weight 0.5kg".to_string(),
        tracking_code(n),
    ]
}

/// Printed tracking code of label `n`.
pub fn tracking_code(n: usize) -> String {
    format!("TT {n:04} 5678 9GB")
}

/// Build a document with the given pages.
pub fn build_document(pages: &[FixturePage]) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut kids = Vec::with_capacity(pages.len());
    for page in pages {
        let mut operations = text_operations(&page.lines, page.layout);

        let mut xobjects = Dictionary::new();
        for (index, &(width, height)) in page.images.iter().enumerate() {
            let image = doc.add_object(gray_image(width, height));
            let name = format!("Im{index}");
            xobjects.set(name.as_bytes().to_vec(), image);
            operations.extend([
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Integer(60),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(60),
                        Object::Integer(400),
                        Object::Integer(700 - 70 * index as i64),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(name.into_bytes())]),
                Operation::new("Q", vec![]),
            ]);
        }

        let content = Content { operations }
            .encode()
            .expect("fixture content encodes");
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content));
        let mut resources = dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        };
        if !xobjects.is_empty() {
            resources.set("XObject", xobjects);
        }
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(595), Object::Integer(842)],
            "Contents" => content_id,
            "Resources" => resources,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

fn text_operations(lines: &[String], layout: FixtureLayout) -> Vec<Operation> {
    if lines.is_empty() {
        return Vec::new();
    }
    let font = || Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(10)]);
    let show = |line: &String| Operation::new("Tj", vec![Object::string_literal(line.as_str())]);
    let baseline = |row: usize| TOP - LEADING * row as i64;

    let mut operations = Vec::new();
    match layout {
        FixtureLayout::LinePerObject | FixtureLayout::SameBaseline => {
            for (row, line) in lines.iter().enumerate() {
                let (x, y) = match layout {
                    FixtureLayout::SameBaseline => (40 + 60 * row as i64, TOP),
                    _ => (40, baseline(row)),
                };
                operations.extend([
                    Operation::new("BT", vec![]),
                    font(),
                    Operation::new("Td", vec![Object::Integer(x), Object::Integer(y)]),
                    show(line),
                    Operation::new("ET", vec![]),
                ]);
            }
        }
        FixtureLayout::SingleObject => {
            operations.extend([
                Operation::new("BT", vec![]),
                font(),
                Operation::new("TL", vec![Object::Integer(LEADING)]),
                Operation::new("Td", vec![Object::Integer(40), Object::Integer(TOP)]),
            ]);
            for line in lines {
                operations.extend([show(line), Operation::new("T*", vec![])]);
            }
            operations.push(Operation::new("ET", vec![]));
        }
        FixtureLayout::QuoteOperators => {
            operations.extend([
                Operation::new("BT", vec![]),
                font(),
                Operation::new("TL", vec![Object::Integer(LEADING)]),
                Operation::new("Td", vec![Object::Integer(40), Object::Integer(TOP + LEADING)]),
            ]);
            for (row, line) in lines.iter().enumerate() {
                let text = Object::string_literal(line.as_str());
                operations.push(if row % 2 == 0 {
                    Operation::new("'", vec![text])
                } else {
                    Operation::new("\"", vec![Object::Integer(0), Object::Integer(0), text])
                });
            }
            operations.push(Operation::new("ET", vec![]));
        }
        FixtureLayout::TextMatrix => {
            operations.extend([Operation::new("BT", vec![]), font()]);
            for (row, line) in lines.iter().enumerate() {
                operations.extend([
                    Operation::new(
                        "Tm",
                        vec![
                            Object::Integer(1),
                            Object::Integer(0),
                            Object::Integer(0),
                            Object::Integer(1),
                            Object::Integer(40),
                            Object::Integer(baseline(row)),
                        ],
                    ),
                    show(line),
                ]);
            }
            operations.push(Operation::new("ET", vec![]));
        }
        FixtureLayout::CrlfString => {
            operations.extend([
                Operation::new("BT", vec![]),
                font(),
                Operation::new("Td", vec![Object::Integer(40), Object::Integer(TOP)]),
                Operation::new("Tj", vec![Object::string_literal(lines.join("\r\n"))]),
                Operation::new("ET", vec![]),
            ]);
        }
    }
    operations
}

/// Serialised form of [`build_document`].
pub fn document_bytes(pages: &[FixturePage]) -> Vec<u8> {
    let mut doc = build_document(pages);
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("fixture document serialises");
    bytes
}

/// `labels` label pages (one compact QR each) followed by `packing` packing
/// slip pages.
pub fn source_bytes(labels: usize, packing: usize) -> Vec<u8> {
    let mut pages: Vec<FixturePage> = (0..labels).map(FixturePage::label).collect();
    pages.extend((0..packing).map(FixturePage::packing));
    document_bytes(&pages)
}

/// The blank proof-of-postage template.
pub fn template_bytes() -> Vec<u8> {
    TemplateWriter::new().create().expect("template builds")
}

fn gray_image(width: u32, height: u32) -> Stream {
    let mut samples = vec![0xFF; (width * height) as usize];
    // A dark block where the large variant keeps its QR code.
    for y in 450..730.min(height) {
        for x in 70..350.min(width) {
            samples[(y * width + x) as usize] = 0x00;
        }
    }
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(width),
            "Height" => i64::from(height),
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        samples,
    )
}
