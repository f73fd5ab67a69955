// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Proof-of-postage batch assembler — fills one copy of the template per
// thirty records and writes it to the store folder.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use lopdf::Document;
use postwerk_core::error::{PostwerkError, Result};
use postwerk_core::{BATCH_SIZE, Batch, DocumentKind, FilenameGenerator, ShippingRecord};
use tracing::{debug, info, instrument};

use crate::pdf::form::{FormFields, mark_need_appearances};
use crate::pdf::{pdf_err, save_document};

/// Template field holding the item count.
pub const SUMMARY_COUNT_FIELD: &str = "Text57";
/// Template field holding the date.
pub const SUMMARY_DATE_FIELD: &str = "Text58";

/// Name field of row `position` (1-based).
pub fn name_field(position: usize) -> String {
    position.to_string()
}

/// Address field of row `position`. The first row uses a legacy name.
pub fn address_field(position: usize) -> String {
    if position == 1 {
        "my text here".to_string()
    } else {
        format!("address and postcode {position}")
    }
}

/// Tracking-number field of row `position`.
pub fn service_field(position: usize) -> String {
    format!("service used {position}")
}

/// Raw bytes of the fill-in template; parsed afresh for every batch so no
/// batch sees another batch's values.
#[derive(Clone)]
pub struct ProofOfPostageTemplate {
    bytes: Vec<u8>,
}

impl ProofOfPostageTemplate {
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|err| PostwerkError::file("read template", path, err))?;
        let template = Self::from_bytes(bytes)?;
        debug!("Template loaded");
        Ok(template)
    }

    /// Wrap template bytes, checking once that they parse.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Document::load_mem(&bytes).map_err(|err| pdf_err("template is not a readable PDF", err))?;
        Ok(Self { bytes })
    }

    fn fresh_copy(&self) -> Result<Document> {
        Document::load_mem(&self.bytes).map_err(|err| pdf_err("failed to load template", err))
    }
}

/// Fill one sheet with up to thirty records.
///
/// Field values depend only on `records` and `date`.
pub fn fill_sheet(
    template: &ProofOfPostageTemplate,
    records: &[ShippingRecord],
    date: NaiveDate,
) -> Result<Document> {
    if records.len() > BATCH_SIZE {
        return Err(PostwerkError::PdfError(format!(
            "{} records do not fit on one sheet of {}",
            records.len(),
            BATCH_SIZE
        )));
    }
    let mut doc = template.fresh_copy()?;
    let fields = FormFields::collect(&doc)?;

    for (offset, record) in records.iter().enumerate() {
        let position = offset + 1;
        fields.set_text(&mut doc, &name_field(position), &record.name)?;
        fields.set_text(&mut doc, &address_field(position), &record.address)?;
        fields.set_text(&mut doc, &service_field(position), &record.tracking_number)?;
        debug!(
            position,
            name = %record.name,
            tracking = %record.tracking_number,
            "Filled row"
        );
    }
    fields.set_text(&mut doc, SUMMARY_COUNT_FIELD, &format!("{} items", records.len()))?;
    fields.set_text(&mut doc, SUMMARY_DATE_FIELD, &date.format("%d/%m/%Y").to_string())?;
    mark_need_appearances(&mut doc)?;
    Ok(doc)
}

/// Splits records into sheets and writes each sheet to the store folder.
pub struct BatchAssembler<'a> {
    template: &'a ProofOfPostageTemplate,
    names: &'a FilenameGenerator,
    store_folder: PathBuf,
}

impl<'a> BatchAssembler<'a> {
    pub fn new(
        template: &'a ProofOfPostageTemplate,
        names: &'a FilenameGenerator,
        store_folder: impl Into<PathBuf>,
    ) -> Self {
        Self {
            template,
            names,
            store_folder: store_folder.into(),
        }
    }

    /// Assemble with today's date.
    pub fn assemble(&self, source_name: &str, records: &[ShippingRecord]) -> Result<Vec<Batch>> {
        self.assemble_on(source_name, records, Local::now().date_naive())
    }

    /// One batch per chunk of [`BATCH_SIZE`] records, in order.
    ///
    /// A failure part-way leaves the sheets already written on disk.
    #[instrument(skip(self, records), fields(source = source_name, records = records.len()))]
    pub fn assemble_on(
        &self,
        source_name: &str,
        records: &[ShippingRecord],
        date: NaiveDate,
    ) -> Result<Vec<Batch>> {
        let mut batches = Vec::with_capacity(records.len().div_ceil(BATCH_SIZE));
        for (chunk_index, chunk) in records.chunks(BATCH_SIZE).enumerate() {
            let start_index = chunk_index * BATCH_SIZE;
            let mut doc = fill_sheet(self.template, chunk, date)?;

            let output_filename = self.names.generate(source_name, DocumentKind::ProofOfPostage);
            save_document(&mut doc, &self.store_folder.join(&output_filename))?;
            info!(
                file = %output_filename,
                start_index,
                records = chunk.len(),
                "Created proof of postage"
            );

            batches.push(Batch {
                output_filename,
                records: chunk.to_vec(),
                source_document: source_name.to_string(),
                start_index,
            });
        }
        Ok(batches)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lopdf::Object;
    use postwerk_core::SequenceNumbers;

    use super::*;
    use crate::fixtures::template_bytes;

    fn records(count: usize) -> Vec<ShippingRecord> {
        (0..count)
            .map(|n| ShippingRecord::new(format!("Customer {n}"), format!("{n} Road"), format!("Tracked 48 TT{n}")))
            .collect()
    }

    fn template() -> ProofOfPostageTemplate {
        ProofOfPostageTemplate::from_bytes(template_bytes()).expect("template")
    }

    fn value(doc: &Document, name: &str) -> Option<Object> {
        let id = FormFields::collect(doc).expect("fields").get(name)?;
        doc.get_object(id)
            .and_then(Object::as_dict)
            .and_then(|field| field.get(b"V"))
            .ok()
            .cloned()
    }

    #[test]
    fn batch_sizes_and_offsets() {
        let dir = tempfile::tempdir().expect("tempdir");
        let template = template();
        let names = FilenameGenerator::new(Arc::new(SequenceNumbers::new()));
        let assembler = BatchAssembler::new(&template, &names, dir.path());

        for (total, expected) in [
            (1, vec![1]),
            (30, vec![30]),
            (31, vec![30, 1]),
            (47, vec![30, 17]),
            (90, vec![30, 30, 30]),
        ] {
            let batches = assembler.assemble("order.pdf", &records(total)).expect("assemble");
            let sizes: Vec<usize> = batches.iter().map(|b| b.records.len()).collect();
            let starts: Vec<usize> = batches.iter().map(|b| b.start_index).collect();
            assert_eq!(sizes, expected, "total {total}");
            assert_eq!(starts, (0..expected.len()).map(|i| i * 30).collect::<Vec<_>>());
            for batch in &batches {
                assert!(dir.path().join(&batch.output_filename).exists());
                assert_eq!(batch.source_document, "order.pdf");
            }
        }
    }

    #[test]
    fn no_records_no_batches() {
        let dir = tempfile::tempdir().expect("tempdir");
        let template = template();
        let names = FilenameGenerator::new(Arc::new(SequenceNumbers::new()));
        let batches = BatchAssembler::new(&template, &names, dir.path())
            .assemble("order.pdf", &[])
            .expect("assemble");
        assert!(batches.is_empty());
    }

    #[test]
    fn rows_use_position_field_names() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).expect("date");
        let doc = fill_sheet(&template(), &records(3), date).expect("fill");
        assert_eq!(value(&doc, "1"), Some(Object::string_literal("Customer 0")));
        assert_eq!(value(&doc, "my text here"), Some(Object::string_literal("0 Road")));
        assert_eq!(value(&doc, "service used 1"), Some(Object::string_literal("Tracked 48 TT0")));
        assert_eq!(value(&doc, "3"), Some(Object::string_literal("Customer 2")));
        assert_eq!(value(&doc, "address and postcode 3"), Some(Object::string_literal("2 Road")));
        assert_eq!(value(&doc, "4"), None);
        assert_eq!(value(&doc, "Text57"), Some(Object::string_literal("3 items")));
        assert_eq!(value(&doc, "Text58"), Some(Object::string_literal("07/03/2026")));
    }

    #[test]
    fn same_records_same_content() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 2).expect("date");
        let template = template();
        let save = |mut doc: Document| {
            let mut out = Vec::new();
            doc.save_to(&mut out).expect("save");
            out
        };
        let first = save(fill_sheet(&template, &records(12), date).expect("fill"));
        let second = save(fill_sheet(&template, &records(12), date).expect("fill"));
        assert_eq!(first, second);
    }

    #[test]
    fn oversized_sheet_is_rejected() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 2).expect("date");
        assert!(fill_sheet(&template(), &records(31), date).is_err());
    }

    #[test]
    fn template_without_fields_names_the_missing_field() {
        let bytes = crate::fixtures::document_bytes(&[crate::fixtures::FixturePage::text(vec![])]);
        let template = ProofOfPostageTemplate::from_bytes(bytes).expect("template");
        let date = NaiveDate::from_ymd_opt(2026, 1, 2).expect("date");
        match fill_sheet(&template, &records(1), date) {
            Err(PostwerkError::FormField { field }) => assert_eq!(field, "1"),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }
}
