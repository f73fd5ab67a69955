// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unique names for generated documents.
//
// Grammar: `{yyyyMMddHHmmssSSS}-{tag}-{sequence}-{original base name}.{ext}`.
// The timestamp alone is not unique within a millisecond, so every name also
// carries a number drawn from a shared monotonic `SequenceNumbers` service.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Local};

use crate::types::DocumentKind;

/// Monotonic sequence-number service.
///
/// Safe under concurrent use; one instance is shared by everything that
/// names files during the lifetime of the process.
#[derive(Debug, Default)]
pub struct SequenceNumbers {
    next: AtomicU64,
}

impl SequenceNumbers {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Take the next number. Never returns the same value twice.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// Builds unique output filenames from the watched file's name.
#[derive(Debug, Clone)]
pub struct FilenameGenerator {
    sequence: Arc<SequenceNumbers>,
}

impl FilenameGenerator {
    pub fn new(sequence: Arc<SequenceNumbers>) -> Self {
        Self { sequence }
    }

    /// Name a PDF of `kind` derived from `original`.
    pub fn generate(&self, original: &str, kind: DocumentKind) -> String {
        self.generate_with_extension(original, kind, "pdf")
    }

    pub fn generate_with_extension(
        &self,
        original: &str,
        kind: DocumentKind,
        extension: &str,
    ) -> String {
        self.generate_at(Local::now(), original, kind, extension)
    }

    /// Same as [`FilenameGenerator::generate_with_extension`] with an explicit clock reading.
    pub fn generate_at(
        &self,
        now: DateTime<Local>,
        original: &str,
        kind: DocumentKind,
        extension: &str,
    ) -> String {
        format!(
            "{}-{}-{}-{}.{}",
            now.format("%Y%m%d%H%M%S%3f"),
            kind.filename_tag(),
            self.sequence.next(),
            base_name(original),
            extension
        )
    }
}

/// File name without directory and without its last extension.
fn base_name(original: &str) -> &str {
    Path::new(original)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(original)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::TimeZone;

    use super::*;

    fn generator() -> FilenameGenerator {
        FilenameGenerator::new(Arc::new(SequenceNumbers::new()))
    }

    #[test]
    fn follows_grammar() {
        let now = Local
            .with_ymd_and_hms(2026, 3, 7, 9, 5, 1)
            .single()
            .expect("unambiguous local time");
        let name = generator().generate_at(now, "order_123.pdf", DocumentKind::Labels, "pdf");
        assert_eq!(name, "20260307090501000-labels-0-order_123.pdf");
    }

    #[test]
    fn same_instant_never_collides() {
        let now = Local::now();
        let generator = generator();
        let names: HashSet<String> = (0..1_000)
            .map(|_| generator.generate_at(now, "order.pdf", DocumentKind::ProofOfPostage, "pdf"))
            .collect();
        assert_eq!(names.len(), 1_000);
    }

    #[test]
    fn rapid_calls_are_unique() {
        let generator = generator();
        let names: HashSet<String> = (0..1_000)
            .map(|_| generator.generate("order.pdf", DocumentKind::PackingSlip))
            .collect();
        assert_eq!(names.len(), 1_000);
    }

    #[test]
    fn concurrent_increments_are_distinct() {
        let sequence = Arc::new(SequenceNumbers::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sequence = Arc::clone(&sequence);
                std::thread::spawn(move || (0..250).map(|_| sequence.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for n in handle.join().expect("thread finished") {
                assert!(seen.insert(n), "duplicate sequence number {n}");
            }
        }
        assert_eq!(seen.len(), 2_000);
    }

    #[test]
    fn base_name_strips_directory_and_extension() {
        assert_eq!(base_name("order.pdf"), "order");
        assert_eq!(base_name("watch/order.v2.pdf"), "order.v2");
        assert_eq!(base_name("order"), "order");
    }
}
