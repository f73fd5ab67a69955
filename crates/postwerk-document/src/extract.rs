// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shipping-record extractor — turns the line-oriented text of a carrier label
// document into an ordered list of shipping records.
//
// Address blocks start at a "Shipping Address" line. Tracking numbers hang
// off a "Postage Paid GB" line and are handed out to records in creation
// order, not by proximity.

use postwerk_core::ShippingRecord;
use tracing::{debug, info, warn};

const ADDRESS_MARKER: &str = "Shipping Address";
const POSTAGE_MARKER: &str = "Postage Paid GB";
const TRACKED_PREFIX: &str = "Tracked";
const SIGNATURE_NOTE: &str = "No Signature";

/// Result of scanning a document's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// At least one record was found.
    Records(Vec<ShippingRecord>),
    /// No address block at all; the file is not a label document.
    Unrecognized,
}

impl Extraction {
    pub fn records(&self) -> &[ShippingRecord] {
        match self {
            Self::Records(records) => records,
            Self::Unrecognized => &[],
        }
    }
}

/// Scan `text` once, top to bottom, and collect shipping records.
pub fn extract_records(text: &str) -> Extraction {
    let lines: Vec<&str> = text.split('\n').map(|line| line.trim_end_matches('\r')).collect();
    let line = |index: Option<usize>| line_at(&lines, index);

    let mut records: Vec<ShippingRecord> = Vec::new();
    let mut next_tracking = 0usize;

    for (i, current) in lines.iter().enumerate() {
        if current.contains(ADDRESS_MARKER) {
            let name = line(Some(i + 1));
            let address = format!(
                "{} {} {}",
                line(Some(i + 2)),
                line(Some(i + 3)),
                line(Some(i + 4))
            );
            debug!(name, "Found address block");
            records.push(ShippingRecord::new(name, address, ""));
        }

        if current.contains(POSTAGE_MARKER) {
            let carrier = carrier_line(line(i.checked_sub(2)));
            let code = compact_code(line(Some(i + 3)));
            match records.get_mut(next_tracking) {
                Some(record) => {
                    record.tracking_number = format!("{carrier} {code}");
                    debug!(
                        record = next_tracking,
                        tracking = %record.tracking_number,
                        "Assigned tracking number"
                    );
                }
                None => warn!(
                    line = i,
                    "Tracking marker has no address block to attach to, skipping"
                ),
            }
            next_tracking += 1;
        }
    }

    if records.is_empty() {
        info!("No postage details found");
        return Extraction::Unrecognized;
    }

    let untracked = records.iter().filter(|r| r.tracking_number.is_empty()).count();
    if untracked > 0 {
        warn!(untracked, "Some address blocks have no tracking number");
    }
    info!(records = records.len(), "Extracted shipping records");
    Extraction::Records(records)
}

/// Line `index`, or an empty line when it is out of range.
fn line_at<'a>(lines: &[&'a str], index: Option<usize>) -> &'a str {
    index.and_then(|i| lines.get(i)).copied().unwrap_or("")
}

/// The carrier/service line, without the signature note on tracked services.
fn carrier_line(line: &str) -> String {
    if line.starts_with(TRACKED_PREFIX) {
        line.replace(SIGNATURE_NOTE, "").trim_end().to_string()
    } else {
        line.trim_end().to_string()
    }
}

/// Tracking code with spaces and hyphens removed.
fn compact_code(line: &str) -> String {
    line.chars().filter(|c| *c != ' ' && *c != '-').collect()
}
