//! Analyzer output decoding.
//!
//! Decoding never fails: an unusable payload yields no diagnostics, and a
//! single bad finding is dropped without affecting its siblings.

use crate::finding::RawFinding;
use crate::types::Diagnostic;

/// Decode `solidhunter -j` stdout into diagnostics, preserving input order.
#[must_use]
pub fn decode(raw_output: &str) -> Vec<Diagnostic> {
    let trimmed = raw_output.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let value: serde_json::Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!("Analyzer output is not JSON: {e}");
            return Vec::new();
        }
    };

    let serde_json::Value::Array(items) = value else {
        tracing::debug!("Analyzer output is not a list of findings");
        return Vec::new();
    };

    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let finding = match serde_json::from_value::<RawFinding>(item) {
                Ok(finding) => finding,
                Err(e) => {
                    tracing::debug!(index, "Dropping malformed finding: {e}");
                    return None;
                }
            };
            match finding.into_diagnostic() {
                Ok(diag) => Some(diag),
                Err(e) => {
                    tracing::debug!(index, "Dropping finding with bad range: {e}");
                    None
                }
            }
        })
        .collect()
}
