//! Analyzer-native findings and their translation into editor coordinates.
//!
//! The analyzer reports 1-based lines and 0-based characters. Only the line
//! is shifted; characters pass through untouched.

use serde::Deserialize;

use crate::types::{Diagnostic, Position, Range, Severity};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("line {line} is not a valid 1-based line")]
    NonPositiveLine { line: i64 },
    #[error("line {line} does not fit an editor position")]
    LineOverflow { line: i64 },
}

/// One finding as emitted by `solidhunter -j`.
///
/// Unknown fields (`length`, `sourceFileContent`, ...) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFinding {
    pub range: RawRange,
    pub severity: String,
    pub message: String,
    #[serde(default)]
    pub uri: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RawRange {
    pub start: RawPosition,
    pub end: RawPosition,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RawPosition {
    /// 1-based.
    pub line: i64,
    /// 0-based.
    pub character: u32,
}

fn line_to_zero_based(line: i64) -> Result<u32, RangeError> {
    let shifted = line
        .checked_sub(1)
        .ok_or(RangeError::NonPositiveLine { line })?;
    if shifted < 0 {
        return Err(RangeError::NonPositiveLine { line });
    }
    u32::try_from(shifted).map_err(|_| RangeError::LineOverflow { line })
}

/// Convert an analyzer range into a 0-based editor range.
pub fn to_zero_based(range: &RawRange) -> Result<Range, RangeError> {
    Ok(Range::new(
        Position::new(line_to_zero_based(range.start.line)?, range.start.character),
        Position::new(line_to_zero_based(range.end.line)?, range.end.character),
    ))
}

impl RawFinding {
    /// Translate into a [`Diagnostic`], consuming the raw record.
    pub fn into_diagnostic(self) -> Result<Diagnostic, RangeError> {
        let range = to_zero_based(&self.range)?;
        Ok(Diagnostic::new(
            Severity::from_label(&self.severity),
            range,
            self.message,
        ))
    }
}
