//! JSON report generation.
//!
//! # Example
//!
//! ```rust
//! use assess_report::{Report, json::JsonGenerator};
//!
//! let report = Report::default();
//! let generator = JsonGenerator::new(&report);
//!
//! // Compact JSON has no newlines
//! assert!(!generator.generate().unwrap().contains('\n'));
//! assert!(generator.generate_pretty().unwrap().contains("assessment_id"));
//! ```

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::{Report, ReportError, Result};

/// JSON report generator.
pub struct JsonGenerator<'a> {
    report: &'a Report,
}

impl<'a> JsonGenerator<'a> {
    /// Creates a new JSON generator for the given report.
    #[must_use]
    pub const fn new(report: &'a Report) -> Self {
        Self { report }
    }

    /// Generates compact JSON output.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Serialization`] if JSON serialization fails.
    pub fn generate(&self) -> Result<String> {
        serde_json::to_string(self.report).map_err(ReportError::from)
    }

    /// Generates pretty-printed JSON output.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Serialization`] if JSON serialization fails.
    pub fn generate_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self.report).map_err(ReportError::from)
    }

    /// Writes the JSON report to `path`, creating or overwriting it.
    ///
    /// Parent directories must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Serialization`] if JSON serialization fails.
    /// Returns [`ReportError::Io`] if file creation or writing fails.
    pub fn write_to_file(&self, path: &Path, pretty: bool) -> Result<()> {
        let json = if pretty {
            self.generate_pretty()?
        } else {
            self.generate()?
        };

        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(())
    }
}
