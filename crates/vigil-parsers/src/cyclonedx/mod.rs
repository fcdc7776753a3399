use vigil_model::{DedupeAlgorithm, Finding, HashField};

use crate::error::{ParserError, ParserResult};
use crate::file::{ReportFile, ReportFormat};
use crate::registry::ReportParser;

mod xml;

/// CycloneDX BOMs with embedded vulnerability data.
#[derive(Debug)]
pub struct CycloneDxParser;

impl ReportParser for CycloneDxParser {
    fn scan_type(&self) -> &'static str {
        "CycloneDX Scan"
    }

    fn description(&self) -> &'static str {
        "CycloneDX BOM in XML format, legacy vulnerability extension or the 1.4 vulnerabilities block."
    }

    fn parse(&self, file: &ReportFile) -> ParserResult<Vec<Finding>> {
        match file.format() {
            ReportFormat::Xml => xml::parse(file.text()?),
            ReportFormat::Json | ReportFormat::Csv => Err(ParserError::UnknownFileFormat),
        }
    }

    fn hash_fields(&self) -> &'static [HashField] {
        &[
            HashField::Title,
            HashField::Cwe,
            HashField::Severity,
            HashField::ComponentName,
            HashField::ComponentVersion,
        ]
    }

    fn dedupe_algorithm(&self) -> DedupeAlgorithm {
        DedupeAlgorithm::HashCode
    }
}
