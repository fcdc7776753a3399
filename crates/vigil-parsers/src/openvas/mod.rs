use std::sync::LazyLock;

use regex::Regex;
use vigil_model::{DedupeAlgorithm, Finding, HashField};

use crate::error::{ParserError, ParserResult};
use crate::file::{ReportFile, ReportFormat};
use crate::registry::ReportParser;

mod csv;
mod xml;

// CVE ids hide inside NVT oids and reference lists.
pub(super) static CVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CVE-\d{4}-\d{4,7}").expect("hardcoded regex is valid"));

/// Greenbone OpenVAS reports, CSV or XML export.
#[derive(Debug)]
pub struct OpenVasParser;

impl ReportParser for OpenVasParser {
    fn scan_type(&self) -> &'static str {
        "OpenVAS Parser"
    }

    fn description(&self) -> &'static str {
        "CSV or XML output of a Greenbone OpenVAS report."
    }

    fn parse(&self, file: &ReportFile) -> ParserResult<Vec<Finding>> {
        match file.format() {
            ReportFormat::Csv => csv::parse(file.text()?),
            ReportFormat::Xml => xml::parse(file.text()?),
            ReportFormat::Json => Err(ParserError::UnknownFileFormat),
        }
    }

    fn hash_fields(&self) -> &'static [HashField] {
        &[HashField::Title, HashField::Severity, HashField::Endpoints]
    }

    fn dedupe_algorithm(&self) -> DedupeAlgorithm {
        DedupeAlgorithm::HashCode
    }
}
