//! Native JSON findings import.
//!
//! This format belongs to the importer itself rather than to any scanner:
//! an object with one `findings[]` array whose entries mirror the stored
//! finding fields. It is how tools without a dedicated parser, and earlier
//! exports, get their findings in.

use serde::Deserialize;
use tracing::warn;

use vigil_model::{DedupeAlgorithm, Endpoint, Finding, HashField, Severity, Tags};

use crate::date::parse_report_date;
use crate::error::{ParserError, ParserResult};
use crate::file::{ReportFile, ReportFormat};
use crate::registry::ReportParser;

#[derive(Debug)]
pub struct GenericParser;

impl ReportParser for GenericParser {
    fn scan_type(&self) -> &'static str {
        "Generic Findings Import"
    }

    fn description(&self) -> &'static str {
        "Import findings in the native JSON format, one findings array."
    }

    fn parse(&self, file: &ReportFile) -> ParserResult<Vec<Finding>> {
        match file.format() {
            ReportFormat::Json => parse_json(&file.data),
            ReportFormat::Csv | ReportFormat::Xml => Err(ParserError::UnknownFileFormat),
        }
    }

    fn hash_fields(&self) -> &'static [HashField] {
        &[
            HashField::Title,
            HashField::Cwe,
            HashField::Line,
            HashField::FilePath,
            HashField::Description,
        ]
    }

    fn dedupe_algorithm(&self) -> DedupeAlgorithm {
        DedupeAlgorithm::UniqueIdFromToolOrHashCode
    }
}

#[derive(Deserialize)]
struct GenericReport {
    #[serde(default)]
    findings: Vec<GenericFinding>,
}

/// One entry of the `findings[]` array.
///
/// `title` and `severity` are mandatory; everything else is optional and
/// falls back to the finding defaults. Unknown keys are ignored so that
/// newer exports keep importing into older deployments.
#[derive(Deserialize)]
struct GenericFinding {
    title: String,
    severity: String,

    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    mitigation: Option<String>,
    #[serde(default)]
    impact: Option<String>,
    #[serde(default)]
    references: Option<String>,
    #[serde(default)]
    severity_justification: Option<String>,

    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    cve: Option<String>,
    #[serde(default)]
    vulnerability_ids: Vec<String>,
    #[serde(default)]
    cwe: Option<u32>,
    #[serde(default)]
    cvssv3: Option<String>,
    #[serde(default)]
    cvssv3_score: Option<f64>,
    #[serde(default)]
    epss_score: Option<f64>,
    #[serde(default)]
    epss_percentile: Option<f64>,

    #[serde(default)]
    component_name: Option<String>,
    #[serde(default)]
    component_version: Option<String>,
    #[serde(default)]
    file_path: Option<String>,
    #[serde(default)]
    line: Option<u32>,
    #[serde(default)]
    endpoints: Vec<String>,

    #[serde(default)]
    unique_id_from_tool: Option<String>,
    #[serde(default)]
    vuln_id_from_tool: Option<String>,

    #[serde(default)]
    active: Option<bool>,
    #[serde(default)]
    verified: Option<bool>,
    #[serde(default)]
    false_p: Option<bool>,
    #[serde(default)]
    duplicate: Option<bool>,
    #[serde(default)]
    out_of_scope: Option<bool>,
    #[serde(default)]
    risk_accepted: Option<bool>,
    #[serde(default)]
    is_mitigated: Option<bool>,
    #[serde(default)]
    static_finding: Option<bool>,
    #[serde(default)]
    dynamic_finding: Option<bool>,

    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    service: Option<String>,
    #[serde(default)]
    nb_occurences: Option<u32>,
}

fn parse_json(data: &[u8]) -> ParserResult<Vec<Finding>> {
    let report: GenericReport = serde_json::from_slice(data)?;
    Ok(report.findings.into_iter().map(convert).collect())
}

fn convert(entry: GenericFinding) -> Finding {
    let mut finding = Finding::new(entry.title, Severity::sanitize(&entry.severity));

    finding.description = entry.description;
    finding.mitigation = entry.mitigation;
    finding.impact = entry.impact;
    finding.references = entry.references;
    finding.severity_justification = entry.severity_justification;
    finding.cwe = entry.cwe;
    finding.cvssv3 = entry.cvssv3;
    finding.cvssv3_score = entry.cvssv3_score;
    finding.epss_score = entry.epss_score;
    finding.epss_percentile = entry.epss_percentile;
    finding.component_name = entry.component_name;
    finding.component_version = entry.component_version;
    finding.file_path = entry.file_path;
    finding.line = entry.line;
    finding.unique_id_from_tool = entry.unique_id_from_tool;
    finding.vuln_id_from_tool = entry.vuln_id_from_tool;
    finding.service = entry.service;
    finding.nb_occurences = entry.nb_occurences;

    if let Some(raw) = &entry.date {
        finding.date = parse_report_date(raw);
        if finding.date.is_none() {
            warn!(date = raw.as_str(), "ignoring unparseable finding date");
        }
    }

    // The legacy single-cve key comes first so it stays the primary id.
    if let Some(cve) = entry.cve {
        finding.vulnerability_ids.push(cve);
    }
    for id in entry.vulnerability_ids {
        if !finding.vulnerability_ids.contains(&id) {
            finding.vulnerability_ids.push(id);
        }
    }

    for raw in &entry.endpoints {
        match raw.parse::<Endpoint>() {
            Ok(endpoint) => finding.endpoints.push(endpoint),
            Err(err) => warn!(endpoint = raw.as_str(), %err, "skipping endpoint"),
        }
    }

    match Tags::parse(&entry.tags) {
        Ok(tags) => finding.tags = tags,
        Err(err) => warn!(%err, "skipping finding tags"),
    }

    if let Some(active) = entry.active {
        finding.active = active;
    }
    if let Some(verified) = entry.verified {
        finding.verified = verified;
    }
    if let Some(false_p) = entry.false_p {
        finding.false_p = false_p;
    }
    if let Some(duplicate) = entry.duplicate {
        finding.duplicate = duplicate;
    }
    if let Some(out_of_scope) = entry.out_of_scope {
        finding.out_of_scope = out_of_scope;
    }
    if let Some(risk_accepted) = entry.risk_accepted {
        finding.risk_accepted = risk_accepted;
    }
    if let Some(is_mitigated) = entry.is_mitigated {
        finding.is_mitigated = is_mitigated;
    }
    if let Some(static_finding) = entry.static_finding {
        finding.static_finding = static_finding;
    }
    if let Some(dynamic_finding) = entry.dynamic_finding {
        finding.dynamic_finding = dynamic_finding;
    }

    finding
}
