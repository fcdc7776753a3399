//! Twistlock / Prisma Cloud image scans, twistcli JSON or CSV export.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use serde_json::Value;

use vigil_model::{DedupeAlgorithm, Finding, FindingHash, HashField, Severity};

use crate::error::{ParserError, ParserResult};
use crate::file::{ReportFile, ReportFormat};
use crate::registry::ReportParser;
use crate::text::{shorten, title_case, value_text};

#[derive(Debug)]
pub struct TwistlockParser;

impl ReportParser for TwistlockParser {
    fn scan_type(&self) -> &'static str {
        "Twistlock Image Scan"
    }

    fn description(&self) -> &'static str {
        "JSON output of twistcli image scan or CSV."
    }

    fn parse(&self, file: &ReportFile) -> ParserResult<Vec<Finding>> {
        match file.format() {
            ReportFormat::Json => parse_json(&file.data),
            ReportFormat::Csv => parse_csv(file.text()?),
            ReportFormat::Xml => Err(ParserError::UnknownFileFormat),
        }
    }

    fn hash_fields(&self) -> &'static [HashField] {
        &[
            HashField::Title,
            HashField::Severity,
            HashField::ComponentName,
            HashField::ComponentVersion,
        ]
    }

    fn dedupe_algorithm(&self) -> DedupeAlgorithm {
        DedupeAlgorithm::HashCode
    }
}

#[derive(Deserialize)]
struct TwistlockReport {
    #[serde(default)]
    results: Vec<TwistlockResult>,
}

#[derive(Deserialize)]
struct TwistlockResult {
    #[serde(default)]
    vulnerabilities: Vec<TwistlockVulnerability>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TwistlockVulnerability {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    package_name: Option<String>,
    #[serde(default)]
    package_version: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    vector: Option<String>,
    #[serde(default)]
    status: Option<String>,
    /// Number in recent twistcli versions, string in older ones.
    #[serde(default)]
    cvss: Option<Value>,
    /// Free-form map of risk factor labels.
    #[serde(default)]
    risk_factors: Option<Value>,
}

fn parse_json(data: &[u8]) -> ParserResult<Vec<Finding>> {
    let report: TwistlockReport = serde_json::from_slice(data)?;

    // Same vulnerability ids recur across layers. The last occurrence wins
    // but keeps the position of the first.
    let mut findings: Vec<Finding> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();

    let Some(result) = report.results.first() else {
        return Ok(findings);
    };
    for node in &result.vulnerabilities {
        let key = format!(
            "{}{}{}{}",
            node.id.as_deref().unwrap_or_default(),
            node.package_name.as_deref().unwrap_or_default(),
            node.package_version.as_deref().unwrap_or_default(),
            node.severity.as_deref().unwrap_or_default(),
        );
        let finding = convert_json_item(node);
        match by_key.get(&key) {
            Some(&at) => findings[at] = finding,
            None => {
                by_key.insert(key, findings.len());
                findings.push(finding);
            }
        }
    }
    Ok(findings)
}

fn convert_json_item(node: &TwistlockVulnerability) -> Finding {
    let severity = node
        .severity
        .as_deref()
        .map(Severity::sanitize)
        .unwrap_or(Severity::Info);
    let id = node.id.as_deref().unwrap_or("Unknown Vulnerability");
    let package_name = node.package_name.as_deref().unwrap_or("Unknown Package");
    let package_version = node.package_version.as_deref().unwrap_or_default();

    let vector = node
        .vector
        .as_deref()
        .unwrap_or("CVSS vector not provided. ");
    let cvss = node
        .cvss
        .as_ref()
        .map(value_text)
        .unwrap_or_else(|| "No CVSS score yet.".to_string());
    let risk_factors = node
        .risk_factors
        .as_ref()
        .map(value_text)
        .unwrap_or_else(|| "No risk factors.".to_string());

    let mut finding = Finding::new(format!("{id}: {package_name} - {package_version}"), severity);
    finding.description = Some(
        format!(
            "{}<p> Vulnerable Package: {}</p><p> Current Version: {}</p>",
            node.description.as_deref().unwrap_or_default(),
            node.package_name.as_deref().unwrap_or_default(),
            node.package_version.as_deref().unwrap_or_default(),
        )
        .trim()
        .to_string(),
    );
    finding.mitigation = node
        .status
        .as_deref()
        .map(title_case)
        .filter(|s| !s.is_empty());
    finding.references = node.link.clone();
    finding.component_name = node.package_name.clone().filter(|s| !s.is_empty());
    finding.component_version = node.package_version.clone().filter(|s| !s.is_empty());
    finding.severity_justification =
        Some(format!("{vector} (CVSS v3 base score: {cvss})\n\n{risk_factors}"));
    finding.impact = Some(severity.to_string());
    if let Some(id) = &node.id {
        finding.vulnerability_ids.push(id.clone());
    }
    finding
}

fn parse_csv(content: &str) -> ParserResult<Vec<Finding>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());
    let headers = reader.headers()?.clone();

    let mut findings: Vec<Finding> = Vec::new();
    let mut seen: HashSet<FindingHash> = HashSet::new();

    for record in reader.records() {
        let record = record?;
        let col = |name: &str| -> &str {
            headers
                .iter()
                .position(|h| h == name)
                .and_then(|i| record.get(i))
                .unwrap_or_default()
        };

        let vulnerability_id = col("CVE ID");
        let package_name = col("Packages");
        let package_version = col("Package Version");
        let description = col("Description");

        let title = if !vulnerability_id.is_empty() && !package_name.is_empty() {
            format!("{vulnerability_id}: {package_name} - {package_version}")
        } else if !package_name.is_empty() && !package_version.is_empty() {
            format!("{package_name} - {package_version}")
        } else {
            description.to_string()
        };

        let mut finding = Finding::new(shorten(&title, 255), Severity::sanitize(col("Severity")));
        finding.description = Some(
            format!(
                "{description}<p> Vulnerable Package: {package_name}</p><p> Current Version: {package_version}</p>"
            )
            .trim()
            .to_string(),
        );
        finding.mitigation = Some(col("Fix Status").to_string()).filter(|s| !s.is_empty());
        finding.component_name =
            Some(shorten(package_name, 200)).filter(|s| !s.is_empty());
        finding.component_version = Some(package_version.to_string()).filter(|s| !s.is_empty());
        finding.severity_justification =
            Some(format!("(CVSS v3 base score: {})", col("CVSS")));
        finding.impact = Some(col("Severity").to_string()).filter(|s| !s.is_empty());
        if !vulnerability_id.is_empty() {
            finding.vulnerability_ids.push(vulnerability_id.to_string());
        }

        let severity = finding.severity.to_string();
        let key = FindingHash::of_fields([
            severity.as_str(),
            finding.title.as_str(),
            finding.description.as_deref().unwrap_or_default(),
        ]);
        if seen.insert(key) {
            findings.push(finding);
        }
    }
    Ok(findings)
}
