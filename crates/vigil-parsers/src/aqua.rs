//! Aqua Security scans in JSON, three report layouts.
//!
//! Image scans nest vulnerabilities under `resources[]`, the older v2 format
//! lists `cves[]`, and exports taken over the Aqua API carry a `result[]`
//! array of vulnerabilities with their resource inlined.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use vigil_model::{DedupeAlgorithm, Finding, HashField, Severity};

use crate::error::{ParserError, ParserResult};
use crate::file::{ReportFile, ReportFormat};
use crate::registry::ReportParser;
use crate::text::value_text;

#[derive(Debug)]
pub struct AquaParser;

impl ReportParser for AquaParser {
    fn scan_type(&self) -> &'static str {
        "Aqua Scan"
    }

    fn description(&self) -> &'static str {
        "Aqua image scans, v2 scans or API exports, in JSON format."
    }

    fn parse(&self, file: &ReportFile) -> ParserResult<Vec<Finding>> {
        match file.format() {
            ReportFormat::Json => parse_json(&file.data),
            ReportFormat::Xml | ReportFormat::Csv => Err(ParserError::UnknownFileFormat),
        }
    }

    fn hash_fields(&self) -> &'static [HashField] {
        &[
            HashField::Severity,
            HashField::VulnerabilityIds,
            HashField::ComponentName,
            HashField::ComponentVersion,
        ]
    }

    fn dedupe_algorithm(&self) -> DedupeAlgorithm {
        DedupeAlgorithm::HashCode
    }
}

#[derive(Deserialize)]
struct AquaReport {
    #[serde(default)]
    resources: Option<Vec<AquaResourceNode>>,
    #[serde(default)]
    cves: Option<Vec<AquaCve>>,
    #[serde(default)]
    result: Option<Vec<AquaApiVulnerability>>,
}

#[derive(Deserialize)]
struct AquaResourceNode {
    #[serde(default)]
    resource: AquaResource,
    #[serde(default)]
    vulnerabilities: Vec<AquaVulnerability>,
}

#[derive(Deserialize, Default)]
struct AquaResource {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    cpe: Option<String>,
}

#[derive(Deserialize)]
struct AquaVulnerability {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    fix_version: Option<String>,
    #[serde(default)]
    nvd_url: Option<String>,
    #[serde(default)]
    vendor_url: Option<String>,
    #[serde(default)]
    aqua_severity: Option<String>,
    #[serde(default)]
    aqua_severity_classification: Option<String>,
    #[serde(default)]
    aqua_scoring_system: Option<String>,
    #[serde(default)]
    aqua_score: Option<Value>,
    #[serde(default)]
    vendor_score: Option<Value>,
    #[serde(default)]
    nvd_score_v3: Option<Value>,
    #[serde(default)]
    nvd_score: Option<Value>,
    #[serde(default)]
    nvd_vectors_v3: Option<String>,
    #[serde(default)]
    nvd_vectors: Option<String>,
    #[serde(default)]
    epss_score: Option<f64>,
    #[serde(default)]
    epss_percentile: Option<f64>,
}

#[derive(Deserialize)]
struct AquaCve {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    solution: Option<String>,
    #[serde(default)]
    fix_version: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Deserialize)]
struct AquaApiVulnerability {
    #[serde(default)]
    resource: AquaResource,
    #[serde(flatten)]
    vulnerability: AquaVulnerability,
}

fn parse_json(data: &[u8]) -> ParserResult<Vec<Finding>> {
    let report: AquaReport = serde_json::from_slice(data)?;

    // Every layout deduplicates the same way: the last occurrence of a key
    // wins but keeps the position of the first.
    let mut findings: Vec<Finding> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();

    if let Some(resources) = &report.resources {
        for node in resources {
            for vulnerability in &node.vulnerabilities {
                let key = resource_key(&node.resource, vulnerability);
                let finding = image_finding(&node.resource, vulnerability);
                insert_replacing(&mut findings, &mut by_key, key, finding);
            }
        }
    } else if let Some(cves) = &report.cves {
        for cve in cves {
            let key = format!(
                "{}|{}",
                cve.file.as_deref().unwrap_or_default(),
                cve.name.as_deref().unwrap_or_default()
            );
            insert_replacing(&mut findings, &mut by_key, key, v2_finding(cve));
        }
    } else if let Some(result) = &report.result {
        for entry in result {
            let key = resource_key(&entry.resource, &entry.vulnerability);
            let finding = image_finding(&entry.resource, &entry.vulnerability);
            insert_replacing(&mut findings, &mut by_key, key, finding);
        }
    }

    Ok(findings)
}

fn insert_replacing(
    findings: &mut Vec<Finding>,
    by_key: &mut HashMap<String, usize>,
    key: String,
    finding: Finding,
) {
    match by_key.get(&key) {
        Some(&at) => findings[at] = finding,
        None => {
            by_key.insert(key, findings.len());
            findings.push(finding);
        }
    }
}

fn resource_key(resource: &AquaResource, vulnerability: &AquaVulnerability) -> String {
    let identity = resource
        .cpe
        .as_deref()
        .or(resource.name.as_deref())
        .or(resource.path.as_deref())
        .unwrap_or_default();
    format!(
        "{identity}|{}",
        vulnerability.name.as_deref().unwrap_or_default()
    )
}

fn image_finding(resource: &AquaResource, vulnerability: &AquaVulnerability) -> Finding {
    let resource_name = resource.name.as_deref().or(resource.path.as_deref());
    // Sensitive-file findings have no version; the path identifies them.
    let parenthetical = resource.version.as_deref().or(resource.path.as_deref());
    let vulnerability_name = vulnerability.name.as_deref().unwrap_or_default();

    let severity;
    let used_for_classification;
    if let Some(aqua_severity) = &vulnerability.aqua_severity {
        severity = Severity::sanitize(aqua_severity);
        used_for_classification =
            format!("Aqua severity ({aqua_severity}) used for classification.\n");
    } else if let Some(score) = &vulnerability.aqua_score {
        severity = severity_of(score.as_f64().unwrap_or_default());
        used_for_classification =
            format!("Aqua score ({}) used for classification.\n", value_text(score));
    } else if let Some(score) = &vulnerability.vendor_score {
        severity = severity_of(score.as_f64().unwrap_or_default());
        used_for_classification =
            format!("Vendor score ({}) used for classification.\n", value_text(score));
    } else if let Some(score) = &vulnerability.nvd_score_v3 {
        severity = severity_of(score.as_f64().unwrap_or_default());
        used_for_classification =
            format!("NVD score v3 ({}) used for classification.\n", value_text(score));
    } else if let Some(score) = &vulnerability.nvd_score {
        severity = severity_of(score.as_f64().unwrap_or_default());
        used_for_classification =
            format!("NVD score v2 ({}) used for classification.\n", value_text(score));
    } else {
        severity = Severity::Info;
        used_for_classification = String::new();
    }

    let mut finding = Finding::new(
        format!(
            "{vulnerability_name} - {} ({}) ",
            resource_name.unwrap_or_default(),
            parenthetical.unwrap_or_default()
        ),
        severity,
    );
    finding.description = vulnerability.description.clone();
    finding.mitigation = vulnerability.fix_version.clone();
    finding.component_name = resource.name.clone();
    finding.component_version = resource.version.clone();
    finding.cvssv3 = vulnerability.nvd_vectors_v3.clone();
    finding.epss_score = vulnerability.epss_score;
    finding.epss_percentile = vulnerability.epss_percentile;

    let mut references = String::new();
    if let Some(url) = &vulnerability.nvd_url {
        references.push('\n');
        references.push_str(url);
    }
    if let Some(url) = &vulnerability.vendor_url {
        references.push('\n');
        references.push_str(url);
    }
    finding.references = Some(references).filter(|r| !r.is_empty());

    // All scoring inputs land in the justification, whichever one decided.
    finding.severity_justification = Some(format!(
        "\nAqua severity classification: {}\nAqua scoring system: {}\nAqua score: {}\nVendor score: {}\nNVD v3 vectors: {}\nNVD v2 vectors: {}\n{}",
        text_or_none(&vulnerability.aqua_severity_classification),
        text_or_none(&vulnerability.aqua_scoring_system),
        score_or_none(&vulnerability.aqua_score),
        score_or_none(&vulnerability.vendor_score),
        text_or_none(&vulnerability.nvd_vectors_v3),
        text_or_none(&vulnerability.nvd_vectors),
        used_for_classification,
    ));

    if let Some(name) = &vulnerability.name {
        finding.vulnerability_ids.push(name.clone());
    }
    finding
}

fn v2_finding(cve: &AquaCve) -> Finding {
    let severity = match &cve.severity {
        Some(name) => Severity::sanitize(name),
        None => severity_of(cve.score.unwrap_or_default()),
    };

    let mut finding = Finding::new(
        format!(
            "{}: {}",
            cve.name.as_deref().unwrap_or_default(),
            cve.file.as_deref().unwrap_or_default()
        ),
        severity,
    );
    finding.description = cve.description.clone();
    finding.mitigation = Some(match (&cve.solution, &cve.fix_version) {
        (Some(solution), _) => solution.clone(),
        (None, Some(fix_version)) => format!("Upgrade to {fix_version}"),
        (None, None) => "No known mitigation".to_string(),
    });
    finding.references = cve.url.clone();
    finding.file_path = cve.file.clone();
    if let Some(name) = &cve.name {
        finding.vulnerability_ids.push(name.clone());
    }
    finding
}

fn severity_of(score: f64) -> Severity {
    if score >= 9.0 {
        Severity::Critical
    } else if score >= 7.0 {
        Severity::High
    } else if score >= 4.0 {
        Severity::Medium
    } else if score > 0.0 {
        Severity::Low
    } else {
        Severity::Info
    }
}

fn text_or_none(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("None")
}

fn score_or_none(value: &Option<Value>) -> String {
    value
        .as_ref()
        .map(value_text)
        .unwrap_or_else(|| "None".to_string())
}

#[cfg(test)]
mod tests {
    use vigil_model::Severity;

    use super::parse_json;

    const ONE_VULN: &str = r#"{
      "resources": [{
        "resource": {
          "name": "musl",
          "version": "1.1.20-r4",
          "cpe": "pkg:/alpine:3.9.2:musl:1.1.20-r4",
          "path": ""
        },
        "vulnerabilities": [{
          "name": "CVE-2019-14697",
          "description": "musl libc through 1.1.23 has an x87 floating-point stack adjustment imbalance, related to the math/i386/ directory. In some cases, use of this library could introduce out-of-bounds writes that are not present in an application's source code.",
          "nvd_score": 7.5,
          "nvd_score_v3": 9.8,
          "nvd_vectors": "AV:N/AC:L/Au:N/C:P/I:P/A:P",
          "nvd_vectors_v3": "CVSS:3.0/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H",
          "nvd_url": "https://web.nvd.nist.gov/view/vuln/detail?vulnId=CVE-2019-14697",
          "aqua_score": 7.5,
          "vendor_score": 7.5,
          "aqua_severity": "high",
          "aqua_scoring_system": "CVSS V2",
          "fix_version": "1.1.20-r5"
        }]
      }]
    }"#;

    #[test]
    fn image_scan_one_vuln() {
        let findings = parse_json(ONE_VULN.as_bytes()).unwrap();
        assert_eq!(findings.len(), 1);

        let finding = &findings[0];
        assert_eq!(finding.title, "CVE-2019-14697 - musl (1.1.20-r4) ");
        assert_eq!(finding.severity, Severity::High);
        assert_eq!(
            finding.cvssv3.as_deref(),
            Some("CVSS:3.0/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H")
        );
        assert_eq!(finding.mitigation.as_deref(), Some("1.1.20-r5"));
        assert_eq!(finding.component_name.as_deref(), Some("musl"));
        assert_eq!(finding.component_version.as_deref(), Some("1.1.20-r4"));
        assert_eq!(finding.vulnerability_ids, vec!["CVE-2019-14697"]);
        assert_eq!(
            finding.references.as_deref(),
            Some("\nhttps://web.nvd.nist.gov/view/vuln/detail?vulnId=CVE-2019-14697")
        );

        let expected_justification = "\nAqua severity classification: None\nAqua scoring system: CVSS V2\nAqua score: 7.5\nVendor score: 7.5\nNVD v3 vectors: CVSS:3.0/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H\nNVD v2 vectors: AV:N/AC:L/Au:N/C:P/I:P/A:P\nAqua severity (high) used for classification.\n";
        assert_eq!(
            finding.severity_justification.as_deref(),
            Some(expected_justification)
        );
    }

    #[test]
    fn sensitive_file_title_falls_back_to_path() {
        let report = r#"{
          "resources": [{
            "resource": {
              "name": "server.key",
              "path": "/juice-shop/node_modules/node-gyp/test/fixtures/server.key"
            },
            "vulnerabilities": [{"name": "server.key", "aqua_severity": "critical"}]
          }]
        }"#;
        let findings = parse_json(report.as_bytes()).unwrap();
        assert_eq!(
            findings[0].title,
            "server.key - server.key (/juice-shop/node_modules/node-gyp/test/fixtures/server.key) "
        );
    }

    #[test]
    fn aqua_severities_map_with_negligible_as_info() {
        let report = r#"{
          "resources": [{
            "resource": {"name": "libfoo", "version": "1"},
            "vulnerabilities": [
              {"name": "CVE-1", "aqua_severity": "critical"},
              {"name": "CVE-2", "aqua_severity": "high"},
              {"name": "CVE-3", "aqua_severity": "medium"},
              {"name": "CVE-4", "aqua_severity": "low"},
              {"name": "CVE-5", "aqua_severity": "negligible"}
            ]
          }]
        }"#;
        let findings = parse_json(report.as_bytes()).unwrap();
        let severities: Vec<Severity> = findings.iter().map(|f| f.severity).collect();
        assert_eq!(
            severities,
            vec![
                Severity::Critical,
                Severity::High,
                Severity::Medium,
                Severity::Low,
                Severity::Info,
            ]
        );
    }

    #[test]
    fn score_chain_prefers_aqua_then_vendor_then_nvd() {
        let report = r#"{
          "resources": [{
            "resource": {"name": "libfoo", "version": "1"},
            "vulnerabilities": [
              {"name": "CVE-1", "aqua_score": 9.1, "vendor_score": 1.0, "nvd_score_v3": 1.0},
              {"name": "CVE-2", "vendor_score": 7.2, "nvd_score_v3": 1.0},
              {"name": "CVE-3", "nvd_score_v3": 5.0},
              {"name": "CVE-4", "nvd_score": 2.2},
              {"name": "CVE-5"}
            ]
          }]
        }"#;
        let findings = parse_json(report.as_bytes()).unwrap();
        let severities: Vec<Severity> = findings.iter().map(|f| f.severity).collect();
        assert_eq!(
            severities,
            vec![
                Severity::Critical,
                Severity::High,
                Severity::Medium,
                Severity::Low,
                Severity::Info,
            ]
        );
        assert!(
            findings[0]
                .severity_justification
                .as_deref()
                .unwrap()
                .ends_with("Aqua score (9.1) used for classification.\n")
        );
    }

    #[test]
    fn repeated_resource_vulnerability_pairs_collapse() {
        let report = r#"{
          "resources": [
            {
              "resource": {"name": "musl", "version": "1", "cpe": "cpe:musl"},
              "vulnerabilities": [{"name": "CVE-1", "description": "first"}]
            },
            {
              "resource": {"name": "musl", "version": "1", "cpe": "cpe:musl"},
              "vulnerabilities": [{"name": "CVE-1", "description": "second"}]
            }
          ]
        }"#;
        let findings = parse_json(report.as_bytes()).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].description.as_deref(), Some("second"));
    }

    #[test]
    fn epss_fields_land_on_the_finding() {
        let report = r#"{
          "resources": [{
            "resource": {"name": "openssl", "version": "3.0.2"},
            "vulnerabilities": [{
              "name": "CVE-2022-1",
              "aqua_severity": "low",
              "epss_score": 0.0006,
              "epss_percentile": 0.23474
            }]
          }]
        }"#;
        let findings = parse_json(report.as_bytes()).unwrap();
        assert_eq!(findings[0].epss_score, Some(0.0006));
        assert_eq!(findings[0].epss_percentile, Some(0.23474));
    }

    #[test]
    fn v2_layout_builds_title_and_mitigation() {
        let report = r#"{
          "cves": [{
            "name": "CVE-2019-15601",
            "file": "curl",
            "score": 6.4,
            "description": "CURL before 7.68.0 lacks proper input validation, which allows users to create a `FILE:` URL that can make the client access a remote file using SMB (Windows-only issue).",
            "solution": "Upgrade to curl 7.68.0"
          }]
        }"#;
        let findings = parse_json(report.as_bytes()).unwrap();
        assert_eq!(findings.len(), 1);

        let finding = &findings[0];
        assert_eq!(finding.title, "CVE-2019-15601: curl");
        assert_eq!(finding.severity, Severity::Medium);
        assert_eq!(finding.mitigation.as_deref(), Some("Upgrade to curl 7.68.0"));
        assert_eq!(finding.vulnerability_ids, vec!["CVE-2019-15601"]);
        // v2 entries never carry a vector.
        assert!(finding.cvssv3.is_none());
    }

    #[test]
    fn v2_mitigation_fallbacks() {
        let report = r#"{
          "cves": [
            {"name": "CVE-1", "file": "a", "score": 2.0, "fix_version": "1.2.3"},
            {"name": "CVE-2", "file": "b", "score": 2.0}
          ]
        }"#;
        let findings = parse_json(report.as_bytes()).unwrap();
        assert_eq!(findings[0].mitigation.as_deref(), Some("Upgrade to 1.2.3"));
        assert_eq!(
            findings[1].mitigation.as_deref(),
            Some("No known mitigation")
        );
    }

    #[test]
    fn api_export_layout_inlines_resources() {
        let report = r#"{
          "count": 2,
          "result": [
            {
              "resource": {"name": "zlib", "version": "1.2.11"},
              "name": "CVE-2018-25032",
              "aqua_severity": "high",
              "fix_version": "1.2.12"
            },
            {
              "resource": {"name": "busybox", "version": "1.35.0"},
              "name": "CVE-2022-30065",
              "aqua_severity": "medium"
            }
          ]
        }"#;
        let findings = parse_json(report.as_bytes()).unwrap();
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].title, "CVE-2018-25032 - zlib (1.2.11) ");
        assert_eq!(findings[0].mitigation.as_deref(), Some("1.2.12"));
        assert_eq!(findings[1].severity, Severity::Medium);
    }

    #[test]
    fn unknown_layout_is_empty() {
        assert!(parse_json(b"{}").unwrap().is_empty());
        assert!(parse_json(br#"{"image": "alpine"}"#).unwrap().is_empty());
    }
}
