//! CSV export of an OpenVAS report.
//!
//! Columns are matched by lowercase header name, so column order and
//! customized exports do not break the import. Unknown columns are ignored.

use std::collections::HashSet;

use vigil_model::{Endpoint, Finding, FindingHash, Severity};

use crate::date::parse_report_date;
use crate::error::{ParserError, ParserResult};
use crate::openvas::CVE_RE;

pub(super) fn parse(content: &str) -> ParserResult<Vec<Finding>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut headers: Vec<String> = Vec::new();
    let mut findings: Vec<Finding> = Vec::new();
    let mut seen: HashSet<FindingHash> = HashSet::new();

    for (row_number, record) in reader.records().enumerate() {
        let record = record?;
        if row_number == 0 {
            headers = record.iter().map(|h| h.trim().to_ascii_lowercase()).collect();
            continue;
        }
        let col = |name: &str| -> Option<&str> {
            headers.iter().position(|h| h == name).and_then(|i| record.get(i))
        };

        let mut finding = Finding::new(
            col("nvt name").unwrap_or_default(),
            match col("severity") {
                Some(raw) if is_valid_severity(raw) => raw
                    .parse::<Severity>()
                    .map_err(|_| ParserError::Malformed(format!("bad severity: {raw}")))?,
                _ => Severity::Info,
            },
        );

        if let Some(raw) = col("timestamp") {
            finding.date = parse_report_date(raw);
        }
        if let Some(raw) = col("cweid") {
            if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
                finding.cwe = raw.parse::<u32>().ok();
            }
        }
        if let Some(raw) = col("cvss") {
            if !raw.is_empty() {
                let score = raw
                    .parse::<f64>()
                    .map_err(|_| ParserError::Malformed(format!("invalid cvss score: {raw}")))?;
                finding.cvssv3_score = Some(score);
            }
        }

        let mut description = col("summary").unwrap_or_default().to_string();
        finding.mitigation = col("solution").map(str::to_string).filter(|s| !s.is_empty());
        finding.impact = col("vulnerability insight")
            .map(str::to_string)
            .filter(|s| !s.is_empty());
        finding.references = col("specific result")
            .map(str::to_string)
            .filter(|s| !s.is_empty());

        if let Some(flag) = col("active").and_then(evaluate_bool) {
            finding.active = flag;
        }
        if let Some(flag) = col("verified").and_then(evaluate_bool) {
            finding.verified = flag;
        }
        if let Some(flag) = col("falsepositive").and_then(evaluate_bool) {
            finding.false_p = flag;
        }
        if let Some(flag) = col("duplicate").and_then(evaluate_bool) {
            finding.duplicate = flag;
        }

        // CVE lists come either as an explicit column or embedded in the oid.
        if let Some(raw) = col("cves") {
            if !raw.is_empty() {
                if raw.contains(',') {
                    description.push_str("\n**All CVEs:** ");
                    description.push_str(raw);
                    for cve in raw.split(',') {
                        finding.vulnerability_ids.push(cve.to_string());
                    }
                } else {
                    finding.vulnerability_ids.push(raw.to_string());
                }
            }
        }
        if let Some(oid) = col("nvt oid") {
            for m in CVE_RE.find_iter(oid) {
                finding.vulnerability_ids.push(m.as_str().to_string());
            }
        }

        // The hostname wins over the raw ip; values are trimmed because some
        // exports pad them (greenbone/gvmd#2378).
        let hostname = col("hostname").map(str::trim).filter(|h| !h.is_empty());
        let ip = col("ip").map(str::trim).filter(|h| !h.is_empty());
        if let Some(host) = hostname.or(ip) {
            let mut endpoint = Endpoint::from_host(host);
            if let Some(raw) = col("port") {
                if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
                    endpoint.port = raw.parse::<u16>().ok();
                }
            }
            endpoint.protocol = col("port protocol")
                .map(str::to_string)
                .filter(|p| !p.is_empty());
            finding.endpoints.push(endpoint);
        }
        if let Some(ip) = ip {
            description.push_str("\n**IP**: ");
            description.push_str(ip);
        }
        finding.description = Some(description.clone());

        // Exports repeat one result per affected target detail; keep the
        // first occurrence of each endpoint/severity/title/description tuple.
        let endpoint_repr = finding
            .endpoints
            .first()
            .map(|e| e.to_string())
            .unwrap_or_default();
        let severity_repr = finding.severity.to_string();
        let key = FindingHash::of_fields([
            endpoint_repr.as_str(),
            severity_repr.as_str(),
            finding.title.as_str(),
            description.as_str(),
        ]);
        if seen.insert(key) {
            findings.push(finding);
        }
    }

    Ok(findings)
}

fn is_valid_severity(raw: &str) -> bool {
    matches!(raw, "Info" | "Low" | "Medium" | "High" | "Critical")
}

fn evaluate_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}
