//! XML export of a Greenbone OpenVAS report.

use roxmltree::Document;
use vigil_model::{Endpoint, Finding, Severity};

use crate::error::{ParserError, ParserResult};
use crate::openvas::CVE_RE;

pub(super) fn parse(content: &str) -> ParserResult<Vec<Finding>> {
    let doc = Document::parse(content)?;
    let root = doc.root_element();
    if !root.tag_name().name().contains("report") {
        return Err(ParserError::Malformed(
            "not a Greenbone OpenVAS report".to_string(),
        ));
    }
    let Some(results) = root.descendants().find(|n| n.has_tag_name("results")) else {
        return Ok(Vec::new());
    };

    let mut findings = Vec::new();
    for result in results.children().filter(|n| n.has_tag_name("result")) {
        let mut title = String::new();
        let mut description: Vec<String> = Vec::new();
        let mut severity = Severity::Info;
        let mut endpoint: Option<Endpoint> = None;
        let mut script_id: Option<String> = None;
        let mut cves: Vec<String> = Vec::new();

        for field in result.children().filter(|n| n.is_element()) {
            // Elements like <host> carry child elements after their text, so
            // only the leading text node counts.
            let text = field.text().unwrap_or_default();
            match field.tag_name().name() {
                "name" => {
                    title = text.to_string();
                    description.push(format!("**Name**: {text}"));
                }
                "host" => {
                    title.push('_');
                    title.push_str(text);
                    description.push(format!("**Host**: {text}"));
                    // Exports pad host values (greenbone/gvmd#2378).
                    let host = text.trim();
                    if !host.is_empty() {
                        endpoint = Some(Endpoint::from_host(host));
                    }
                }
                "port" => {
                    title.push('_');
                    title.push_str(text);
                    description.push(format!("**Port**: {text}"));
                    // Ports come as "512/tcp"; synthetic ones as "general/tcp".
                    if let (Some(endpoint), Some((port, protocol))) =
                        (endpoint.as_mut(), text.split_once('/'))
                    {
                        if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) {
                            endpoint.port = port.parse::<u16>().ok();
                        }
                        if !protocol.is_empty() {
                            endpoint.protocol = Some(protocol.to_string());
                        }
                    }
                }
                "severity" => {
                    severity = severity_from_score(text)?;
                    description.push(format!("**Severity**: {text}"));
                }
                "qod" => description.push(format!("**QOD**: {text}")),
                "description" => description.push(format!("**Description**: {text}")),
                "nvt" => {
                    if let Some(oid) = field.attribute("oid") {
                        script_id = Some(oid.to_string());
                        cves.extend(CVE_RE.find_iter(oid).map(|m| m.as_str().to_string()));
                    }
                }
                _ => {}
            }
        }

        let mut finding = Finding::new(title, severity);
        finding.description = Some(description.join("\n"));
        finding.vuln_id_from_tool = script_id;
        finding.vulnerability_ids = cves;
        if let Some(endpoint) = endpoint {
            finding.endpoints.push(endpoint);
        }
        findings.push(finding);
    }
    Ok(findings)
}

/// Map a CVSS base score to a severity bucket.
fn severity_from_score(raw: &str) -> ParserResult<Severity> {
    let score = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| ParserError::Malformed(format!("invalid severity score: {raw}")))?;
    Ok(if score == 0.0 {
        Severity::Info
    } else if score < 4.0 {
        Severity::Low
    } else if score < 7.0 {
        Severity::Medium
    } else if score < 9.0 {
        Severity::High
    } else {
        Severity::Critical
    })
}
