//! CycloneDX BOM XML.
//!
//! Two vulnerability layouts exist in the wild: the pre-1.4 extension
//! namespace nesting vulnerabilities under each component, and the 1.4+
//! `<vulnerabilities>` block at BOM level referencing components through
//! `affects/target/ref`. Both are handled; a single BOM may mix them.

use std::collections::HashMap;

use roxmltree::{Document, Node};
use time::Date;
use tracing::{debug, warn};

use vigil_model::{Finding, Severity};

use crate::cvss::CvssV3;
use crate::date::parse_report_date;
use crate::error::{ParserError, ParserResult};

const BOM_NS_PREFIX: &str = "http://cyclonedx.org/schema/bom/";
const VULN_NS: &str = "http://cyclonedx.org/schema/ext/vulnerability/1.0";

type BomRefs<'a> = HashMap<&'a str, (Option<&'a str>, Option<&'a str>)>;

pub(super) fn parse(content: &str) -> ParserResult<Vec<Finding>> {
    let doc = Document::parse(content)?;
    let root = doc.root_element();
    let bom_ns = root
        .tag_name()
        .namespace()
        .filter(|ns| ns.starts_with(BOM_NS_PREFIX))
        .ok_or_else(|| {
            ParserError::Malformed(format!(
                "not a CycloneDX BOM document (root element {:?})",
                root.tag_name().name()
            ))
        })?;

    let report_date = child(root, bom_ns, "metadata")
        .and_then(|metadata| child_text(metadata, bom_ns, "timestamp"))
        .and_then(parse_report_date);

    // First pass indexes every component by its bom-ref, so ad-hoc
    // vulnerabilities can point at components declared after them.
    let mut bom_refs: BomRefs = HashMap::new();
    if let Some(components) = child(root, bom_ns, "components") {
        for component in elements(components, bom_ns, "component") {
            if let Some(reference) = component.attribute("bom-ref") {
                bom_refs.insert(
                    reference,
                    (
                        child_text(component, bom_ns, "name"),
                        child_text(component, bom_ns, "version"),
                    ),
                );
            }
        }
    }

    let mut findings = Vec::new();

    // Legacy extension: vulnerabilities nested under their component.
    if let Some(components) = child(root, bom_ns, "components") {
        for component in elements(components, bom_ns, "component") {
            let name = child_text(component, bom_ns, "name");
            let version = child_text(component, bom_ns, "version");
            if let Some(vulnerabilities) = child(component, VULN_NS, "vulnerabilities") {
                for vulnerability in elements(vulnerabilities, VULN_NS, "vulnerability") {
                    findings.push(legacy_vulnerability(
                        vulnerability,
                        &bom_refs,
                        report_date,
                        Some((name, version)),
                    )?);
                }
            }
        }
    }

    // Legacy extension: ad-hoc vulnerabilities at BOM level.
    if let Some(vulnerabilities) = child(root, VULN_NS, "vulnerabilities") {
        for vulnerability in elements(vulnerabilities, VULN_NS, "vulnerability") {
            findings.push(legacy_vulnerability(
                vulnerability,
                &bom_refs,
                report_date,
                None,
            )?);
        }
    }

    // 1.4+ block.
    if let Some(vulnerabilities) = child(root, bom_ns, "vulnerabilities") {
        for vulnerability in elements(vulnerabilities, bom_ns, "vulnerability") {
            findings.extend(modern_vulnerability(
                vulnerability,
                bom_ns,
                &bom_refs,
                report_date,
            ));
        }
    }

    Ok(findings)
}

fn legacy_vulnerability(
    vulnerability: Node<'_, '_>,
    bom_refs: &BomRefs<'_>,
    report_date: Option<Date>,
    component: Option<(Option<&str>, Option<&str>)>,
) -> ParserResult<Finding> {
    let reference = vulnerability.attribute("ref");
    let vuln_id = child_text(vulnerability, VULN_NS, "id");
    let raw_severity = first_rating_severity(vulnerability, VULN_NS);

    // Only id and ref are mandatory by the extension schema.
    let description = match child_text(vulnerability, VULN_NS, "description") {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => [
            format!("**Ref:** {}", reference.unwrap_or_default()),
            format!("**Id:** {}", vuln_id.unwrap_or_default()),
            format!("**Severity:** {}", raw_severity.unwrap_or_default()),
        ]
        .join("\n"),
    };

    let (component_name, component_version) = match component {
        Some(pair) => pair,
        None => {
            let reference = reference.ok_or_else(|| {
                ParserError::Malformed("vulnerability without a ref attribute".to_string())
            })?;
            *bom_refs
                .get(reference)
                .ok_or_else(|| ParserError::Malformed(format!("unknown bom-ref: {reference}")))?
        }
    };

    let mut references = String::new();
    if let Some(advisories) = child(vulnerability, VULN_NS, "advisories") {
        for advisory in elements(advisories, VULN_NS, "advisory") {
            if let Some(text) = advisory.text() {
                references.push_str(text);
                references.push('\n');
            }
        }
    }

    let mut finding = Finding::new(
        format!(
            "{}:{} | {}",
            component_name.unwrap_or_default(),
            component_version.unwrap_or_default(),
            vuln_id.unwrap_or_default()
        ),
        fix_severity(raw_severity),
    );
    finding.description = Some(description);
    finding.references = Some(references).filter(|r| !r.is_empty());
    finding.component_name = component_name.map(str::to_string);
    finding.component_version = component_version.map(str::to_string);
    finding.vuln_id_from_tool = vuln_id.map(str::to_string);
    finding.nb_occurences = Some(1);
    finding.date = report_date;

    let mut mitigation = String::new();
    if let Some(recommendations) = child(vulnerability, VULN_NS, "recommendations") {
        for recommendation in elements(recommendations, VULN_NS, "recommendation") {
            if let Some(text) = recommendation.text() {
                mitigation.push_str(text);
                mitigation.push('\n');
            }
        }
    }
    if !mitigation.is_empty() {
        finding.mitigation = Some(mitigation);
    }

    if let Some((vector, severity)) = cvss_rating(vulnerability, VULN_NS, &["CVSSv3"]) {
        finding.cvssv3 = Some(vector);
        finding.severity = severity;
    }
    finding.cwe = first_cwe(vulnerability, VULN_NS);
    if let Some(id) = vuln_id {
        finding.vulnerability_ids.push(id.to_string());
    }
    Ok(finding)
}

fn modern_vulnerability(
    vulnerability: Node<'_, '_>,
    ns: &str,
    bom_refs: &BomRefs<'_>,
    report_date: Option<Date>,
) -> Vec<Finding> {
    let vuln_id = child_text(vulnerability, ns, "id");

    let mut description = child_text(vulnerability, ns, "description").map(str::to_string);
    if let Some(detail) = child_text(vulnerability, ns, "detail") {
        description = Some(match description {
            Some(text) => format!("{text}\n{detail}"),
            None => format!("\n{detail}"),
        });
    }

    let severity = fix_severity(first_rating_severity(vulnerability, ns));

    let mut references = String::new();
    if let Some(advisories) = child(vulnerability, ns, "advisories") {
        for advisory in elements(advisories, ns, "advisory") {
            if let Some(title) = child_text(advisory, ns, "title") {
                references.push_str(&format!("**Title:** {title}\n"));
            }
            if let Some(url) = child_text(advisory, ns, "url") {
                references.push_str(&format!("**URL:** {url}\n"));
            }
            references.push('\n');
        }
    }

    let mut vulnerability_ids: Vec<String> = Vec::new();
    if let Some(id) = vuln_id {
        vulnerability_ids.push(id.to_string());
    }
    if let Some(refs) = child(vulnerability, ns, "references") {
        for reference in elements(refs, ns, "reference") {
            if let Some(id) = child_text(reference, ns, "id") {
                vulnerability_ids.push(id.to_string());
            }
        }
    }

    let recommendation = child_text(vulnerability, ns, "recommendation");
    let cvss_override = cvss_rating(vulnerability, ns, &["CVSSv3", "CVSSv31"]);
    // The old extension namespace takes priority for CWEs even in 1.4 BOMs.
    let cwe = first_cwe(vulnerability, VULN_NS).or_else(|| first_cwe(vulnerability, ns));

    let mut is_mitigated = false;
    let mut false_p = false;
    let mut active = true;
    let mut analysis_detail = None;
    let analyses: Vec<Node> = vulnerability
        .children()
        .filter(|n| n.has_tag_name((ns, "analysis")))
        .collect();
    if let [analysis] = analyses.as_slice() {
        match child_text(*analysis, ns, "state") {
            Some("resolved" | "resolved_with_pedigree" | "not_affected") => {
                is_mitigated = true;
                active = false;
            }
            Some("false_positive") => {
                false_p = true;
                active = false;
            }
            _ => {}
        }
        if !active {
            analysis_detail = child_text(*analysis, ns, "detail");
        }
    }

    let mut findings = Vec::new();
    let Some(affects) = child(vulnerability, ns, "affects") else {
        return findings;
    };
    for target in elements(affects, ns, "target") {
        let Some(target_ref) = child_text(target, ns, "ref") else {
            continue;
        };
        let (component_name, component_version) = match bom_refs.get(target_ref) {
            Some(&pair) => pair,
            None => {
                warn!(reference = target_ref, "bom-ref not found among components");
                (None, None)
            }
        };

        let mut finding = Finding::new(
            format!(
                "{}:{} | {}",
                component_name.unwrap_or_default(),
                component_version.unwrap_or_default(),
                vuln_id.unwrap_or_default()
            ),
            severity,
        );
        finding.description = description.clone();
        finding.mitigation = recommendation.map(str::to_string);
        finding.references = Some(references.clone()).filter(|r| !r.is_empty());
        finding.component_name = component_name.map(str::to_string);
        finding.component_version = component_version.map(str::to_string);
        finding.static_finding = true;
        finding.dynamic_finding = false;
        finding.vuln_id_from_tool = vuln_id.map(str::to_string);
        finding.nb_occurences = Some(1);
        finding.vulnerability_ids = vulnerability_ids.clone();
        finding.date = report_date;
        if let Some((vector, severity)) = &cvss_override {
            finding.cvssv3 = Some(vector.clone());
            finding.severity = *severity;
        }
        finding.cwe = cwe;
        finding.is_mitigated = is_mitigated;
        finding.false_p = false_p;
        finding.active = active;
        if !active {
            if let Some(detail) = analysis_detail {
                let suffix =
                    format!("\n**This vulnerability is mitigated and/or suppressed:** {detail}\n");
                finding.mitigation = Some(match finding.mitigation.take() {
                    Some(mitigation) => mitigation + &suffix,
                    None => suffix,
                });
            }
        }
        findings.push(finding);
    }
    findings
}

/// Last parseable CVSS rating wins: normalized vector plus the severity,
/// either the rating's own or the one derived from the vector.
fn cvss_rating(
    vulnerability: Node<'_, '_>,
    ns: &str,
    methods: &[&str],
) -> Option<(String, Severity)> {
    let mut out = None;
    let ratings = child(vulnerability, ns, "ratings")?;
    for rating in elements(ratings, ns, "rating") {
        let method = child_text(rating, ns, "method").unwrap_or_default();
        if !methods.contains(&method) {
            continue;
        }
        let raw_vector = child_text(rating, ns, "vector").unwrap_or_default();
        let Some(cvss) = CvssV3::parse(raw_vector) else {
            debug!(vector = raw_vector, "dropping unparsable cvss vector");
            continue;
        };
        let severity = match child_text(rating, ns, "severity") {
            Some(text) if !text.is_empty() => fix_severity(Some(text)),
            _ => cvss.severity(),
        };
        out = Some((cvss.to_string(), severity));
    }
    out
}

fn first_rating_severity<'a>(vulnerability: Node<'a, '_>, ns: &str) -> Option<&'a str> {
    let ratings = child(vulnerability, ns, "ratings")?;
    elements(ratings, ns, "rating").find_map(|rating| child_text(rating, ns, "severity"))
}

fn first_cwe(vulnerability: Node<'_, '_>, ns: &str) -> Option<u32> {
    let cwes: Vec<u32> = child(vulnerability, ns, "cwes")
        .into_iter()
        .flat_map(|cwes| elements(cwes, ns, "cwe"))
        .filter_map(|n| n.text())
        .filter_map(|t| t.parse::<u32>().ok())
        .collect();
    if cwes.len() > 1 {
        debug!("more than one CWE for a finding ({cwes:?}), keeping the first");
    }
    cwes.first().copied()
}

/// The rating severity is optional in both layouts; a missing one means
/// `Medium`, while unknown names (including `unknown` and `none`) read as
/// `Info`.
fn fix_severity(raw: Option<&str>) -> Severity {
    match raw {
        None => Severity::Medium,
        Some(raw) => Severity::sanitize(raw),
    }
}

fn child<'a, 'i>(node: Node<'a, 'i>, ns: &str, name: &str) -> Option<Node<'a, 'i>> {
    node.children().find(|n| n.has_tag_name((ns, name)))
}

fn child_text<'a>(node: Node<'a, '_>, ns: &str, name: &str) -> Option<&'a str> {
    child(node, ns, name).and_then(|n| n.text())
}

fn elements<'a, 'i>(
    parent: Node<'a, 'i>,
    ns: &str,
    name: &str,
) -> impl Iterator<Item = Node<'a, 'i>> {
    parent
        .children()
        .filter(move |n| n.has_tag_name((ns, name)))
}

#[cfg(test)]
mod tests {
    use vigil_model::Severity;

    use super::parse;

    const LEGACY_BOM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<bom xmlns="http://cyclonedx.org/schema/bom/1.1"
     xmlns:v="http://cyclonedx.org/schema/ext/vulnerability/1.0"
     version="1" serialNumber="urn:uuid:00000000-0000-0000-0000-000000000001">
  <components>
    <component type="library" bom-ref="pkg:npm/jquery@2.2.0">
      <name>jquery</name>
      <version>2.2.0</version>
      <v:vulnerabilities>
        <v:vulnerability ref="pkg:npm/jquery@2.2.0">
          <v:id>CVE-2015-9251</v:id>
          <v:ratings>
            <v:rating>
              <v:score><v:base>6.1</v:base></v:score>
              <v:severity>Medium</v:severity>
              <v:method>CVSSv3</v:method>
              <v:vector>AV:N/AC:L/PR:N/UI:R/S:C/C:L/I:L/A:N</v:vector>
            </v:rating>
          </v:ratings>
          <v:cwes><v:cwe>79</v:cwe></v:cwes>
          <v:description>jQuery before 3.0.0 is vulnerable to XSS.</v:description>
          <v:recommendations>
            <v:recommendation>Upgrade to 3.0.0 or later</v:recommendation>
          </v:recommendations>
          <v:advisories>
            <v:advisory>https://github.com/advisories/GHSA-1</v:advisory>
          </v:advisories>
        </v:vulnerability>
      </v:vulnerabilities>
    </component>
  </components>
</bom>"#;

    #[test]
    fn legacy_extension_vulnerability() {
        let findings = parse(LEGACY_BOM).unwrap();
        assert_eq!(findings.len(), 1);

        let finding = &findings[0];
        assert_eq!(finding.title, "jquery:2.2.0 | CVE-2015-9251");
        assert_eq!(finding.severity, Severity::Medium);
        assert_eq!(finding.component_name.as_deref(), Some("jquery"));
        assert_eq!(finding.component_version.as_deref(), Some("2.2.0"));
        assert_eq!(finding.cwe, Some(79));
        assert_eq!(finding.vuln_id_from_tool.as_deref(), Some("CVE-2015-9251"));
        assert_eq!(finding.vulnerability_ids, vec!["CVE-2015-9251"]);
        assert_eq!(finding.nb_occurences, Some(1));
        assert_eq!(
            finding.mitigation.as_deref(),
            Some("Upgrade to 3.0.0 or later\n")
        );
        assert_eq!(
            finding.references.as_deref(),
            Some("https://github.com/advisories/GHSA-1\n")
        );
        // The bare vector is normalized with its prefix.
        assert_eq!(
            finding.cvssv3.as_deref(),
            Some("CVSS:3.1/AV:N/AC:L/PR:N/UI:R/S:C/C:L/I:L/A:N")
        );
    }

    #[test]
    fn legacy_description_fallback_lists_ref_id_severity() {
        let bom = r#"<bom xmlns="http://cyclonedx.org/schema/bom/1.1"
                          xmlns:v="http://cyclonedx.org/schema/ext/vulnerability/1.0">
          <components>
            <component bom-ref="pkg:deb/debian/zlib@1.2.8" type="library">
              <name>zlib</name>
              <version>1.2.8</version>
            </component>
          </components>
          <v:vulnerabilities>
            <v:vulnerability ref="pkg:deb/debian/zlib@1.2.8">
              <v:id>CVE-2016-9841</v:id>
            </v:vulnerability>
          </v:vulnerabilities>
        </bom>"#;
        let findings = parse(bom).unwrap();
        assert_eq!(findings.len(), 1);

        let finding = &findings[0];
        // Component comes from the bom-ref index.
        assert_eq!(finding.title, "zlib:1.2.8 | CVE-2016-9841");
        // Missing rating severity reads as Medium.
        assert_eq!(finding.severity, Severity::Medium);
        assert_eq!(
            finding.description.as_deref(),
            Some(
                "**Ref:** pkg:deb/debian/zlib@1.2.8\n**Id:** CVE-2016-9841\n**Severity:** "
            )
        );
    }

    #[test]
    fn modern_block_fans_out_per_affected_component() {
        let bom = r#"<bom xmlns="http://cyclonedx.org/schema/bom/1.4">
          <metadata><timestamp>2021-04-22T15:10:38Z</timestamp></metadata>
          <components>
            <component bom-ref="log4j-a" type="library">
              <name>log4j-core</name>
              <version>2.14.0</version>
            </component>
            <component bom-ref="log4j-b" type="library">
              <name>log4j-core</name>
              <version>2.14.1</version>
            </component>
          </components>
          <vulnerabilities>
            <vulnerability>
              <id>CVE-2021-44228</id>
              <ratings>
                <rating>
                  <severity>critical</severity>
                  <method>CVSSv31</method>
                  <vector>CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H</vector>
                </rating>
              </ratings>
              <cwes><cwe>502</cwe></cwes>
              <description>JNDI lookup injection.</description>
              <detail>Exploitable via crafted log messages.</detail>
              <recommendation>Upgrade to 2.17.1</recommendation>
              <advisories>
                <advisory>
                  <title>Log4Shell</title>
                  <url>https://nvd.nist.gov/vuln/detail/CVE-2021-44228</url>
                </advisory>
              </advisories>
              <references>
                <reference><id>GHSA-jfh8-c2jp-5v3q</id></reference>
              </references>
              <affects>
                <target><ref>log4j-a</ref></target>
                <target><ref>log4j-b</ref></target>
              </affects>
            </vulnerability>
          </vulnerabilities>
        </bom>"#;
        let findings = parse(bom).unwrap();
        assert_eq!(findings.len(), 2);

        let first = &findings[0];
        assert_eq!(first.title, "log4j-core:2.14.0 | CVE-2021-44228");
        assert_eq!(first.severity, Severity::Critical);
        assert_eq!(first.cwe, Some(502));
        assert!(first.static_finding);
        assert!(!first.dynamic_finding);
        assert_eq!(
            first.vulnerability_ids,
            vec!["CVE-2021-44228", "GHSA-jfh8-c2jp-5v3q"]
        );
        assert_eq!(
            first.description.as_deref(),
            Some("JNDI lookup injection.\nExploitable via crafted log messages.")
        );
        assert_eq!(first.mitigation.as_deref(), Some("Upgrade to 2.17.1"));
        let references = first.references.as_deref().unwrap();
        assert!(references.contains("**Title:** Log4Shell\n"));
        assert!(references.contains("**URL:** https://nvd.nist.gov/"));
        assert_eq!(first.date, Some(time::macros::date!(2021 - 04 - 22)));

        assert_eq!(findings[1].title, "log4j-core:2.14.1 | CVE-2021-44228");
    }

    #[test]
    fn modern_analysis_states_mitigate_or_flag_false_positive() {
        let bom = r#"<bom xmlns="http://cyclonedx.org/schema/bom/1.4">
          <components>
            <component bom-ref="c1" type="library"><name>lib-a</name><version>1.0</version></component>
            <component bom-ref="c2" type="library"><name>lib-b</name><version>2.0</version></component>
          </components>
          <vulnerabilities>
            <vulnerability>
              <id>CVE-1</id>
              <recommendation>Upgrade</recommendation>
              <analysis>
                <state>not_affected</state>
                <detail>Code path never reached.</detail>
              </analysis>
              <affects><target><ref>c1</ref></target></affects>
            </vulnerability>
            <vulnerability>
              <id>CVE-2</id>
              <analysis><state>false_positive</state></analysis>
              <affects><target><ref>c2</ref></target></affects>
            </vulnerability>
          </vulnerabilities>
        </bom>"#;
        let findings = parse(bom).unwrap();
        assert_eq!(findings.len(), 2);

        let mitigated = &findings[0];
        assert!(mitigated.is_mitigated);
        assert!(!mitigated.active);
        assert!(!mitigated.false_p);
        assert_eq!(
            mitigated.mitigation.as_deref(),
            Some(
                "Upgrade\n**This vulnerability is mitigated and/or suppressed:** Code path never reached.\n"
            )
        );

        let false_positive = &findings[1];
        assert!(false_positive.false_p);
        assert!(!false_positive.active);
        assert!(!false_positive.is_mitigated);
    }

    #[test]
    fn modern_unknown_ref_still_yields_a_finding() {
        let bom = r#"<bom xmlns="http://cyclonedx.org/schema/bom/1.4">
          <vulnerabilities>
            <vulnerability>
              <id>CVE-3</id>
              <affects><target><ref>missing</ref></target></affects>
            </vulnerability>
          </vulnerabilities>
        </bom>"#;
        let findings = parse(bom).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].title, ": | CVE-3");
        assert!(findings[0].component_name.is_none());
    }

    #[test]
    fn rejects_non_bom_documents() {
        assert!(parse("<bom version=\"1\"/>").is_err());
        assert!(parse("<report xmlns=\"http://example.com/ns\"/>").is_err());
    }
}
