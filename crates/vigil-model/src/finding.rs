use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::domain::{Endpoint, FindingHash, HashField, Severity, Tags};

/// One normalized vulnerability observation.
///
/// `Finding` is what parsers produce and what the import pipeline stores.
/// Only `title` and `severity` are mandatory; everything else depends on
/// what the originating tool reports.
///
/// Status is a set of flags rather than a single enum because the original
/// states are not mutually exclusive: a finding can be e.g. both mitigated
/// and a duplicate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Finding {
    pub title: String,
    pub severity: Severity,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mitigation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
    /// Tool-specific reasoning behind the reported severity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity_justification: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwe: Option<u32>,
    /// Vulnerability identifiers (CVE, GHSA, ...); the first is primary.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vulnerability_ids: Vec<String>,
    /// CVSSv3 vector string as reported by the tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cvssv3: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cvssv3_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epss_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epss_percentile: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<Endpoint>,

    /// Stable identifier the tool assigns to this exact observation.
    ///
    /// Powers the unique-id deduplication algorithms. Not every tool has
    /// one; hash-based deduplication covers the rest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id_from_tool: Option<String>,
    /// Identifier of the vulnerability *class* in the tool's own catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vuln_id_from_tool: Option<String>,

    /// Date the tool observed the finding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<Date>,

    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub false_p: bool,
    #[serde(default)]
    pub duplicate: bool,
    #[serde(default)]
    pub out_of_scope: bool,
    #[serde(default)]
    pub risk_accepted: bool,
    #[serde(default)]
    pub is_mitigated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(with = "time::serde::rfc3339::option")]
    pub mitigated: Option<OffsetDateTime>,

    #[serde(default)]
    pub static_finding: bool,
    #[serde(default = "default_true")]
    pub dynamic_finding: bool,

    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
    /// Service the finding belongs to, used to partition imports that feed
    /// one engagement from several sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// How many times the tool saw this issue within a single report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nb_occurences: Option<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<Note>,
}

/// Free-form annotation attached to a finding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Note {
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    pub entry: String,
}

impl Note {
    pub fn new(entry: impl Into<String>, created: OffsetDateTime) -> Self {
        Self {
            created,
            entry: entry.into(),
        }
    }
}

fn default_true() -> bool {
    true
}

impl Finding {
    /// Create a finding with the given title and severity; everything else
    /// starts at its default.
    pub fn new(title: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            severity,
            description: None,
            mitigation: None,
            impact: None,
            references: None,
            severity_justification: None,
            cwe: None,
            vulnerability_ids: Vec::new(),
            cvssv3: None,
            cvssv3_score: None,
            epss_score: None,
            epss_percentile: None,
            component_name: None,
            component_version: None,
            file_path: None,
            line: None,
            endpoints: Vec::new(),
            unique_id_from_tool: None,
            vuln_id_from_tool: None,
            date: None,
            active: true,
            verified: false,
            false_p: false,
            duplicate: false,
            out_of_scope: false,
            risk_accepted: false,
            is_mitigated: false,
            mitigated: None,
            static_finding: false,
            dynamic_finding: true,
            tags: Tags::new(),
            service: None,
            nb_occurences: None,
            notes: Vec::new(),
        }
    }

    /// The primary vulnerability id, if any.
    pub fn primary_vulnerability_id(&self) -> Option<&str> {
        self.vulnerability_ids.first().map(|s| s.as_str())
    }

    /// Whether the finding counts as mitigated.
    ///
    /// Requires the finding to be inactive *and* carry mitigation evidence,
    /// either the flag or a mitigation timestamp.
    pub fn mitigated_status(&self) -> bool {
        !self.active && (self.is_mitigated || self.mitigated.is_some())
    }

    /// Whether a human decided this finding's status.
    ///
    /// Automated transitions (close on re-scan, reactivate on reimport) must
    /// not override these.
    pub fn human_set_status(&self) -> bool {
        self.false_p || self.out_of_scope || self.risk_accepted
    }

    /// Compute the content hash over the given field set.
    ///
    /// List-valued fields are folded in sorted order so that report ordering
    /// does not change the hash.
    pub fn compute_hash(&self, fields: &[HashField]) -> FindingHash {
        let mut parts: Vec<String> = Vec::with_capacity(fields.len());
        for field in fields {
            let part = match field {
                HashField::Title => self.title.clone(),
                HashField::Cwe => self.cwe.map(|c| c.to_string()).unwrap_or_default(),
                HashField::Severity => self.severity.to_string(),
                HashField::VulnerabilityIds => {
                    let mut ids = self.vulnerability_ids.clone();
                    ids.sort();
                    ids.join(",")
                }
                HashField::Endpoints => {
                    let mut eps: Vec<String> =
                        self.endpoints.iter().map(|e| e.to_string()).collect();
                    eps.sort();
                    eps.join(",")
                }
                HashField::FilePath => self.file_path.clone().unwrap_or_default(),
                HashField::Line => self.line.map(|l| l.to_string()).unwrap_or_default(),
                HashField::ComponentName => self.component_name.clone().unwrap_or_default(),
                HashField::ComponentVersion => self.component_version.clone().unwrap_or_default(),
                HashField::Description => self.description.clone().unwrap_or_default(),
                HashField::VulnIdFromTool => self.vuln_id_from_tool.clone().unwrap_or_default(),
            };
            parts.push(part);
        }
        FindingHash::of_fields(parts)
    }
}
