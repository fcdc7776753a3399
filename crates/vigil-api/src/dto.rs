//! Wire types of the v2 API.
//!
//! Requests validate and convert themselves into engine types; everything
//! serializes snake_case.

use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};
use time::Date;
use time::macros::format_description;

use vigil_engine::{EngagementSelector, ImportOptions, ImportStatistics, SlaStatus, StoredFinding};
use vigil_model::{EngagementId, Severity, Tags, TestId};
use vigil_parsers::ReportFile;

use crate::error::{ApiError, ApiResult};

/// Body of `POST /api/v2/import-scan`.
///
/// The target is either an `engagement` id or a `product_name` plus
/// `engagement_name` pair; with `auto_create_context` the named context
/// is created on first use. The report content comes inline as `file`
/// or base64-encoded as `file_base64`.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportScanRequest {
    pub scan_type: String,
    pub engagement: Option<u64>,
    pub product_name: Option<String>,
    pub engagement_name: Option<String>,
    #[serde(default)]
    pub auto_create_context: bool,
    pub minimum_severity: Option<String>,
    pub active: Option<bool>,
    pub verified: Option<bool>,
    pub scan_date: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub service: Option<String>,
    pub test_title: Option<String>,
    pub close_old_findings: Option<bool>,
    #[serde(default)]
    pub apply_false_positive_history: bool,
    pub file_name: Option<String>,
    pub file: Option<String>,
    pub file_base64: Option<String>,
}

/// Body of `POST /api/v2/reimport-scan`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReimportScanRequest {
    pub test: u64,
    #[serde(flatten)]
    pub import: ImportScanRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportScanResponse {
    pub test_id: TestId,
    pub statistics: ImportStatistics,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEngagementRequest {
    pub product: u64,
    pub name: String,
    #[serde(default)]
    pub deduplication_on_engagement: bool,
    pub target_start: Option<String>,
    pub target_end: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Body of `POST /api/v2/findings/{id}/close`.
///
/// Closing always deactivates the finding and stamps `mitigated`;
/// `is_mitigated` defaults to true and the triage flags are applied
/// when set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CloseFindingRequest {
    pub is_mitigated: Option<bool>,
    pub false_p: Option<bool>,
    pub out_of_scope: Option<bool>,
    pub duplicate: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppendTagsRequest {
    pub tags: Vec<String>,
}

/// A stored finding plus its current SLA position.
#[derive(Debug, Clone, Serialize)]
pub struct FindingView {
    #[serde(flatten)]
    pub finding: StoredFinding,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sla: Option<SlaStatus>,
}

impl ImportScanRequest {
    /// Validate the request and build the engine options.
    pub fn options(&self) -> ApiResult<ImportOptions> {
        let mut options = ImportOptions::new(self.scan_type.clone(), self.selector()?);
        if let Some(raw) = &self.minimum_severity {
            options.minimum_severity = parse_severity(raw)?;
        }
        options.active = self.active;
        options.verified = self.verified;
        if let Some(raw) = &self.scan_date {
            options.scan_date = Some(parse_date("scan_date", raw)?);
        }
        options.tags = Tags::parse(&self.tags)
            .map_err(|err| ApiError::InvalidRequest(err.to_string()))?;
        options.service = self.service.clone();
        options.test_title = self.test_title.clone();
        options.close_old_findings = self.close_old_findings;
        options.apply_false_positive_history = self.apply_false_positive_history;
        Ok(options)
    }

    fn selector(&self) -> ApiResult<EngagementSelector> {
        if let Some(id) = self.engagement {
            return Ok(EngagementSelector::Id(EngagementId(id)));
        }
        match (&self.product_name, &self.engagement_name) {
            (Some(product_name), Some(engagement_name)) => Ok(EngagementSelector::Named {
                product_name: product_name.clone(),
                engagement_name: engagement_name.clone(),
                auto_create_context: self.auto_create_context,
            }),
            _ => Err(ApiError::InvalidRequest(
                "either engagement or product_name and engagement_name are required".to_owned(),
            )),
        }
    }

    /// Decode the report content.
    pub fn file(&self) -> ApiResult<ReportFile> {
        let data = match (&self.file, &self.file_base64) {
            (Some(_), Some(_)) => {
                return Err(ApiError::InvalidRequest(
                    "file and file_base64 are mutually exclusive".to_owned(),
                ));
            }
            (Some(text), None) => text.clone().into_bytes(),
            (None, Some(encoded)) => general_purpose::STANDARD
                .decode(encoded)
                .map_err(|err| ApiError::InvalidRequest(format!("invalid base64 report: {err}")))?,
            (None, None) => {
                return Err(ApiError::InvalidRequest(
                    "report content is missing: send file or file_base64".to_owned(),
                ));
            }
        };
        Ok(match &self.file_name {
            Some(name) => ReportFile::named(name.clone(), data),
            None => ReportFile::unnamed(data),
        })
    }
}

pub(crate) fn parse_severity(raw: &str) -> ApiResult<Severity> {
    raw.parse::<Severity>()
        .map_err(|err| ApiError::InvalidRequest(err.to_string()))
}

pub(crate) fn parse_date(field: &str, raw: &str) -> ApiResult<Date> {
    let format = format_description!("[year]-[month]-[day]");
    Date::parse(raw.trim(), &format)
        .map_err(|_| ApiError::InvalidRequest(format!("invalid {field}: {raw:?}")))
}
