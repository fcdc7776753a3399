use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::{ScanType, Tags};
use crate::hierarchy::{EngagementId, TestId};

/// Container for the findings of one import.
///
/// Every import creates a test; reimports reconcile an existing one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Test {
    pub id: TestId,
    pub engagement_id: EngagementId,
    pub scan_type: ScanType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}
