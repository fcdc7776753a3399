use serde::{Deserialize, Serialize};
use time::Date;

use crate::domain::Tags;
use crate::hierarchy::{EngagementId, ProductId};

/// A testing window inside a product.
///
/// Imports land in engagements (via a test per import). The
/// `deduplication_on_engagement` flag narrows deduplication for this
/// engagement from product scope to the engagement itself, which is what
/// you want when the same product is scanned in deliberately independent
/// contexts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Engagement {
    pub id: EngagementId,
    pub product_id: ProductId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_start: Option<Date>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_end: Option<Date>,
    #[serde(default)]
    pub deduplication_on_engagement: bool,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}
