use serde::{Deserialize, Serialize};

use crate::domain::Tags;
use crate::hierarchy::ProductId;

/// Top level of the hierarchy: one product owns many engagements.
///
/// Deduplication defaults to product scope, so findings imported into any
/// engagement of the same product are candidates for each other.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}
