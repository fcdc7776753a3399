use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{ModelError, ModelResult};

/// How findings are matched against existing ones during deduplication.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupeAlgorithm {
    /// Content hash over the parser's declared field set.
    HashCode,
    /// Tool-native stable id, scoped to the same scan type.
    UniqueIdFromTool,
    /// Unique id when both sides have one, content hash otherwise.
    UniqueIdFromToolOrHashCode,
    /// Title/severity match backed by endpoint or file evidence.
    Legacy,
}

impl Default for DedupeAlgorithm {
    fn default() -> Self {
        DedupeAlgorithm::HashCode
    }
}

impl FromStr for DedupeAlgorithm {
    type Err = ModelError;
    fn from_str(s: &str) -> ModelResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hash-code" | "hash_code" => Ok(DedupeAlgorithm::HashCode),
            "unique-id-from-tool" | "unique_id_from_tool" => Ok(DedupeAlgorithm::UniqueIdFromTool),
            "unique-id-or-hash-code" | "unique_id_from_tool_or_hash_code" => {
                Ok(DedupeAlgorithm::UniqueIdFromToolOrHashCode)
            }
            "legacy" => Ok(DedupeAlgorithm::Legacy),
            other => Err(ModelError::UnknownAlgorithm(other.to_string())),
        }
    }
}
