use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One finding field folded into the content hash.
///
/// Each parser declares which fields identify a finding for its scan type.
/// Tools reporting stable locations hash the file path, network scanners
/// hash endpoints, and so on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashField {
    Title,
    Cwe,
    Severity,
    VulnerabilityIds,
    Endpoints,
    FilePath,
    Line,
    ComponentName,
    ComponentVersion,
    Description,
    VulnIdFromTool,
}

/// Field set used when a parser does not declare its own.
pub const DEFAULT_HASH_FIELDS: &[HashField] =
    &[HashField::Title, HashField::Cwe, HashField::Severity];

/// sha256 content hash of a finding, lowercase hex.
///
/// Two findings with the same hash are deduplication candidates. The hash
/// is computed once at import time and stored with the finding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FindingHash(String);

impl FindingHash {
    /// Hash raw bytes.
    pub fn digest(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hex::encode(hasher.finalize()))
    }

    /// Hash a sequence of already-rendered field values.
    ///
    /// Values are joined with `|` so that field boundaries survive in the
    /// preimage.
    pub fn of_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut hasher = Sha256::new();
        let mut first = true;
        for field in fields {
            if !first {
                hasher.update(b"|");
            }
            hasher.update(field.as_ref().as_bytes());
            first = false;
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FindingHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
