use std::collections::{HashMap, HashSet};

use tracing::debug;

use vigil_model::{DedupeAlgorithm, EndpointField, EngagementId, Finding, FindingId, TestId};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::store::{FindingStore, StoredFinding};

/// Deduplicate one freshly imported finding against the store.
///
/// Candidates come from the same product, restricted to the finding's own
/// engagement when that engagement opted into engagement-level
/// deduplication. Engagements with the flag set are invisible to the rest
/// of the product. Among older matches the oldest wins and becomes the
/// original; the new finding is marked its duplicate.
///
/// Returns the original's id when a duplicate was recorded.
pub fn deduplicate(
    store: &FindingStore,
    config: &EngineConfig,
    finding_id: FindingId,
    algorithm: DedupeAlgorithm,
) -> EngineResult<Option<FindingId>> {
    let Some(new) = store.finding(finding_id) else {
        return Err(EngineError::FindingNotFound(finding_id));
    };
    let Some(context) = store.context_of_test(new.test_id) else {
        return Err(EngineError::TestNotFound(new.test_id));
    };

    let engagements = store.engagements(Some(context.product_id));
    let eligible: HashSet<EngagementId> = if context.engagement.deduplication_on_engagement {
        [context.engagement.id].into()
    } else {
        engagements
            .iter()
            .filter(|e| !e.deduplication_on_engagement)
            .map(|e| e.id)
            .collect()
    };

    let mut scan_types: HashMap<TestId, String> = HashMap::new();
    for engagement_id in &eligible {
        for test in store.tests(Some(*engagement_id)) {
            scan_types.insert(test.id, test.scan_type);
        }
    }

    let mut candidates: Vec<StoredFinding> = Vec::new();
    for test_id in scan_types.keys() {
        candidates.extend(store.findings_of_test(*test_id));
    }
    candidates.sort_by_key(|c| c.id);

    let original = candidates.iter().find(|candidate| {
        if candidate.id >= new.id {
            return false;
        }
        let Some(candidate_scan_type) = scan_types.get(&candidate.test_id) else {
            return false;
        };
        algorithm_match(
            &new,
            &context.test.scan_type,
            candidate,
            candidate_scan_type,
            algorithm,
            &config.endpoint_fields,
        )
    });

    match original {
        Some(original) => {
            let root = set_duplicate(store, finding_id, original.id)?;
            Ok(Some(root))
        }
        None => Ok(None),
    }
}

/// Mark `duplicate` as a duplicate of `original`.
///
/// Chains stay depth one: when `original` is itself a duplicate the new
/// finding points at its root instead, and findings already pointing at
/// `duplicate` are re-pointed the same way. Returns the root.
pub fn set_duplicate(
    store: &FindingStore,
    duplicate: FindingId,
    original: FindingId,
) -> EngineResult<FindingId> {
    if duplicate == original {
        return Err(EngineError::DuplicateOfSelf(duplicate));
    }
    let Some(original_stored) = store.finding(original) else {
        return Err(EngineError::FindingNotFound(original));
    };
    let root = original_stored.duplicate_of.unwrap_or(original);
    if root == duplicate {
        return Err(EngineError::DuplicateOfSelf(duplicate));
    }

    for child in store.duplicates_of(duplicate) {
        if child == root {
            continue;
        }
        store.update_finding(child, |stored| stored.duplicate_of = Some(root))?;
    }
    store.update_finding(duplicate, |stored| {
        stored.duplicate_of = Some(root);
        stored.finding.duplicate = true;
        stored.finding.active = false;
        stored.finding.verified = false;
    })?;
    debug!(%duplicate, original = %root, "finding marked duplicate");
    Ok(root)
}

fn algorithm_match(
    new: &StoredFinding,
    new_scan_type: &str,
    candidate: &StoredFinding,
    candidate_scan_type: &str,
    algorithm: DedupeAlgorithm,
    endpoint_fields: &[EndpointField],
) -> bool {
    match algorithm {
        DedupeAlgorithm::HashCode => hashes_eq(new, candidate),
        DedupeAlgorithm::UniqueIdFromTool => {
            new_scan_type == candidate_scan_type && unique_ids_eq(&new.finding, &candidate.finding)
        }
        DedupeAlgorithm::UniqueIdFromToolOrHashCode => {
            hashes_eq(new, candidate)
                || (new_scan_type == candidate_scan_type
                    && unique_ids_eq(&new.finding, &candidate.finding))
        }
        DedupeAlgorithm::Legacy => {
            new.finding.title.eq_ignore_ascii_case(&candidate.finding.title)
                && new.finding.severity == candidate.finding.severity
                && location_evidence_matches(&new.finding, &candidate.finding, endpoint_fields)
        }
    }
}

fn hashes_eq(a: &StoredFinding, b: &StoredFinding) -> bool {
    matches!((&a.hash_code, &b.hash_code), (Some(x), Some(y)) if x == y)
}

pub(crate) fn unique_ids_eq(a: &Finding, b: &Finding) -> bool {
    matches!(
        (&a.unique_id_from_tool, &b.unique_id_from_tool),
        (Some(x), Some(y)) if x == y
    )
}

/// Location agreement for the legacy algorithm.
///
/// Endpoint evidence is compared when both sides carry endpoints, file
/// evidence when both carry a file path. Two findings without any
/// location evidence agree by default; mixed evidence never does.
pub(crate) fn location_evidence_matches(
    a: &Finding,
    b: &Finding,
    endpoint_fields: &[EndpointField],
) -> bool {
    if !a.endpoints.is_empty() && !b.endpoints.is_empty() {
        return a
            .endpoints
            .iter()
            .any(|ea| b.endpoints.iter().any(|eb| ea.matches_on(eb, endpoint_fields)));
    }
    if a.file_path.is_some() && b.file_path.is_some() {
        return a.file_path == b.file_path && a.line == b.line;
    }
    no_location_evidence(a) && no_location_evidence(b)
}

fn no_location_evidence(finding: &Finding) -> bool {
    finding.endpoints.is_empty() && finding.file_path.is_none()
}
