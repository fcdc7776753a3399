use std::collections::HashMap;

use tracing::debug;

use vigil_model::{DedupeAlgorithm, FindingId, ProductId, TestId};

use crate::dedupe::unique_ids_eq;
use crate::error::{EngineError, EngineResult};
use crate::store::{FindingStore, StoredFinding};

/// Silence a fresh finding that matches a known false positive.
///
/// Candidates come from the whole product regardless of engagement
/// flags; a false positive verdict is about the finding itself, not
/// about where it was seen. When any candidate was triaged false
/// positive the new finding inherits the verdict and is deactivated.
///
/// Returns whether the verdict was applied.
pub fn apply_false_positive_history(
    store: &FindingStore,
    finding_id: FindingId,
    algorithm: DedupeAlgorithm,
) -> EngineResult<bool> {
    let Some(new) = store.finding(finding_id) else {
        return Err(EngineError::FindingNotFound(finding_id));
    };
    let Some(context) = store.context_of_test(new.test_id) else {
        return Err(EngineError::TestNotFound(new.test_id));
    };

    let known_false_positive = product_matches(store, &new, context.product_id, algorithm)
        .iter()
        .any(|candidate| candidate.finding.false_p);
    if known_false_positive {
        store.update_finding(finding_id, |stored| {
            stored.finding.false_p = true;
            stored.finding.active = false;
            stored.finding.verified = false;
        })?;
        debug!(finding = %finding_id, "false positive history applied");
    }
    Ok(known_false_positive)
}

/// Spread a fresh false positive verdict over existing matches.
///
/// Every finding in the product matching `finding_id` is marked false
/// positive and deactivated. Returns the ids that changed.
pub fn retroactively_apply(
    store: &FindingStore,
    finding_id: FindingId,
    algorithm: DedupeAlgorithm,
) -> EngineResult<Vec<FindingId>> {
    let Some(source) = store.finding(finding_id) else {
        return Err(EngineError::FindingNotFound(finding_id));
    };
    let Some(context) = store.context_of_test(source.test_id) else {
        return Err(EngineError::TestNotFound(source.test_id));
    };

    let mut changed = Vec::new();
    for candidate in product_matches(store, &source, context.product_id, algorithm) {
        if candidate.finding.false_p {
            continue;
        }
        store.update_finding(candidate.id, |stored| {
            stored.finding.false_p = true;
            stored.finding.active = false;
            stored.finding.verified = false;
        })?;
        changed.push(candidate.id);
    }
    if !changed.is_empty() {
        debug!(
            source = %finding_id,
            spread = changed.len(),
            "false positive verdict applied retroactively"
        );
    }
    Ok(changed)
}

fn product_matches(
    store: &FindingStore,
    subject: &StoredFinding,
    product: ProductId,
    algorithm: DedupeAlgorithm,
) -> Vec<StoredFinding> {
    let mut scan_types: HashMap<TestId, String> = HashMap::new();
    for engagement in store.engagements(Some(product)) {
        for test in store.tests(Some(engagement.id)) {
            scan_types.insert(test.id, test.scan_type);
        }
    }
    let subject_scan_type = scan_types.get(&subject.test_id).cloned().unwrap_or_default();

    let mut matches = Vec::new();
    for (test_id, candidate_scan_type) in &scan_types {
        for candidate in store.findings_of_test(*test_id) {
            if candidate.id == subject.id {
                continue;
            }
            if history_match(
                subject,
                &subject_scan_type,
                &candidate,
                candidate_scan_type,
                algorithm,
            ) {
                matches.push(candidate);
            }
        }
    }
    matches.sort_by_key(|c| c.id);
    matches
}

fn history_match(
    subject: &StoredFinding,
    subject_scan_type: &str,
    candidate: &StoredFinding,
    candidate_scan_type: &str,
    algorithm: DedupeAlgorithm,
) -> bool {
    let hashes = matches!(
        (&subject.hash_code, &candidate.hash_code),
        (Some(x), Some(y)) if x == y
    );
    match algorithm {
        DedupeAlgorithm::HashCode => hashes,
        DedupeAlgorithm::UniqueIdFromTool => {
            subject_scan_type == candidate_scan_type
                && unique_ids_eq(&subject.finding, &candidate.finding)
        }
        DedupeAlgorithm::UniqueIdFromToolOrHashCode => {
            hashes
                || (subject_scan_type == candidate_scan_type
                    && unique_ids_eq(&subject.finding, &candidate.finding))
        }
        // Location evidence is deliberately ignored here: a false
        // positive verdict for a weak cipher report covers the same
        // report from any endpoint.
        DedupeAlgorithm::Legacy => {
            subject.finding.title.eq_ignore_ascii_case(&candidate.finding.title)
                && subject.finding.severity == candidate.finding.severity
        }
    }
}
