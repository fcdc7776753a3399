use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use time::{Date, OffsetDateTime};
use tracing::{info, instrument};

use vigil_model::{
    DedupeAlgorithm, EndpointField, Engagement, EngagementId, Finding, FindingHash, FindingId,
    HashField, NOTE_AUTO_CLOSED, NOTE_AUTO_REOPENED, Note, Severity, Tags, TestId,
};
use vigil_parsers::{ParserRegistry, ReportFile};

use crate::config::EngineConfig;
use crate::dedupe::{self, location_evidence_matches, unique_ids_eq};
use crate::error::{EngineError, EngineResult};
use crate::fp_history;
use crate::metrics::{FindingOutcome, MetricsHandle};
use crate::store::{FindingStore, ImportKind, ImportStatistics, StoredFinding};

/// Where an import lands.
#[derive(Clone, Debug)]
pub enum EngagementSelector {
    /// An existing engagement.
    Id(EngagementId),
    /// Engagement by name under a product by name.
    Named {
        product_name: String,
        engagement_name: String,
        /// Create the product and engagement when missing.
        auto_create_context: bool,
    },
}

/// Per-request options of an import or reimport.
#[derive(Clone, Debug)]
pub struct ImportOptions {
    pub scan_type: String,
    pub engagement: EngagementSelector,
    /// Findings more lenient than this are dropped before storage.
    pub minimum_severity: Severity,
    pub active: Option<bool>,
    pub verified: Option<bool>,
    /// Date stamped on findings the report leaves undated.
    pub scan_date: Option<Date>,
    pub tags: Tags,
    pub service: Option<String>,
    pub test_title: Option<String>,
    /// `None` keeps the per-operation default: imports leave old findings
    /// alone, reimports close what disappeared.
    pub close_old_findings: Option<bool>,
    /// Request false positive history for this import even when it is off
    /// in the engine configuration.
    pub apply_false_positive_history: bool,
}

impl ImportOptions {
    pub fn new(scan_type: impl Into<String>, engagement: EngagementSelector) -> Self {
        Self {
            scan_type: scan_type.into(),
            engagement,
            minimum_severity: Severity::Info,
            active: None,
            verified: None,
            scan_date: None,
            tags: Tags::new(),
            service: None,
            test_title: None,
            close_old_findings: None,
            apply_false_positive_history: false,
        }
    }
}

/// Outcome of one import: the test it landed in plus the counts.
#[derive(Clone, Copy, Debug)]
pub struct ImportSummary {
    pub test_id: TestId,
    pub statistics: ImportStatistics,
}

/// The import pipeline.
///
/// Owns the parser registry, applies the engine configuration and drives
/// deduplication, false positive history and old-finding closing around
/// the [`FindingStore`].
pub struct Importer {
    store: Arc<FindingStore>,
    registry: Arc<ParserRegistry>,
    config: EngineConfig,
    metrics: MetricsHandle,
}

impl Importer {
    pub fn new(
        store: Arc<FindingStore>,
        registry: Arc<ParserRegistry>,
        config: EngineConfig,
        metrics: MetricsHandle,
    ) -> Self {
        Self {
            store,
            registry,
            config,
            metrics,
        }
    }

    pub fn store(&self) -> &FindingStore {
        &self.store
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Import a report into a fresh test.
    #[instrument(level = "debug", skip(self, options, file), fields(scan_type = %options.scan_type))]
    pub fn import_scan(
        &self,
        options: &ImportOptions,
        file: &ReportFile,
    ) -> EngineResult<ImportSummary> {
        let started = Instant::now();
        let engagement = self.resolve_engagement(&options.engagement)?;
        let parser = self.registry.resolve(&options.scan_type)?;
        let parsed = parser.parse(file)?;

        let test = self.store.create_test(
            engagement.id,
            options.scan_type.clone(),
            options.test_title.clone(),
            options.tags.clone(),
        )?;

        let today = OffsetDateTime::now_utc().date();
        let hash_fields = parser.hash_fields();
        let mut statistics = ImportStatistics::default();
        let mut inserted = Vec::new();
        let mut report_hashes: HashSet<FindingHash> = HashSet::new();

        for finding in parsed {
            let Some((finding, hash)) = prepare(finding, options, hash_fields, today) else {
                continue;
            };
            report_hashes.insert(hash.clone());
            let stored = self.store.insert_finding(test.id, finding, Some(hash))?;
            inserted.push(stored.id);
            statistics.created += 1;
            self.metrics
                .record_finding(&options.scan_type, FindingOutcome::Created);
        }

        let algorithm = self
            .config
            .algorithm_for(&options.scan_type, parser.dedupe_algorithm());
        self.postprocess(
            &options.scan_type,
            algorithm,
            &inserted,
            options.apply_false_positive_history,
        )?;

        if options.close_old_findings.unwrap_or(false) {
            statistics.closed =
                self.close_missing(&engagement, test.id, &options.scan_type, &report_hashes)?;
        }

        self.store
            .record_history(test.id, ImportKind::Import, statistics);
        self.metrics
            .record_import(&options.scan_type, ImportKind::Import);
        self.metrics
            .record_import_duration(&options.scan_type, started.elapsed().as_secs_f64());
        info!(
            test = %test.id,
            created = statistics.created,
            closed = statistics.closed,
            "import finished"
        );
        Ok(ImportSummary {
            test_id: test.id,
            statistics,
        })
    }

    /// Reconcile an existing test with a fresh report of the same scan type.
    #[instrument(level = "debug", skip(self, options, file), fields(test = %test_id, scan_type = %options.scan_type))]
    pub fn reimport_scan(
        &self,
        test_id: TestId,
        options: &ImportOptions,
        file: &ReportFile,
    ) -> EngineResult<ImportSummary> {
        let started = Instant::now();
        let Some(test) = self.store.test(test_id) else {
            return Err(EngineError::TestNotFound(test_id));
        };
        if test.scan_type != options.scan_type {
            return Err(EngineError::ScanTypeMismatch {
                test: test_id,
                expected: test.scan_type.clone(),
                got: options.scan_type.clone(),
            });
        }
        let parser = self.registry.resolve(&options.scan_type)?;
        let parsed = parser.parse(file)?;

        let now = OffsetDateTime::now_utc();
        let today = now.date();
        let hash_fields = parser.hash_fields();
        let algorithm = self
            .config
            .algorithm_for(&options.scan_type, parser.dedupe_algorithm());

        let existing = self.store.findings_of_test(test_id);
        let mut seen: HashSet<FindingId> = HashSet::new();
        let mut inserted = Vec::new();
        let mut statistics = ImportStatistics::default();

        for finding in parsed {
            let Some((finding, hash)) = prepare(finding, options, hash_fields, today) else {
                continue;
            };
            let matched = existing.iter().find(|candidate| {
                reimport_match(
                    &finding,
                    &hash,
                    candidate,
                    algorithm,
                    &self.config.endpoint_fields,
                )
            });
            let Some(candidate) = matched else {
                let stored = self.store.insert_finding(test_id, finding, Some(hash))?;
                inserted.push(stored.id);
                statistics.created += 1;
                self.metrics
                    .record_finding(&options.scan_type, FindingOutcome::Created);
                continue;
            };

            let first_sighting = seen.insert(candidate.id);
            let reactivate = first_sighting
                && !candidate.finding.active
                && !candidate.finding.human_set_status()
                && !candidate.finding.duplicate;
            if reactivate {
                self.store.update_finding(candidate.id, |stored| {
                    stored.finding.active = true;
                    stored.finding.is_mitigated = false;
                    stored.finding.mitigated = None;
                    stored.finding.notes.push(Note::new(NOTE_AUTO_REOPENED, now));
                })?;
                statistics.reactivated += 1;
                self.metrics
                    .record_finding(&options.scan_type, FindingOutcome::Reactivated);
            } else {
                statistics.untouched += 1;
                self.metrics
                    .record_finding(&options.scan_type, FindingOutcome::Untouched);
            }
        }

        if options.close_old_findings.unwrap_or(true) {
            for stored in &existing {
                if seen.contains(&stored.id)
                    || !stored.finding.active
                    || stored.finding.human_set_status()
                {
                    continue;
                }
                self.close_finding(stored.id, now)?;
                statistics.closed += 1;
                self.metrics
                    .record_finding(&options.scan_type, FindingOutcome::Closed);
            }
        }

        self.postprocess(
            &options.scan_type,
            algorithm,
            &inserted,
            options.apply_false_positive_history,
        )?;

        self.store
            .record_history(test_id, ImportKind::Reimport, statistics);
        self.metrics
            .record_import(&options.scan_type, ImportKind::Reimport);
        self.metrics
            .record_import_duration(&options.scan_type, started.elapsed().as_secs_f64());
        info!(
            test = %test_id,
            created = statistics.created,
            reactivated = statistics.reactivated,
            closed = statistics.closed,
            untouched = statistics.untouched,
            "reimport finished"
        );
        Ok(ImportSummary {
            test_id,
            statistics,
        })
    }

    fn resolve_engagement(&self, selector: &EngagementSelector) -> EngineResult<Engagement> {
        match selector {
            EngagementSelector::Id(id) => self
                .store
                .engagement(*id)
                .ok_or_else(|| EngineError::EngagementNotFound(id.to_string())),
            EngagementSelector::Named {
                product_name,
                engagement_name,
                auto_create_context,
            } => {
                let product = match self.store.product_by_name(product_name) {
                    Some(product) => product,
                    None if *auto_create_context => {
                        self.store
                            .create_product(product_name.clone(), None, Tags::new())?
                    }
                    None => return Err(EngineError::ProductNotFound(product_name.clone())),
                };
                match self.store.engagement_by_name(product.id, engagement_name) {
                    Some(engagement) => Ok(engagement),
                    None if *auto_create_context => Ok(self.store.create_engagement(
                        product.id,
                        engagement_name.clone(),
                        false,
                        None,
                        None,
                        Tags::new(),
                    )?),
                    None => Err(EngineError::EngagementNotFound(engagement_name.clone())),
                }
            }
        }
    }

    fn postprocess(
        &self,
        scan_type: &str,
        algorithm: DedupeAlgorithm,
        inserted: &[FindingId],
        request_fp_history: bool,
    ) -> EngineResult<()> {
        if self.config.dedupe_enabled {
            for &id in inserted {
                if dedupe::deduplicate(&self.store, &self.config, id, algorithm)?.is_some() {
                    self.metrics
                        .record_finding(scan_type, FindingOutcome::Duplicate);
                }
            }
        }
        if request_fp_history || self.config.false_positive_history {
            for &id in inserted {
                fp_history::apply_false_positive_history(&self.store, id, algorithm)?;
            }
        }
        Ok(())
    }

    /// Close active findings of earlier tests of the same scan type whose
    /// hash is absent from the current report.
    fn close_missing(
        &self,
        engagement: &Engagement,
        current_test: TestId,
        scan_type: &str,
        report_hashes: &HashSet<FindingHash>,
    ) -> EngineResult<u32> {
        let scope: Vec<EngagementId> = if engagement.deduplication_on_engagement {
            vec![engagement.id]
        } else {
            self.store
                .engagements(Some(engagement.product_id))
                .iter()
                .map(|e| e.id)
                .collect()
        };

        let now = OffsetDateTime::now_utc();
        let mut closed = 0;
        for engagement_id in scope {
            for test in self.store.tests(Some(engagement_id)) {
                if test.id >= current_test || test.scan_type != scan_type {
                    continue;
                }
                for stored in self.store.findings_of_test(test.id) {
                    if !stored.finding.active || stored.finding.human_set_status() {
                        continue;
                    }
                    // Findings without a hash cannot be matched against the
                    // report and are left alone.
                    let gone = stored
                        .hash_code
                        .as_ref()
                        .is_some_and(|hash| !report_hashes.contains(hash));
                    if !gone {
                        continue;
                    }
                    self.close_finding(stored.id, now)?;
                    closed += 1;
                    self.metrics.record_finding(scan_type, FindingOutcome::Closed);
                }
            }
        }
        Ok(closed)
    }

    fn close_finding(&self, id: FindingId, now: OffsetDateTime) -> EngineResult<()> {
        self.store.update_finding(id, |stored| {
            stored.finding.active = false;
            stored.finding.is_mitigated = true;
            stored.finding.mitigated = Some(now);
            stored.finding.notes.push(Note::new(NOTE_AUTO_CLOSED, now));
        })?;
        Ok(())
    }
}

/// Apply the request options to one parsed finding and hash it.
///
/// Returns `None` when the finding falls under the minimum severity.
fn prepare(
    mut finding: Finding,
    options: &ImportOptions,
    hash_fields: &[HashField],
    today: Date,
) -> Option<(Finding, FindingHash)> {
    if !finding.severity.at_least(options.minimum_severity) {
        return None;
    }
    if let Some(active) = options.active {
        finding.active = active;
    }
    if let Some(verified) = options.verified {
        finding.verified = verified;
    }
    if finding.date.is_none() {
        finding.date = options.scan_date.or(Some(today));
    }
    if let Some(service) = &options.service {
        finding.service = Some(service.clone());
    }
    finding.tags.merge(&options.tags);
    let hash = finding.compute_hash(hash_fields);
    Some((finding, hash))
}

/// Whether a parsed finding is a re-sighting of a stored one.
///
/// Same rules as deduplication, except that both sides live in the same
/// test so the scan types trivially agree.
fn reimport_match(
    finding: &Finding,
    hash: &FindingHash,
    candidate: &StoredFinding,
    algorithm: DedupeAlgorithm,
    endpoint_fields: &[EndpointField],
) -> bool {
    let hashes = candidate.hash_code.as_ref() == Some(hash);
    match algorithm {
        DedupeAlgorithm::HashCode => hashes,
        DedupeAlgorithm::UniqueIdFromTool => unique_ids_eq(finding, &candidate.finding),
        DedupeAlgorithm::UniqueIdFromToolOrHashCode => {
            hashes || unique_ids_eq(finding, &candidate.finding)
        }
        DedupeAlgorithm::Legacy => {
            finding.title.eq_ignore_ascii_case(&candidate.finding.title)
                && finding.severity == candidate.finding.severity
                && location_evidence_matches(finding, &candidate.finding, endpoint_fields)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use serde_json::json;
    use time::macros::date;

    use vigil_model::DEFAULT_HASH_FIELDS;

    use super::*;
    use crate::metrics::{MetricsBackend, noop_metrics};

    fn engine() -> (Arc<FindingStore>, Importer) {
        engine_with(EngineConfig::default())
    }

    fn engine_with(config: EngineConfig) -> (Arc<FindingStore>, Importer) {
        let store = Arc::new(FindingStore::new());
        let importer = Importer::new(
            Arc::clone(&store),
            Arc::new(ParserRegistry::defaults()),
            config,
            noop_metrics(),
        );
        (store, importer)
    }

    fn seeded_engagement(store: &FindingStore) -> EngagementId {
        let product = store.create_product("billing", None, Tags::new()).unwrap();
        store
            .create_engagement(product.id, "ci", false, None, None, Tags::new())
            .unwrap()
            .id
    }

    fn generic_report(titles: &[&str]) -> ReportFile {
        let findings: Vec<serde_json::Value> = titles
            .iter()
            .map(|title| json!({ "title": title, "severity": "High" }))
            .collect();
        ReportFile::named(
            "report.json",
            json!({ "findings": findings }).to_string().into_bytes(),
        )
    }

    fn options(engagement: EngagementId) -> ImportOptions {
        ImportOptions::new("Generic Findings Import", EngagementSelector::Id(engagement))
    }

    #[test]
    fn import_creates_a_test_with_findings() {
        let (store, importer) = engine();
        let engagement = seeded_engagement(&store);

        let summary = importer
            .import_scan(&options(engagement), &generic_report(&["A", "B"]))
            .unwrap();

        assert_eq!(summary.statistics.created, 2);
        assert_eq!(summary.statistics.closed, 0);
        let findings = store.findings_of_test(summary.test_id);
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().all(|f| f.hash_code.is_some()));
        assert!(findings.iter().all(|f| f.finding.date.is_some()));

        let history = store.history(Some(summary.test_id));
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, ImportKind::Import);
        assert_eq!(history[0].statistics.created, 2);
    }

    #[test]
    fn minimum_severity_drops_lenient_findings() {
        let (store, importer) = engine();
        let engagement = seeded_engagement(&store);
        let report = ReportFile::named(
            "report.json",
            json!({
                "findings": [
                    { "title": "serious", "severity": "High" },
                    { "title": "noise", "severity": "Low" },
                ]
            })
            .to_string()
            .into_bytes(),
        );

        let mut opts = options(engagement);
        opts.minimum_severity = Severity::Medium;
        let summary = importer.import_scan(&opts, &report).unwrap();

        assert_eq!(summary.statistics.created, 1);
        let findings = store.findings_of_test(summary.test_id);
        assert_eq!(findings[0].finding.title, "serious");
    }

    #[test]
    fn options_stamp_context_onto_findings() {
        let (store, importer) = engine();
        let engagement = seeded_engagement(&store);

        let mut opts = options(engagement);
        opts.active = Some(false);
        opts.verified = Some(true);
        opts.scan_date = Some(date!(2026 - 02 - 01));
        opts.service = Some("checkout".to_owned());
        opts.tags = Tags::parse(["nightly"]).unwrap();
        let summary = importer
            .import_scan(&opts, &generic_report(&["A"]))
            .unwrap();

        let stored = &store.findings_of_test(summary.test_id)[0];
        assert!(!stored.finding.active);
        assert!(stored.finding.verified);
        assert_eq!(stored.finding.date, Some(date!(2026 - 02 - 01)));
        assert_eq!(stored.finding.service.as_deref(), Some("checkout"));
        assert!(stored.finding.tags.contains("nightly"));
    }

    #[test]
    fn a_report_date_wins_over_the_scan_date() {
        let (store, importer) = engine();
        let engagement = seeded_engagement(&store);
        let report = ReportFile::named(
            "report.json",
            json!({
                "findings": [
                    { "title": "dated", "severity": "High", "date": "2026-01-15" },
                ]
            })
            .to_string()
            .into_bytes(),
        );

        let mut opts = options(engagement);
        opts.scan_date = Some(date!(2026 - 02 - 01));
        let summary = importer.import_scan(&opts, &report).unwrap();

        let stored = &store.findings_of_test(summary.test_id)[0];
        assert_eq!(stored.finding.date, Some(date!(2026 - 01 - 15)));
    }

    #[test]
    fn named_selector_auto_creates_context_once() {
        let (store, importer) = engine();
        let selector = EngagementSelector::Named {
            product_name: "billing".to_owned(),
            engagement_name: "nightly".to_owned(),
            auto_create_context: true,
        };
        let opts = ImportOptions::new("Generic Findings Import", selector);

        importer.import_scan(&opts, &generic_report(&["A"])).unwrap();
        importer.import_scan(&opts, &generic_report(&["B"])).unwrap();

        assert_eq!(store.products().len(), 1);
        assert_eq!(store.engagements(None).len(), 1);
        assert_eq!(store.tests(None).len(), 2);
    }

    #[test]
    fn named_selector_requires_context_without_the_flag() {
        let (_store, importer) = engine();
        let selector = EngagementSelector::Named {
            product_name: "billing".to_owned(),
            engagement_name: "nightly".to_owned(),
            auto_create_context: false,
        };
        let opts = ImportOptions::new("Generic Findings Import", selector);

        let err = importer
            .import_scan(&opts, &generic_report(&["A"]))
            .unwrap_err();
        assert!(matches!(err, EngineError::ProductNotFound(_)));
    }

    #[test]
    fn unknown_scan_types_are_rejected() {
        let (store, importer) = engine();
        let engagement = seeded_engagement(&store);
        let opts = ImportOptions::new("No Such Scan", EngagementSelector::Id(engagement));

        let err = importer
            .import_scan(&opts, &generic_report(&["A"]))
            .unwrap_err();
        assert!(matches!(err, EngineError::Parser(_)));
    }

    #[test]
    fn close_old_findings_closes_what_disappeared() {
        let (store, importer) = engine();
        let engagement = seeded_engagement(&store);

        let first = importer
            .import_scan(&options(engagement), &generic_report(&["A", "B"]))
            .unwrap();

        let mut opts = options(engagement);
        opts.close_old_findings = Some(true);
        let second = importer.import_scan(&opts, &generic_report(&["A"])).unwrap();

        assert_eq!(second.statistics.closed, 1);
        let closed = store
            .findings_of_test(first.test_id)
            .into_iter()
            .find(|f| f.finding.title == "B")
            .unwrap();
        assert!(!closed.finding.active);
        assert!(closed.finding.is_mitigated);
        assert!(closed.finding.mitigated.is_some());
        assert_eq!(closed.finding.notes.len(), 1);
        assert_eq!(closed.finding.notes[0].entry, NOTE_AUTO_CLOSED);

        // The reappeared finding stays open.
        let kept = store
            .findings_of_test(first.test_id)
            .into_iter()
            .find(|f| f.finding.title == "A")
            .unwrap();
        assert!(kept.finding.active);
    }

    #[test]
    fn close_old_findings_spares_human_triage() {
        let (store, importer) = engine();
        let engagement = seeded_engagement(&store);

        let first = importer
            .import_scan(&options(engagement), &generic_report(&["A"]))
            .unwrap();
        let triaged = store.findings_of_test(first.test_id)[0].id;
        store
            .update_finding(triaged, |f| f.finding.risk_accepted = true)
            .unwrap();

        let mut opts = options(engagement);
        opts.close_old_findings = Some(true);
        let second = importer
            .import_scan(&opts, &generic_report(&["other"]))
            .unwrap();

        assert_eq!(second.statistics.closed, 0);
        assert!(store.finding(triaged).unwrap().finding.active);
    }

    #[test]
    fn import_deduplicates_within_the_product() {
        let (store, importer) = engine();
        let engagement = seeded_engagement(&store);

        importer
            .import_scan(&options(engagement), &generic_report(&["A"]))
            .unwrap();
        let second = importer
            .import_scan(&options(engagement), &generic_report(&["A"]))
            .unwrap();

        let duplicate = &store.findings_of_test(second.test_id)[0];
        assert!(duplicate.finding.duplicate);
        assert!(!duplicate.finding.active);
        assert_eq!(duplicate.duplicate_of, Some(FindingId(1)));
    }

    #[test]
    fn deduplication_can_be_switched_off() {
        let (store, importer) = engine_with(EngineConfig {
            dedupe_enabled: false,
            ..EngineConfig::default()
        });
        let engagement = seeded_engagement(&store);

        importer
            .import_scan(&options(engagement), &generic_report(&["A"]))
            .unwrap();
        let second = importer
            .import_scan(&options(engagement), &generic_report(&["A"]))
            .unwrap();

        let fresh = &store.findings_of_test(second.test_id)[0];
        assert!(!fresh.finding.duplicate);
        assert!(fresh.finding.active);
    }

    #[test]
    fn false_positive_history_silences_known_noise() {
        let (store, importer) = engine();
        let engagement = seeded_engagement(&store);

        let first = importer
            .import_scan(&options(engagement), &generic_report(&["pinned cert"]))
            .unwrap();
        let triaged = store.findings_of_test(first.test_id)[0].id;
        store
            .update_finding(triaged, |f| {
                f.finding.false_p = true;
                f.finding.active = false;
            })
            .unwrap();

        let mut opts = options(engagement);
        opts.apply_false_positive_history = true;
        let second = importer
            .import_scan(&opts, &generic_report(&["pinned cert"]))
            .unwrap();

        let fresh = &store.findings_of_test(second.test_id)[0];
        assert!(fresh.finding.false_p);
        assert!(!fresh.finding.active);
    }

    #[test]
    fn reimport_reconciles_created_closed_and_reactivated() {
        let (store, importer) = engine();
        let engagement = seeded_engagement(&store);

        let imported = importer
            .import_scan(&options(engagement), &generic_report(&["A", "B"]))
            .unwrap();
        let test = imported.test_id;

        // B disappears, C appears.
        let first = importer
            .reimport_scan(test, &options(engagement), &generic_report(&["A", "C"]))
            .unwrap();
        assert_eq!(first.statistics.created, 1);
        assert_eq!(first.statistics.untouched, 1);
        assert_eq!(first.statistics.closed, 1);
        assert_eq!(first.statistics.reactivated, 0);

        let b = store
            .findings_of_test(test)
            .into_iter()
            .find(|f| f.finding.title == "B")
            .unwrap();
        assert!(!b.finding.active);
        assert_eq!(b.finding.notes[0].entry, NOTE_AUTO_CLOSED);

        // B comes back.
        let second = importer
            .reimport_scan(test, &options(engagement), &generic_report(&["A", "B", "C"]))
            .unwrap();
        assert_eq!(second.statistics.created, 0);
        assert_eq!(second.statistics.reactivated, 1);
        assert_eq!(second.statistics.untouched, 2);
        assert_eq!(second.statistics.closed, 0);

        let b = store
            .findings_of_test(test)
            .into_iter()
            .find(|f| f.finding.title == "B")
            .unwrap();
        assert!(b.finding.active);
        assert!(!b.finding.is_mitigated);
        assert!(b.finding.mitigated.is_none());
        assert_eq!(b.finding.notes.len(), 2);
        assert_eq!(b.finding.notes[1].entry, NOTE_AUTO_REOPENED);

        // Everything stays in the one test, and history has all three runs.
        assert_eq!(store.tests(None).len(), 1);
        assert_eq!(store.history(Some(test)).len(), 3);
    }

    #[test]
    fn reimport_never_reopens_human_triaged_findings() {
        let (store, importer) = engine();
        let engagement = seeded_engagement(&store);

        let imported = importer
            .import_scan(&options(engagement), &generic_report(&["A"]))
            .unwrap();
        let test = imported.test_id;
        let triaged = store.findings_of_test(test)[0].id;
        store
            .update_finding(triaged, |f| {
                f.finding.out_of_scope = true;
                f.finding.active = false;
            })
            .unwrap();

        let summary = importer
            .reimport_scan(test, &options(engagement), &generic_report(&["A"]))
            .unwrap();

        assert_eq!(summary.statistics.reactivated, 0);
        assert_eq!(summary.statistics.untouched, 1);
        assert!(!store.finding(triaged).unwrap().finding.active);
    }

    #[test]
    fn reimport_rejects_a_scan_type_mismatch() {
        let (store, importer) = engine();
        let engagement = seeded_engagement(&store);
        let imported = importer
            .import_scan(&options(engagement), &generic_report(&["A"]))
            .unwrap();

        let opts = ImportOptions::new("Aqua Scan", EngagementSelector::Id(engagement));
        let err = importer
            .reimport_scan(imported.test_id, &opts, &generic_report(&["A"]))
            .unwrap_err();
        assert!(matches!(err, EngineError::ScanTypeMismatch { .. }));
    }

    #[test]
    fn reimport_can_keep_missing_findings_open() {
        let (store, importer) = engine();
        let engagement = seeded_engagement(&store);
        let imported = importer
            .import_scan(&options(engagement), &generic_report(&["A", "B"]))
            .unwrap();

        let mut opts = options(engagement);
        opts.close_old_findings = Some(false);
        let summary = importer
            .reimport_scan(imported.test_id, &opts, &generic_report(&["A"]))
            .unwrap();

        assert_eq!(summary.statistics.closed, 0);
        let b = store
            .findings_of_test(imported.test_id)
            .into_iter()
            .find(|f| f.finding.title == "B")
            .unwrap();
        assert!(b.finding.active);
    }

    #[derive(Default)]
    struct CountingMetrics {
        imports: AtomicU32,
        findings: AtomicU32,
        durations: AtomicU32,
    }

    impl MetricsBackend for CountingMetrics {
        fn record_import(&self, _scan_type: &str, _kind: ImportKind) {
            self.imports.fetch_add(1, Ordering::Relaxed);
        }

        fn record_finding(&self, _scan_type: &str, _outcome: FindingOutcome) {
            self.findings.fetch_add(1, Ordering::Relaxed);
        }

        fn record_import_duration(&self, _scan_type: &str, _seconds: f64) {
            self.durations.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn the_pipeline_reports_to_the_metrics_backend() {
        let store = Arc::new(FindingStore::new());
        let metrics = Arc::new(CountingMetrics::default());
        let importer = Importer::new(
            Arc::clone(&store),
            Arc::new(ParserRegistry::defaults()),
            EngineConfig::default(),
            Arc::clone(&metrics) as MetricsHandle,
        );
        let engagement = seeded_engagement(&store);

        importer
            .import_scan(&options(engagement), &generic_report(&["A", "B"]))
            .unwrap();

        assert_eq!(metrics.imports.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.findings.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.durations.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn prepared_findings_hash_over_the_parser_fields() {
        let finding = Finding::new("A", Severity::High);
        let opts = ImportOptions::new(
            "Generic Findings Import",
            EngagementSelector::Id(EngagementId(1)),
        );
        let (prepared, hash) =
            prepare(finding, &opts, DEFAULT_HASH_FIELDS, date!(2026 - 02 - 01)).unwrap();
        assert_eq!(prepared.date, Some(date!(2026 - 02 - 01)));
        assert_eq!(hash, prepared.compute_hash(DEFAULT_HASH_FIELDS));
    }
}
