use async_trait::async_trait;
use time::OffsetDateTime;

use vigil_engine::{
    EngineError, FindingFilter, ImportHistory, Importer, StoredFinding, retroactively_apply,
    sla_status,
};
use vigil_model::{
    DedupeAlgorithm, Engagement, EngagementId, FindingId, Product, ProductId, Tags, Test, TestId,
};

use crate::dto::{
    AppendTagsRequest, CloseFindingRequest, CreateEngagementRequest, CreateProductRequest,
    FindingView, ImportScanRequest, ImportScanResponse, ReimportScanRequest, parse_date,
};
use crate::error::ApiResult;
use crate::handler::ApiHandler;

/// Adapter that serves [`ApiHandler`] straight from the engine.
pub struct EngineAdapter {
    importer: Importer,
}

impl EngineAdapter {
    pub fn new(importer: Importer) -> Self {
        Self { importer }
    }

    fn view(&self, stored: StoredFinding) -> FindingView {
        let today = OffsetDateTime::now_utc().date();
        let sla = sla_status(&stored.finding, &self.importer.config().sla, today);
        FindingView {
            finding: stored,
            sla,
        }
    }

    /// Effective deduplication algorithm of the finding's scan type.
    fn algorithm_of(&self, stored: &StoredFinding) -> DedupeAlgorithm {
        let store = self.importer.store();
        let scan_type = store
            .test(stored.test_id)
            .map(|t| t.scan_type)
            .unwrap_or_default();
        let parser_default = self
            .importer
            .registry()
            .pick(&scan_type)
            .map(|p| p.dedupe_algorithm())
            .unwrap_or_default();
        self.importer.config().algorithm_for(&scan_type, parser_default)
    }
}

#[async_trait]
impl ApiHandler for EngineAdapter {
    async fn import_scan(&self, request: ImportScanRequest) -> ApiResult<ImportScanResponse> {
        let options = request.options()?;
        let file = request.file()?;
        let summary = self.importer.import_scan(&options, &file)?;
        Ok(ImportScanResponse {
            test_id: summary.test_id,
            statistics: summary.statistics,
        })
    }

    async fn reimport_scan(&self, request: ReimportScanRequest) -> ApiResult<ImportScanResponse> {
        let options = request.import.options()?;
        let file = request.import.file()?;
        let summary =
            self.importer
                .reimport_scan(TestId(request.test), &options, &file)?;
        Ok(ImportScanResponse {
            test_id: summary.test_id,
            statistics: summary.statistics,
        })
    }

    async fn scan_types(&self) -> ApiResult<Vec<String>> {
        Ok(self
            .importer
            .registry()
            .scan_types()
            .into_iter()
            .map(String::from)
            .collect())
    }

    async fn create_product(&self, request: CreateProductRequest) -> ApiResult<Product> {
        let tags = Tags::parse(&request.tags).map_err(EngineError::from)?;
        let product = self
            .importer
            .store()
            .create_product(request.name, request.description, tags)?;
        Ok(product)
    }

    async fn get_product(&self, id: ProductId) -> ApiResult<Product> {
        self.importer
            .store()
            .product(id)
            .ok_or_else(|| EngineError::ProductNotFound(id.to_string()).into())
    }

    async fn list_products(&self) -> ApiResult<Vec<Product>> {
        Ok(self.importer.store().products())
    }

    async fn delete_product(&self, id: ProductId) -> ApiResult<()> {
        self.importer.store().delete_product(id)?;
        Ok(())
    }

    async fn create_engagement(&self, request: CreateEngagementRequest) -> ApiResult<Engagement> {
        let tags = Tags::parse(&request.tags).map_err(EngineError::from)?;
        let target_start = match &request.target_start {
            Some(raw) => Some(parse_date("target_start", raw)?),
            None => None,
        };
        let target_end = match &request.target_end {
            Some(raw) => Some(parse_date("target_end", raw)?),
            None => None,
        };
        let engagement = self.importer.store().create_engagement(
            ProductId(request.product),
            request.name,
            request.deduplication_on_engagement,
            target_start,
            target_end,
            tags,
        )?;
        Ok(engagement)
    }

    async fn get_engagement(&self, id: EngagementId) -> ApiResult<Engagement> {
        self.importer
            .store()
            .engagement(id)
            .ok_or_else(|| EngineError::EngagementNotFound(id.to_string()).into())
    }

    async fn list_engagements(&self, product: Option<ProductId>) -> ApiResult<Vec<Engagement>> {
        Ok(self.importer.store().engagements(product))
    }

    async fn delete_engagement(&self, id: EngagementId) -> ApiResult<()> {
        self.importer.store().delete_engagement(id)?;
        Ok(())
    }

    async fn get_test(&self, id: TestId) -> ApiResult<Test> {
        self.importer
            .store()
            .test(id)
            .ok_or_else(|| EngineError::TestNotFound(id).into())
    }

    async fn list_tests(&self, engagement: Option<EngagementId>) -> ApiResult<Vec<Test>> {
        Ok(self.importer.store().tests(engagement))
    }

    async fn get_finding(&self, id: FindingId) -> ApiResult<FindingView> {
        let stored = self
            .importer
            .store()
            .finding(id)
            .ok_or(EngineError::FindingNotFound(id))?;
        Ok(self.view(stored))
    }

    async fn list_findings(&self, filter: FindingFilter) -> ApiResult<Vec<FindingView>> {
        Ok(self
            .importer
            .store()
            .findings(&filter)
            .into_iter()
            .map(|stored| self.view(stored))
            .collect())
    }

    async fn close_finding(
        &self,
        id: FindingId,
        request: CloseFindingRequest,
    ) -> ApiResult<FindingView> {
        let now = OffsetDateTime::now_utc();
        let updated = self.importer.store().update_finding(id, |stored| {
            stored.finding.active = false;
            stored.finding.mitigated = Some(now);
            stored.finding.is_mitigated = request.is_mitigated.unwrap_or(true);
            if request.false_p == Some(true) {
                stored.finding.false_p = true;
            }
            if request.out_of_scope == Some(true) {
                stored.finding.out_of_scope = true;
            }
            if request.duplicate == Some(true) {
                stored.finding.duplicate = true;
            }
        })?;

        if updated.finding.false_p
            && self.importer.config().retroactive_false_positive_history
        {
            let algorithm = self.algorithm_of(&updated);
            retroactively_apply(self.importer.store(), id, algorithm)?;
        }
        Ok(self.view(updated))
    }

    async fn reopen_finding(&self, id: FindingId) -> ApiResult<FindingView> {
        let updated = self.importer.store().update_finding(id, |stored| {
            stored.finding.active = true;
            stored.finding.is_mitigated = false;
            stored.finding.mitigated = None;
        })?;
        Ok(self.view(updated))
    }

    async fn get_finding_tags(&self, id: FindingId) -> ApiResult<Vec<String>> {
        let stored = self
            .importer
            .store()
            .finding(id)
            .ok_or(EngineError::FindingNotFound(id))?;
        Ok(stored.finding.tags.iter().map(String::from).collect())
    }

    async fn append_finding_tags(
        &self,
        id: FindingId,
        request: AppendTagsRequest,
    ) -> ApiResult<Vec<String>> {
        let parsed = Tags::parse(&request.tags).map_err(EngineError::from)?;
        let updated = self
            .importer
            .store()
            .update_finding(id, |stored| stored.finding.tags.merge(&parsed))?;
        Ok(updated.finding.tags.iter().map(String::from).collect())
    }

    async fn import_history(&self, test: Option<TestId>) -> ApiResult<Vec<ImportHistory>> {
        Ok(self.importer.store().history(test))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use vigil_engine::{EngineConfig, FindingStore, noop_metrics};
    use vigil_model::Severity;
    use vigil_parsers::ParserRegistry;

    use super::*;
    use crate::error::ApiError;

    fn adapter() -> EngineAdapter {
        adapter_with(EngineConfig::default())
    }

    fn adapter_with(config: EngineConfig) -> EngineAdapter {
        let store = Arc::new(FindingStore::new());
        let importer = Importer::new(
            store,
            Arc::new(ParserRegistry::defaults()),
            config,
            noop_metrics(),
        );
        EngineAdapter::new(importer)
    }

    fn product_request(name: &str) -> CreateProductRequest {
        serde_json::from_value(json!({ "name": name })).unwrap()
    }

    fn engagement_request(product: u64, name: &str) -> CreateEngagementRequest {
        serde_json::from_value(json!({ "product": product, "name": name })).unwrap()
    }

    fn import_request(engagement: u64, titles: &[&str]) -> ImportScanRequest {
        let findings: Vec<serde_json::Value> = titles
            .iter()
            .map(|title| json!({ "title": title, "severity": "High" }))
            .collect();
        serde_json::from_value(json!({
            "scan_type": "Generic Findings Import",
            "engagement": engagement,
            "file": json!({ "findings": findings }).to_string(),
            "file_name": "scan.json",
        }))
        .unwrap()
    }

    async fn seeded(adapter: &EngineAdapter) -> EngagementId {
        let product = adapter
            .create_product(product_request("billing"))
            .await
            .unwrap();
        adapter
            .create_engagement(engagement_request(product.id.value(), "ci"))
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn products_crud_and_cascade() {
        let adapter = adapter();
        let product = adapter
            .create_product(product_request("billing"))
            .await
            .unwrap();
        assert_eq!(adapter.get_product(product.id).await.unwrap().name, "billing");
        assert_eq!(adapter.list_products().await.unwrap().len(), 1);

        let engagement = adapter
            .create_engagement(engagement_request(product.id.value(), "ci"))
            .await
            .unwrap();

        adapter.delete_product(product.id).await.unwrap();
        assert!(matches!(
            adapter.get_product(product.id).await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            adapter.get_engagement(engagement.id).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_product_names_conflict() {
        let adapter = adapter();
        adapter
            .create_product(product_request("billing"))
            .await
            .unwrap();
        assert!(matches!(
            adapter.create_product(product_request("billing")).await,
            Err(ApiError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn engagement_dates_are_validated() {
        let adapter = adapter();
        let product = adapter
            .create_product(product_request("billing"))
            .await
            .unwrap();

        let request: CreateEngagementRequest = serde_json::from_value(json!({
            "product": product.id.value(),
            "name": "q3",
            "target_start": "2026-07-01",
            "target_end": "2026-09-30",
        }))
        .unwrap();
        let engagement = adapter.create_engagement(request).await.unwrap();
        assert!(engagement.target_start.is_some());

        let request: CreateEngagementRequest = serde_json::from_value(json!({
            "product": product.id.value(),
            "name": "bad",
            "target_start": "07/01/2026",
        }))
        .unwrap();
        assert!(matches!(
            adapter.create_engagement(request).await,
            Err(ApiError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn import_scan_end_to_end() {
        let adapter = adapter();
        let engagement = seeded(&adapter).await;

        let response = adapter
            .import_scan(import_request(engagement.value(), &["A", "B"]))
            .await
            .unwrap();
        assert_eq!(response.statistics.created, 2);

        let findings = adapter
            .list_findings(FindingFilter {
                severity: Some(Severity::High),
                ..FindingFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(findings.len(), 2);

        // Imported today as High: the 30 day window is wide open.
        let view = adapter.get_finding(findings[0].finding.id).await.unwrap();
        let sla = view.sla.unwrap();
        assert_eq!(sla.age_days, 0);
        assert_eq!(sla.days_remaining, 30);
        assert!(!sla.breached);

        let tests = adapter.list_tests(Some(engagement)).await.unwrap();
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].scan_type, "Generic Findings Import");
    }

    #[tokio::test]
    async fn reimport_scan_reconciles() {
        let adapter = adapter();
        let engagement = seeded(&adapter).await;
        let imported = adapter
            .import_scan(import_request(engagement.value(), &["A", "B"]))
            .await
            .unwrap();

        let report = json!({ "findings": [{ "title": "A", "severity": "High" }] });
        let request: ReimportScanRequest = serde_json::from_value(json!({
            "test": imported.test_id.value(),
            "scan_type": "Generic Findings Import",
            "engagement": engagement.value(),
            "file": report.to_string(),
            "file_name": "scan.json",
        }))
        .unwrap();

        let response = adapter.reimport_scan(request).await.unwrap();
        assert_eq!(response.test_id, imported.test_id);
        assert_eq!(response.statistics.untouched, 1);
        assert_eq!(response.statistics.closed, 1);

        let history = adapter.import_history(Some(imported.test_id)).await.unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn close_records_the_verdict_and_reopen_reverts() {
        let adapter = adapter();
        let engagement = seeded(&adapter).await;
        adapter
            .import_scan(import_request(engagement.value(), &["A"]))
            .await
            .unwrap();
        let id = adapter
            .list_findings(FindingFilter::default())
            .await
            .unwrap()[0]
            .finding
            .id;

        let request: CloseFindingRequest =
            serde_json::from_value(json!({ "false_p": true })).unwrap();
        let closed = adapter.close_finding(id, request).await.unwrap();
        assert!(!closed.finding.finding.active);
        assert!(closed.finding.finding.is_mitigated);
        assert!(closed.finding.finding.mitigated.is_some());
        assert!(closed.finding.finding.false_p);

        let reopened = adapter.reopen_finding(id).await.unwrap();
        assert!(reopened.finding.finding.active);
        assert!(!reopened.finding.finding.is_mitigated);
        assert!(reopened.finding.finding.mitigated.is_none());
        // The triage verdict itself is not forgotten.
        assert!(reopened.finding.finding.false_p);
    }

    #[tokio::test]
    async fn closing_as_false_positive_spreads_retroactively() {
        let adapter = adapter_with(EngineConfig {
            dedupe_enabled: false,
            retroactive_false_positive_history: true,
            ..EngineConfig::default()
        });
        let engagement = seeded(&adapter).await;

        adapter
            .import_scan(import_request(engagement.value(), &["pinned cert"]))
            .await
            .unwrap();
        adapter
            .import_scan(import_request(engagement.value(), &["pinned cert"]))
            .await
            .unwrap();

        let findings = adapter.list_findings(FindingFilter::default()).await.unwrap();
        assert_eq!(findings.len(), 2);
        let (first, second) = (findings[0].finding.id, findings[1].finding.id);

        let request: CloseFindingRequest =
            serde_json::from_value(json!({ "false_p": true })).unwrap();
        adapter.close_finding(first, request).await.unwrap();

        let spread = adapter.get_finding(second).await.unwrap();
        assert!(spread.finding.finding.false_p);
        assert!(!spread.finding.finding.active);
    }

    #[tokio::test]
    async fn finding_tags_round_trip() {
        let adapter = adapter();
        let engagement = seeded(&adapter).await;
        adapter
            .import_scan(import_request(engagement.value(), &["A"]))
            .await
            .unwrap();
        let id = adapter
            .list_findings(FindingFilter::default())
            .await
            .unwrap()[0]
            .finding
            .id;

        assert!(adapter.get_finding_tags(id).await.unwrap().is_empty());

        let request: AppendTagsRequest =
            serde_json::from_value(json!({ "tags": ["prod,web"] })).unwrap();
        let tags = adapter.append_finding_tags(id, request).await.unwrap();
        assert_eq!(tags, vec!["prod", "web"]);

        // Appending again keeps the list unique.
        let request: AppendTagsRequest =
            serde_json::from_value(json!({ "tags": ["web", "edge"] })).unwrap();
        let tags = adapter.append_finding_tags(id, request).await.unwrap();
        assert_eq!(tags, vec!["prod", "web", "edge"]);
    }

    #[tokio::test]
    async fn scan_types_lists_the_registry() {
        let adapter = adapter();
        let types = adapter.scan_types().await.unwrap();
        assert_eq!(types.len(), 5);
        assert!(types.iter().any(|t| t == "Aqua Scan"));
        assert!(types.iter().any(|t| t == "Generic Findings Import"));
    }

    #[tokio::test]
    async fn unknown_ids_surface_as_not_found() {
        let adapter = adapter();
        assert!(matches!(
            adapter.get_finding(FindingId(99)).await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            adapter.get_test(TestId(99)).await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            adapter
                .close_finding(FindingId(99), CloseFindingRequest::default())
                .await,
            Err(ApiError::NotFound(_))
        ));
    }
}
