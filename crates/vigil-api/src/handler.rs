use async_trait::async_trait;

use vigil_engine::{FindingFilter, ImportHistory};
use vigil_model::{Engagement, EngagementId, FindingId, Product, ProductId, Test, TestId};

use crate::dto::{
    AppendTagsRequest, CloseFindingRequest, CreateEngagementRequest, CreateProductRequest,
    FindingView, ImportScanRequest, ImportScanResponse, ReimportScanRequest,
};
use crate::error::ApiResult;

/// Findings API handler.
///
/// The HTTP layer is generic over this trait; [`EngineAdapter`] is the
/// stock implementation, custom handlers can wrap it with auth, rate
/// limiting or multi-tenancy.
///
/// [`EngineAdapter`]: crate::adapter::EngineAdapter
#[async_trait]
pub trait ApiHandler: Send + Sync + 'static {
    /// Import a scan report into a fresh test.
    async fn import_scan(&self, request: ImportScanRequest) -> ApiResult<ImportScanResponse>;

    /// Reconcile an existing test with a fresh report.
    async fn reimport_scan(&self, request: ReimportScanRequest) -> ApiResult<ImportScanResponse>;

    /// Scan types accepted by `import_scan`, in registration order.
    async fn scan_types(&self) -> ApiResult<Vec<String>>;

    async fn create_product(&self, request: CreateProductRequest) -> ApiResult<Product>;
    async fn get_product(&self, id: ProductId) -> ApiResult<Product>;
    async fn list_products(&self) -> ApiResult<Vec<Product>>;
    /// Delete a product and everything under it.
    async fn delete_product(&self, id: ProductId) -> ApiResult<()>;

    async fn create_engagement(&self, request: CreateEngagementRequest) -> ApiResult<Engagement>;
    async fn get_engagement(&self, id: EngagementId) -> ApiResult<Engagement>;
    async fn list_engagements(&self, product: Option<ProductId>) -> ApiResult<Vec<Engagement>>;
    /// Delete an engagement and everything under it.
    async fn delete_engagement(&self, id: EngagementId) -> ApiResult<()>;

    async fn get_test(&self, id: TestId) -> ApiResult<Test>;
    async fn list_tests(&self, engagement: Option<EngagementId>) -> ApiResult<Vec<Test>>;

    async fn get_finding(&self, id: FindingId) -> ApiResult<FindingView>;
    async fn list_findings(&self, filter: FindingFilter) -> ApiResult<Vec<FindingView>>;

    /// Close a finding, optionally recording a triage verdict.
    async fn close_finding(
        &self,
        id: FindingId,
        request: CloseFindingRequest,
    ) -> ApiResult<FindingView>;

    /// Reopen a closed finding.
    async fn reopen_finding(&self, id: FindingId) -> ApiResult<FindingView>;

    async fn get_finding_tags(&self, id: FindingId) -> ApiResult<Vec<String>>;

    /// Append tags to a finding, keeping the list unique.
    async fn append_finding_tags(
        &self,
        id: FindingId,
        request: AppendTagsRequest,
    ) -> ApiResult<Vec<String>>;

    /// Import audit trail, optionally narrowed to one test.
    async fn import_history(&self, test: Option<TestId>) -> ApiResult<Vec<ImportHistory>>;
}
