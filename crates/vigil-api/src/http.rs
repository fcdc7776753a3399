use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};

use vigil_engine::{FindingFilter, ImportHistory};
use vigil_model::{Engagement, EngagementId, FindingId, Product, ProductId, Test, TestId};

use crate::dto::{
    AppendTagsRequest, CloseFindingRequest, CreateEngagementRequest, CreateProductRequest,
    FindingView, ImportScanRequest, ReimportScanRequest, parse_severity,
};
use crate::error::ApiError;
use crate::handler::ApiHandler;

/// HTTP API service builder.
pub struct HttpApi<H> {
    handler: Arc<H>,
}

impl<H> HttpApi<H>
where
    H: ApiHandler,
{
    /// Create new HTTP API with the given handler.
    pub fn new(handler: Arc<H>) -> Self {
        Self { handler }
    }

    /// Build axum router with mounted endpoints.
    ///
    /// Routes:
    /// - POST /api/v2/import-scan - Import a scan report
    /// - POST /api/v2/reimport-scan - Reconcile a test with a new report
    /// - GET /api/v2/scan-types - List supported scan types
    /// - POST/GET /api/v2/products, GET/DELETE /api/v2/products/:id
    /// - POST/GET /api/v2/engagements, GET/DELETE /api/v2/engagements/:id
    /// - GET /api/v2/tests, GET /api/v2/tests/:id
    /// - GET /api/v2/findings, GET /api/v2/findings/:id
    /// - POST /api/v2/findings/:id/close, POST /api/v2/findings/:id/reopen
    /// - GET/POST /api/v2/findings/:id/tags
    /// - GET /api/v2/import-history - Import audit trail
    /// - GET /healthz - Liveness probe
    pub fn router(self) -> Router {
        Router::new()
            .route("/api/v2/import-scan", post(import_scan::<H>))
            .route("/api/v2/reimport-scan", post(reimport_scan::<H>))
            .route("/api/v2/scan-types", get(scan_types::<H>))
            .route("/api/v2/products", post(create_product::<H>))
            .route("/api/v2/products", get(list_products::<H>))
            .route("/api/v2/products/{id}", get(get_product::<H>))
            .route("/api/v2/products/{id}", delete(delete_product::<H>))
            .route("/api/v2/engagements", post(create_engagement::<H>))
            .route("/api/v2/engagements", get(list_engagements::<H>))
            .route("/api/v2/engagements/{id}", get(get_engagement::<H>))
            .route("/api/v2/engagements/{id}", delete(delete_engagement::<H>))
            .route("/api/v2/tests", get(list_tests::<H>))
            .route("/api/v2/tests/{id}", get(get_test::<H>))
            .route("/api/v2/findings", get(list_findings::<H>))
            .route("/api/v2/findings/{id}", get(get_finding::<H>))
            .route("/api/v2/findings/{id}/close", post(close_finding::<H>))
            .route("/api/v2/findings/{id}/reopen", post(reopen_finding::<H>))
            .route("/api/v2/findings/{id}/tags", get(get_finding_tags::<H>))
            .route("/api/v2/findings/{id}/tags", post(append_finding_tags::<H>))
            .route("/api/v2/import-history", get(import_history::<H>))
            .route("/healthz", get(healthz))
            .with_state(self.handler)
    }
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct ScanTypesResponse {
    scan_types: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ListProductsResponse {
    products: Vec<Product>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ListEngagementsResponse {
    engagements: Vec<Engagement>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ListTestsResponse {
    tests: Vec<Test>,
}

#[derive(Debug, Serialize)]
struct ListFindingsResponse {
    findings: Vec<FindingView>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FindingTagsResponse {
    tags: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ImportHistoryResponse {
    history: Vec<ImportHistory>,
}

#[derive(Debug, Deserialize)]
struct ListEngagementsQuery {
    /// Filter by owning product
    product: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ListTestsQuery {
    /// Filter by owning engagement
    engagement: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ListFindingsQuery {
    product: Option<u64>,
    engagement: Option<u64>,
    test: Option<u64>,
    /// Filter by severity label
    severity: Option<String>,
    active: Option<bool>,
    duplicate: Option<bool>,
    /// Findings carrying this tag
    tag: Option<String>,
}

impl ListFindingsQuery {
    fn into_filter(self) -> Result<FindingFilter, ApiError> {
        let severity = match &self.severity {
            Some(raw) => Some(parse_severity(raw)?),
            None => None,
        };
        Ok(FindingFilter {
            product: self.product.map(ProductId),
            engagement: self.engagement.map(EngagementId),
            test: self.test.map(TestId),
            severity,
            active: self.active,
            duplicate: self.duplicate,
            tag: self.tag,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ImportHistoryQuery {
    /// Narrow the trail to one test
    test: Option<u64>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v2/import-scan
async fn import_scan<H>(
    State(handler): State<Arc<H>>,
    Json(req): Json<ImportScanRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let response = handler.import_scan(req).await?;
    Ok(Json(response))
}

/// POST /api/v2/reimport-scan
async fn reimport_scan<H>(
    State(handler): State<Arc<H>>,
    Json(req): Json<ReimportScanRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let response = handler.reimport_scan(req).await?;
    Ok(Json(response))
}

/// GET /api/v2/scan-types
async fn scan_types<H>(State(handler): State<Arc<H>>) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let scan_types = handler.scan_types().await?;
    Ok(Json(ScanTypesResponse { scan_types }))
}

/// POST /api/v2/products
async fn create_product<H>(
    State(handler): State<Arc<H>>,
    Json(req): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let product = handler.create_product(req).await?;
    Ok(Json(product))
}

/// GET /api/v2/products/:id
async fn get_product<H>(
    State(handler): State<Arc<H>>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let product = handler.get_product(ProductId(id)).await?;
    Ok(Json(product))
}

/// GET /api/v2/products
async fn list_products<H>(State(handler): State<Arc<H>>) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let products = handler.list_products().await?;
    Ok(Json(ListProductsResponse { products }))
}

/// DELETE /api/v2/products/:id
async fn delete_product<H>(
    State(handler): State<Arc<H>>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    handler.delete_product(ProductId(id)).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// POST /api/v2/engagements
async fn create_engagement<H>(
    State(handler): State<Arc<H>>,
    Json(req): Json<CreateEngagementRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let engagement = handler.create_engagement(req).await?;
    Ok(Json(engagement))
}

/// GET /api/v2/engagements/:id
async fn get_engagement<H>(
    State(handler): State<Arc<H>>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let engagement = handler.get_engagement(EngagementId(id)).await?;
    Ok(Json(engagement))
}

/// GET /api/v2/engagements
///
/// Query params:
/// - ?product=id - narrow to one product
async fn list_engagements<H>(
    State(handler): State<Arc<H>>,
    Query(query): Query<ListEngagementsQuery>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let engagements = handler.list_engagements(query.product.map(ProductId)).await?;
    Ok(Json(ListEngagementsResponse { engagements }))
}

/// DELETE /api/v2/engagements/:id
async fn delete_engagement<H>(
    State(handler): State<Arc<H>>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    handler.delete_engagement(EngagementId(id)).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// GET /api/v2/tests/:id
async fn get_test<H>(
    State(handler): State<Arc<H>>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let test = handler.get_test(TestId(id)).await?;
    Ok(Json(test))
}

/// GET /api/v2/tests
///
/// Query params:
/// - ?engagement=id - narrow to one engagement
async fn list_tests<H>(
    State(handler): State<Arc<H>>,
    Query(query): Query<ListTestsQuery>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let tests = handler.list_tests(query.engagement.map(EngagementId)).await?;
    Ok(Json(ListTestsResponse { tests }))
}

/// GET /api/v2/findings/:id
async fn get_finding<H>(
    State(handler): State<Arc<H>>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let finding = handler.get_finding(FindingId(id)).await?;
    Ok(Json(finding))
}

/// GET /api/v2/findings
///
/// Query params:
/// - ?product=id / ?engagement=id / ?test=id - hierarchy scope
/// - ?severity=High - severity label
/// - ?active=true / ?duplicate=false - status flags
/// - ?tag=prod - tag membership
async fn list_findings<H>(
    State(handler): State<Arc<H>>,
    Query(query): Query<ListFindingsQuery>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let filter = query.into_filter()?;
    let findings = handler.list_findings(filter).await?;
    Ok(Json(ListFindingsResponse { findings }))
}

/// POST /api/v2/findings/:id/close
async fn close_finding<H>(
    State(handler): State<Arc<H>>,
    Path(id): Path<u64>,
    Json(req): Json<CloseFindingRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let finding = handler.close_finding(FindingId(id), req).await?;
    Ok(Json(finding))
}

/// POST /api/v2/findings/:id/reopen
async fn reopen_finding<H>(
    State(handler): State<Arc<H>>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let finding = handler.reopen_finding(FindingId(id)).await?;
    Ok(Json(finding))
}

/// GET /api/v2/findings/:id/tags
async fn get_finding_tags<H>(
    State(handler): State<Arc<H>>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let tags = handler.get_finding_tags(FindingId(id)).await?;
    Ok(Json(FindingTagsResponse { tags }))
}

/// POST /api/v2/findings/:id/tags
async fn append_finding_tags<H>(
    State(handler): State<Arc<H>>,
    Path(id): Path<u64>,
    Json(req): Json<AppendTagsRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let tags = handler.append_finding_tags(FindingId(id), req).await?;
    Ok(Json(FindingTagsResponse { tags }))
}

/// GET /api/v2/import-history
///
/// Query params:
/// - ?test=id - narrow to one test
async fn import_history<H>(
    State(handler): State<Arc<H>>,
    Query(query): Query<ImportHistoryQuery>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let history = handler.import_history(query.test.map(TestId)).await?;
    Ok(Json(ImportHistoryResponse { history }))
}

/// GET /healthz
async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
