//! HTTP surface of the findings engine.
//!
//! [`ApiHandler`] is the seam: the axum layer behind [`HttpApi`] is
//! generic over it, and [`EngineAdapter`] implements it directly on top
//! of [`vigil_engine::Importer`].

mod error;
pub use error::{ApiError, ApiResult};

mod dto;
pub use dto::{
    AppendTagsRequest, CloseFindingRequest, CreateEngagementRequest, CreateProductRequest,
    FindingView, ImportScanRequest, ImportScanResponse, ReimportScanRequest,
};

mod handler;
pub use handler::ApiHandler;

mod adapter;
pub use adapter::EngineAdapter;

mod http;
pub use http::HttpApi;
