use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use dentflow_core::TenantId;

use crate::context::TenantContext;

pub const TENANT_HEADER: &str = "x-tenant-id";

/// Resolve the tenant for a request from the `x-tenant-id` header.
///
/// Every domain route is tenant-scoped; a request without a valid tenant id
/// never reaches a handler.
pub async fn tenant_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let tenant_id = extract_tenant(req.headers())?;

    req.extensions_mut().insert(TenantContext::new(tenant_id));

    Ok(next.run(req).await)
}

fn extract_tenant(headers: &HeaderMap) -> Result<TenantId, StatusCode> {
    let header = headers.get(TENANT_HEADER).ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let uuid: Uuid = header.trim().parse().map_err(|_| StatusCode::UNAUTHORIZED)?;

    Ok(TenantId::from_uuid(uuid))
}
