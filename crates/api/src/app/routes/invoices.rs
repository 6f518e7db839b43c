use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use dentflow_cases::CaseId;
use dentflow_invoicing::InvoiceId;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_invoice).get(list_invoices))
        .route("/preview", post(preview_price))
        .route("/:id", get(get_invoice))
        .route("/:id/payment", post(record_payment))
        .route("/:id/cancel", post(cancel_invoice))
}

/// Price a hypothetical case without touching any aggregate.
pub async fn preview_price(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Json(body): Json<dto::PricePreviewRequest>,
) -> axum::response::Response {
    match services.price_case(
        tenant.tenant_id(),
        body.work_type,
        &body.teeth,
        body.priority,
        &body.overrides,
    ) {
        Ok(breakdown) => (StatusCode::OK, Json(dto::breakdown_to_json(breakdown))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// Issue an invoice for a QC-passed case.
///
/// Work type, teeth and priority come from the case itself; the caller only
/// chooses discount, tax, due date and price overrides.
pub async fn create_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Json(body): Json<dto::CreateInvoiceRequest>,
) -> axum::response::Response {
    let case_agg = match common::parse_id(&body.case_id, "case") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let case_id = CaseId::new(case_agg);

    let Some(case) = services.cases_get(tenant.tenant_id(), &case_id) else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "case not found");
    };

    let breakdown = match services.price_case(
        tenant.tenant_id(),
        case.work_type,
        &case.teeth,
        case.priority,
        &body.overrides,
    ) {
        Ok(b) => b,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let (invoice_id, invoice_number, committed) = match services.create_invoice_for_case(
        tenant.tenant_id(),
        case_id,
        case.doctor_id,
        breakdown,
        body.discount,
        body.tax,
        body.due_date,
    ) {
        Ok(v) => v,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": invoice_id.0.to_string(),
            "invoice_number": invoice_number,
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn record_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RecordPaymentRequest>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "invoice") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let committed = match services.record_invoice_payment(
        tenant.tenant_id(),
        InvoiceId::new(agg),
        body.amount,
        body.method,
        body.reference,
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn cancel_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CancelInvoiceRequest>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "invoice") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let committed =
        match services.cancel_invoice(tenant.tenant_id(), InvoiceId::new(agg), body.reason) {
            Ok(c) => c,
            Err(e) => return errors::dispatch_error_to_response(e),
        };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "invoice") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.invoices_get(tenant.tenant_id(), &InvoiceId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(dto::invoice_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "invoice not found"),
    }
}

#[derive(Debug, Deserialize)]
pub struct InvoicesQuery {
    pub case_id: Option<String>,
}

pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Query(query): Query<InvoicesQuery>,
) -> axum::response::Response {
    let tenant_id = tenant.tenant_id();

    let items = if let Some(case_id) = query.case_id {
        let agg = match common::parse_id(&case_id, "case") {
            Ok(v) => v,
            Err(resp) => return resp,
        };
        services
            .invoice_for_case(tenant_id, CaseId::new(agg))
            .into_iter()
            .collect()
    } else {
        services.invoices_list(tenant_id)
    };

    let items = items
        .into_iter()
        .map(dto::invoice_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}
