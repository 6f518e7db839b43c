use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use dentflow_cases::{
    Case, CaseCommand, CaseId, CaseStatus, Department, RecordQc, RegisterCase, Transfer,
};
use dentflow_core::AggregateId;
use dentflow_parties::PartyId;

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_case).get(list_cases))
        .route("/:id", get(get_case))
        .route("/:id/transfer", post(transfer_case))
        .route("/:id/qc", post(record_qc))
}

pub async fn register_case(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Json(body): Json<dto::RegisterCaseRequest>,
) -> axum::response::Response {
    let doctor_agg = match common::parse_id(&body.doctor_id, "doctor") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let case_agg = AggregateId::new();
    let case_id = CaseId::new(case_agg);
    let case_number = services.next_case_number(tenant.tenant_id());

    let committed = match services.dispatch::<Case>(
        tenant.tenant_id(),
        case_agg,
        "cases.case",
        CaseCommand::RegisterCase(RegisterCase {
            tenant_id: tenant.tenant_id(),
            case_id,
            case_number: case_number.clone(),
            doctor_id: PartyId::new(doctor_agg),
            work_type: body.work_type,
            teeth: body.teeth,
            priority: body.priority,
            notes: body.notes,
            occurred_at: Utc::now(),
        }),
        |_t, aggregate_id| Case::empty(CaseId::new(aggregate_id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": case_agg.to_string(),
            "case_number": case_number,
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn transfer_case(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::TransferCaseRequest>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "case") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let committed = match services.dispatch::<Case>(
        tenant.tenant_id(),
        agg,
        "cases.case",
        CaseCommand::Transfer(Transfer {
            tenant_id: tenant.tenant_id(),
            case_id: CaseId::new(agg),
            to_status: body.to_status,
            notes: body.notes,
            rejection_reason: body.rejection_reason,
            occurred_at: Utc::now(),
        }),
        |_t, aggregate_id| Case::empty(CaseId::new(aggregate_id)),
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

pub async fn record_qc(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RecordQcRequest>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "case") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let committed = match services.dispatch::<Case>(
        tenant.tenant_id(),
        agg,
        "cases.case",
        CaseCommand::RecordQc(RecordQc {
            tenant_id: tenant.tenant_id(),
            case_id: CaseId::new(agg),
            result: body.result,
            notes: body.notes,
            occurred_at: Utc::now(),
        }),
        |_t, aggregate_id| Case::empty(CaseId::new(aggregate_id)),
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

pub async fn get_case(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "case") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.cases_get(tenant.tenant_id(), &CaseId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(dto::case_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "case not found"),
    }
}

#[derive(Debug, Deserialize)]
pub struct CasesQuery {
    pub status: Option<CaseStatus>,
    pub department: Option<Department>,
    pub doctor_id: Option<String>,
}

pub async fn list_cases(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Query(query): Query<CasesQuery>,
) -> axum::response::Response {
    let tenant_id = tenant.tenant_id();

    let items = if let Some(status) = query.status {
        services.cases_by_status(tenant_id, status)
    } else if let Some(department) = query.department {
        services.cases_by_department(tenant_id, department)
    } else if let Some(doctor_id) = query.doctor_id {
        let agg = match common::parse_id(&doctor_id, "doctor") {
            Ok(v) => v,
            Err(resp) => return resp,
        };
        services.cases_by_doctor(tenant_id, PartyId::new(agg))
    } else {
        services.cases_list(tenant_id)
    };

    let items = items.into_iter().map(dto::case_to_json).collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}
