use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use dentflow_core::AggregateId;
use dentflow_parties::{
    Party, PartyCommand, PartyId, PartyKind, ReactivateParty, RegisterParty, SuspendParty,
    UpdateDetails,
};

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_supplier).get(list_suppliers))
        .route("/balances", get(list_balances))
        .route("/:id", get(get_supplier).put(update_supplier))
        .route("/:id/suspend", post(suspend_supplier))
        .route("/:id/reactivate", post(reactivate_supplier))
        .route("/:id/balance", get(get_balance))
}

pub async fn register_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Json(body): Json<dto::RegisterPartyRequest>,
) -> axum::response::Response {
    let party_agg = AggregateId::new();

    let committed = match services.dispatch::<Party>(
        tenant.tenant_id(),
        party_agg,
        "parties.party",
        PartyCommand::RegisterParty(RegisterParty {
            tenant_id: tenant.tenant_id(),
            party_id: PartyId::new(party_agg),
            kind: PartyKind::Supplier,
            name: body.name,
            contact: body.contact,
            occurred_at: Utc::now(),
        }),
        |_t, aggregate_id| Party::empty(PartyId::new(aggregate_id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": party_agg.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn update_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdatePartyRequest>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "supplier") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let committed = match services.dispatch::<Party>(
        tenant.tenant_id(),
        agg,
        "parties.party",
        PartyCommand::UpdateDetails(UpdateDetails {
            tenant_id: tenant.tenant_id(),
            party_id: PartyId::new(agg),
            name: body.name,
            contact: body.contact,
            occurred_at: Utc::now(),
        }),
        |_t, aggregate_id| Party::empty(PartyId::new(aggregate_id)),
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

pub async fn suspend_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SuspendPartyRequest>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "supplier") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let committed = match services.dispatch::<Party>(
        tenant.tenant_id(),
        agg,
        "parties.party",
        PartyCommand::SuspendParty(SuspendParty {
            tenant_id: tenant.tenant_id(),
            party_id: PartyId::new(agg),
            reason: body.reason,
            occurred_at: Utc::now(),
        }),
        |_t, aggregate_id| Party::empty(PartyId::new(aggregate_id)),
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

pub async fn reactivate_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "supplier") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let committed = match services.dispatch::<Party>(
        tenant.tenant_id(),
        agg,
        "parties.party",
        PartyCommand::ReactivateParty(ReactivateParty {
            tenant_id: tenant.tenant_id(),
            party_id: PartyId::new(agg),
            occurred_at: Utc::now(),
        }),
        |_t, aggregate_id| Party::empty(PartyId::new(aggregate_id)),
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

pub async fn get_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "supplier") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.parties_get(tenant.tenant_id(), &PartyId::new(agg)) {
        Some(rm) if rm.kind == PartyKind::Supplier => {
            (StatusCode::OK, Json(dto::party_to_json(rm))).into_response()
        }
        _ => errors::json_error(StatusCode::NOT_FOUND, "not_found", "supplier not found"),
    }
}

pub async fn list_suppliers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    let items = services
        .parties_list(tenant.tenant_id(), PartyKind::Supplier)
        .into_iter()
        .map(dto::party_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn get_balance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "supplier") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.supplier_balance(tenant.tenant_id(), &PartyId::new(agg)) {
        Some(b) => (StatusCode::OK, Json(dto::supplier_balance_to_json(b))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "no balance for supplier"),
    }
}

pub async fn list_balances(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    let items = services
        .supplier_balances_list(tenant.tenant_id())
        .into_iter()
        .map(dto::supplier_balance_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}
