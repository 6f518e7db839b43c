use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use dentflow_core::AggregateId;
use dentflow_parties::PartyId;
use dentflow_purchasing::{
    CreatePurchaseOrder, OrderLineInput, PurchaseOrder, PurchaseOrderCommand, PurchaseOrderId,
    RecordSupplierPayment,
};

use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/status", put(change_status))
        .route("/:id/payment", post(record_supplier_payment))
        .route("/:id/expense", post(book_expense))
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Json(body): Json<dto::CreatePurchaseOrderRequest>,
) -> axum::response::Response {
    let supplier_agg = match common::parse_id(&body.supplier_id, "supplier") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let order_agg = AggregateId::new();
    let order_id = PurchaseOrderId::new(order_agg);
    let po_number = services.next_po_number(tenant.tenant_id());

    let lines = body
        .lines
        .into_iter()
        .map(|l| OrderLineInput {
            description: l.description,
            quantity: l.quantity,
            unit_price: l.unit_price,
        })
        .collect();

    let committed = match services.dispatch::<PurchaseOrder>(
        tenant.tenant_id(),
        order_agg,
        "purchasing.order",
        PurchaseOrderCommand::CreatePurchaseOrder(CreatePurchaseOrder {
            tenant_id: tenant.tenant_id(),
            order_id,
            po_number: po_number.clone(),
            supplier_id: PartyId::new(supplier_agg),
            lines,
            discount: body.discount,
            tax: body.tax,
            expected_delivery: body.expected_delivery,
            occurred_at: Utc::now(),
        }),
        |_t, aggregate_id| PurchaseOrder::empty(PurchaseOrderId::new(aggregate_id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": order_agg.to_string(),
            "po_number": po_number,
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn change_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ChangePoStatusRequest>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "purchase order") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let committed =
        match services.change_po_status(tenant.tenant_id(), PurchaseOrderId::new(agg), body.status)
        {
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

pub async fn record_supplier_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SupplierPaymentRequest>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "purchase order") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let committed = match services.dispatch::<PurchaseOrder>(
        tenant.tenant_id(),
        agg,
        "purchasing.order",
        PurchaseOrderCommand::RecordSupplierPayment(RecordSupplierPayment {
            tenant_id: tenant.tenant_id(),
            order_id: PurchaseOrderId::new(agg),
            amount: body.amount,
            method: body.method,
            reference: body.reference,
            occurred_at: Utc::now(),
        }),
        |_t, aggregate_id| PurchaseOrder::empty(PurchaseOrderId::new(aggregate_id)),
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

/// Manual fallback for the goods-received expense.
pub async fn book_expense(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "purchase order") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let committed = match services.book_po_expense(tenant.tenant_id(), PurchaseOrderId::new(agg)) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match common::parse_id(&id, "purchase order") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.purchase_orders_get(tenant.tenant_id(), &PurchaseOrderId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(dto::purchase_order_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "purchase order not found"),
    }
}

#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    pub supplier_id: Option<String>,
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Query(query): Query<OrdersQuery>,
) -> axum::response::Response {
    let tenant_id = tenant.tenant_id();

    let items = if let Some(supplier_id) = query.supplier_id {
        let agg = match common::parse_id(&supplier_id, "supplier") {
            Ok(v) => v,
            Err(resp) => return resp,
        };
        services.purchase_orders_by_supplier(tenant_id, PartyId::new(agg))
    } else {
        services.purchase_orders_list(tenant_id)
    };

    let items = items
        .into_iter()
        .map(dto::purchase_order_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}
