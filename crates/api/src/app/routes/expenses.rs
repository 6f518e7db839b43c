use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use dentflow_accounting::{
    Expense, ExpenseCategory, ExpenseCommand, ExpenseId, ExpenseSource, RecordExpense,
};
use dentflow_core::AggregateId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/", post(record_expense).get(list_expenses))
}

/// Record a manual overhead expense (rent, salaries, utilities, ...).
///
/// Materials expenses for received purchase orders are booked automatically
/// by the purchasing workflow, not through this endpoint.
pub async fn record_expense(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Json(body): Json<dto::RecordExpenseRequest>,
) -> axum::response::Response {
    let expense_agg = AggregateId::new();

    let committed = match services.dispatch::<Expense>(
        tenant.tenant_id(),
        expense_agg,
        "accounting.expense",
        ExpenseCommand::RecordExpense(RecordExpense {
            tenant_id: tenant.tenant_id(),
            expense_id: ExpenseId::new(expense_agg),
            category: body.category,
            amount: body.amount,
            date: body.date,
            reference: body.reference,
            purchase_order_id: None,
            source: ExpenseSource::Manual,
            occurred_at: Utc::now(),
        }),
        |_t, aggregate_id| Expense::empty(ExpenseId::new(aggregate_id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": expense_agg.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct ExpensesQuery {
    pub category: Option<ExpenseCategory>,
}

pub async fn list_expenses(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Query(query): Query<ExpensesQuery>,
) -> axum::response::Response {
    let tenant_id = tenant.tenant_id();

    let items = match query.category {
        Some(category) => services.expenses_by_category(tenant_id, category),
        None => services.expenses_list(tenant_id),
    };

    let items = items.into_iter().map(dto::expense_to_json).collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}
