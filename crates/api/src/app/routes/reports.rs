use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use dentflow_accounting::reports;

use crate::app::errors;
use crate::app::services::AppServices;

/// Ledger-facing reports, mounted under `/accounting`.
pub fn accounting_router() -> Router {
    Router::new()
        .route("/financial-summary", get(financial_summary))
        .route("/aging", get(aging))
}

/// Derived analytics, mounted under `/analytics`.
pub fn analytics_router() -> Router {
    Router::new()
        .route("/cost-analysis", get(cost_analysis))
        .route("/material-profitability", get(material_profitability))
        .route("/purchase-vs-sales", get(purchase_vs_sales))
        .route("/daily-revenue", get(daily_revenue))
}

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub period: Option<String>,
}

impl PeriodQuery {
    /// Defaults to the current month (`YYYY-MM`).
    fn period(&self) -> String {
        self.period
            .clone()
            .unwrap_or_else(|| Utc::now().format("%Y-%m").to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct DaysQuery {
    pub days: Option<u32>,
}

pub async fn financial_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Query(query): Query<PeriodQuery>,
) -> axum::response::Response {
    let tenant_id = tenant.tenant_id();
    let invoices = services.invoice_report_rows(tenant_id);
    let expenses = services.expense_report_rows(tenant_id);

    match reports::financial_summary(&query.period(), &invoices, &expenses) {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn aging(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    let invoices = services.invoice_report_rows(tenant.tenant_id());
    let report = reports::aging_report(Utc::now().date_naive(), &invoices);
    (StatusCode::OK, Json(report)).into_response()
}

pub async fn cost_analysis(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Query(query): Query<PeriodQuery>,
) -> axum::response::Response {
    let tenant_id = tenant.tenant_id();
    let invoices = services.invoice_report_rows(tenant_id);
    let purchases = services.purchase_report_rows(tenant_id);
    let expenses = services.expense_report_rows(tenant_id);

    match reports::cost_analysis(&query.period(), &invoices, &purchases, &expenses) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn material_profitability(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    let invoices = services.invoice_report_rows(tenant.tenant_id());
    let report = reports::material_profitability(&invoices);
    (StatusCode::OK, Json(report)).into_response()
}

pub async fn purchase_vs_sales(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Query(query): Query<PeriodQuery>,
) -> axum::response::Response {
    let tenant_id = tenant.tenant_id();
    let invoices = services.invoice_report_rows(tenant_id);
    let purchases = services.purchase_report_rows(tenant_id);

    match reports::purchase_vs_sales(&query.period(), &invoices, &purchases) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn daily_revenue(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Query(query): Query<DaysQuery>,
) -> axum::response::Response {
    let tenant_id = tenant.tenant_id();
    let invoices = services.invoice_report_rows(tenant_id);
    let expenses = services.expense_report_rows(tenant_id);

    let days = query.days.unwrap_or(7);
    let series = reports::daily_revenue(days, Utc::now().date_naive(), &invoices, &expenses);
    (StatusCode::OK, Json(serde_json::json!({ "days": series }))).into_response()
}
