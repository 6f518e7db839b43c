use axum::Router;

pub mod cases;
pub mod common;
pub mod doctors;
pub mod expenses;
pub mod invoices;
pub mod pricing_rules;
pub mod purchase_orders;
pub mod reports;
pub mod suppliers;
pub mod system;

/// Router for all tenant-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/cases", cases::router())
        .nest("/invoices", invoices::router())
        .nest("/purchase-orders", purchase_orders::router())
        .nest("/doctors", doctors::router())
        .nest("/suppliers", suppliers::router())
        .nest("/expenses", expenses::router())
        .nest("/pricing-rules", pricing_rules::router())
        .nest("/accounting", reports::accounting_router())
        .nest("/analytics", reports::analytics_router())
}
