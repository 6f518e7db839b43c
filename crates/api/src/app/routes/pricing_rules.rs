use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use dentflow_pricing::WorkType;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_rules))
        .route("/:work_type", get(get_rule).put(put_rule))
}

fn parse_work_type(raw: &str) -> Result<WorkType, axum::response::Response> {
    WorkType::ALL
        .into_iter()
        .find(|w| w.label() == raw)
        .ok_or_else(|| {
            errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_work_type",
                format!("unknown work type: {raw}"),
            )
        })
}

pub async fn list_rules(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    let items = services
        .list_pricing_rules(tenant.tenant_id())
        .into_iter()
        .map(|(work_type, rule)| dto::pricing_rule_to_json(work_type, rule))
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn get_rule(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(work_type): Path<String>,
) -> axum::response::Response {
    let work_type = match parse_work_type(&work_type) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let rule = services.pricing_rule(tenant.tenant_id(), work_type);
    (StatusCode::OK, Json(dto::pricing_rule_to_json(work_type, rule))).into_response()
}

pub async fn put_rule(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(work_type): Path<String>,
    Json(body): Json<dto::PutPricingRuleRequest>,
) -> axum::response::Response {
    let work_type = match parse_work_type(&work_type) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let rule = body.into_rule();
    services.put_pricing_rule(tenant.tenant_id(), work_type, rule);
    (StatusCode::OK, Json(dto::pricing_rule_to_json(work_type, rule))).into_response()
}
