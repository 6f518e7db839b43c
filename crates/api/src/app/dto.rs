use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use dentflow_cases::{CaseStatus, QcResult};
use dentflow_infra::projections::{
    CaseReadModel, DoctorBalance, ExpenseReadModel, InvoiceReadModel, PartyReadModel,
    PurchaseOrderReadModel, SupplierBalance,
};
use dentflow_parties::ContactInfo;
use dentflow_pricing::{CostBreakdown, PriceOverrides, PricingRule, Priority, WorkType};
use dentflow_purchasing::PoStatus;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterCaseRequest {
    pub doctor_id: String,
    pub work_type: WorkType,
    pub teeth: String,
    #[serde(default)]
    pub priority: Priority,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransferCaseRequest {
    pub to_status: CaseStatus,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecordQcRequest {
    pub result: QcResult,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PricePreviewRequest {
    pub work_type: WorkType,
    pub teeth: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub overrides: PriceOverrides,
}

#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    pub case_id: String,
    #[serde(default)]
    pub discount: u64,
    #[serde(default)]
    pub tax: u64,
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub overrides: PriceOverrides,
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub amount: u64,
    pub method: dentflow_invoicing::PaymentMethod,
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelInvoiceRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PurchaseOrderLineRequest {
    pub description: String,
    pub quantity: u32,
    pub unit_price: u64,
}

#[derive(Debug, Deserialize)]
pub struct CreatePurchaseOrderRequest {
    pub supplier_id: String,
    pub lines: Vec<PurchaseOrderLineRequest>,
    #[serde(default)]
    pub discount: u64,
    #[serde(default)]
    pub tax: u64,
    pub expected_delivery: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePoStatusRequest {
    pub status: PoStatus,
}

#[derive(Debug, Deserialize)]
pub struct SupplierPaymentRequest {
    pub amount: u64,
    pub method: dentflow_purchasing::PaymentMethod,
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterPartyRequest {
    pub name: String,
    pub contact: Option<ContactInfo>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePartyRequest {
    pub name: Option<String>,
    pub contact: Option<ContactInfo>,
}

#[derive(Debug, Deserialize)]
pub struct SuspendPartyRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecordExpenseRequest {
    pub category: dentflow_accounting::ExpenseCategory,
    pub amount: u64,
    pub date: NaiveDate,
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PutPricingRuleRequest {
    pub base_price_per_unit: u64,
    pub material_cost_multiplier_bps: u32,
    pub labor_cost_per_hour: u64,
    pub rush_surcharge_percent: u32,
}

impl PutPricingRuleRequest {
    pub fn into_rule(self) -> PricingRule {
        PricingRule {
            base_price_per_unit: self.base_price_per_unit,
            material_cost_multiplier_bps: self.material_cost_multiplier_bps,
            labor_cost_per_hour: self.labor_cost_per_hour,
            rush_surcharge_percent: self.rush_surcharge_percent,
        }
    }
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn case_to_json(rm: CaseReadModel) -> serde_json::Value {
    json!({
        "id": rm.case_id.0.to_string(),
        "case_number": rm.case_number,
        "doctor_id": rm.doctor_id.0.to_string(),
        "work_type": rm.work_type,
        "teeth": rm.teeth,
        "priority": rm.priority,
        "status": rm.status,
        "department": rm.department,
        "qc_result": rm.qc_result,
        "invoice_id": rm.invoice_id.map(|id| id.to_string()),
        "history": rm.history,
        "registered_at": rm.registered_at.to_rfc3339(),
        "updated_at": rm.updated_at.to_rfc3339(),
    })
}

pub fn invoice_to_json(rm: InvoiceReadModel) -> serde_json::Value {
    json!({
        "id": rm.invoice_id.0.to_string(),
        "invoice_number": rm.invoice_number,
        "case_id": rm.case_id.0.to_string(),
        "doctor_id": rm.doctor_id.0.to_string(),
        "work_type": rm.work_type,
        "subtotal": rm.subtotal,
        "discount": rm.discount,
        "tax": rm.tax,
        "total_amount": rm.total_amount,
        "total_paid": rm.total_paid,
        "remaining": rm.remaining(),
        "status": rm.status,
        "issued_on": rm.issued_on,
        "due_date": rm.due_date,
        "payments": rm.payments.into_iter().map(|p| json!({
            "amount": p.amount,
            "method": p.method,
            "reference": p.reference,
            "date": p.date,
        })).collect::<Vec<_>>(),
    })
}

pub fn breakdown_to_json(b: CostBreakdown) -> serde_json::Value {
    json!({
        "work_type": b.work_type,
        "teeth_count": b.teeth_count,
        "unit_price": b.unit_price,
        "base_price": b.base_price,
        "materials_cost": b.materials_cost,
        "labor_cost": b.labor_cost,
        "rush_surcharge": b.rush_surcharge,
        "items": b.items,
        "items_total": b.items_total,
        "subtotal": b.subtotal,
    })
}

pub fn purchase_order_to_json(rm: PurchaseOrderReadModel) -> serde_json::Value {
    json!({
        "id": rm.order_id.0.to_string(),
        "po_number": rm.po_number,
        "supplier_id": rm.supplier_id.0.to_string(),
        "lines": rm.lines,
        "subtotal": rm.subtotal,
        "discount": rm.discount,
        "tax": rm.tax,
        "total_amount": rm.total_amount,
        "total_paid": rm.total_paid,
        "remaining": rm.remaining(),
        "status": rm.status,
        "expected_delivery": rm.expected_delivery,
        "created_on": rm.created_on,
        "payments": rm.payments.into_iter().map(|p| json!({
            "amount": p.amount,
            "method": p.method,
            "reference": p.reference,
            "date": p.date,
        })).collect::<Vec<_>>(),
    })
}

pub fn party_to_json(rm: PartyReadModel) -> serde_json::Value {
    json!({
        "id": rm.party_id.0.to_string(),
        "kind": rm.kind,
        "name": rm.name,
        "contact": rm.contact,
        "status": rm.status,
    })
}

pub fn doctor_balance_to_json(b: DoctorBalance) -> serde_json::Value {
    json!({
        "doctor_id": b.doctor_id.0.to_string(),
        "total_invoiced": b.total_invoiced,
        "total_paid": b.total_paid,
        "total_debt": b.total_debt,
        "open_invoice_count": b.open_invoice_count,
    })
}

pub fn supplier_balance_to_json(b: SupplierBalance) -> serde_json::Value {
    json!({
        "supplier_id": b.supplier_id.0.to_string(),
        "total_purchases": b.total_purchases,
        "total_paid": b.total_paid,
        "balance": b.balance,
        "order_count": b.order_count,
    })
}

pub fn expense_to_json(rm: ExpenseReadModel) -> serde_json::Value {
    json!({
        "id": rm.expense_id.0.to_string(),
        "category": rm.category,
        "amount": rm.amount,
        "date": rm.date,
        "reference": rm.reference,
        "purchase_order_id": rm.purchase_order_id.map(|id| id.0.to_string()),
        "source": rm.source,
    })
}

pub fn pricing_rule_to_json(work_type: WorkType, rule: PricingRule) -> serde_json::Value {
    json!({
        "work_type": work_type,
        "base_price_per_unit": rule.base_price_per_unit,
        "material_cost_multiplier_bps": rule.material_cost_multiplier_bps,
        "labor_cost_per_hour": rule.labor_cost_per_hour,
        "rush_surcharge_percent": rule.rush_surcharge_percent,
    })
}
