use serde::{Deserialize, Serialize};

use dentflow_core::DomainError;

use crate::rules::{PricingRule, Priority, WorkType};

/// Number of units a "full mouth" specification bills for.
const FULL_MOUTH_UNITS: u32 = 14;

/// Fixed costing assumption: two labor-hours per unit.
const LABOR_HOURS_PER_UNIT: u64 = 2;

/// Caller-supplied custom invoice line (replaces the default single line,
/// never the materials/labor/rush components).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomLine {
    pub description: String,
    pub quantity: u32,
    /// Price in minor units.
    pub unit_price: u64,
}

/// Per-operation price overrides. `None` means "use the rule".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PriceOverrides {
    pub unit_price: Option<u64>,
    pub materials_cost: Option<u64>,
    pub labor_cost: Option<u64>,
    pub custom_items: Option<Vec<CustomLine>>,
}

/// One line of a cost breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostLine {
    pub description: String,
    pub quantity: u32,
    pub unit_price: u64,
    pub total: u64,
}

/// Full derived cost picture for a case.
///
/// `subtotal` excludes discount and tax; the invoice ledger applies those.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub work_type: WorkType,
    pub teeth_count: u32,
    pub unit_price: u64,
    pub base_price: u64,
    pub materials_cost: u64,
    pub labor_cost: u64,
    pub rush_surcharge: u64,
    pub items: Vec<CostLine>,
    pub items_total: u64,
    pub subtotal: u64,
}

/// Units billed for a teeth specification.
///
/// A specification containing "full" (any case) bills a full mouth; otherwise
/// each non-empty comma-separated tooth entry is one unit.
pub fn teeth_count(teeth: &str) -> u32 {
    if teeth.to_lowercase().contains("full") {
        return FULL_MOUTH_UNITS;
    }
    teeth.split(',').filter(|t| !t.trim().is_empty()).count() as u32
}

fn mul(a: u64, b: u64, what: &str) -> Result<u64, DomainError> {
    a.checked_mul(b)
        .ok_or_else(|| DomainError::invariant(format!("{what} overflow")))
}

fn add(a: u64, b: u64, what: &str) -> Result<u64, DomainError> {
    a.checked_add(b)
        .ok_or_else(|| DomainError::invariant(format!("{what} overflow")))
}

/// Derive the cost breakdown for a case.
///
/// Pure: no side effects, deterministic for identical inputs, shared by the
/// preview and create paths.
pub fn calculate(
    work_type: WorkType,
    teeth: &str,
    priority: Priority,
    rule: &PricingRule,
    overrides: &PriceOverrides,
) -> Result<CostBreakdown, DomainError> {
    let teeth_count = teeth_count(teeth);
    let unit_price = overrides.unit_price.unwrap_or(rule.base_price_per_unit);
    let base_price = mul(unit_price, u64::from(teeth_count), "base price")?;

    let materials_cost = match overrides.materials_cost {
        Some(v) => v,
        None => {
            // Multiplier expresses total-over-base, so only the markup share
            // above 10000 bps is materials.
            let markup_bps = u64::from(rule.material_cost_multiplier_bps.saturating_sub(10_000));
            mul(base_price, markup_bps, "materials cost")? / 10_000
        }
    };

    let labor_cost = match overrides.labor_cost {
        Some(v) => v,
        None => mul(
            rule.labor_cost_per_hour,
            u64::from(teeth_count) * LABOR_HOURS_PER_UNIT,
            "labor cost",
        )?,
    };

    let full_surcharge = mul(base_price, u64::from(rule.rush_surcharge_percent), "rush surcharge")? / 100;
    let rush_surcharge = match priority {
        Priority::Rush => full_surcharge,
        Priority::Urgent => full_surcharge / 2,
        Priority::Normal => 0,
    };

    let items = match &overrides.custom_items {
        Some(custom) if !custom.is_empty() => {
            let mut lines = Vec::with_capacity(custom.len());
            for line in custom {
                if line.quantity == 0 {
                    return Err(DomainError::validation("custom item quantity must be positive"));
                }
                let total = mul(u64::from(line.quantity), line.unit_price, "custom line total")?;
                lines.push(CostLine {
                    description: line.description.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    total,
                });
            }
            lines
        }
        _ => vec![CostLine {
            description: work_type.label().to_string(),
            quantity: teeth_count,
            unit_price,
            total: base_price,
        }],
    };

    let mut items_total: u64 = 0;
    for line in &items {
        items_total = add(items_total, line.total, "items total")?;
    }

    let mut subtotal = add(items_total, materials_cost, "subtotal")?;
    subtotal = add(subtotal, labor_cost, "subtotal")?;
    subtotal = add(subtotal, rush_surcharge, "subtotal")?;

    Ok(CostBreakdown {
        work_type,
        teeth_count,
        unit_price,
        base_price,
        materials_cost,
        labor_cost,
        rush_surcharge,
        items,
        items_total,
        subtotal,
    })
}
