use serde::{Deserialize, Serialize};

/// Kind of prosthetic work a case produces.
///
/// Pricing rules are keyed by this; profitability reporting groups by it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkType {
    Crown,
    Bridge,
    Veneer,
    Implant,
    Denture,
    Orthodontic,
}

impl WorkType {
    pub const ALL: [WorkType; 6] = [
        WorkType::Crown,
        WorkType::Bridge,
        WorkType::Veneer,
        WorkType::Implant,
        WorkType::Denture,
        WorkType::Orthodontic,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            WorkType::Crown => "crown",
            WorkType::Bridge => "bridge",
            WorkType::Veneer => "veneer",
            WorkType::Implant => "implant",
            WorkType::Denture => "denture",
            WorkType::Orthodontic => "orthodontic",
        }
    }
}

/// Case priority. Rush adds the full surcharge percentage, urgent half of it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    Urgent,
    Rush,
}

/// Per-work-type pricing parameters.
///
/// All currency values are in minor units (piastres). The material multiplier
/// is in basis points and expresses the total-over-base ratio: 13000 means
/// materials add 30% on top of the base price.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingRule {
    pub base_price_per_unit: u64,
    pub material_cost_multiplier_bps: u32,
    pub labor_cost_per_hour: u64,
    pub rush_surcharge_percent: u32,
}

/// Fallback unit price when no rule exists and no override is given.
pub const DEFAULT_UNIT_PRICE: u64 = 50_000;

impl Default for PricingRule {
    fn default() -> Self {
        Self {
            base_price_per_unit: DEFAULT_UNIT_PRICE,
            material_cost_multiplier_bps: 13_000,
            labor_cost_per_hour: 5_000,
            rush_surcharge_percent: 20,
        }
    }
}

impl PricingRule {
    /// Seed rule for a work type; tenants override these through the admin path.
    pub fn default_for(work_type: WorkType) -> Self {
        let base_price_per_unit = match work_type {
            WorkType::Crown => 50_000,
            WorkType::Bridge => 45_000,
            WorkType::Veneer => 60_000,
            WorkType::Implant => 120_000,
            WorkType::Denture => 80_000,
            WorkType::Orthodontic => 30_000,
        };
        Self {
            base_price_per_unit,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_type_serializes_snake_case() {
        let json = serde_json::to_string(&WorkType::Crown).unwrap();
        assert_eq!(json, "\"crown\"");
    }

    #[test]
    fn default_rule_matches_fallback_unit_price() {
        let rule = PricingRule::default();
        assert_eq!(rule.base_price_per_unit, DEFAULT_UNIT_PRICE);
        assert_eq!(rule.material_cost_multiplier_bps, 13_000);
    }
}
