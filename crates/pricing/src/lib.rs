//! Pricing: per-work-type rules and the pure cost calculator.
//!
//! `calculate` is shared by the non-persisting invoice preview and the
//! persisting create path; identical inputs produce identical breakdowns.

pub mod calculator;
pub mod rules;

pub use calculator::{CostBreakdown, CostLine, CustomLine, PriceOverrides, calculate, teeth_count};
pub use rules::{PricingRule, Priority, WorkType};
