//! Derived financial reports.
//!
//! Every function here is pure: it reads rows the caller already loaded from
//! the read models and returns a computed report. Nothing in this module
//! touches a store or emits events.

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use dentflow_core::DomainError;
use dentflow_pricing::WorkType;

use crate::expense::ExpenseCategory;

/// One settled payment, dated for the daily series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRow {
    pub date: NaiveDate,
    pub amount: u64,
}

/// Invoice facts the reports need. Amounts in minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRow {
    pub invoice_number: String,
    pub work_type: WorkType,
    pub total_amount: u64,
    pub total_paid: u64,
    pub materials_cost: u64,
    pub labor_cost: u64,
    pub cancelled: bool,
    pub issued_on: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub payments: Vec<PaymentRow>,
}

impl InvoiceRow {
    pub fn remaining(&self) -> u64 {
        self.total_amount.saturating_sub(self.total_paid)
    }
}

/// Purchase order facts the reports need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRow {
    pub po_number: String,
    pub total_amount: u64,
    pub total_paid: u64,
    pub cancelled: bool,
    pub created_on: NaiveDate,
}

/// Expense facts the reports need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseRow {
    pub category: ExpenseCategory,
    pub amount: u64,
    pub date: NaiveDate,
}

/// Period summary for one `YYYY-MM` month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialSummary {
    pub period: String,
    pub revenue: u64,
    pub collected: u64,
    pub outstanding: u64,
    pub total_expenses: u64,
    pub net_profit: i64,
    /// Rounded percentage, 0 when there is no revenue.
    pub collection_rate: u32,
}

/// One aging bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingBucket {
    pub label: String,
    pub count: u64,
    pub total: u64,
    pub invoice_numbers: Vec<String>,
}

/// Receivables aging over all open invoices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingReport {
    pub buckets: Vec<AgingBucket>,
    pub total_outstanding: u64,
}

/// Period cost analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostAnalysis {
    pub period: String,
    pub revenue: u64,
    pub materials_cost: u64,
    pub labor_cost: u64,
    pub purchases: u64,
    pub overhead: u64,
    pub gross_profit: i64,
    pub net_profit: i64,
    pub gross_margin_percent: i64,
    pub net_margin_percent: i64,
    pub case_count: u64,
    pub avg_revenue_per_case: u64,
}

/// Profitability of one work type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkTypeProfit {
    pub work_type: WorkType,
    pub case_count: u64,
    pub revenue: u64,
    pub cost: u64,
    pub profit: i64,
    pub margin_percent: i64,
    pub avg_revenue: u64,
    pub avg_cost: u64,
}

/// Profitability grouped by work type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialProfitability {
    pub per_type: Vec<WorkTypeProfit>,
}

/// One day of the trailing revenue series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRevenuePoint {
    pub date: NaiveDate,
    pub revenue: u64,
    pub collected: u64,
    pub expenses: u64,
}

/// Purchases against sales for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseVsSales {
    pub period: String,
    pub sales_total: u64,
    pub sales_collected: u64,
    pub purchases_total: u64,
    pub purchases_paid: u64,
    pub net: i64,
    /// purchases as a rounded percentage of sales, 0 when there are no sales.
    pub purchase_to_sales_ratio_percent: i64,
}

/// Parse a `YYYY-MM` period string.
fn parse_period(period: &str) -> Result<(i32, u32), DomainError> {
    let (year, month) = period
        .split_once('-')
        .ok_or_else(|| DomainError::validation("period must be YYYY-MM"))?;
    let year: i32 = year
        .parse()
        .map_err(|_| DomainError::validation("period must be YYYY-MM"))?;
    let month: u32 = month
        .parse()
        .map_err(|_| DomainError::validation("period must be YYYY-MM"))?;
    if !(1..=12).contains(&month) {
        return Err(DomainError::validation("period month out of range"));
    }
    Ok((year, month))
}

fn in_period(date: NaiveDate, year: i32, month: u32) -> bool {
    date.year() == year && date.month() == month
}

/// Rounded percentage of `part` over `whole`, 0 when `whole` is zero.
fn percent_u(part: u64, whole: u64) -> u32 {
    if whole == 0 {
        return 0;
    }
    let scaled = u128::from(part) * 100 + u128::from(whole) / 2;
    (scaled / u128::from(whole)) as u32
}

fn percent_i(part: i64, whole: u64) -> i64 {
    if whole == 0 {
        return 0;
    }
    let whole = i128::from(whole);
    let scaled = i128::from(part) * 100;
    let rounded = if scaled >= 0 {
        (scaled + whole / 2) / whole
    } else {
        (scaled - whole / 2) / whole
    };
    rounded as i64
}

/// Monthly revenue/collection/expense summary.
pub fn financial_summary(
    period: &str,
    invoices: &[InvoiceRow],
    expenses: &[ExpenseRow],
) -> Result<FinancialSummary, DomainError> {
    let (year, month) = parse_period(period)?;

    let mut revenue: u64 = 0;
    let mut collected: u64 = 0;
    for inv in invoices {
        if inv.cancelled || !in_period(inv.issued_on, year, month) {
            continue;
        }
        revenue = revenue.saturating_add(inv.total_amount);
        collected = collected.saturating_add(inv.total_paid);
    }

    let total_expenses: u64 = expenses
        .iter()
        .filter(|e| in_period(e.date, year, month))
        .fold(0u64, |acc, e| acc.saturating_add(e.amount));

    Ok(FinancialSummary {
        period: period.to_string(),
        revenue,
        collected,
        outstanding: revenue.saturating_sub(collected),
        total_expenses,
        net_profit: collected as i64 - total_expenses as i64,
        collection_rate: percent_u(collected, revenue),
    })
}

const AGING_CURRENT: &str = "جاري";
const AGING_31_60: &str = "31-60 يوم";
const AGING_61_90: &str = "61-90 يوم";
const AGING_OVER_90: &str = "أكثر من 90 يوم";

/// Receivables aging. Open (non-cancelled, not fully paid) invoices are
/// bucketed by days past their due date; invoices without a due date count
/// as current.
pub fn aging_report(now: NaiveDate, invoices: &[InvoiceRow]) -> AgingReport {
    let mut buckets: Vec<AgingBucket> =
        [AGING_CURRENT, AGING_31_60, AGING_61_90, AGING_OVER_90]
            .into_iter()
            .map(|label| AgingBucket {
                label: label.to_string(),
                count: 0,
                total: 0,
                invoice_numbers: Vec::new(),
            })
            .collect();

    let mut total_outstanding: u64 = 0;
    for inv in invoices {
        if inv.cancelled || inv.remaining() == 0 {
            continue;
        }

        let days_overdue = inv
            .due_date
            .map(|due| (now - due).num_days().max(0))
            .unwrap_or(0);
        let idx = match days_overdue {
            0..=30 => 0,
            31..=60 => 1,
            61..=90 => 2,
            _ => 3,
        };

        let bucket = &mut buckets[idx];
        bucket.count += 1;
        bucket.total = bucket.total.saturating_add(inv.remaining());
        bucket.invoice_numbers.push(inv.invoice_number.clone());
        total_outstanding = total_outstanding.saturating_add(inv.remaining());
    }

    AgingReport {
        buckets,
        total_outstanding,
    }
}

/// Period cost analysis: production costs from invoices, procurement from
/// purchase orders, overhead from the flagged expense categories.
pub fn cost_analysis(
    period: &str,
    invoices: &[InvoiceRow],
    purchases: &[PurchaseRow],
    expenses: &[ExpenseRow],
) -> Result<CostAnalysis, DomainError> {
    let (year, month) = parse_period(period)?;

    let mut revenue: u64 = 0;
    let mut materials_cost: u64 = 0;
    let mut labor_cost: u64 = 0;
    let mut case_count: u64 = 0;
    for inv in invoices {
        if inv.cancelled || !in_period(inv.issued_on, year, month) {
            continue;
        }
        revenue = revenue.saturating_add(inv.total_amount);
        materials_cost = materials_cost.saturating_add(inv.materials_cost);
        labor_cost = labor_cost.saturating_add(inv.labor_cost);
        case_count += 1;
    }

    let purchases_total: u64 = purchases
        .iter()
        .filter(|po| !po.cancelled && in_period(po.created_on, year, month))
        .fold(0u64, |acc, po| acc.saturating_add(po.total_amount));

    let overhead: u64 = expenses
        .iter()
        .filter(|e| e.category.is_overhead() && in_period(e.date, year, month))
        .fold(0u64, |acc, e| acc.saturating_add(e.amount));

    let gross_profit = revenue as i64 - materials_cost as i64 - labor_cost as i64;
    let net_profit = revenue as i64 - purchases_total as i64 - overhead as i64;

    Ok(CostAnalysis {
        period: period.to_string(),
        revenue,
        materials_cost,
        labor_cost,
        purchases: purchases_total,
        overhead,
        gross_profit,
        net_profit,
        gross_margin_percent: percent_i(gross_profit, revenue),
        net_margin_percent: percent_i(net_profit, revenue),
        case_count,
        avg_revenue_per_case: if case_count == 0 { 0 } else { revenue / case_count },
    })
}

/// Profitability per work type over all non-cancelled invoices.
pub fn material_profitability(invoices: &[InvoiceRow]) -> MaterialProfitability {
    let per_type = WorkType::ALL
        .iter()
        .filter_map(|&work_type| {
            let mut case_count: u64 = 0;
            let mut revenue: u64 = 0;
            let mut cost: u64 = 0;
            for inv in invoices {
                if inv.cancelled || inv.work_type != work_type {
                    continue;
                }
                case_count += 1;
                revenue = revenue.saturating_add(inv.total_amount);
                cost = cost
                    .saturating_add(inv.materials_cost)
                    .saturating_add(inv.labor_cost);
            }
            if case_count == 0 {
                return None;
            }
            let profit = revenue as i64 - cost as i64;
            Some(WorkTypeProfit {
                work_type,
                case_count,
                revenue,
                cost,
                profit,
                margin_percent: percent_i(profit, revenue),
                avg_revenue: revenue / case_count,
                avg_cost: cost / case_count,
            })
        })
        .collect();

    MaterialProfitability { per_type }
}

/// Trailing per-day {revenue, collected, expenses} series, oldest day first.
/// Revenue is keyed by issue date, collections by payment date.
pub fn daily_revenue(
    days: u32,
    now: NaiveDate,
    invoices: &[InvoiceRow],
    expenses: &[ExpenseRow],
) -> Vec<DailyRevenuePoint> {
    let days = days.max(1);
    (0..days)
        .rev()
        .filter_map(|back| now.checked_sub_days(Days::new(u64::from(back))))
        .map(|date| {
            let mut revenue: u64 = 0;
            let mut collected: u64 = 0;
            for inv in invoices {
                if inv.cancelled {
                    continue;
                }
                if inv.issued_on == date {
                    revenue = revenue.saturating_add(inv.total_amount);
                }
                collected = collected.saturating_add(
                    inv.payments
                        .iter()
                        .filter(|p| p.date == date)
                        .fold(0u64, |acc, p| acc.saturating_add(p.amount)),
                );
            }
            let day_expenses: u64 = expenses
                .iter()
                .filter(|e| e.date == date)
                .fold(0u64, |acc, e| acc.saturating_add(e.amount));
            DailyRevenuePoint {
                date,
                revenue,
                collected,
                expenses: day_expenses,
            }
        })
        .collect()
}

/// Purchases against sales for one `YYYY-MM` period.
pub fn purchase_vs_sales(
    period: &str,
    invoices: &[InvoiceRow],
    purchases: &[PurchaseRow],
) -> Result<PurchaseVsSales, DomainError> {
    let (year, month) = parse_period(period)?;

    let mut sales_total: u64 = 0;
    let mut sales_collected: u64 = 0;
    for inv in invoices {
        if inv.cancelled || !in_period(inv.issued_on, year, month) {
            continue;
        }
        sales_total = sales_total.saturating_add(inv.total_amount);
        sales_collected = sales_collected.saturating_add(inv.total_paid);
    }

    let mut purchases_total: u64 = 0;
    let mut purchases_paid: u64 = 0;
    for po in purchases {
        if po.cancelled || !in_period(po.created_on, year, month) {
            continue;
        }
        purchases_total = purchases_total.saturating_add(po.total_amount);
        purchases_paid = purchases_paid.saturating_add(po.total_paid);
    }

    Ok(PurchaseVsSales {
        period: period.to_string(),
        sales_total,
        sales_collected,
        purchases_total,
        purchases_paid,
        net: sales_total as i64 - purchases_total as i64,
        purchase_to_sales_ratio_percent: percent_i(purchases_total as i64, sales_total),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn invoice(number: &str, total: u64, paid: u64, issued: NaiveDate) -> InvoiceRow {
        InvoiceRow {
            invoice_number: number.to_string(),
            work_type: WorkType::Crown,
            total_amount: total,
            total_paid: paid,
            materials_cost: total / 5,
            labor_cost: total / 10,
            cancelled: false,
            issued_on: issued,
            due_date: None,
            payments: Vec::new(),
        }
    }

    #[test]
    fn financial_summary_filters_by_period() {
        let invoices = vec![
            invoice("INV-000001", 225_000, 100_000, date(2024, 3, 5)),
            invoice("INV-000002", 100_000, 100_000, date(2024, 3, 20)),
            invoice("INV-000003", 999_000, 0, date(2024, 4, 1)),
        ];
        let expenses = vec![
            ExpenseRow {
                category: ExpenseCategory::Rent,
                amount: 50_000,
                date: date(2024, 3, 1),
            },
            ExpenseRow {
                category: ExpenseCategory::Materials,
                amount: 70_000,
                date: date(2024, 4, 2),
            },
        ];

        let summary = financial_summary("2024-03", &invoices, &expenses).unwrap();
        assert_eq!(summary.revenue, 325_000);
        assert_eq!(summary.collected, 200_000);
        assert_eq!(summary.outstanding, 125_000);
        assert_eq!(summary.total_expenses, 50_000);
        assert_eq!(summary.net_profit, 150_000);
        // 200_000 / 325_000 = 61.5% -> 62
        assert_eq!(summary.collection_rate, 62);
    }

    #[test]
    fn financial_summary_with_no_revenue_has_zero_rate() {
        let summary = financial_summary("2024-03", &[], &[]).unwrap();
        assert_eq!(summary.collection_rate, 0);
        assert_eq!(summary.net_profit, 0);
    }

    #[test]
    fn financial_summary_saturates_on_absurd_amounts() {
        // Report folds must not panic on overflow; they clamp at the bound.
        let invoices = vec![
            invoice("INV-000001", u64::MAX, 0, date(2024, 3, 5)),
            invoice("INV-000002", u64::MAX, 0, date(2024, 3, 6)),
        ];
        let summary = financial_summary("2024-03", &invoices, &[]).unwrap();
        assert_eq!(summary.revenue, u64::MAX);
        assert_eq!(summary.outstanding, u64::MAX);

        let aging = aging_report(date(2024, 4, 1), &invoices);
        assert_eq!(aging.total_outstanding, u64::MAX);
    }

    #[test]
    fn malformed_period_is_rejected() {
        let err = financial_summary("march", &[], &[]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        let err = financial_summary("2024-13", &[], &[]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn invoice_due_45_days_ago_lands_in_second_bucket() {
        let now = date(2024, 5, 15);
        let mut inv = invoice("INV-000010", 225_000, 0, date(2024, 3, 1));
        inv.due_date = Some(date(2024, 3, 31)); // 45 days before now

        let report = aging_report(now, &[inv]);
        assert_eq!(report.buckets[1].label, "31-60 يوم");
        assert_eq!(report.buckets[1].count, 1);
        assert_eq!(report.buckets[1].total, 225_000);
        assert_eq!(report.buckets[0].count, 0);
        assert_eq!(report.total_outstanding, 225_000);
    }

    #[test]
    fn aging_skips_paid_and_cancelled_and_defaults_to_current() {
        let now = date(2024, 5, 15);
        let paid = invoice("INV-000011", 100_000, 100_000, date(2024, 1, 1));
        let mut cancelled = invoice("INV-000012", 100_000, 0, date(2024, 1, 1));
        cancelled.cancelled = true;
        let no_due = invoice("INV-000013", 80_000, 30_000, date(2024, 5, 1));
        let mut ancient = invoice("INV-000014", 60_000, 0, date(2024, 1, 1));
        ancient.due_date = Some(date(2024, 1, 10)); // 126 days before now

        let report = aging_report(now, &[paid, cancelled, no_due, ancient]);
        assert_eq!(report.buckets[0].label, "جاري");
        assert_eq!(report.buckets[0].count, 1);
        assert_eq!(report.buckets[0].total, 50_000);
        assert_eq!(report.buckets[3].label, "أكثر من 90 يوم");
        assert_eq!(report.buckets[3].count, 1);
        assert_eq!(report.buckets[3].invoice_numbers, vec!["INV-000014".to_string()]);
        assert_eq!(report.total_outstanding, 110_000);
    }

    #[test]
    fn cost_analysis_splits_production_procurement_and_overhead() {
        let invoices = vec![
            invoice("INV-000020", 200_000, 150_000, date(2024, 3, 5)),
            invoice("INV-000021", 100_000, 0, date(2024, 3, 8)),
        ];
        let purchases = vec![
            PurchaseRow {
                po_number: "PO-000001".to_string(),
                total_amount: 90_000,
                total_paid: 90_000,
                cancelled: false,
                created_on: date(2024, 3, 2),
            },
            PurchaseRow {
                po_number: "PO-000002".to_string(),
                total_amount: 40_000,
                total_paid: 0,
                cancelled: true,
                created_on: date(2024, 3, 9),
            },
        ];
        let expenses = vec![
            ExpenseRow {
                category: ExpenseCategory::Salaries,
                amount: 60_000,
                date: date(2024, 3, 28),
            },
            ExpenseRow {
                category: ExpenseCategory::Materials,
                amount: 90_000,
                date: date(2024, 3, 28),
            },
        ];

        let analysis = cost_analysis("2024-03", &invoices, &purchases, &expenses).unwrap();
        assert_eq!(analysis.revenue, 300_000);
        assert_eq!(analysis.materials_cost, 60_000);
        assert_eq!(analysis.labor_cost, 30_000);
        assert_eq!(analysis.purchases, 90_000);
        // Materials expenses are procurement, not overhead.
        assert_eq!(analysis.overhead, 60_000);
        assert_eq!(analysis.gross_profit, 210_000);
        assert_eq!(analysis.net_profit, 150_000);
        assert_eq!(analysis.gross_margin_percent, 70);
        assert_eq!(analysis.net_margin_percent, 50);
        assert_eq!(analysis.case_count, 2);
        assert_eq!(analysis.avg_revenue_per_case, 150_000);
    }

    #[test]
    fn material_profitability_groups_by_work_type() {
        let mut implant = invoice("INV-000030", 360_000, 0, date(2024, 3, 1));
        implant.work_type = WorkType::Implant;
        let invoices = vec![
            invoice("INV-000031", 200_000, 0, date(2024, 3, 1)),
            invoice("INV-000032", 100_000, 0, date(2024, 3, 2)),
            implant,
        ];

        let report = material_profitability(&invoices);
        assert_eq!(report.per_type.len(), 2);

        let crowns = report
            .per_type
            .iter()
            .find(|t| t.work_type == WorkType::Crown)
            .unwrap();
        assert_eq!(crowns.case_count, 2);
        assert_eq!(crowns.revenue, 300_000);
        assert_eq!(crowns.cost, 90_000);
        assert_eq!(crowns.profit, 210_000);
        assert_eq!(crowns.margin_percent, 70);
        assert_eq!(crowns.avg_revenue, 150_000);
    }

    #[test]
    fn daily_revenue_builds_trailing_window() {
        let now = date(2024, 3, 10);
        let mut inv = invoice("INV-000040", 120_000, 50_000, date(2024, 3, 9));
        inv.payments = vec![
            PaymentRow {
                date: date(2024, 3, 9),
                amount: 20_000,
            },
            PaymentRow {
                date: date(2024, 3, 10),
                amount: 30_000,
            },
        ];
        let expenses = vec![ExpenseRow {
            category: ExpenseCategory::Transport,
            amount: 5_000,
            date: date(2024, 3, 10),
        }];

        let series = daily_revenue(3, now, &[inv], &expenses);
        assert_eq!(series.len(), 3);
        assert_eq!(series[0].date, date(2024, 3, 8));
        assert_eq!(series[1].revenue, 120_000);
        assert_eq!(series[1].collected, 20_000);
        assert_eq!(series[2].collected, 30_000);
        assert_eq!(series[2].expenses, 5_000);
    }

    #[test]
    fn purchase_vs_sales_compares_period_totals() {
        let invoices = vec![invoice("INV-000050", 400_000, 250_000, date(2024, 3, 3))];
        let purchases = vec![PurchaseRow {
            po_number: "PO-000010".to_string(),
            total_amount: 100_000,
            total_paid: 60_000,
            cancelled: false,
            created_on: date(2024, 3, 4),
        }];

        let report = purchase_vs_sales("2024-03", &invoices, &purchases).unwrap();
        assert_eq!(report.sales_total, 400_000);
        assert_eq!(report.sales_collected, 250_000);
        assert_eq!(report.purchases_total, 100_000);
        assert_eq!(report.purchases_paid, 60_000);
        assert_eq!(report.net, 300_000);
        assert_eq!(report.purchase_to_sales_ratio_percent, 25);
    }
}
