//! Accounting: the expense ledger and the derived financial reports.

pub mod expense;
pub mod reports;

pub use expense::{
    Expense, ExpenseCategory, ExpenseCommand, ExpenseEvent, ExpenseId, ExpenseRecorded,
    ExpenseSource, RecordExpense, OVERHEAD_CATEGORIES,
};
pub use reports::{
    aging_report, cost_analysis, daily_revenue, financial_summary, material_profitability,
    purchase_vs_sales, AgingBucket, AgingReport, CostAnalysis, DailyRevenuePoint, ExpenseRow,
    FinancialSummary, InvoiceRow, MaterialProfitability, PaymentRow, PurchaseRow,
    PurchaseVsSales, WorkTypeProfit,
};
