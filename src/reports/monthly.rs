// 🗓️ Monthly Report - month-by-month totals with top categories

use super::DateRange;
use crate::db::Transaction;
use crate::statistics::{average, period_key, round2};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const DEFAULT_MONTH_LIMIT: usize = 12;
pub const TOP_CATEGORIES_PER_MONTH: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopCategory {
    pub category: String,
    pub amount: f64,
    /// Share of the month's total spending
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySummary {
    /// "YYYY-MM"
    pub month: String,
    pub total_amount: f64,
    pub transaction_count: usize,
    pub average_amount: f64,
    pub top_categories: Vec<TopCategory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReport {
    pub monthly_summaries: Vec<MonthlySummary>,
    pub total_months: usize,
}

#[derive(Default)]
struct MonthAccumulator<'a> {
    total_amount: f64,
    transaction_count: usize,
    categories: HashMap<&'a str, f64>,
}

/// Monthly summaries, newest month first, at most `limit` months.
///
/// Every dated record counts toward its month's `transaction_count`, even
/// without an amount; such records add nothing to `total_amount`. Category
/// totals only take records with a category and a non-zero amount.
pub fn build_monthly_report(
    transactions: &[Transaction],
    range: DateRange,
    limit: Option<usize>,
) -> MonthlyReport {
    let limit = limit.unwrap_or(DEFAULT_MONTH_LIMIT);
    let mut months: BTreeMap<String, MonthAccumulator> = BTreeMap::new();

    for t in transactions.iter().filter(|t| range.contains(t.date)) {
        let Some(date) = t.date else {
            continue;
        };

        let acc = months.entry(period_key(date)).or_default();
        acc.total_amount += t.amount.unwrap_or(0.0);
        acc.transaction_count += 1;

        if let (Some(category), Some(amount)) = (t.category_name(), t.amount) {
            if amount != 0.0 {
                *acc.categories.entry(category).or_insert(0.0) += amount;
            }
        }
    }

    let monthly_summaries: Vec<MonthlySummary> = months
        .into_iter()
        .rev()
        .take(limit)
        .map(|(month, acc)| MonthlySummary {
            month,
            total_amount: round2(acc.total_amount),
            transaction_count: acc.transaction_count,
            average_amount: round2(average(acc.total_amount, acc.transaction_count)),
            top_categories: top_categories(&acc.categories, acc.total_amount),
        })
        .collect();

    MonthlyReport {
        total_months: monthly_summaries.len(),
        monthly_summaries,
    }
}

fn top_categories(categories: &HashMap<&str, f64>, month_total: f64) -> Vec<TopCategory> {
    if month_total <= 0.0 {
        return Vec::new();
    }

    let mut ranked: Vec<(&str, f64)> = categories.iter().map(|(c, a)| (*c, *a)).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    ranked
        .into_iter()
        .take(TOP_CATEGORIES_PER_MONTH)
        .map(|(category, amount)| TopCategory {
            category: category.to_string(),
            amount: round2(amount),
            percentage: round2(amount / month_total * 100.0),
        })
        .collect()
}
