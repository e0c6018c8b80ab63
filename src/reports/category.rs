// 🏷️ Category Spending - where the money goes

use super::DateRange;
use crate::config::StatisticsConfig;
use crate::db::Transaction;
use crate::statistics::{average, round2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySpending {
    pub category: String,
    pub total_amount: f64,
    pub percentage: f64,
    pub transaction_count: usize,
    pub average_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySpendingReport {
    pub categories: Vec<CategorySpending>,
    pub total_amount: f64,
    pub total_transactions: usize,
    pub time_period: String,
}

/// Spending per category, largest first.
///
/// Only records with a non-zero amount participate; a missing category is
/// reported under `config.uncategorized_label`.
pub fn build_category_spending(
    transactions: &[Transaction],
    range: DateRange,
    config: &StatisticsConfig,
) -> CategorySpendingReport {
    let mut total_amount = 0.0;
    let mut total_transactions = 0;
    let mut categories: HashMap<&str, (f64, usize)> = HashMap::new();

    for t in transactions.iter().filter(|t| range.contains(t.date)) {
        let Some(amount) = t.amount.filter(|a| *a != 0.0) else {
            continue;
        };

        total_amount += amount;
        total_transactions += 1;

        let category = t
            .category_name()
            .unwrap_or(config.uncategorized_label.as_str());
        let entry = categories.entry(category).or_insert((0.0, 0));
        entry.0 += amount;
        entry.1 += 1;
    }

    let mut rows: Vec<CategorySpending> = categories
        .into_iter()
        .map(|(category, (amount, count))| CategorySpending {
            category: category.to_string(),
            total_amount: round2(amount),
            percentage: if total_amount > 0.0 {
                round2(amount / total_amount * 100.0)
            } else {
                0.0
            },
            transaction_count: count,
            average_amount: round2(average(amount, count)),
        })
        .collect();

    rows.sort_by(|a, b| {
        b.total_amount
            .total_cmp(&a.total_amount)
            .then_with(|| a.category.cmp(&b.category))
    });

    CategorySpendingReport {
        categories: rows,
        total_amount: round2(total_amount),
        total_transactions,
        time_period: range.label(),
    }
}
