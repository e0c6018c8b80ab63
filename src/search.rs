// 🔎 Transaction search - recent activity, filters and pagination

use crate::db::Transaction;
use crate::reports::DateRange;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const DEFAULT_RECENT_LIMIT: usize = 10;
pub const MAX_RECENT_LIMIT: usize = 50;
pub const DEFAULT_PER_PAGE: usize = 10;
pub const MAX_PER_PAGE: usize = 100;

/// Newest first; undated records sort after every dated one
fn newest_first(a: &Transaction, b: &Transaction) -> Ordering {
    match (a.date, b.date) {
        (Some(x), Some(y)) => y.cmp(&x).then_with(|| b.id.cmp(&a.id)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.id.cmp(&a.id),
    }
}

// ============================================================================
// RECENT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentTransactions {
    pub transactions: Vec<Transaction>,
    pub total: usize,
    pub limit: usize,
    pub last_updated: Option<NaiveDate>,
}

/// Clamp a requested recent limit into `1..=MAX_RECENT_LIMIT`
pub fn clamp_recent_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_RECENT_LIMIT).clamp(1, MAX_RECENT_LIMIT)
}

pub fn recent_transactions(transactions: &[Transaction], limit: Option<usize>) -> RecentTransactions {
    let limit = clamp_recent_limit(limit);

    let mut sorted: Vec<Transaction> = transactions.to_vec();
    sorted.sort_by(newest_first);
    sorted.truncate(limit);

    let last_updated = sorted.iter().filter_map(|t| t.date).max();

    RecentTransactions {
        total: sorted.len(),
        transactions: sorted,
        limit,
        last_updated,
    }
}

// ============================================================================
// SEARCH
// ============================================================================

/// Search filters; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<f64>,

    /// Case-insensitive substring of the merchant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant: Option<String>,

    /// Case-insensitive substring of the category
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Exact sale type
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub sale_type: Option<String>,
}

fn contains_ignore_case(haystack: Option<&str>, needle: &str) -> bool {
    haystack.map_or(false, |h| h.to_lowercase().contains(&needle.to_lowercase()))
}

impl SearchFilters {
    pub fn matches(&self, t: &Transaction) -> bool {
        if !DateRange::new(self.start_date, self.end_date).contains(t.date) {
            return false;
        }
        if let Some(min) = self.min_amount {
            if !t.amount.map_or(false, |a| a >= min) {
                return false;
            }
        }
        if let Some(max) = self.max_amount {
            if !t.amount.map_or(false, |a| a <= max) {
                return false;
            }
        }
        if let Some(merchant) = self.merchant.as_deref() {
            if !contains_ignore_case(t.merchant.as_deref(), merchant) {
                return false;
            }
        }
        if let Some(category) = self.category.as_deref() {
            if !contains_ignore_case(t.category.as_deref(), category) {
                return false;
            }
        }
        if let Some(sale_type) = self.sale_type.as_deref() {
            if t.sale_type.as_deref() != Some(sale_type) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    pub transactions: Vec<Transaction>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub pages: usize,
    /// Echo of the filters that were set
    pub filters_applied: SearchFilters,
}

/// Requested page is past the last one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOutOfRange {
    pub page: usize,
    pub pages: usize,
}

/// Filter, order newest first and paginate.
///
/// `page` starts at 1; `per_page` is clamped to `1..=MAX_PER_PAGE`. An empty
/// page beyond the first is an error only when something matched at all.
pub fn search_transactions(
    transactions: &[Transaction],
    filters: &SearchFilters,
    page: Option<usize>,
    per_page: Option<usize>,
) -> Result<SearchPage, PageOutOfRange> {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);

    let mut matched: Vec<&Transaction> = transactions.iter().filter(|t| filters.matches(t)).collect();
    matched.sort_by(|a, b| newest_first(a, b));

    let total = matched.len();
    let pages = total.div_ceil(per_page);

    // an offset past usize::MAX is past the end
    let items: Vec<Transaction> = match (page - 1).checked_mul(per_page) {
        Some(offset) => matched
            .into_iter()
            .skip(offset)
            .take(per_page)
            .cloned()
            .collect(),
        None => Vec::new(),
    };

    if items.is_empty() && page > 1 && total > 0 {
        return Err(PageOutOfRange { page, pages });
    }

    Ok(SearchPage {
        transactions: items,
        total,
        page,
        per_page,
        pages,
        filters_applied: filters.clone(),
    })
}
