// Report builders over a client's transactions

pub mod category;
pub mod monthly;

pub use category::{build_category_spending, CategorySpending, CategorySpendingReport};
pub use monthly::{build_monthly_report, MonthlyReport, MonthlySummary, TopCategory};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Inclusive date bounds. With at least one bound set, undated records
/// fall outside the range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        DateRange { start, end }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, date: Option<NaiveDate>) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let Some(date) = date else {
            return false;
        };
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }

    /// Human label for the covered period
    pub fn label(&self) -> String {
        match (self.start, self.end) {
            (Some(s), Some(e)) => format!("{} to {}", s, e),
            (Some(s), None) => format!("From {}", s),
            (None, Some(e)) => format!("Until {}", e),
            (None, None) => "All time".to_string(),
        }
    }
}
