// 📊 Transaction Statistics - per-client spending report
//
// Summary scalars, monthly trend with period-over-period change, top
// merchants and day-of-week breakdown, computed in one pass per aggregate
// over an in-memory slice of transactions.
//
// Null handling is per aggregate: a record missing the fields an aggregate
// needs is skipped there and still counted everywhere else.

use crate::config::StatisticsConfig;
use crate::db::Transaction;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const DAYS_OF_WEEK: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Months used for the period label when the caller gives none
pub const DEFAULT_MONTHS: u32 = 12;

// ============================================================================
// NUMERIC HELPERS
// ============================================================================

/// Round to 2 decimal places (half away from zero)
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `total / count`, 0 when count is 0
pub fn average(total: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

/// Percentage change from `previous` to `current`, 0 unless `previous > 0`
pub fn change_percentage(previous: f64, current: f64) -> f64 {
    if previous > 0.0 {
        (current - previous) / previous * 100.0
    } else {
        0.0
    }
}

/// "YYYY-MM" period key
pub fn period_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

// ============================================================================
// REPORT TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_transactions: usize,
    pub total_spent: f64,
    pub average_transaction: f64,
    pub highest_transaction: f64,
    pub lowest_transaction: f64,
    pub most_expensive_category: Option<String>,
    pub most_frequent_category: Option<String>,
}

impl Summary {
    fn empty() -> Self {
        Summary {
            total_transactions: 0,
            total_spent: 0.0,
            average_transaction: 0.0,
            highest_transaction: 0.0,
            lowest_transaction: 0.0,
            most_expensive_category: None,
            most_frequent_category: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTrendPoint {
    /// "YYYY-MM"
    pub period: String,
    pub amount: f64,
    pub transaction_count: usize,
    pub change_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantStat {
    pub merchant: String,
    pub visit_count: usize,
    pub total_spent: f64,
    pub average_transaction: f64,
    pub last_visit: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayOfWeekStat {
    pub day: String,
    pub transaction_count: usize,
    pub total_amount: f64,
    pub average_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsReport {
    pub summary: Summary,
    pub spending_trends: Vec<MonthlyTrendPoint>,
    pub top_merchants: Vec<MerchantStat>,
    pub day_of_week_stats: Vec<DayOfWeekStat>,
    pub time_period: String,
}

impl StatisticsReport {
    /// Zero-valued report returned for an empty transaction set
    pub fn empty(months: u32) -> Self {
        StatisticsReport {
            summary: Summary::empty(),
            spending_trends: Vec::new(),
            top_merchants: Vec::new(),
            day_of_week_stats: Vec::new(),
            time_period: time_period_label(months),
        }
    }
}

/// `months` only names the period; the report always covers the full history
pub fn time_period_label(months: u32) -> String {
    format!("Last {} months", months)
}

// ============================================================================
// AGGREGATION
// ============================================================================

/// Build the statistics report for one client's transactions
pub fn compute_statistics(
    transactions: &[Transaction],
    months: Option<u32>,
    config: &StatisticsConfig,
) -> StatisticsReport {
    let months = months.unwrap_or(DEFAULT_MONTHS);

    if transactions.is_empty() {
        return StatisticsReport::empty(months);
    }

    let report = StatisticsReport {
        summary: summarize(transactions),
        spending_trends: monthly_trends(transactions),
        top_merchants: top_merchants(transactions, config.top_merchants_limit),
        day_of_week_stats: day_of_week_stats(transactions),
        time_period: time_period_label(months),
    };

    log::debug!(
        "Statistics over {} transactions: {} months, {} merchants, {} weekdays",
        transactions.len(),
        report.spending_trends.len(),
        report.top_merchants.len(),
        report.day_of_week_stats.len()
    );

    report
}

/// Key with the largest value; ties go to the lexicographically smallest key
fn max_key<'a, V, F>(map: &HashMap<&'a str, V>, cmp: F) -> Option<String>
where
    F: Fn(&V, &V) -> std::cmp::Ordering,
{
    map.iter()
        .max_by(|a, b| cmp(a.1, b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(k, _)| k.to_string())
}

pub fn summarize(transactions: &[Transaction]) -> Summary {
    let amounts: Vec<f64> = transactions.iter().filter_map(|t| t.amount).collect();

    let mut category_counts: HashMap<&str, usize> = HashMap::new();
    let mut category_amounts: HashMap<&str, f64> = HashMap::new();

    for t in transactions {
        if let (Some(category), Some(amount)) = (t.category_name(), t.amount) {
            *category_counts.entry(category).or_insert(0) += 1;
            *category_amounts.entry(category).or_insert(0.0) += amount;
        }
    }

    let total_spent: f64 = amounts.iter().sum();
    let highest = amounts.iter().copied().fold(None, |acc: Option<f64>, a| {
        Some(acc.map_or(a, |m| m.max(a)))
    });
    let lowest = amounts.iter().copied().fold(None, |acc: Option<f64>, a| {
        Some(acc.map_or(a, |m| m.min(a)))
    });

    Summary {
        total_transactions: transactions.len(),
        total_spent: round2(total_spent),
        average_transaction: round2(average(total_spent, amounts.len())),
        highest_transaction: round2(highest.unwrap_or(0.0)),
        lowest_transaction: round2(lowest.unwrap_or(0.0)),
        most_expensive_category: max_key(&category_amounts, |a, b| a.total_cmp(b)),
        most_frequent_category: max_key(&category_counts, |a, b| a.cmp(b)),
    }
}

pub fn monthly_trends(transactions: &[Transaction]) -> Vec<MonthlyTrendPoint> {
    // BTreeMap keeps "YYYY-MM" keys in chronological order
    let mut months: BTreeMap<String, (f64, usize)> = BTreeMap::new();

    for t in transactions {
        if let (Some(date), Some(amount)) = (t.date, t.amount) {
            let entry = months.entry(period_key(date)).or_insert((0.0, 0));
            entry.0 += amount;
            entry.1 += 1;
        }
    }

    let mut trends = Vec::with_capacity(months.len());
    let mut previous: Option<f64> = None;

    for (period, (amount, count)) in months {
        let change = previous.map_or(0.0, |prev| change_percentage(prev, amount));

        trends.push(MonthlyTrendPoint {
            period,
            amount: round2(amount),
            transaction_count: count,
            change_percentage: round2(change),
        });

        previous = Some(amount);
    }

    trends
}

#[derive(Default)]
struct MerchantAccumulator {
    visit_count: usize,
    total_spent: f64,
    last_visit: Option<NaiveDate>,
}

pub fn top_merchants(transactions: &[Transaction], limit: usize) -> Vec<MerchantStat> {
    let mut merchants: HashMap<&str, MerchantAccumulator> = HashMap::new();

    for t in transactions {
        if let (Some(merchant), Some(amount)) = (t.merchant_name(), t.amount) {
            let acc = merchants.entry(merchant).or_default();
            acc.visit_count += 1;
            acc.total_spent += amount;
            if let Some(date) = t.date {
                acc.last_visit = Some(acc.last_visit.map_or(date, |last| last.max(date)));
            }
        }
    }

    let mut ranked: Vec<(&str, MerchantAccumulator)> = merchants.into_iter().collect();
    ranked.sort_by(|(ma, a), (mb, b)| {
        b.visit_count
            .cmp(&a.visit_count)
            .then_with(|| ma.cmp(mb))
    });

    ranked
        .into_iter()
        .take(limit)
        .map(|(merchant, acc)| MerchantStat {
            merchant: merchant.to_string(),
            visit_count: acc.visit_count,
            total_spent: round2(acc.total_spent),
            average_transaction: round2(average(acc.total_spent, acc.visit_count)),
            last_visit: acc.last_visit,
        })
        .collect()
}

pub fn day_of_week_stats(transactions: &[Transaction]) -> Vec<DayOfWeekStat> {
    // Monday = 0
    let mut days = [(0usize, 0.0f64); 7];

    for t in transactions {
        if let (Some(date), Some(amount)) = (t.date, t.amount) {
            let slot = &mut days[date.weekday().num_days_from_monday() as usize];
            slot.0 += 1;
            slot.1 += amount;
        }
    }

    DAYS_OF_WEEK
        .iter()
        .zip(days.iter())
        .filter(|(_, (count, _))| *count > 0)
        .map(|(day, (count, total))| DayOfWeekStat {
            day: day.to_string(),
            transaction_count: *count,
            total_amount: round2(*total),
            average_amount: round2(average(*total, *count)),
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(date: Option<&str>, amount: Option<f64>, category: Option<&str>, merchant: Option<&str>) -> Transaction {
        let mut t = Transaction::new("client-1");
        t.date = date.map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap());
        t.amount = amount;
        t.category = category.map(str::to_string);
        t.merchant = merchant.map(str::to_string);
        t
    }

    fn report(transactions: &[Transaction]) -> StatisticsReport {
        compute_statistics(transactions, None, &StatisticsConfig::default())
    }

    #[test]
    fn test_empty_input_gives_zero_report() {
        let r = compute_statistics(&[], Some(6), &StatisticsConfig::default());

        assert_eq!(r, StatisticsReport::empty(6));
        assert_eq!(r.summary.total_transactions, 0);
        assert_eq!(r.summary.most_frequent_category, None);
        assert_eq!(r.summary.most_expensive_category, None);
        assert!(r.spending_trends.is_empty());
        assert!(r.top_merchants.is_empty());
        assert!(r.day_of_week_stats.is_empty());
        assert_eq!(r.time_period, "Last 6 months");
    }

    #[test]
    fn test_two_month_example() {
        let txs = vec![
            tx(Some("2023-01-05"), Some(100.0), Some("A"), Some("X")),
            tx(Some("2023-02-10"), Some(50.0), Some("B"), Some("X")),
        ];

        let r = report(&txs);

        assert_eq!(
            r.spending_trends,
            vec![
                MonthlyTrendPoint {
                    period: "2023-01".to_string(),
                    amount: 100.0,
                    transaction_count: 1,
                    change_percentage: 0.0,
                },
                MonthlyTrendPoint {
                    period: "2023-02".to_string(),
                    amount: 50.0,
                    transaction_count: 1,
                    change_percentage: -50.0,
                },
            ]
        );

        assert_eq!(r.top_merchants.len(), 1);
        assert_eq!(r.top_merchants[0].merchant, "X");
        assert_eq!(r.top_merchants[0].visit_count, 2);
        assert_eq!(r.top_merchants[0].total_spent, 150.0);
        assert_eq!(r.top_merchants[0].average_transaction, 75.0);
        assert_eq!(r.top_merchants[0].last_visit, NaiveDate::from_ymd_opt(2023, 2, 10));

        assert_eq!(r.summary.total_spent, 150.0);
        assert_eq!(r.summary.highest_transaction, 100.0);
        assert_eq!(r.summary.lowest_transaction, 50.0);
        assert_eq!(r.summary.average_transaction, 75.0);
        // Tie at one transaction each: smallest name wins
        assert_eq!(r.summary.most_frequent_category.as_deref(), Some("A"));
        assert_eq!(r.summary.most_expensive_category.as_deref(), Some("A"));

        // 2023-01-05 is a Thursday, 2023-02-10 a Friday
        let days: Vec<&str> = r.day_of_week_stats.iter().map(|d| d.day.as_str()).collect();
        assert_eq!(days, vec!["Thursday", "Friday"]);
        assert_eq!(r.time_period, "Last 12 months");
    }

    #[test]
    fn test_tie_break_is_independent_of_input_order() {
        let forward = vec![
            tx(None, Some(10.0), Some("ZAPATERIAS"), None),
            tx(None, Some(10.0), Some("ABARROTES"), None),
        ];
        let mut backward = forward.clone();
        backward.reverse();

        for txs in [forward, backward] {
            let s = summarize(&txs);
            assert_eq!(s.most_frequent_category.as_deref(), Some("ABARROTES"));
            assert_eq!(s.most_expensive_category.as_deref(), Some("ABARROTES"));
        }
    }

    #[test]
    fn test_null_amount_only_counts_toward_total_transactions() {
        let txs = vec![
            tx(Some("2023-03-06"), None, Some("C"), Some("Y")),
            tx(Some("2023-03-07"), Some(20.0), Some("D"), Some("Z")),
        ];

        let r = report(&txs);

        assert_eq!(r.summary.total_transactions, 2);
        assert_eq!(r.summary.total_spent, 20.0);
        assert_eq!(r.summary.most_frequent_category.as_deref(), Some("D"));
        assert_eq!(r.spending_trends.len(), 1);
        assert_eq!(r.spending_trends[0].transaction_count, 1);
        assert_eq!(r.top_merchants.len(), 1);
        assert_eq!(r.top_merchants[0].merchant, "Z");
        // 2023-03-06 (Monday) has no amount, so only Tuesday appears
        assert_eq!(r.day_of_week_stats.len(), 1);
        assert_eq!(r.day_of_week_stats[0].day, "Tuesday");
    }

    #[test]
    fn test_asymmetric_null_handling() {
        let txs = vec![
            // amount, no merchant, no date: summary only
            tx(None, Some(40.0), Some("A"), None),
            // amount + date, no merchant: summary + trend + weekday
            tx(Some("2023-05-01"), Some(60.0), None, None),
            // amount + merchant, no date: merchant without last visit
            tx(None, Some(5.0), None, Some("KIOSKO")),
        ];

        let r = report(&txs);

        assert_eq!(r.summary.total_transactions, 3);
        assert_eq!(r.summary.total_spent, 105.0);
        assert_eq!(r.summary.lowest_transaction, 5.0);
        assert_eq!(r.summary.most_frequent_category.as_deref(), Some("A"));

        assert_eq!(r.spending_trends.len(), 1);
        assert_eq!(r.spending_trends[0].amount, 60.0);

        assert_eq!(r.top_merchants.len(), 1);
        assert_eq!(r.top_merchants[0].last_visit, None);

        assert_eq!(r.day_of_week_stats.len(), 1);
        assert_eq!(r.day_of_week_stats[0].day, "Monday");
        assert_eq!(r.day_of_week_stats[0].total_amount, 60.0);
    }

    #[test]
    fn test_all_amounts_missing() {
        let txs = vec![
            tx(Some("2023-01-01"), None, Some("A"), Some("X")),
            tx(None, None, None, None),
        ];

        let r = report(&txs);

        assert_eq!(r.summary.total_transactions, 2);
        assert_eq!(r.summary.total_spent, 0.0);
        assert_eq!(r.summary.highest_transaction, 0.0);
        assert_eq!(r.summary.lowest_transaction, 0.0);
        assert_eq!(r.summary.most_frequent_category, None);
        assert!(r.spending_trends.is_empty());
        assert!(r.top_merchants.is_empty());
        assert!(r.day_of_week_stats.is_empty());
    }

    #[test]
    fn test_trends_sorted_and_change_after_zero_month() {
        let txs = vec![
            tx(Some("2023-03-15"), Some(30.0), None, None),
            tx(Some("2022-12-01"), Some(0.0), None, None),
            tx(Some("2023-01-20"), Some(10.0), None, None),
            tx(Some("2023-01-21"), Some(15.0), None, None),
        ];

        let trends = monthly_trends(&txs);
        let periods: Vec<&str> = trends.iter().map(|p| p.period.as_str()).collect();

        assert_eq!(periods, vec!["2022-12", "2023-01", "2023-03"]);
        // previous month total is 0, so no percentage
        assert_eq!(trends[1].change_percentage, 0.0);
        assert_eq!(trends[1].amount, 25.0);
        assert_eq!(trends[1].transaction_count, 2);
        assert_eq!(trends[2].change_percentage, 20.0);

        let sum: f64 = trends.iter().map(|p| p.amount).sum();
        assert!((sum - 55.0).abs() < 1e-9);
    }

    #[test]
    fn test_change_percentage_rounded() {
        let txs = vec![
            tx(Some("2023-01-01"), Some(3.0), None, None),
            tx(Some("2023-02-01"), Some(4.0), None, None),
        ];

        let trends = monthly_trends(&txs);

        assert_eq!(trends[1].change_percentage, 33.33);
    }

    #[test]
    fn test_top_merchants_capped_and_ordered() {
        let mut txs = Vec::new();
        let visits = [("A", 1), ("B", 4), ("C", 2), ("D", 6), ("E", 3), ("F", 2), ("G", 5)];
        for (merchant, count) in visits {
            for _ in 0..count {
                txs.push(tx(Some("2023-01-02"), Some(10.0), None, Some(merchant)));
            }
        }

        let top = top_merchants(&txs, 5);
        let names: Vec<&str> = top.iter().map(|m| m.merchant.as_str()).collect();

        // C and F tie at 2 visits; name order decides
        assert_eq!(names, vec!["D", "G", "B", "E", "C"]);
        assert!(top.windows(2).all(|w| w[0].visit_count >= w[1].visit_count));
    }

    #[test]
    fn test_merchant_keys_are_case_sensitive() {
        let txs = vec![
            tx(None, Some(1.0), None, Some("Oxxo")),
            tx(None, Some(1.0), None, Some("OXXO")),
        ];

        assert_eq!(top_merchants(&txs, 5).len(), 2);
    }

    #[test]
    fn test_day_of_week_fixed_order_and_totals() {
        let txs = vec![
            tx(Some("2023-01-08"), Some(5.0), None, None),  // Sunday
            tx(Some("2023-01-02"), Some(10.0), None, None), // Monday
            tx(Some("2023-01-09"), Some(20.0), None, None), // Monday
            tx(Some("2023-01-04"), Some(7.5), None, None),  // Wednesday
        ];

        let stats = day_of_week_stats(&txs);

        let days: Vec<&str> = stats.iter().map(|d| d.day.as_str()).collect();
        assert_eq!(days, vec!["Monday", "Wednesday", "Sunday"]);
        assert_eq!(stats[0].transaction_count, 2);
        assert_eq!(stats[0].total_amount, 30.0);
        assert_eq!(stats[0].average_amount, 15.0);
    }

    #[test]
    fn test_rounding_applied_at_output() {
        let txs = vec![
            tx(Some("2023-01-02"), Some(0.333), None, None),
            tx(Some("2023-01-03"), Some(0.333), None, None),
            tx(Some("2023-01-04"), Some(0.333), None, None),
        ];

        let r = report(&txs);

        // accumulated 0.999 rounds to 1.0, not 3 * 0.33
        assert_eq!(r.summary.total_spent, 1.0);
        assert_eq!(r.spending_trends[0].amount, 1.0);
        assert_eq!(r.summary.average_transaction, 0.33);
    }

    #[test]
    fn test_report_json_shape() {
        let txs = vec![tx(Some("2023-01-05"), Some(100.0), Some("A"), Some("X"))];

        let json = serde_json::to_value(report(&txs)).unwrap();
        let obj = json.as_object().unwrap();

        let mut keys: Vec<&str> = obj.keys().map(|k| k.as_str()).collect();
        keys.sort();
        assert_eq!(
            keys,
            vec!["day_of_week_stats", "spending_trends", "summary", "time_period", "top_merchants"]
        );
        assert_eq!(json["top_merchants"][0]["last_visit"], "2023-01-05");
        assert_eq!(json["day_of_week_stats"][0]["day"], "Thursday");
    }

    #[test]
    fn test_helpers() {
        assert_eq!(average(10.0, 0), 0.0);
        assert_eq!(average(10.0, 4), 2.5);
        assert_eq!(round2(2.345678), 2.35);
        assert_eq!(round2(-1.005_1), -1.01);
        assert_eq!(change_percentage(0.0, 10.0), 0.0);
        assert_eq!(change_percentage(-5.0, 10.0), 0.0);
        assert_eq!(period_key(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()), "2024-02");
    }
}
