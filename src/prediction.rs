// 🔮 Spending Prediction - monthly features + pluggable model
//
// The model is an opaque collaborator behind `SpendingModel`. It is loaded
// once by the startup path and handed to whoever needs it as a
// `ModelHandle`; nothing here holds global state.

use crate::db::{Client, Transaction};
use anyhow::{bail, Context as AnyhowContext, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Feature rows needed (after lag/rolling warm-up) before the model is asked
pub const MIN_FEATURE_ROWS: usize = 3;

/// Window of the rolling mean, in months
pub const ROLLING_WINDOW: usize = 3;

pub const NUMERIC_FEATURES: [&str; 6] = [
    "month_num",
    "year",
    "monthly_prev",
    "rolling_3",
    "id_municipio",
    "id_estado",
];

pub const CATEGORICAL_FEATURES: [&str; 4] = ["id", "tipo_persona", "genero", "actividad_empresarial"];

// ============================================================================
// FEATURES
// ============================================================================

/// One calendar month of a client's spending with lag features
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyFeatureRow {
    /// First day of the month
    pub month: NaiveDate,
    pub monthly_total: f64,
    pub monthly_prev: f64,
    pub rolling_3: f64,
}

/// Model input for the latest month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    pub client_id: String,
    pub month_num: u32,
    pub year: i32,
    pub monthly_prev: f64,
    pub rolling_3: f64,
    pub municipality_id: Option<i64>,
    pub state_id: Option<i64>,
    pub person_type: Option<String>,
    pub gender: Option<String>,
    pub business_activity: Option<String>,
}

impl FeatureVector {
    pub fn new(client: &Client, row: &MonthlyFeatureRow) -> Self {
        FeatureVector {
            client_id: client.id.clone(),
            month_num: row.month.month(),
            year: row.month.year(),
            monthly_prev: row.monthly_prev,
            rolling_3: row.rolling_3,
            municipality_id: client.municipality_id,
            state_id: client.state_id,
            person_type: client.person_type.clone(),
            gender: client.gender.clone(),
            business_activity: client.business_activity.clone(),
        }
    }

    /// Numeric feature by name; `None` when unknown or missing
    pub fn numeric(&self, name: &str) -> Option<f64> {
        match name {
            "month_num" => Some(self.month_num as f64),
            "year" => Some(self.year as f64),
            "monthly_prev" => Some(self.monthly_prev),
            "rolling_3" => Some(self.rolling_3),
            "id_municipio" => self.municipality_id.map(|v| v as f64),
            "id_estado" => self.state_id.map(|v| v as f64),
            _ => None,
        }
    }

    /// Categorical feature by name
    pub fn categorical(&self, name: &str) -> Option<&str> {
        match name {
            "id" => Some(self.client_id.as_str()),
            "tipo_persona" => self.person_type.as_deref(),
            "genero" => self.gender.as_deref(),
            "actividad_empresarial" => self.business_activity.as_deref(),
            _ => None,
        }
    }
}

/// Monthly totals with previous-month and 3-month rolling mean.
///
/// Undated records are ignored; a month's total sums the records that have
/// an amount. The first `ROLLING_WINDOW - 1` months lack a full window and
/// are dropped.
pub fn build_feature_rows(transactions: &[Transaction]) -> Vec<MonthlyFeatureRow> {
    let mut months: BTreeMap<NaiveDate, f64> = BTreeMap::new();

    for t in transactions {
        if let Some(date) = t.date {
            let Some(month) = date.with_day(1) else {
                continue;
            };
            *months.entry(month).or_insert(0.0) += t.amount.unwrap_or(0.0);
        }
    }

    let series: Vec<(NaiveDate, f64)> = months.into_iter().collect();

    series
        .windows(ROLLING_WINDOW)
        .map(|window| {
            let (month, total) = window[ROLLING_WINDOW - 1];
            let sum: f64 = window.iter().map(|(_, amount)| amount).sum();
            MonthlyFeatureRow {
                month,
                monthly_total: total,
                monthly_prev: window[ROLLING_WINDOW - 2].1,
                rolling_3: sum / ROLLING_WINDOW as f64,
            }
        })
        .collect()
}

// ============================================================================
// MODEL
// ============================================================================

/// Anything that turns a feature vector into a spending estimate
pub trait SpendingModel: Send + Sync {
    fn predict(&self, features: &FeatureVector) -> Result<f64>;
}

/// Shared, explicitly owned model instance
pub type ModelHandle = Arc<dyn SpendingModel>;

/// Linear model exported as JSON:
/// `intercept + Σ weight·numeric + Σ offset[categorical value]`.
/// Missing numeric values and unseen categories contribute nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,

    #[serde(default)]
    pub weights: HashMap<String, f64>,

    #[serde(default)]
    pub categorical: HashMap<String, HashMap<String, f64>>,
}

impl LinearModel {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read model file: {:?}", path.as_ref()))?;

        let model: LinearModel =
            serde_json::from_str(&content).context("Failed to parse model JSON")?;
        model.validate()?;

        log::info!(
            "Loaded spending model: {} numeric weights, {} categorical features",
            model.weights.len(),
            model.categorical.len()
        );

        Ok(model)
    }

    /// Reject weights for features the vector does not provide
    pub fn validate(&self) -> Result<()> {
        for name in self.weights.keys() {
            if !NUMERIC_FEATURES.contains(&name.as_str()) {
                bail!("Unknown numeric feature in model: {}", name);
            }
        }
        for name in self.categorical.keys() {
            if !CATEGORICAL_FEATURES.contains(&name.as_str()) {
                bail!("Unknown categorical feature in model: {}", name);
            }
        }
        Ok(())
    }
}

impl SpendingModel for LinearModel {
    fn predict(&self, features: &FeatureVector) -> Result<f64> {
        let mut estimate = self.intercept;

        for (name, weight) in &self.weights {
            if let Some(value) = features.numeric(name) {
                estimate += weight * value;
            }
        }

        for (name, offsets) in &self.categorical {
            if let Some(offset) = features.categorical(name).and_then(|v| offsets.get(v)) {
                estimate += offset;
            }
        }

        if !estimate.is_finite() {
            bail!("Model produced a non-finite estimate");
        }

        Ok(estimate)
    }
}

// ============================================================================
// PREDICTION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub client_id: String,
    pub current_month_spend: f64,
}

/// Predict the client's spending for the latest month in its history.
/// Too little history yields 0.0 without consulting the model.
pub fn predict_spending(
    client: &Client,
    transactions: &[Transaction],
    model: &dyn SpendingModel,
) -> Result<Prediction> {
    let rows = build_feature_rows(transactions);

    let current_month_spend = match rows.last() {
        Some(latest) if rows.len() >= MIN_FEATURE_ROWS => {
            let features = FeatureVector::new(client, latest);
            log::debug!("Predicting with features {:?}", features);
            model.predict(&features)?
        }
        _ => {
            log::debug!(
                "Client {} has {} feature rows, need {}; predicting 0",
                client.id,
                rows.len(),
                MIN_FEATURE_ROWS
            );
            0.0
        }
    };

    Ok(Prediction {
        client_id: client.id.clone(),
        current_month_spend,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn tx(date: Option<&str>, amount: Option<f64>) -> Transaction {
        let mut t = Transaction::new("c1");
        t.date = date.map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap());
        t.amount = amount;
        t
    }

    fn months(totals: &[f64]) -> Vec<Transaction> {
        totals
            .iter()
            .enumerate()
            .map(|(i, total)| tx(Some(&format!("2023-{:02}-15", i + 1)), Some(*total)))
            .collect()
    }

    fn client() -> Client {
        let mut c = Client::new("c1");
        c.state_id = Some(9);
        c.gender = Some("F".to_string());
        c
    }

    struct CountingModel {
        calls: AtomicUsize,
    }

    impl SpendingModel for CountingModel {
        fn predict(&self, features: &FeatureVector) -> Result<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(features.rolling_3)
        }
    }

    #[test]
    fn test_feature_rows_lag_and_rolling() {
        let mut txs = months(&[100.0, 200.0, 300.0, 400.0]);
        // same month, amount missing, undated: none change the totals
        txs.push(tx(Some("2023-01-20"), None));
        txs.push(tx(None, Some(1000.0)));

        let rows = build_feature_rows(&txs);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].month, NaiveDate::from_ymd_opt(2023, 3, 1).unwrap());
        assert_eq!(rows[0].monthly_total, 300.0);
        assert_eq!(rows[0].monthly_prev, 200.0);
        assert_eq!(rows[0].rolling_3, 200.0);
        assert_eq!(rows[1].monthly_prev, 300.0);
        assert_eq!(rows[1].rolling_3, 300.0);
    }

    #[test]
    fn test_short_history_predicts_zero_without_model() {
        let model = CountingModel { calls: AtomicUsize::new(0) };
        // four months -> two feature rows
        let txs = months(&[10.0, 20.0, 30.0, 40.0]);

        let prediction = predict_spending(&client(), &txs, &model).unwrap();

        assert_eq!(prediction.current_month_spend, 0.0);
        assert_eq!(prediction.client_id, "c1");
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_uses_latest_month() {
        let model = CountingModel { calls: AtomicUsize::new(0) };
        let txs = months(&[10.0, 20.0, 30.0, 40.0, 50.0]);

        let prediction = predict_spending(&client(), &txs, &model).unwrap();

        assert_eq!(prediction.current_month_spend, 40.0);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_linear_model_predict() {
        let model = LinearModel {
            intercept: 10.0,
            weights: [("rolling_3".to_string(), 0.5), ("id_municipio".to_string(), 100.0)]
                .into_iter()
                .collect(),
            categorical: [(
                "genero".to_string(),
                [("F".to_string(), 5.0)].into_iter().collect(),
            )]
            .into_iter()
            .collect(),
        };
        model.validate().unwrap();

        let row = MonthlyFeatureRow {
            month: NaiveDate::from_ymd_opt(2023, 5, 1).unwrap(),
            monthly_total: 50.0,
            monthly_prev: 40.0,
            rolling_3: 40.0,
        };
        let features = FeatureVector::new(&client(), &row);

        // municipality is missing and contributes nothing
        assert_eq!(model.predict(&features).unwrap(), 10.0 + 20.0 + 5.0);
        assert_eq!(features.month_num, 5);
        assert_eq!(features.year, 2023);
    }

    #[test]
    fn test_linear_model_per_client_offset() {
        let model = LinearModel {
            intercept: 0.0,
            weights: HashMap::new(),
            categorical: [(
                "id".to_string(),
                [("c1".to_string(), 250.0), ("c2".to_string(), -1.0)].into_iter().collect(),
            )]
            .into_iter()
            .collect(),
        };
        model.validate().unwrap();

        let row = MonthlyFeatureRow {
            month: NaiveDate::from_ymd_opt(2023, 5, 1).unwrap(),
            monthly_total: 0.0,
            monthly_prev: 0.0,
            rolling_3: 0.0,
        };
        let features = FeatureVector::new(&client(), &row);

        assert_eq!(features.categorical("id"), Some("c1"));
        assert_eq!(model.predict(&features).unwrap(), 250.0);
    }

    #[test]
    fn test_linear_model_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"intercept": 1.5, "weights": {{"monthly_prev": 1.0}}}}"#).unwrap();

        let model = LinearModel::from_file(file.path()).unwrap();

        assert_eq!(model.intercept, 1.5);
        assert!(model.categorical.is_empty());
    }

    #[test]
    fn test_linear_model_rejects_unknown_feature() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"intercept": 0.0, "weights": {{"shoe_size": 2.0}}}}"#).unwrap();

        assert!(LinearModel::from_file(file.path()).is_err());
    }

    #[test]
    fn test_model_handle_is_shareable() {
        let handle: ModelHandle = Arc::new(LinearModel {
            intercept: 42.0,
            weights: HashMap::new(),
            categorical: HashMap::new(),
        });
        let txs = months(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        let prediction = predict_spending(&client(), &txs, handle.as_ref()).unwrap();

        assert_eq!(prediction.current_month_spend, 42.0);
    }
}
