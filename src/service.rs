// Request layer: resolve the client, fetch its transactions, build a report.
// Shared by the CLI and the HTTP server.

use crate::config::{AppConfig, StatisticsConfig};
use crate::db::{get_client, get_transactions_for_client, setup_database, Client, Transaction};
use crate::error::{InsightsError, Result};
use crate::prediction::{predict_spending, LinearModel, ModelHandle, Prediction};
use crate::reports::{
    build_category_spending, build_monthly_report, CategorySpendingReport, DateRange, MonthlyReport,
};
use crate::search::{recent_transactions, search_transactions, RecentTransactions, SearchFilters, SearchPage};
use crate::statistics::{compute_statistics, StatisticsReport};
use anyhow::{anyhow, Context as AnyhowContext};
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub struct InsightsService {
    db: Arc<Mutex<Connection>>,
    model: Option<ModelHandle>,
    statistics: StatisticsConfig,
    default_months: u32,
}

impl InsightsService {
    pub fn new(conn: Connection, config: &AppConfig, model: Option<ModelHandle>) -> Self {
        InsightsService {
            db: Arc::new(Mutex::new(conn)),
            model,
            statistics: config.statistics.clone(),
            default_months: config.default_months,
        }
    }

    /// Startup path: open the database and load the model named in the config
    pub fn open(config: &AppConfig) -> anyhow::Result<Self> {
        let conn = Connection::open(&config.database_path)
            .with_context(|| format!("Failed to open database {:?}", config.database_path))?;
        setup_database(&conn)?;

        let model: Option<ModelHandle> = match &config.model_path {
            Some(path) => Some(Arc::new(LinearModel::from_file(path)?)),
            None => {
                log::warn!("No model_path configured; predictions are disabled");
                None
            }
        };

        Ok(InsightsService::new(conn, config, model))
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| InsightsError::Storage(anyhow!("database lock poisoned")))
    }

    pub fn client(&self, client_id: &str) -> Result<Client> {
        let conn = self.conn()?;
        get_client(&conn, client_id)?.ok_or_else(|| InsightsError::ClientNotFound(client_id.to_string()))
    }

    /// Client record plus every transaction it owns
    fn client_transactions(&self, client_id: &str) -> Result<(Client, Vec<Transaction>)> {
        let conn = self.conn()?;
        let client = get_client(&conn, client_id)?
            .ok_or_else(|| InsightsError::ClientNotFound(client_id.to_string()))?;
        let transactions = get_transactions_for_client(&conn, client_id)?;
        Ok((client, transactions))
    }

    /// Full-history statistics; `months` only sets the period label.
    /// A client without transactions gets the zero-valued report.
    pub fn statistics(&self, client_id: &str, months: Option<u32>) -> Result<StatisticsReport> {
        let (_, transactions) = self.client_transactions(client_id)?;
        let months = months.unwrap_or(self.default_months);

        log::info!(
            "Statistics for client {}: {} transactions (label: last {} months)",
            client_id,
            transactions.len(),
            months
        );

        Ok(compute_statistics(&transactions, Some(months), &self.statistics))
    }

    pub fn monthly_report(&self, client_id: &str, range: DateRange, limit: Option<usize>) -> Result<MonthlyReport> {
        let (_, transactions) = self.client_transactions(client_id)?;
        Ok(build_monthly_report(&transactions, range, limit))
    }

    pub fn category_spending(&self, client_id: &str, range: DateRange) -> Result<CategorySpendingReport> {
        let (_, transactions) = self.client_transactions(client_id)?;
        Ok(build_category_spending(&transactions, range, &self.statistics))
    }

    pub fn recent(&self, client_id: &str, limit: Option<usize>) -> Result<RecentTransactions> {
        let (_, transactions) = self.client_transactions(client_id)?;
        Ok(recent_transactions(&transactions, limit))
    }

    pub fn search(
        &self,
        client_id: &str,
        filters: &SearchFilters,
        page: Option<usize>,
        per_page: Option<usize>,
    ) -> Result<SearchPage> {
        let (_, transactions) = self.client_transactions(client_id)?;
        search_transactions(&transactions, filters, page, per_page)
            .map_err(|e| InsightsError::PageNotFound { page: e.page, pages: e.pages })
    }

    pub fn predict(&self, client_id: &str) -> Result<Prediction> {
        let model = self.model.as_ref().ok_or(InsightsError::ModelUnavailable)?;
        let (client, transactions) = self.client_transactions(client_id)?;

        if transactions.is_empty() {
            return Err(InsightsError::NoTransactions(client_id.to_string()));
        }

        predict_spending(&client, &transactions, model.as_ref()).map_err(InsightsError::Prediction)
    }
}
