// Hey Insights - Core Library
// Exposes all modules for use in the CLI, the API server and tests

pub mod config;
pub mod db;
pub mod error;
pub mod prediction;
pub mod reports;
pub mod search;
pub mod service;
pub mod statistics;

// Re-export commonly used types
pub use config::{AppConfig, StatisticsConfig};
pub use db::{
    Client, ImportRecord, ImportSummary, Transaction,
    count_clients, count_transactions, get_client, get_transactions_for_client,
    insert_clients, insert_transactions, load_clients_csv, load_transactions_csv,
    setup_database,
};
pub use error::InsightsError;
pub use prediction::{
    FeatureVector, LinearModel, ModelHandle, MonthlyFeatureRow, Prediction, SpendingModel,
    build_feature_rows, predict_spending,
};
pub use reports::{
    CategorySpending, CategorySpendingReport, DateRange, MonthlyReport, MonthlySummary, TopCategory,
    build_category_spending, build_monthly_report,
};
pub use search::{
    PageOutOfRange, RecentTransactions, SearchFilters, SearchPage,
    recent_transactions, search_transactions,
};
pub use service::InsightsService;
pub use statistics::{
    DayOfWeekStat, MerchantStat, MonthlyTrendPoint, StatisticsReport, Summary,
    compute_statistics,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
