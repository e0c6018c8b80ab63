/// Failures surfaced by the request layer.
/// Report builders never fail; these come from lookups, paging and plumbing.
#[derive(Debug, thiserror::Error)]
pub enum InsightsError {
    #[error("Client data not found: {0}")]
    ClientNotFound(String),

    #[error("No transaction data found for client {0}")]
    NoTransactions(String),

    #[error("Page not found: page {page} of {pages}")]
    PageNotFound { page: usize, pages: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Prediction model not loaded")]
    ModelUnavailable,

    #[error("Error making prediction: {0}")]
    Prediction(anyhow::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl InsightsError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            InsightsError::ClientNotFound(_)
                | InsightsError::NoTransactions(_)
                | InsightsError::PageNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, InsightsError>;
