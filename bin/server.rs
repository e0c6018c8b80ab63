// Hey Insights - Web Server
// REST API with Axum over the per-client report builders

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::NaiveDate;
use env_logger::Env;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::PathBuf;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use hey_insights::{AppConfig, DateRange, InsightsError, InsightsService, SearchFilters, VERSION};

/// Environment variable naming the JSON config file
const ENV_CONFIG: &str = "HEY_CONFIG";

// ============================================================================
// Errors
// ============================================================================

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

struct ApiError(InsightsError);

impl From<InsightsError> for ApiError {
    fn from(err: InsightsError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            e if e.is_not_found() => StatusCode::NOT_FOUND,
            InsightsError::InvalidArgument(_) | InsightsError::Prediction(_) => StatusCode::BAD_REQUEST,
            InsightsError::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            log::error!("Request failed: {}", self.0);
        } else {
            log::debug!("Request rejected ({}): {}", status, self.0);
        }

        (status, Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// `Query` whose rejection renders as an `{ "error": ... }` body
struct ApiQuery<T>(T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError(InsightsError::InvalidArgument(rejection.body_text())))?;
        Ok(ApiQuery(value))
    }
}

// ============================================================================
// Query parameters
// ============================================================================

/// `months` is a label; anything unparseable falls back to the default
#[derive(Deserialize)]
struct StatisticsParams {
    months: Option<String>,
}

impl StatisticsParams {
    fn months(&self) -> Option<u32> {
        self.months.as_deref().and_then(|m| m.trim().parse().ok())
    }
}

#[derive(Deserialize)]
struct RangeParams {
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    limit: Option<usize>,
}

impl RangeParams {
    fn range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }
}

#[derive(Deserialize)]
struct LimitParams {
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct SearchParams {
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    min_amount: Option<f64>,
    max_amount: Option<f64>,
    merchant: Option<String>,
    category: Option<String>,
    #[serde(rename = "type")]
    sale_type: Option<String>,
    page: Option<usize>,
    per_page: Option<usize>,
}

impl SearchParams {
    fn filters(&self) -> SearchFilters {
        SearchFilters {
            start_date: self.start_date,
            end_date: self.end_date,
            min_amount: self.min_amount,
            max_amount: self.max_amount,
            merchant: self.merchant.clone().filter(|m| !m.is_empty()),
            category: self.category.clone().filter(|c| !c.is_empty()),
            sale_type: self.sale_type.clone().filter(|t| !t.is_empty()),
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check(State(service): State<InsightsService>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "OK",
        "version": VERSION,
        "model_loaded": service.has_model(),
    }))
}

/// GET /api/clients/:id - Client record
async fn get_client(
    State(service): State<InsightsService>,
    Path(client_id): Path<String>,
) -> ApiResult<hey_insights::Client> {
    Ok(Json(service.client(&client_id)?))
}

/// GET /api/clients/:id/statistics - Spending statistics
async fn get_statistics(
    State(service): State<InsightsService>,
    Path(client_id): Path<String>,
    ApiQuery(params): ApiQuery<StatisticsParams>,
) -> ApiResult<hey_insights::StatisticsReport> {
    Ok(Json(service.statistics(&client_id, params.months())?))
}

/// GET /api/clients/:id/monthly_report - Month-by-month summary
async fn get_monthly_report(
    State(service): State<InsightsService>,
    Path(client_id): Path<String>,
    ApiQuery(params): ApiQuery<RangeParams>,
) -> ApiResult<hey_insights::MonthlyReport> {
    Ok(Json(service.monthly_report(&client_id, params.range(), params.limit)?))
}

/// GET /api/clients/:id/category_spending - Spending per category
async fn get_category_spending(
    State(service): State<InsightsService>,
    Path(client_id): Path<String>,
    ApiQuery(params): ApiQuery<RangeParams>,
) -> ApiResult<hey_insights::CategorySpendingReport> {
    Ok(Json(service.category_spending(&client_id, params.range())?))
}

/// GET /api/clients/:id/recent - Most recent transactions
async fn get_recent(
    State(service): State<InsightsService>,
    Path(client_id): Path<String>,
    ApiQuery(params): ApiQuery<LimitParams>,
) -> ApiResult<hey_insights::RecentTransactions> {
    Ok(Json(service.recent(&client_id, params.limit)?))
}

/// GET /api/clients/:id/search - Filtered, paginated transactions
async fn search(
    State(service): State<InsightsService>,
    Path(client_id): Path<String>,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> ApiResult<hey_insights::SearchPage> {
    let filters = params.filters();
    Ok(Json(service.search(&client_id, &filters, params.page, params.per_page)?))
}

/// GET /api/clients/:id/prediction - Current month spending estimate
async fn get_prediction(
    State(service): State<InsightsService>,
    Path(client_id): Path<String>,
) -> ApiResult<hey_insights::Prediction> {
    Ok(Json(service.predict(&client_id)?))
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    println!("🌐 Hey Insights - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config_path = std::env::var(ENV_CONFIG).ok().map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;

    // Database connection and model are owned here and shared through the state
    let service = InsightsService::open(&config)?;
    println!("✓ Database opened: {:?}", config.database_path);
    if service.has_model() {
        println!("✓ Spending model loaded");
    }

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/clients/:id", get(get_client))
        .route("/clients/:id/statistics", get(get_statistics))
        .route("/clients/:id/monthly_report", get(get_monthly_report))
        .route("/clients/:id/category_spending", get(get_category_spending))
        .route("/clients/:id/recent", get(get_recent))
        .route("/clients/:id/search", get(search))
        .route("/clients/:id/prediction", get(get_prediction))
        .with_state(service);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()));

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;

    println!("\n🚀 Server running on http://{}", config.bind_address);
    println!("   API: http://{}/api/clients/<id>/statistics", config.bind_address);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await?;

    Ok(())
}
