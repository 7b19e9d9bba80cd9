use std::sync::Arc;
use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::market::{PriceFeed, PriceSnapshot, Ticker, SUPPORTED_TICKERS};
use crate::portfolio::{require, Holding, PortfolioService};

#[derive(Clone)]
pub struct ApiState {
    pub portfolio_service: Arc<PortfolioService>,
    pub price_feed: PriceFeed,
}

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct AddStockRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub ticker: String,
    // Browsers submit form inputs as strings, so accept "3" as well as 3
    #[serde(default)]
    pub quantity: Value,
}

#[derive(Debug, Deserialize)]
pub struct DeleteStockRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub ticker: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub holdings: Vec<Holding>,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct HoldingsResponse {
    pub holdings: Vec<Holding>,
}

#[derive(Debug, Serialize)]
pub struct StocksResponse {
    pub stocks: Vec<Ticker>,
}

// Malformed bodies get the same `{"error": ...}` shape as every other failure
fn body<T: DeserializeOwned>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(request)| request)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

/// Positive whole number, given either as a JSON number or a numeric string.
pub fn parse_quantity(raw: &Value) -> AppResult<u64> {
    let invalid = || AppError::Validation("Quantity must be a positive integer".to_string());

    let quantity = match raw {
        Value::Null => return Err(AppError::Validation("Please fill all fields".to_string())),
        Value::Number(n) => n.as_u64().ok_or_else(invalid)?,
        Value::String(s) => s.trim().parse::<u64>().map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };

    if quantity == 0 {
        return Err(invalid());
    }
    Ok(quantity)
}

// Argon2 hashing and file-store writes block; keep them off the async workers
async fn run_blocking<T, F>(task: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> AppResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| AppError::Internal(format!("Blocking task failed: {e}")))?
}

// POST /register
pub async fn register(
    State(state): State<ApiState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> AppResult<Json<MessageResponse>> {
    let request = body(payload)?;
    let service = state.portfolio_service.clone();
    run_blocking(move || service.register(&request.email, &request.password)).await?;

    Ok(Json(MessageResponse {
        message: "Registration successful".to_string(),
    }))
}

// POST /login
pub async fn login(
    State(state): State<ApiState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> AppResult<Json<LoginResponse>> {
    let request = body(payload)?;
    let service = state.portfolio_service.clone();
    let outcome = run_blocking(move || service.login(&request.email, &request.password)).await?;

    Ok(Json(LoginResponse {
        message: "Login Success".to_string(),
        holdings: outcome.holdings,
        token: outcome.token,
    }))
}

// POST /add-stock
pub async fn add_stock(
    State(state): State<ApiState>,
    payload: Result<Json<AddStockRequest>, JsonRejection>,
) -> AppResult<Json<HoldingsResponse>> {
    let request = body(payload)?;
    // Ticker first: an unsupported symbol is rejected before anything else
    require(&request.ticker)?;
    request.ticker.parse::<Ticker>()?;
    let quantity = parse_quantity(&request.quantity)?;

    let service = state.portfolio_service.clone();
    let holdings =
        run_blocking(move || service.add_stock(&request.email, &request.ticker, quantity)).await?;
    Ok(Json(HoldingsResponse { holdings }))
}

// POST /delete-stock
pub async fn delete_stock(
    State(state): State<ApiState>,
    payload: Result<Json<DeleteStockRequest>, JsonRejection>,
) -> AppResult<Json<HoldingsResponse>> {
    let request = body(payload)?;
    let service = state.portfolio_service.clone();
    let holdings = run_blocking(move || service.delete_stock(&request.email, &request.ticker)).await?;
    Ok(Json(HoldingsResponse { holdings }))
}

// GET /stocks
pub async fn list_stocks() -> Json<StocksResponse> {
    Json(StocksResponse {
        stocks: SUPPORTED_TICKERS.to_vec(),
    })
}

// GET /prices - empty object until the first tick
pub async fn latest_prices(State(state): State<ApiState>) -> Json<PriceSnapshot> {
    Json(
        state
            .price_feed
            .latest()
            .map(|snapshot| (*snapshot).clone())
            .unwrap_or_default(),
    )
}

// GET /health
pub async fn health_check(State(state): State<ApiState>) -> Json<Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "finance_dash",
        "users": state.portfolio_service.user_count(),
        "timestamp": chrono::Utc::now()
    }))
}

pub fn create_api_router(state: ApiState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/add-stock", post(add_stock))
        .route("/delete-stock", post(delete_stock))
        .route("/stocks", get(list_stocks))
        .route("/prices", get(latest_prices))
        .route("/health", get(health_check))
        .with_state(state)
}
