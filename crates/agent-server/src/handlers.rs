//! HTTP Handlers

use std::time::Duration;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use agent_core::{
    Admission, AssistantMessage, Conversation, ExternalAnswer, ToolSchema, Turn, assemble,
    provider::ModelInfo,
};

use crate::state::AppState;

/// Header carrying the caller address set by the reverse proxy
pub const IDENTITY_HEADER: &str = "x-real-ip";

const QUESTION_CHARS: std::ops::RangeInclusive<usize> = 5..=1000;
const DESTINATION_CHARS: std::ops::RangeInclusive<usize> = 2..=100;
const MAX_HISTORY_TURNS: usize = 40;

pub const PREFERENCES: [&str; 15] = [
    "cultural", "adventure", "relaxing", "food", "nightlife", "shopping", "nature", "historical", "beach",
    "mountain", "city", "luxury", "budget", "family", "romantic",
];

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub model: String,
    pub model_backend_connected: bool,
    pub tools: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
    User,
    Assistant,
}

/// Earlier plain-text turn resubmitted by the caller
#[derive(Clone, Debug, Deserialize)]
pub struct HistoryTurn {
    pub role: HistoryRole,
    pub content: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default)]
    pub history: Vec<HistoryTurn>,
}

impl QueryRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_question(&self.question)?;
        if self.history.len() > MAX_HISTORY_TURNS {
            return Err(ApiError::bad_request(format!(
                "history may hold at most {MAX_HISTORY_TURNS} turns"
            )));
        }
        Ok(())
    }

    /// Seed conversation: history first, then the question
    pub fn conversation(&self) -> Result<Conversation, ApiError> {
        let turns = self.history.iter().map(|turn| match turn.role {
            HistoryRole::User => Turn::User {
                text: turn.content.clone(),
            },
            HistoryRole::Assistant => Turn::Assistant {
                message: AssistantMessage::Text(turn.content.clone()),
            },
        });
        Conversation::seeded(turns, self.question.trim()).map_err(|e| ApiError::bad_request(e.to_string()))
    }
}

/// Budget given either as free text ("$2000") or as a number
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Budget {
    Amount(f64),
    Text(String),
}

impl std::fmt::Display for Budget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Amount(amount) => write!(f, "{amount}"),
            Self::Text(text) => f.write_str(text.trim()),
        }
    }
}

/// Structured trip request, translated into a seed question
#[derive(Clone, Debug, Deserialize)]
pub struct TripRequest {
    pub destination: String,
    pub duration: u32,
    #[serde(default)]
    pub budget: Option<Budget>,
    #[serde(default)]
    pub preferences: Vec<String>,
    #[serde(default)]
    pub group_size: Option<u32>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl TripRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let destination = self.destination.trim().chars().count();
        if !DESTINATION_CHARS.contains(&destination) {
            return Err(ApiError::bad_request("destination must be 2 to 100 characters"));
        }
        if !(1..=30).contains(&self.duration) {
            return Err(ApiError::bad_request("duration must be between 1 and 30 days"));
        }
        if let Some(size) = self.group_size {
            if !(1..=20).contains(&size) {
                return Err(ApiError::bad_request("group_size must be between 1 and 20"));
            }
        }
        if let Some(pref) = self
            .preferences
            .iter()
            .find(|p| !PREFERENCES.contains(&p.trim().to_lowercase().as_str()))
        {
            return Err(ApiError::bad_request(format!(
                "Invalid preference: {pref}. Valid options: {}",
                PREFERENCES.join(", ")
            )));
        }
        if let Some(currency) = &self.currency {
            let code = currency.trim();
            if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(ApiError::bad_request("currency must be a 3-letter code"));
            }
        }
        Ok(())
    }

    pub fn to_question(&self) -> String {
        let mut question = format!("Plan a {}-day trip to {}", self.duration, self.destination.trim());

        if let Some(budget) = self.budget.as_ref().filter(|b| !b.to_string().is_empty()) {
            question.push_str(&format!(" with a budget of {budget}"));
        }
        if !self.preferences.is_empty() {
            let prefs: Vec<String> = self.preferences.iter().map(|p| p.trim().to_lowercase()).collect();
            question.push_str(&format!(" focusing on {} activities", prefs.join(", ")));
        }
        if let Some(size) = self.group_size.filter(|n| *n > 1) {
            question.push_str(&format!(" for {size} people"));
        }
        if let Some(currency) = self
            .currency
            .as_ref()
            .map(|c| c.trim().to_uppercase())
            .filter(|c| c != "USD")
        {
            question.push_str(&format!(" with costs in {currency}"));
        }
        question
    }
}

/// Answer plus the question that produced it
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    #[serde(flatten)]
    pub answer: ExternalAnswer,
    pub query: String,
}

#[derive(Serialize)]
pub struct ToolsResponse {
    pub count: usize,
    pub tools: Vec<ToolSchema>,
}

#[derive(Serialize)]
pub struct ModelsResponse {
    pub active: String,
    pub models: Vec<ModelInfo>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

/// Error returned before the loop starts
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: error.into(),
                code: code.into(),
                retry_after_secs: None,
            },
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", error)
    }

    pub fn rate_limited(retry_after: Duration) -> Self {
        // round up so clients never retry inside the window
        let secs = (retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0)).max(1);
        let mut err = Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            "RATE_LIMITED",
            format!("Too many requests. Try again in {secs} seconds."),
        );
        err.body.retry_after_secs = Some(secs);
        err
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let retry_after = self.body.retry_after_secs;
        let mut response = (self.status, Json(self.body)).into_response();
        if let Some(secs) = retry_after {
            response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

fn validate_question(question: &str) -> Result<(), ApiError> {
    let chars = question.trim().chars().count();
    if QUESTION_CHARS.contains(&chars) {
        Ok(())
    } else {
        Err(ApiError::bad_request("question must be 5 to 1000 characters"))
    }
}

/// Caller identity used for rate limiting
pub fn caller_identity(headers: &HeaderMap) -> String {
    headers
        .get(IDENTITY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

fn admit(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let identity = caller_identity(headers);
    match state.rate_guard.admit(&identity) {
        Admission::Allowed { remaining } => {
            tracing::debug!(%identity, remaining, "Request admitted");
            Ok(())
        }
        Admission::Denied { retry_after } => {
            tracing::warn!(%identity, ?retry_after, "Rate limit exceeded");
            Err(ApiError::rate_limited(retry_after))
        }
    }
}

/// Run the loop and assemble the external answer; aborts come back as degraded answers
async fn answer(state: &AppState, mut conversation: Conversation, query: String) -> QueryResponse {
    let report = state
        .orchestrator
        .run(&mut conversation, &state.shutdown.child_token())
        .await;
    QueryResponse {
        answer: assemble(report.outcome),
        query,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = state.provider.health_check().await.unwrap_or(false);

    Json(HealthResponse {
        status: if connected { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        model: state.model.clone(),
        model_backend_connected: connected,
        tools: state.tools.len(),
        timestamp: Utc::now(),
    })
}

/// Free-form travel question
pub async fn query_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    admit(&state, &headers)?;
    let Json(request) = payload?;
    request.validate()?;

    let conversation = request.conversation()?;
    tracing::info!(question = %request.question.trim(), history = request.history.len(), "Travel query");
    Ok(Json(answer(&state, conversation, request.question.trim().to_string()).await))
}

/// Structured trip request
pub async fn plan_trip_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<TripRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    admit(&state, &headers)?;
    let Json(request) = payload?;
    request.validate()?;

    let question = request.to_question();
    tracing::info!(%question, "Generated trip question");
    Ok(Json(answer(&state, Conversation::from_question(question.clone()), question).await))
}

/// Tool catalog
pub async fn list_tools(State(state): State<AppState>) -> Json<ToolsResponse> {
    let tools = state.tools.schemas();
    Json(ToolsResponse {
        count: tools.len(),
        tools,
    })
}

/// Models reported by the backend
pub async fn list_models(State(state): State<AppState>) -> Result<Json<ModelsResponse>, ApiError> {
    let models = state.provider.list_models().await.map_err(|e| {
        tracing::warn!("Model listing failed: {}", e);
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "MODEL_BACKEND_UNAVAILABLE",
            "The model backend is not reachable",
        )
    })?;

    Ok(Json(ModelsResponse {
        active: state.model.clone(),
        models,
    }))
}
