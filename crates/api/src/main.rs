use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use buywise_core::domain::{
    AlternativesQuery, AlternativesResult, FieldIssue, ImageRecommendation, PurchaseQuery,
    Recommendation, ValidationError, Verdict,
};
use buywise_core::flow::FlowError;
use buywise_core::llm::LlmClient;

// Base64 photos up to the 4MB image cap, plus the rest of the form.
const BODY_LIMIT_BYTES: usize = 8 * 1024 * 1024;

const ANALYSIS_FAILED: &str = "An error occurred while getting advice. Please try again.";
const ALTERNATIVES_FAILED: &str = "An error occurred while finding alternatives. Please try again.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = buywise_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    if settings.model_api_key().is_none() {
        tracing::warn!(
            provider = %settings.provider,
            var = settings.model_api_key_var(),
            "model API key missing; advice requests will fail until it is set"
        );
    }

    let llm = buywise_core::llm::client_from_settings(&settings)?;
    let app = router(AppState { llm });

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, provider = %settings.provider, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/analysis/persona", post(post_persona_analysis))
        .route("/analysis/image", post(post_image_analysis))
        .route("/alternatives", post(post_alternatives))
        .with_state(state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    llm: Arc<dyn LlmClient>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiReply<T> {
    request_id: Uuid,
    provider: String,
    generated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    verdict: Option<Verdict>,
    result: T,
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<FieldIssue>,
}

type ApiError = (StatusCode, Json<ApiErrorBody>);
type ApiResult<T> = Result<Json<ApiReply<T>>, ApiError>;

impl AppState {
    fn reply<T>(&self, verdict: Option<Verdict>, result: T) -> Json<ApiReply<T>> {
        Json(ApiReply {
            request_id: Uuid::new_v4(),
            provider: self.llm.provider().to_string(),
            generated_at: Utc::now(),
            verdict,
            result,
        })
    }
}

async fn post_persona_analysis(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Recommendation> {
    let query = PurchaseQuery::from_value(&body).map_err(validation_error)?;
    let rec = buywise_core::flow::persona_analysis(state.llm.as_ref(), &query)
        .await
        .map_err(|e| flow_error(e, ANALYSIS_FAILED))?;
    Ok(state.reply(Some(rec.verdict()), rec))
}

async fn post_image_analysis(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<ImageRecommendation> {
    let query = PurchaseQuery::from_value(&body).map_err(validation_error)?;
    let rec = buywise_core::flow::analyze_image(state.llm.as_ref(), &query)
        .await
        .map_err(|e| flow_error(e, ANALYSIS_FAILED))?;
    Ok(state.reply(Some(rec.verdict()), rec))
}

async fn post_alternatives(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<AlternativesResult> {
    let query = AlternativesQuery::from_value(&body).map_err(validation_error)?;
    let result = buywise_core::flow::find_cheaper_alternatives(state.llm.as_ref(), &query)
        .await
        .map_err(|e| flow_error(e, ALTERNATIVES_FAILED))?;
    Ok(state.reply(None, result))
}

fn validation_error(err: ValidationError) -> ApiError {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ApiErrorBody {
            error: "Missing or invalid information.".to_string(),
            fields: err.issues,
        }),
    )
}

fn flow_error(err: FlowError, message: &str) -> ApiError {
    match err {
        FlowError::Validation(v) => validation_error(v),
        FlowError::Service(e) => {
            if let Some(diag) = e.downcast_ref::<buywise_core::llm::error::LlmDiagnosticsError>() {
                tracing::error!(
                    provider = %diag.provider,
                    stage = diag.stage,
                    raw_output = diag.raw_output.as_deref().unwrap_or(""),
                    "model call diagnostics"
                );
            }
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "advice request failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(ApiErrorBody {
                    error: message.to_string(),
                    fields: Vec::new(),
                }),
            )
        }
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &buywise_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use buywise_core::llm::{GenerateInput, Provider};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CannedClient {
        reply: Option<Value>,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl LlmClient for CannedClient {
        fn provider(&self) -> Provider {
            Provider::Gemini
        }

        async fn generate(&self, _input: GenerateInput) -> anyhow::Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply
                .clone()
                .ok_or_else(|| anyhow::anyhow!("connection reset by peer"))
        }
    }

    fn state(reply: Option<Value>) -> (AppState, Arc<CannedClient>) {
        let client = Arc::new(CannedClient {
            reply,
            calls: AtomicUsize::new(0),
        });
        let llm: Arc<dyn LlmClient> = client.clone();
        (AppState { llm }, client)
    }

    fn advice() -> Value {
        json!({
            "recommendation": "Don't Buy",
            "reasoning": "You already own a desk.",
            "opportunityCost": "$500 toward the emergency fund.",
            "financialImpact": "A tenth of monthly savings.",
            "keyInsights": "Novelty fades; habits stay.",
        })
    }

    #[tokio::test]
    async fn persona_analysis_wraps_result_with_verdict() {
        let (state, client) = state(Some(advice()));
        let Json(reply) = post_persona_analysis(
            State(state),
            Json(json!({"itemName": "Standing Desk", "cost": 500, "frequency": "Daily"})),
        )
        .await
        .unwrap();
        assert_eq!(reply.verdict, Some(Verdict::DontBuy));
        assert_eq!(reply.provider, "gemini");
        assert_eq!(reply.result.recommendation, "Don't Buy");
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);

        let encoded = serde_json::to_value(&reply).unwrap();
        assert_eq!(encoded["verdict"], json!("dont_buy"));
        assert!(encoded["requestId"].is_string());
        assert_eq!(encoded["result"], advice());
    }

    #[tokio::test]
    async fn invalid_body_is_unprocessable_and_skips_the_model() {
        let (state, client) = state(Some(advice()));
        let (status, Json(body)) = post_persona_analysis(
            State(state),
            Json(json!({"itemName": "", "cost": 0, "frequency": "Sometimes"})),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let fields: Vec<_> = body.fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(fields, vec!["itemName", "frequency", "cost"]);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn alternatives_require_photo() {
        let (state, client) = state(Some(json!({"alternatives": []})));
        let (status, Json(body)) =
            post_alternatives(State(state), Json(json!({"itemName": "Luxury Watch"})))
                .await
                .unwrap_err();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.fields[0].field, "photo");
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn image_analysis_requires_photo() {
        let (state, client) = state(Some(advice()));
        let (status, Json(body)) =
            post_image_analysis(State(state), Json(json!({"itemName": "Lamp", "cost": 20})))
                .await
                .unwrap_err();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.fields[0].field, "photo");
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn service_failure_is_bad_gateway_with_generic_message() {
        let (state, _client) = state(None);
        let (status, Json(body)) = post_alternatives(
            State(state),
            Json(json!({
                "itemName": "Luxury Watch",
                "itemImageUrl": "data:image/png;base64,iVBORw0KGgo="
            })),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body.error, ALTERNATIVES_FAILED);
        assert!(body.fields.is_empty());
    }
}
