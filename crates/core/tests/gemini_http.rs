use buywise_core::config::Settings;
use buywise_core::domain::{AlternativesQuery, ImagePayload, PurchaseQuery};
use buywise_core::flow::{find_cheaper_alternatives, persona_analysis, FlowError};
use buywise_core::llm::gemini::GeminiClient;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENERATE_PATH: &str = "/v1beta/models/gemini-2.0-flash:generateContent";

fn client(server: &MockServer, api_key: Option<&str>) -> GeminiClient {
    let base_url = format!("{}/v1beta", server.uri());
    let api_key = api_key.map(str::to_string);
    let settings = Settings::from_lookup(|key| match key {
        "GEMINI_BASE_URL" => Some(base_url.clone()),
        "GEMINI_API_KEY" => api_key.clone(),
        _ => None,
    })
    .unwrap();
    GeminiClient::from_settings(&settings).unwrap()
}

fn gemini_reply(text: &str) -> serde_json::Value {
    json!({
        "candidates": [
            {"content": {"role": "model", "parts": [{"text": text}]}, "finishReason": "STOP"}
        ]
    })
}

#[tokio::test]
async fn persona_analysis_round_trip() {
    let server = MockServer::start().await;
    let reply = json!({
        "recommendation": "Buy",
        "reasoning": "Used daily for years.",
        "opportunityCost": "Modest.",
        "alternatives": "A sturdy used desk.",
        "financialImpact": "Negligible.",
        "keyInsights": "Tools you use daily earn their keep.",
    });
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("x-goog-api-key", "k"))
        .and(body_partial_json(json!({
            "generationConfig": {"responseMimeType": "application/json"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(&reply.to_string())))
        .expect(1)
        .mount(&server)
        .await;

    let query = PurchaseQuery::from_value(&json!({
        "itemName": "Standing Desk",
        "cost": 500,
        "frequency": "Daily",
    }))
    .unwrap();
    let rec = persona_analysis(&client(&server, Some("k")), &query)
        .await
        .unwrap();
    assert_eq!(serde_json::to_value(&rec).unwrap(), reply);
}

#[tokio::test]
async fn photo_is_sent_inline() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(body_partial_json(json!({
            "contents": [{"parts": [
                {"text": "You are a helpful shopping assistant that finds cheaper alternatives for items online.\n\nGiven the item name and an image of the item, find at least three cheaper alternatives.\nReturn a list of alternatives with their name, URL, and price.\n\nItem Name: Luxury Watch\nItem Image: "},
                {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}}
            ]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply(
            "```json\n{\"alternatives\": [{\"name\": \"Quartz\", \"url\": \"https://example.com/q\", \"price\": 99}]}\n```",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let query = AlternativesQuery::new(
        "Luxury Watch",
        ImagePayload::from_data_uri("data:image/png;base64,iVBORw0KGgo=").unwrap(),
    );
    let result = find_cheaper_alternatives(&client(&server, Some("k")), &query)
        .await
        .unwrap();
    assert_eq!(result.alternatives.len(), 1);
    assert_eq!(result.alternatives[0].price, 99.0);
}

#[tokio::test]
async fn http_error_is_a_service_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": {"code": 503, "message": "overloaded"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let query = PurchaseQuery::new("Lamp", 30.0);
    let err = persona_analysis(&client(&server, Some("k")), &query)
        .await
        .unwrap_err();
    let diag = err.diagnostics().unwrap();
    assert_eq!(diag.stage, "http");
    assert!(diag.raw_output.as_deref().unwrap().contains("overloaded"));
}

#[tokio::test]
async fn prose_reply_is_a_service_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(gemini_reply("Recommendation: Buy\nReasoning: why not")),
        )
        .mount(&server)
        .await;

    let query = PurchaseQuery::new("Lamp", 30.0);
    let err = persona_analysis(&client(&server, Some("k")), &query)
        .await
        .unwrap_err();
    assert_eq!(err.diagnostics().map(|d| d.stage), Some("parse"));
}

#[tokio::test]
async fn missing_key_fails_without_a_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let query = PurchaseQuery::new("Lamp", 30.0);
    let err = persona_analysis(&client(&server, None), &query)
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Service(_)));
    assert_eq!(err.diagnostics().map(|d| d.stage), Some("credential"));
}
