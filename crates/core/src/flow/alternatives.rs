use crate::domain::{AlternativesQuery, AlternativesResult, ValidationError};
use crate::flow::{run, Flow, FlowError};
use crate::llm::LlmClient;
use crate::prompt::{Prompt, PromptBuilder};
use serde_json::Value;

/// Asks the model for cheaper substitutes of a photographed item.
///
/// "Cheaper" is an instruction to the model only; the reply is returned as given.
pub struct FindAlternatives;

impl Flow for FindAlternatives {
    const NAME: &'static str = "find_alternatives";

    type Input = AlternativesQuery;
    type Reply = AlternativesResult;

    fn validate(input: &AlternativesQuery) -> Result<(), ValidationError> {
        input.validate()
    }

    fn render(q: &AlternativesQuery) -> Prompt {
        PromptBuilder::new()
            .line("You are a helpful shopping assistant that finds cheaper alternatives for items online.")
            .blank()
            .line("Given the item name and an image of the item, find at least three cheaper alternatives.")
            .line("Return a list of alternatives with their name, URL, and price.")
            .blank()
            .field("Item Name", &q.item_name)
            .optional_image("Item Image", q.photo.as_ref())
            .blank()
            .line("Ensure that you only suggest alternatives that are cheaper than the original item.")
            .line("Every URL must be a real product page starting with https://.")
            .line("Be mindful of the opportunity cost and rational decision-making in your suggestions.")
            .line("Return your response as a JSON object: {\"alternatives\": [{\"name\": ..., \"url\": ..., \"price\": ...}]}")
            .build()
    }

    fn output_schema() -> Value {
        AlternativesResult::output_schema()
    }

    fn check_reply(reply: &AlternativesResult) -> Result<(), ValidationError> {
        reply.validate()
    }
}

pub async fn find_cheaper_alternatives(
    client: &dyn LlmClient,
    query: &AlternativesQuery,
) -> Result<AlternativesResult, FlowError> {
    run::<FindAlternatives>(client, query).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Alternative, ImagePayload};
    use crate::flow::testing::StubClient;
    use serde_json::json;

    fn watch() -> AlternativesQuery {
        AlternativesQuery::new(
            "Luxury Watch",
            ImagePayload::from_data_uri("data:image/jpeg;base64,/9j/4AAQSkZJRg==").unwrap(),
        )
    }

    fn three_cheaper() -> Value {
        json!({
            "alternatives": [
                {"name": "Seiko 5 Automatic", "url": "https://shop.example.com/seiko-5", "price": 275.0},
                {"name": "Orient Bambino", "url": "https://shop.example.com/orient-bambino", "price": 189.99},
                {"name": "Casio Edifice", "url": "http://watches.example.net/edifice?ref=1", "price": 120}
            ]
        })
    }

    #[tokio::test]
    async fn returns_the_models_items_unmodified() {
        let client = StubClient::replying(three_cheaper());
        let result = find_cheaper_alternatives(&client, &watch()).await.unwrap();
        assert_eq!(
            result.alternatives,
            vec![
                Alternative {
                    name: "Seiko 5 Automatic".into(),
                    url: "https://shop.example.com/seiko-5".into(),
                    price: 275.0,
                },
                Alternative {
                    name: "Orient Bambino".into(),
                    url: "https://shop.example.com/orient-bambino".into(),
                    price: 189.99,
                },
                Alternative {
                    name: "Casio Edifice".into(),
                    url: "http://watches.example.net/edifice?ref=1".into(),
                    price: 120.0,
                },
            ]
        );

        let sent = client.last_input();
        assert_eq!(sent.operation, "find_alternatives");
        assert_eq!(sent.prompt.images().count(), 1);
        assert!(sent.prompt.to_display_text().contains("Item Name: Luxury Watch\nItem Image: "));
    }

    #[tokio::test]
    async fn missing_name_or_photo_makes_no_call() {
        let client = StubClient::replying(three_cheaper());

        let no_photo = AlternativesQuery {
            item_name: "Luxury Watch".into(),
            photo: None,
        };
        let err = find_cheaper_alternatives(&client, &no_photo).await.unwrap_err();
        assert!(err.is_validation());

        let mut no_name = watch();
        no_name.item_name = "  ".into();
        let err = find_cheaper_alternatives(&client, &no_name).await.unwrap_err();
        assert!(err.is_validation());

        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn relative_url_breaks_the_contract() {
        let mut reply = three_cheaper();
        reply["alternatives"][1]["url"] = json!("/orient-bambino");
        let client = StubClient::replying(reply);
        let err = find_cheaper_alternatives(&client, &watch()).await.unwrap_err();
        let diag = err.diagnostics().unwrap();
        assert_eq!(diag.stage, "contract");
        assert!(diag.detail.contains("alternatives[1].url"));
    }

    #[tokio::test]
    async fn string_price_breaks_the_contract() {
        let mut reply = three_cheaper();
        reply["alternatives"][0]["price"] = json!("$275");
        let client = StubClient::replying(reply);
        let err = find_cheaper_alternatives(&client, &watch()).await.unwrap_err();
        assert!(matches!(err, FlowError::Service(_)));
    }

    #[tokio::test]
    async fn identical_calls_each_satisfy_the_schema() {
        let client = StubClient::replying(three_cheaper());
        let first = find_cheaper_alternatives(&client, &watch()).await.unwrap();
        let second = find_cheaper_alternatives(&client, &watch()).await.unwrap();
        first.validate().unwrap();
        second.validate().unwrap();
        assert_eq!(client.call_count(), 2);
    }
}
