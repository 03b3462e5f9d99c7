use async_trait::async_trait;
use serde_json::json;
use tracing::instrument;

use curator_shared::{CuratorError, Result, SummarizationService};

use crate::client::{ChatResponse, OpenAiClient};

/// Short event labels from a cluster's member titles.
pub struct OpenAiSummarizer {
    client: OpenAiClient,
    model: String,
}

impl OpenAiSummarizer {
    pub fn new(client: OpenAiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

fn label_prompt(titles: &[String]) -> String {
    let list: Vec<String> = titles.iter().map(|t| format!("- {t}")).collect();
    format!(
        "These headlines all report the same event. Summarize its core topic as one short phrase of at most 10 words:\n\n{}\n\nOutput only the label, no explanation.",
        list.join("\n")
    )
}

#[async_trait]
impl SummarizationService for OpenAiSummarizer {
    #[instrument(skip_all, fields(model = %self.model, titles = titles.len()))]
    async fn summarize(&self, titles: &[String]) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": label_prompt(titles) }],
            "max_tokens": 50,
            "temperature": 0.3,
        });
        let response: ChatResponse = self.client.post_json("chat/completions", &body).await?;
        let label = response
            .into_content()?
            .trim()
            .trim_matches(|c| c == '"' || c == '\'')
            .trim()
            .to_string();
        if label.is_empty() {
            return Err(CuratorError::data("empty event label"));
        }
        Ok(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::test_client;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn prompt_lists_every_title() {
        let prompt = label_prompt(&["A launches X".into(), "X is here".into()]);
        assert!(prompt.contains("- A launches X\n- X is here"));
    }

    #[tokio::test]
    async fn trims_quotes_from_label() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"max_tokens": 50})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": " \"X model launch\"\n" } }]
            })))
            .mount(&server)
            .await;

        let summarizer = OpenAiSummarizer::new(test_client(&server), "gpt-4o-mini");
        let label = summarizer.summarize(&["a".into(), "b".into()]).await.unwrap();
        assert_eq!(label, "X model launch");
    }

    #[tokio::test]
    async fn blank_label_is_a_data_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": "  " } }]
            })))
            .mount(&server)
            .await;

        let summarizer = OpenAiSummarizer::new(test_client(&server), "m");
        assert!(summarizer.summarize(&["a".into()]).await.is_err());
    }
}
