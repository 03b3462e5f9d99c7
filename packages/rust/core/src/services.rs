//! Capability wiring from `[openai]` config.

use std::sync::Arc;

use tracing::{info, warn};

use curator_llm::{OpenAiClient, OpenAiEmbedder, OpenAiScorer, OpenAiSummarizer};
use curator_shared::{
    CuratorError, EmbeddingService, OpenAiConfig, Result, ScoringService, SummarizationService,
    resolve_api_key,
};

/// The capabilities handed to the stage engines. Any of them may be absent.
#[derive(Default, Clone)]
pub struct Services {
    pub embedder: Option<Arc<dyn EmbeddingService>>,
    pub scorer: Option<Arc<dyn ScoringService>>,
    pub summarizer: Option<Arc<dyn SummarizationService>>,
}

impl Services {
    /// No capabilities at all.
    pub fn none() -> Self {
        Self::default()
    }

    /// Build the OpenAI-backed capabilities.
    ///
    /// A missing API key is not an error here: each stage records its own
    /// degradation for the absent capability, and ranking reports the
    /// config error.
    pub fn from_config(config: &OpenAiConfig) -> Result<Self> {
        let key = match resolve_api_key(config) {
            Ok(key) => key,
            Err(CuratorError::Config { message }) => {
                warn!(%message, "no API key; remote capabilities disabled");
                return Ok(Self::none());
            }
            Err(e) => return Err(e),
        };

        let client = OpenAiClient::new(config, key)?;
        info!(
            embedding_model = %config.embedding_model,
            scoring_model = %config.scoring_model,
            "remote capabilities configured"
        );
        Ok(Self {
            embedder: Some(Arc::new(OpenAiEmbedder::new(client.clone(), &config.embedding_model))),
            scorer: Some(Arc::new(OpenAiScorer::new(client.clone(), &config.scoring_model)?)),
            summarizer: Some(Arc::new(OpenAiSummarizer::new(client, &config.summary_model))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_yields_no_services() {
        let config = OpenAiConfig {
            api_key_env: "CURATOR_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..Default::default()
        };
        let services = Services::from_config(&config).unwrap();
        assert!(services.embedder.is_none());
        assert!(services.scorer.is_none());
        assert!(services.summarizer.is_none());
    }
}
