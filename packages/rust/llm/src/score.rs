//! Rubric scoring through a JSON-mode chat completion.

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument, warn};

use curator_shared::types::truncate_chars;
use curator_shared::{CuratorError, RawScore, Result, ScoringInput, ScoringService};

use crate::client::{ChatResponse, OpenAiClient};

const SYSTEM_PROMPT: &str = "You are an expert content curator for an AI industry intelligence brief.";

const RUBRIC: &str = r#"Score each item for how valuable it is to business decisions. Total is out of 30.

1. timeliness (0-6): 6 official announcement or release within 24h; 5 major update or breaking news; 4 trend of the week; 3 in-depth report or case study; 1-2 old news.
2. impact (0-9): 9 industry-changing (new frontier model, major policy, API pricing); 7-8 major product update; 5-6 official tool or notable feature; 3-4 trending library or plugin; 1-2 opinion, discussion, ordinary open-source project.
3. actionability (0-7): 7 official API/SDK change usable right away; 5-6 full tutorial or example; 3-4 useful reference, tool needs vetting; 1-2 theory or early experiment.
4. relevance (0-8): 8 directly affects business decisions (pricing, competitors, market); 6-7 workflow or productivity; 4-5 architecture or technology choice; 2-3 general AI news; 1 tangential.

Source tier: A official sources, score impact and actionability generously; B authoritative, score normally; C community, score strictly; D aggregators, score most strictly.

Return JSON only, no markdown:
{"items": [{"id": "<input id>", "timeliness": 5, "impact": 7, "actionability": 6, "relevance": 7, "total": 25, "why": "one sentence on the value", "category": "announcement|insight|tool|case|research|risk"}]}"#;

/// Chat-completion backed [`ScoringService`].
pub struct OpenAiScorer {
    client: OpenAiClient,
    model: String,
    whitespace: Regex,
}

impl OpenAiScorer {
    pub fn new(client: OpenAiClient, model: impl Into<String>) -> Result<Self> {
        let whitespace =
            Regex::new(r"\s+").map_err(|e| CuratorError::config(format!("invalid whitespace pattern: {e}")))?;
        Ok(Self {
            client,
            model: model.into(),
            whitespace,
        })
    }

    fn normalize(&self, text: &str, max_chars: usize) -> String {
        let collapsed = self.whitespace.replace_all(text.trim(), " ");
        truncate_chars(&collapsed, max_chars)
    }

    fn payload(&self, batch: &[ScoringInput]) -> Value {
        let items: Vec<Value> = batch
            .iter()
            .map(|input| {
                json!({
                    "id": input.id,
                    "title": self.normalize(&input.title, 120),
                    "snippet": self.normalize(&input.snippet, 280),
                    "source": self.normalize(&input.source, 80),
                    "tier": input.tier.as_str(),
                    "published_at": input.published_at,
                })
            })
            .collect();
        Value::Array(items)
    }
}

#[async_trait]
impl ScoringService for OpenAiScorer {
    #[instrument(skip_all, fields(model = %self.model, batch = batch.len()))]
    async fn score(&self, batch: &[ScoringInput]) -> Result<Vec<RawScore>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let input = serde_json::to_string_pretty(&self.payload(batch))
            .map_err(|e| CuratorError::data(format!("failed to encode scoring payload: {e}")))?;
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": format!("{RUBRIC}\n\nInput:\n{input}") },
            ],
            "temperature": 0.2,
            "response_format": { "type": "json_object" },
        });

        let response: ChatResponse = self.client.post_json("chat/completions", &body).await?;
        let content = response.into_content()?;
        let parsed = parse_lenient(&content)
            .ok_or_else(|| CuratorError::data("scoring response is not JSON"))?;
        let scores = extract_scores(&parsed, batch);
        debug!(returned = scores.len(), "scores parsed");
        Ok(scores)
    }
}

/// Parse `text` as JSON, falling back to its outermost `{..}` then `[..]` span.
pub fn parse_lenient(text: &str) -> Option<Value> {
    let text = text.trim();
    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }
    [('{', '}'), ('[', ']')].into_iter().find_map(|(open, close)| {
        let start = text.find(open)?;
        let end = text.rfind(close)?;
        if end <= start {
            return None;
        }
        serde_json::from_str(&text[start..=end]).ok()
    })
}

fn extract_scores(parsed: &Value, batch: &[ScoringInput]) -> Vec<RawScore> {
    let entries: &[Value] = match parsed {
        Value::Array(items) => items.as_slice(),
        Value::Object(obj) => match obj.get("items") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };

    entries
        .iter()
        .filter_map(|entry| {
            let obj = entry.as_object()?;
            let Some(id) = resolve_id(obj.get("id")?, batch) else {
                warn!(id = %obj["id"], "score for unknown id ignored");
                return None;
            };
            Some(RawScore {
                id,
                timeliness: number(obj, &["timeliness", "freshness"]).unwrap_or(0.0),
                impact: number(obj, &["impact", "shareworthy"]).unwrap_or(0.0),
                actionability: number(obj, &["actionability", "practical"]).unwrap_or(0.0),
                relevance: number(obj, &["relevance"]).unwrap_or(0.0),
                total: number(obj, &["total"]),
                category: text(obj, &["category", "type"]),
                rationale: text(obj, &["why", "rationale"]),
            })
        })
        .collect()
}

/// Map a returned id onto a batch item: an exact id, or a positional index.
fn resolve_id(raw: &Value, batch: &[ScoringInput]) -> Option<String> {
    let by_index = |n: u64| batch.get(usize::try_from(n).ok()?).map(|input| input.id.clone());
    match raw {
        Value::String(s) => batch
            .iter()
            .find(|input| input.id == *s)
            .map(|input| input.id.clone())
            .or_else(|| s.trim().parse::<u64>().ok().and_then(by_index)),
        Value::Number(n) => n.as_u64().and_then(by_index),
        _ => None,
    }
}

fn number(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn text(obj: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| obj.get(*key)?.as_str().filter(|s| !s.is_empty()))
        .unwrap_or_default()
        .to_string()
}
