use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::engine::sequencing::decode_ordered_answer;
use crate::engine::types::{
    AnswerRepresentation, ExerciseItem, ExerciseType, GameKind, ItemMetadata,
};
use crate::engine::{ContentQuery, ContentSource};
use crate::metrics::track_upstream_call;
use crate::utils::retry::{retry_async_with_config, RetryConfig};

/// Raw record as served by the content API.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentRecord {
    pub id: String,
    pub question: String,
    /// Either a plain string or an ordered list of filenames, which may
    /// arrive as a real JSON array or as a JSON-encoded string.
    pub answer: serde_json::Value,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub option_urls: Vec<String>,
    pub exercise_type: ExerciseType,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub difficulty_level: Option<u8>,
    #[serde(default)]
    pub question_type: Option<String>,
}

impl ContentRecord {
    pub fn into_item(self, game: Option<GameKind>) -> ExerciseItem {
        let ordered = game == Some(GameKind::Sequencing);
        let answer = match self.answer {
            serde_json::Value::Array(values) => AnswerRepresentation::Ordered(
                values
                    .into_iter()
                    .map(|v| match v {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            serde_json::Value::String(raw) if ordered => {
                AnswerRepresentation::Ordered(decode_ordered_answer(&self.id, &raw))
            }
            serde_json::Value::String(raw) => AnswerRepresentation::Single(raw),
            serde_json::Value::Null => AnswerRepresentation::Single(String::new()),
            other => AnswerRepresentation::Single(other.to_string()),
        };

        ExerciseItem {
            id: self.id,
            prompt: self.question,
            answer,
            options: self.options,
            option_urls: self.option_urls,
            exercise_type: self.exercise_type,
            metadata: ItemMetadata {
                category: self.category,
                difficulty_level: self.difficulty_level,
                question_type: self.question_type,
            },
        }
    }
}

pub struct RestContentClient {
    http_client: Client,
    base_url: String,
    timeout: Duration,
    retry: RetryConfig,
}

impl RestContentClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_once(&self, query: &ContentQuery) -> Result<Vec<ContentRecord>> {
        let url = format!("{}/content", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .query(query)
            .timeout(self.timeout)
            .send()
            .await
            .context("Failed to call content API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!(
                "Content API returned error {}: {}",
                status,
                error_text
            ));
        }

        response
            .json()
            .await
            .context("Failed to parse content API response")
    }
}

#[async_trait]
impl ContentSource for RestContentClient {
    async fn fetch(&self, query: &ContentQuery) -> Result<Vec<ExerciseItem>> {
        let records = retry_async_with_config(self.retry.clone(), || async {
            track_upstream_call("content", "fetch", self.fetch_once(query)).await
        })
        .await?;

        let total = records.len();
        let items: Vec<ExerciseItem> = records
            .into_iter()
            .map(|record| record.into_item(query.game_type))
            .collect();

        tracing::info!(
            "Fetched {} content items for theme {} (difficulty={}, category={})",
            total,
            query.theme_id,
            query.difficulty_level,
            query.category
        );

        Ok(items)
    }
}
