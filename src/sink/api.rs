//! Remote story API sink
//!
//! Talks to a small JSON API:
//! - `POST /api/stories/check` with `{name}` returns `{exists, storyId, chapters}`
//! - `POST /api/stories/create` with `{name, cover, description}` returns `{storyId}` or `{id}`
//! - `POST /api/stories/add-chapter` with `{storyId, chapter, images}`
//!
//! Chapters the API already lists are not sent again. Any non-2xx status
//! is a failure.

use crate::model::StoryRecord;
use crate::sink::{Sink, SinkError, SinkResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

/// Sink that publishes records to the story API
pub struct ApiSink {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

#[derive(Debug, Serialize)]
struct CheckRequest<'a> {
    name: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct CheckResponse {
    #[serde(default)]
    exists: bool,
    #[serde(default, rename = "storyId")]
    story_id: Option<Value>,
    #[serde(default)]
    chapters: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct CreateRequest<'a> {
    name: &'a str,
    cover: Option<&'a str>,
    description: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
struct CreateResponse {
    #[serde(default, rename = "storyId")]
    story_id: Option<Value>,
    #[serde(default)]
    id: Option<Value>,
}

#[derive(Debug, Serialize)]
struct AddChapterRequest<'a> {
    #[serde(rename = "storyId")]
    story_id: &'a Value,
    chapter: &'a str,
    images: &'a [String],
}

impl ApiSink {
    /// Creates a sink for `endpoint`, authenticating with `token` if given
    pub fn new(
        endpoint: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token,
        })
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> SinkResult<R>
    where
        B: Serialize + ?Sized + Sync,
        R: for<'de> Deserialize<'de> + Default,
    {
        let url = format!("{}{}", self.endpoint, path);
        let mut request = self.client.post(&url).json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Rejected {
                endpoint: url,
                status: status.as_u16(),
            });
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(R::default());
        }
        serde_json::from_str(&text)
            .map_err(|e| SinkError::Protocol(format!("{}: {}", url, e)))
    }

    /// Finds the remote story id, creating the story if the API lacks it
    async fn ensure_story(&self, name: &str, record: &StoryRecord) -> SinkResult<(Value, HashSet<String>)> {
        let check: CheckResponse = self.post("/api/stories/check", &CheckRequest { name }).await?;

        if check.exists {
            let story_id = check
                .story_id
                .filter(|v| !v.is_null())
                .ok_or_else(|| SinkError::Protocol(format!("check for '{}' returned no storyId", name)))?;
            let existing = check
                .chapters
                .iter()
                .filter_map(|c| c.as_str().map(str::to_string))
                .collect();
            return Ok((story_id, existing));
        }

        tracing::info!("Creating story '{}' on the API", name);
        let created: CreateResponse = self
            .post(
                "/api/stories/create",
                &CreateRequest {
                    name,
                    cover: record.thumbnail_url.as_deref(),
                    description: record.description.as_deref(),
                },
            )
            .await?;

        let story_id = created
            .story_id
            .or(created.id)
            .filter(|v| !v.is_null())
            .ok_or_else(|| SinkError::Protocol(format!("create for '{}' returned no id", name)))?;
        Ok((story_id, HashSet::new()))
    }
}

#[async_trait]
impl Sink for ApiSink {
    fn name(&self) -> &'static str {
        "api"
    }

    async fn persist(&self, record: &StoryRecord) -> SinkResult<()> {
        record.validate()?;

        let name = record.title.as_deref().unwrap_or(&record.id);
        let (story_id, existing) = self.ensure_story(name, record).await?;

        for chapter in &record.chapters {
            if existing.contains(&chapter.display_name) {
                tracing::debug!("'{}' already has {}", name, chapter.display_name);
                continue;
            }

            let _: Value = self
                .post(
                    "/api/stories/add-chapter",
                    &AddChapterRequest {
                        story_id: &story_id,
                        chapter: &chapter.display_name,
                        images: &chapter.images,
                    },
                )
                .await?;
            tracing::debug!("Published {} of '{}'", chapter.display_name, name);
        }

        Ok(())
    }
}
