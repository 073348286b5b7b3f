use crate::traits::BlockStore;
use crate::{ContentBlock, StoreError};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

pub const NOTION_API_BASE: &str = "https://api.notion.com/v1/";
pub const NOTION_VERSION: &str = "2022-06-28";
pub const MAX_BLOCKS_PER_REQUEST: usize = 100;
pub const MAX_RICH_TEXT_CHARS: usize = 2_000;
const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(500);
const BACKEND: &str = "notion";

/// Database columns the PDF sync reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyNames {
    pub uid: String,
    pub file_id: String,
    pub link: String,
}

impl Default for PropertyNames {
    fn default() -> Self {
        Self {
            uid: "UID".to_string(),
            file_id: "Drive File ID".to_string(),
            link: "PDF (Drive)".to_string(),
        }
    }
}

pub struct NotionStore {
    client: Arc<Client>,
    endpoint: Url,
    token: String,
    properties: PropertyNames,
    batch_delay: Duration,
}

impl NotionStore {
    pub fn new(token: impl Into<String>) -> Result<Self, StoreError> {
        Self::with_endpoint(NOTION_API_BASE, token)
    }

    pub fn with_endpoint(endpoint: &str, token: impl Into<String>) -> Result<Self, StoreError> {
        let endpoint = if endpoint.ends_with('/') {
            Url::parse(endpoint)?
        } else {
            Url::parse(&format!("{endpoint}/"))?
        };

        Ok(Self {
            client: Arc::new(Client::new()),
            endpoint,
            token: token.into(),
            properties: PropertyNames::default(),
            batch_delay: DEFAULT_BATCH_DELAY,
        })
    }

    pub fn with_properties(mut self, properties: PropertyNames) -> Self {
        self.properties = properties;
        self
    }

    /// Pause between consecutive append batches of one page.
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn url(&self, path: &str) -> Result<Url, StoreError> {
        Ok(self.endpoint.join(path)?)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
    }
}

#[async_trait]
impl BlockStore for NotionStore {
    async fn append_blocks(
        &self,
        page_id: &str,
        blocks: &[ContentBlock],
    ) -> Result<(), StoreError> {
        let url = self.url(&format!("blocks/{page_id}/children"))?;
        let total = blocks.len();

        for (index, batch) in blocks.chunks(MAX_BLOCKS_PER_REQUEST).enumerate() {
            if index > 0 && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }

            let children = batch.iter().map(block_json).collect::<Vec<_>>();
            let response = self
                .request(Method::PATCH, url.clone())
                .json(&json!({ "children": children }))
                .send()
                .await?;
            ensure_success(response, "append blocks").await?;

            let start = index * MAX_BLOCKS_PER_REQUEST;
            debug!(page_id, from = start + 1, to = start + batch.len(), total, "blocks appended");
        }

        info!(page_id, total, "page content appended");
        Ok(())
    }

    async fn update_pdf_fields(
        &self,
        page_id: &str,
        file_id: &str,
        link: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut properties = serde_json::Map::new();
        properties.insert(
            self.properties.file_id.clone(),
            json!({ "rich_text": rich_text(file_id) }),
        );
        if let Some(link) = link.filter(|link| !link.is_empty()) {
            properties.insert(self.properties.link.clone(), json!({ "url": link }));
        }

        let response = self
            .request(Method::PATCH, self.url(&format!("pages/{page_id}"))?)
            .json(&json!({ "properties": properties }))
            .send()
            .await?;
        ensure_success(response, "update pdf fields").await?;

        debug!(page_id, file_id, "pdf fields updated");
        Ok(())
    }

    async fn find_page_by_uid(
        &self,
        database_id: &str,
        uid: &str,
    ) -> Result<Option<String>, StoreError> {
        let response = self
            .request(
                Method::POST,
                self.url(&format!("databases/{database_id}/query"))?,
            )
            .json(&json!({
                "filter": {
                    "property": self.properties.uid,
                    "rich_text": { "equals": uid }
                },
                "page_size": 1
            }))
            .send()
            .await?;
        let body: Value = ensure_success(response, "query by uid").await?.json().await?;

        Ok(body
            .get("results")
            .and_then(Value::as_array)
            .and_then(|results| results.first())
            .and_then(|page| page.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}

async fn ensure_success(response: Response, operation: &str) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(StoreError::BackendResponse {
        backend: BACKEND.to_string(),
        details: format!("{operation} failed with {status}: {body}"),
    })
}

/// Request body for one block, in the store's rich-text shape.
pub fn block_json(block: &ContentBlock) -> Value {
    match block {
        ContentBlock::Embed { url } => json!({
            "object": "block",
            "type": "embed",
            "embed": { "url": url }
        }),
        ContentBlock::Divider => json!({
            "object": "block",
            "type": "divider",
            "divider": {}
        }),
        ContentBlock::Heading { text, .. } | ContentBlock::Paragraph { text } => {
            let kind = block.type_name();
            json!({
                "object": "block",
                "type": kind,
                kind: { "rich_text": rich_text(text) }
            })
        }
        ContentBlock::Code { text, language } => json!({
            "object": "block",
            "type": "code",
            "code": {
                "rich_text": rich_text(text),
                "language": code_language(language)
            }
        }),
    }
}

/// Text runs capped at [`MAX_RICH_TEXT_CHARS`] each.
pub fn rich_text(text: &str) -> Vec<Value> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![text_run("")];
    }

    chars
        .chunks(MAX_RICH_TEXT_CHARS)
        .map(|piece| text_run(&piece.iter().collect::<String>()))
        .collect()
}

fn text_run(content: &str) -> Value {
    json!({ "type": "text", "text": { "content": content } })
}

fn code_language(language: &str) -> &str {
    match language {
        "" | "text" => "plain text",
        other => other,
    }
}
