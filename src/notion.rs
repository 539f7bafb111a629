use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use serde_json::Value;

use crate::source::{Block, BlockKind, DocumentSource, PageMeta, Paginated};

pub const DEFAULT_BASE_URL: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";

#[derive(Debug, Clone)]
pub struct NotionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl NotionClient {
    pub fn new(base_url: &str, api_key: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("build notion http client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.to_owned(),
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> anyhow::Result<Value> {
        let response = request
            .bearer_auth(&self.api_key)
            .header("Notion-Version", NOTION_VERSION)
            .header(USER_AGENT, "kbdesk/0.1")
            .send()
            .await
            .with_context(|| format!("{what}: send"))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .with_context(|| format!("{what}: read body"))?;
        if !status.is_success() {
            let message = parse_error_message(&raw).unwrap_or_else(|| raw.clone());
            anyhow::bail!("{what}: notion API error ({status}): {message}");
        }
        serde_json::from_str(&raw).with_context(|| format!("{what}: parse response"))
    }
}

#[async_trait]
impl DocumentSource for NotionClient {
    async fn retrieve_page(&self, id: &str) -> anyhow::Result<PageMeta> {
        let endpoint = format!("{}/pages/{id}", self.base_url);
        let value = self
            .send(self.client.get(&endpoint), &format!("GET {endpoint}"))
            .await?;
        Ok(PageMeta {
            title: page_title(&value),
        })
    }

    async fn list_blocks(
        &self,
        id: &str,
        cursor: Option<&str>,
    ) -> anyhow::Result<Paginated<Block>> {
        let endpoint = format!("{}/blocks/{id}/children", self.base_url);
        let mut request = self.client.get(&endpoint).query(&[("page_size", "100")]);
        if let Some(cursor) = cursor {
            request = request.query(&[("start_cursor", cursor)]);
        }
        let value = self.send(request, &format!("GET {endpoint}")).await?;
        let results = results_array(&value)?
            .iter()
            .filter_map(decode_block)
            .collect();
        Ok(paginated(&value, results))
    }

    async fn query_database(
        &self,
        id: &str,
        cursor: Option<&str>,
    ) -> anyhow::Result<Paginated<String>> {
        let endpoint = format!("{}/databases/{id}/query", self.base_url);
        let mut body = serde_json::json!({ "page_size": 100 });
        if let Some(cursor) = cursor
            && let Some(obj) = body.as_object_mut()
        {
            obj.insert("start_cursor".to_owned(), Value::String(cursor.to_owned()));
        }
        let value = self
            .send(
                self.client.post(&endpoint).json(&body),
                &format!("POST {endpoint}"),
            )
            .await?;
        let results = results_array(&value)?
            .iter()
            .filter_map(|row| row.get("id").and_then(Value::as_str))
            .map(str::to_owned)
            .collect();
        Ok(paginated(&value, results))
    }
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: Value = serde_json::from_str(raw_json).ok()?;
    Some(value.get("message")?.as_str()?.to_owned())
}

fn results_array(value: &Value) -> anyhow::Result<&Vec<Value>> {
    value
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow::anyhow!("missing `results` array in response"))
}

fn paginated<T>(value: &Value, results: Vec<T>) -> Paginated<T> {
    let has_more = value
        .get("has_more")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let next_cursor = value
        .get("next_cursor")
        .and_then(Value::as_str)
        .map(str::to_owned);
    Paginated {
        results,
        has_more,
        next_cursor,
    }
}

fn plain_text(rich_text: Option<&Value>) -> String {
    rich_text
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("plain_text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

fn page_title(page: &Value) -> String {
    let Some(properties) = page.get("properties").and_then(Value::as_object) else {
        return "Untitled".to_owned();
    };
    let title = properties
        .values()
        .filter(|prop| prop.get("type").and_then(Value::as_str) == Some("title"))
        .filter_map(|prop| prop.get("title").and_then(Value::as_array))
        .find_map(|parts| parts.first())
        .and_then(|first| first.get("plain_text").and_then(Value::as_str))
        .unwrap_or("Untitled");
    title.to_owned()
}

fn decode_block(value: &Value) -> Option<Block> {
    let id = value.get("id").and_then(Value::as_str)?.to_owned();
    let block_type = value.get("type").and_then(Value::as_str)?;
    let body = value.get(block_type);
    let text = || plain_text(body.and_then(|b| b.get("rich_text")));

    let kind = match block_type {
        "paragraph" => BlockKind::Paragraph(text()),
        "heading_1" | "heading_2" | "heading_3" => BlockKind::Heading(text()),
        "bulleted_list_item" | "numbered_list_item" => BlockKind::ListItem(text()),
        "callout" => BlockKind::Callout(text()),
        "image" => BlockKind::Image {
            caption: plain_text(body.and_then(|b| b.get("caption"))),
        },
        "table" => BlockKind::Table,
        "table_row" => BlockKind::TableRow {
            cells: body
                .and_then(|b| b.get("cells"))
                .and_then(Value::as_array)
                .map(|cells| cells.iter().map(|cell| plain_text(Some(cell))).collect())
                .unwrap_or_default(),
        },
        "child_page" => BlockKind::ChildPage {
            title: body
                .and_then(|b| b.get("title"))
                .and_then(Value::as_str)
                .unwrap_or("Untitled")
                .to_owned(),
        },
        "child_database" => BlockKind::ChildDatabase,
        other => BlockKind::Unsupported(other.to_owned()),
    };
    Some(Block { id, kind })
}
