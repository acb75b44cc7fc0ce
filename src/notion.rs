//! Notion block JSON and page publishing.
//!
//! ## Block JSON
//!
//! [`encode_block`] maps each [`Block`] variant onto the Notion API's block
//! object (`heading_N`, `bulleted_list_item`, `numbered_list_item`, `code`,
//! `paragraph`, `table`/`table_row`). [`decode_blocks`] goes the other way
//! for the structured synthesis path; it is lenient, because the JSON comes
//! from a language model:
//!
//! - unknown block types are skipped with a warning;
//! - table children that are not `table_row` are kept as
//!   [`TableChild::Foreign`] for the validator to drop;
//! - rich text is read from `plain_text` or `text.content`.
//!
//! ## Publishing
//!
//! [`NotionPublisher`] creates a page under a parent page, a database (title
//! property `Name`) or the workspace. Notion accepts at most
//! [`MAX_BLOCKS_PER_REQUEST`] children per call, so the first chunk goes with
//! the create call and the rest are appended afterwards.

use crate::error::PublishError;
use crate::model::{Block, HeadingLevel, RichText, TableBlock, TableChild, TableRow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Notion API version header value.
pub const NOTION_VERSION: &str = "2022-06-28";

/// Default API base.
pub const NOTION_API_BASE: &str = "https://api.notion.com/v1";

/// Maximum children per create/append request.
pub const MAX_BLOCKS_PER_REQUEST: usize = 100;

/// Maximum characters in one rich-text run.
pub const MAX_RICH_TEXT_CHARS: usize = 2000;

// ── Encoding ─────────────────────────────────────────────────────────────

/// Rich-text runs for `text`, split every [`MAX_RICH_TEXT_CHARS`] characters.
pub fn rich_text(text: &str, bold: bool) -> Vec<Value> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(MAX_RICH_TEXT_CHARS)
        .map(|chunk| {
            let content: String = chunk.iter().collect();
            let mut run = json!({"type": "text", "text": {"content": content}});
            if bold {
                run["annotations"] = json!({"bold": true});
            }
            run
        })
        .collect()
}

fn text_block(kind: &str, text: &str, bold: bool) -> Value {
    let mut block = json!({"object": "block", "type": kind});
    block[kind] = json!({"rich_text": rich_text(text, bold)});
    block
}

/// Notion JSON for one block.
pub fn encode_block(block: &Block) -> Value {
    match block {
        Block::Heading { level, text } => {
            text_block(&format!("heading_{}", level.get()), text, false)
        }
        Block::BulletItem { text } => text_block("bulleted_list_item", text, false),
        Block::NumberedItem { text } => text_block("numbered_list_item", text, false),
        Block::CodeLine { text } => json!({
            "object": "block",
            "type": "code",
            "code": {"rich_text": rich_text(text, false), "language": "plain text"}
        }),
        Block::BoldParagraph { text } => text_block("paragraph", text, true),
        Block::Paragraph { text } => text_block("paragraph", text, false),
        Block::Table(table) => encode_table(table),
    }
}

fn encode_table(table: &TableBlock) -> Value {
    let rows: Vec<Value> = table
        .table_rows()
        .map(|row| {
            let cells: Vec<Value> = row
                .cells
                .iter()
                .map(|cell| Value::Array(rich_text(cell.as_str(), false)))
                .collect();
            json!({"object": "block", "type": "table_row", "table_row": {"cells": cells}})
        })
        .collect();

    json!({
        "object": "block",
        "type": "table",
        "table": {
            "table_width": table.width,
            "has_column_header": table.has_column_header,
            "has_row_header": table.has_row_header,
            "children": rows
        }
    })
}

pub fn encode_blocks(blocks: &[Block]) -> Vec<Value> {
    blocks.iter().map(encode_block).collect()
}

// ── Decoding ─────────────────────────────────────────────────────────────

/// Errors decoding Notion block JSON.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON array of blocks, got {0}")]
    NotAnArray(&'static str),
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Decode a JSON array of Notion blocks into candidate [`Block`]s.
pub fn decode_blocks(json: &str) -> Result<Vec<Block>, DecodeError> {
    let value: Value = serde_json::from_str(json)?;
    let items = match &value {
        Value::Array(items) => items,
        other => return Err(DecodeError::NotAnArray(json_kind(other))),
    };

    let mut blocks = Vec::with_capacity(items.len());
    for item in items {
        match decode_block(item) {
            Some(block) => blocks.push(block),
            None => {
                let kind = item.get("type").and_then(serde_json::Value::as_str);
                warn!("Skipping unsupported block type {:?}", kind.unwrap_or("<missing>"));
            }
        }
    }
    Ok(blocks)
}

/// Concatenated plain text of a rich-text array.
fn plain_text(runs: Option<&Value>) -> String {
    runs.and_then(Value::as_array)
        .map(|runs| {
            runs.iter()
                .filter_map(|run| {
                    run.get("plain_text")
                        .or_else(|| run.get("text").and_then(|t| t.get("content")))
                        .and_then(Value::as_str)
                })
                .collect()
        })
        .unwrap_or_default()
}

fn any_bold(runs: Option<&Value>) -> bool {
    runs.and_then(Value::as_array).is_some_and(|runs| {
        runs.iter().any(|run| {
            run.pointer("/annotations/bold")
                .and_then(Value::as_bool)
                .unwrap_or(false)
        })
    })
}

/// Decode one block object; `None` for unsupported types.
pub fn decode_block(value: &Value) -> Option<Block> {
    let kind = value.get("type")?.as_str()?;
    let body = value.get(kind);
    let runs = body.and_then(|b| b.get("rich_text"));

    let block = match kind {
        "heading_1" | "heading_2" | "heading_3" => {
            let level = kind[kind.len() - 1..].parse::<u8>().ok()?;
            Block::Heading {
                level: HeadingLevel::try_from(level).ok()?,
                text: plain_text(runs),
            }
        }
        "bulleted_list_item" => Block::BulletItem {
            text: plain_text(runs),
        },
        "numbered_list_item" => Block::NumberedItem {
            text: plain_text(runs),
        },
        "code" => Block::CodeLine {
            text: plain_text(runs),
        },
        "paragraph" if any_bold(runs) => Block::BoldParagraph {
            text: plain_text(runs),
        },
        "paragraph" => Block::Paragraph {
            text: plain_text(runs),
        },
        "table" => Block::Table(decode_table(value, body?)),
        _ => return None,
    };
    Some(block)
}

fn decode_table(value: &Value, body: &Value) -> TableBlock {
    let flag = |name: &str| body.get(name).and_then(Value::as_bool).unwrap_or(false);
    let children = body
        .get("children")
        .or_else(|| value.get("children"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    TableBlock {
        width: body
            .get("table_width")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize,
        has_column_header: flag("has_column_header"),
        has_row_header: flag("has_row_header"),
        rows: children.iter().map(decode_table_child).collect(),
    }
}

fn decode_table_child(child: &Value) -> TableChild {
    let kind = child.get("type").and_then(Value::as_str).unwrap_or("unknown");
    if kind != "table_row" {
        return TableChild::Foreign {
            kind: kind.to_string(),
        };
    }
    let cells = child
        .pointer("/table_row/cells")
        .and_then(Value::as_array)
        .map(|cells| {
            cells
                .iter()
                .map(|cell| RichText::new(plain_text(Some(cell))))
                .collect()
        })
        .unwrap_or_default();
    TableChild::Row(TableRow { cells })
}

// ── Publishing ───────────────────────────────────────────────────────────

/// Where a published page lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Parent {
    Page(String),
    Database(String),
    Workspace,
}

impl Parent {
    fn to_json(&self) -> Value {
        match self {
            Parent::Page(id) => json!({"type": "page_id", "page_id": id}),
            Parent::Database(id) => json!({"type": "database_id", "database_id": id}),
            Parent::Workspace => json!({"type": "workspace", "workspace": true}),
        }
    }
}

/// A page to publish.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub title: String,
    pub blocks: Vec<Block>,
    pub parent: Parent,
}

/// The created page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedPage {
    pub id: String,
    pub url: String,
}

/// Publishing target for validated blocks.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishedPage, PublishError>;
}

/// Public URL for a page id when the API does not return one.
pub fn fallback_page_url(id: &str) -> String {
    format!("https://notion.so/{}", id.replace('-', ""))
}

/// Body of `POST /pages`.
pub fn create_page_payload(title: &str, parent: &Parent, children: &[Value]) -> Value {
    let title_runs = json!([{"text": {"content": title}}]);
    let properties = match parent {
        Parent::Database(_) => json!({"Name": {"title": title_runs}}),
        Parent::Page(_) | Parent::Workspace => json!({"title": title_runs}),
    };
    json!({
        "parent": parent.to_json(),
        "properties": properties,
        "children": children
    })
}

#[derive(Debug, Deserialize)]
struct CreatedPage {
    id: String,
    url: Option<String>,
}

/// [`Publisher`] for the Notion REST API.
#[derive(Debug, Clone)]
pub struct NotionPublisher {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl NotionPublisher {
    pub fn new(token: impl Into<String>, timeout_secs: u64) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            token: token.into(),
            base_url: NOTION_API_BASE.to_string(),
        })
    }

    /// Point at another API base (e.g. a local mock).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
    }

    async fn send(&self, builder: reqwest::RequestBuilder, body: &Value) -> Result<String, PublishError> {
        let response = builder.json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl Publisher for NotionPublisher {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishedPage, PublishError> {
        if self.token.trim().is_empty() {
            return Err(PublishError::MissingToken);
        }

        let encoded = encode_blocks(&request.blocks);
        let mut chunks = encoded.chunks(MAX_BLOCKS_PER_REQUEST);
        let first = chunks.next().unwrap_or(&[]);

        let payload = create_page_payload(&request.title, &request.parent, first);
        let body = self
            .send(self.request(reqwest::Method::POST, "/pages"), &payload)
            .await?;
        let created: CreatedPage = serde_json::from_str(&body)
            .map_err(|e| PublishError::InvalidResponse(format!("{e}: {body}")))?;

        let mut appended = 0;
        for chunk in chunks {
            let path = format!("/blocks/{}/children", created.id);
            self.send(
                self.request(reqwest::Method::PATCH, &path),
                &json!({"children": chunk}),
            )
            .await?;
            appended += chunk.len();
            debug!("Appended {} blocks to {}", chunk.len(), created.id);
        }

        let url = created
            .url
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| fallback_page_url(&created.id));
        info!(
            "Published '{}' ({} blocks, {} appended) → {}",
            request.title,
            encoded.len(),
            appended,
            url
        );

        Ok(PublishedPage {
            id: created.id,
            url,
        })
    }
}
