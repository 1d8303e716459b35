//! Notion Record Store
//!
//! Implements RecordStore over the Notion database HTTP API.
//! Pages are decoded into `StoreRecord` through the store's `StoreSchema`;
//! a property of the wrong type or missing altogether decodes to the
//! empty value.

use crate::config::StoreSchema;
use crate::domain::entities::{DateRange, FieldPatch, PatchOp, StoreRecord};
use crate::domain::ports::{EqualityFilter, RecordStore};
use crate::domain::value_objects::{BusinessKey, RecordId};
use crate::error::{RelayError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

const NOTION_VERSION: &str = "2022-06-28";

/// One page of a database query.
#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    object: String,
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Connection settings for one database.
#[derive(Debug, Clone)]
pub struct NotionConfig {
    /// API root, e.g. `https://api.notion.com`.
    pub base_url: String,
    pub token: String,
    pub database_id: String,
    pub schema: StoreSchema,
}

pub struct NotionRecordStore {
    name: String,
    config: NotionConfig,
    client: reqwest::Client,
}

impl NotionRecordStore {
    pub fn new(name: impl Into<String>, config: NotionConfig) -> Self {
        Self::with_client(name, config, reqwest::Client::new())
    }

    /// Share one connection pool between stores.
    pub fn with_client(
        name: impl Into<String>,
        config: NotionConfig,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// `{"property": name, "<type>": {"equals": value}}`
    fn filter_json(&self, filter: &EqualityFilter) -> Value {
        let schema = &self.config.schema;
        let (property, kind, value) = match filter {
            EqualityFilter::BusinessKey(key) => (
                &schema.key_property,
                schema.key_kind.as_str(),
                json!(key.as_str()),
            ),
            EqualityFilter::SyncFlag(flag) => (&schema.flag_property, "checkbox", json!(flag)),
        };

        let mut rendered = Map::new();
        rendered.insert("property".to_string(), json!(property));
        rendered.insert(kind.to_string(), json!({ "equals": value }));
        Value::Object(rendered)
    }

    /// Render a patch as a `properties` map. `Keep` fields are omitted and
    /// `Clear` fields are written as explicit nulls.
    fn properties_json(&self, patch: &FieldPatch) -> Map<String, Value> {
        let schema = &self.config.schema;
        let mut props = Map::new();

        match &patch.quantity {
            PatchOp::Keep => {}
            PatchOp::Set(q) => {
                props.insert(schema.quantity_property.clone(), json!({ "number": q }));
            }
            PatchOp::Clear => {
                props.insert(schema.quantity_property.clone(), json!({ "number": null }));
            }
        }

        match &patch.request_date {
            PatchOp::Keep => {}
            PatchOp::Set(date) => {
                props.insert(
                    schema.request_date_property.clone(),
                    json!({ "date": date }),
                );
            }
            PatchOp::Clear => {
                props.insert(
                    schema.request_date_property.clone(),
                    json!({ "date": null }),
                );
            }
        }

        match &patch.sync_flag {
            PatchOp::Keep => {}
            PatchOp::Set(flag) => {
                props.insert(schema.flag_property.clone(), json!({ "checkbox": flag }));
            }
            // Checkboxes have no null state.
            PatchOp::Clear => {
                props.insert(schema.flag_property.clone(), json!({ "checkbox": false }));
            }
        }

        props
    }

    /// Decode one page object into a typed record.
    fn decode(&self, page: &Value) -> StoreRecord {
        let schema = &self.config.schema;
        let props = &page["properties"];

        let key_text = plain_text(&props[&schema.key_property][schema.key_kind.as_str()]);
        let quantity = props[&schema.quantity_property]["number"].as_f64();
        let request_date =
            serde_json::from_value::<DateRange>(props[&schema.request_date_property]["date"].clone())
                .ok();
        let sync_flag = props[&schema.flag_property]["checkbox"]
            .as_bool()
            .unwrap_or(false);

        StoreRecord {
            id: RecordId::new(page["id"].as_str().unwrap_or_default()),
            business_key: BusinessKey::parse(&key_text),
            sync_flag,
            quantity,
            request_date,
        }
    }

    async fn query_page(&self, body: &Value) -> Result<QueryResponse> {
        let url = self.url(&format!("/v1/databases/{}/query", self.config.database_id));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| RelayError::query(&self.name, e.to_string()))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let page: QueryResponse = serde_json::from_str(&text).map_err(|_| {
            RelayError::query(&self.name, format!("HTTP {}: {}", status.as_u16(), text))
        })?;

        if !status.is_success() || page.object == "error" {
            let message = page
                .message
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(RelayError::query(&self.name, message));
        }

        Ok(page)
    }
}

/// Concatenate the `plain_text` of every rich-text segment.
fn plain_text(segments: &Value) -> String {
    segments
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|s| s["plain_text"].as_str())
                .collect::<String>()
        })
        .unwrap_or_default()
}

#[async_trait]
impl RecordStore for NotionRecordStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(&self, filter: &EqualityFilter) -> Result<Vec<StoreRecord>> {
        let mut body = json!({ "filter": self.filter_json(filter) });
        let mut records = Vec::new();

        loop {
            let page = self.query_page(&body).await?;
            records.extend(page.results.iter().map(|p| self.decode(p)));

            match page.next_cursor {
                Some(cursor) if page.has_more => body["start_cursor"] = json!(cursor),
                _ => break,
            }
        }

        tracing::debug!(
            store = %self.name,
            field = ?filter.field(),
            "query returned {} records",
            records.len()
        );
        Ok(records)
    }

    async fn update(&self, id: &RecordId, patch: &FieldPatch) -> bool {
        if patch.is_empty() {
            return true;
        }

        let url = self.url(&format!("/v1/pages/{}", id));
        let body = json!({ "properties": self.properties_json(patch) });

        let response = match self
            .client
            .patch(&url)
            .bearer_auth(&self.config.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(store = %self.name, record_id = %id, "update failed: {}", e);
                return false;
            }
        };

        let status = response.status();
        let payload: Option<Value> = response.json().await.ok();
        let is_error_object = payload
            .as_ref()
            .map_or(true, |p| p["object"].as_str() == Some("error"));

        if !status.is_success() || is_error_object {
            tracing::warn!(
                store = %self.name,
                record_id = %id,
                status = status.as_u16(),
                "update rejected: {}",
                payload
                    .as_ref()
                    .and_then(|p| p["message"].as_str())
                    .unwrap_or("malformed response")
            );
            return false;
        }

        true
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer, schema: StoreSchema) -> NotionRecordStore {
        NotionRecordStore::new(
            "requests",
            NotionConfig {
                base_url: server.uri(),
                token: "secret_abc".to_string(),
                database_id: "db-a".to_string(),
                schema,
            },
        )
    }

    fn request_page(id: &str, key: &str, flag: bool) -> Value {
        json!({
            "object": "page",
            "id": id,
            "properties": {
                "Tool Number": { "type": "title", "title": [
                    { "plain_text": key }
                ]},
                "Quantity": { "type": "number", "number": 5 },
                "Request Date": { "type": "date", "date": {
                    "start": "2024-01-01", "end": null, "time_zone": null
                }},
                "Sync Flag": { "type": "checkbox", "checkbox": flag }
            }
        })
    }

    #[tokio::test]
    async fn test_query_flagged_decodes_records() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/databases/db-a/query"))
            .and(header("Notion-Version", NOTION_VERSION))
            .and(header("Authorization", "Bearer secret_abc"))
            .and(body_json(json!({
                "filter": { "property": "Sync Flag", "checkbox": { "equals": true } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "results": [request_page("a1", "X1", true)],
                "has_more": false,
                "next_cursor": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        let records = store(&server, StoreSchema::source_default())
            .query(&EqualityFilter::SyncFlag(true))
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.id.as_str(), "a1");
        assert_eq!(r.business_key.as_ref().unwrap().as_str(), "X1");
        assert!(r.sync_flag);
        assert_eq!(r.quantity, Some(5.0));
        assert_eq!(r.request_date, Some(DateRange::starting("2024-01-01")));
    }

    #[tokio::test]
    async fn test_query_by_rich_text_key() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/databases/db-a/query"))
            .and(body_partial_json(json!({
                "filter": { "property": "Part Number", "rich_text": { "equals": "X1" } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "results": [{
                    "object": "page",
                    "id": "b1",
                    "properties": {
                        "Part Number": { "type": "rich_text", "rich_text": [
                            { "plain_text": "X" }, { "plain_text": "1" }
                        ]}
                    }
                }],
                "has_more": false
            })))
            .expect(1)
            .mount(&server)
            .await;

        let key = BusinessKey::parse("X1").unwrap();
        let records = store(&server, StoreSchema::target_default())
            .query(&EqualityFilter::BusinessKey(key.clone()))
            .await
            .unwrap();

        assert_eq!(records[0].business_key, Some(key));
        assert_eq!(records[0].quantity, None);
        assert_eq!(records[0].request_date, None);
        assert!(!records[0].sync_flag);
    }

    #[tokio::test]
    async fn test_query_follows_cursor() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/databases/db-a/query"))
            .and(body_partial_json(json!({ "start_cursor": "page-2" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "results": [request_page("a2", "X2", true)],
                "has_more": false,
                "next_cursor": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/databases/db-a/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "results": [request_page("a1", "X1", true)],
                "has_more": true,
                "next_cursor": "page-2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let records = store(&server, StoreSchema::source_default())
            .query(&EqualityFilter::SyncFlag(true))
            .await
            .unwrap();

        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a2"]);
    }

    #[tokio::test]
    async fn test_query_error_object_is_raised() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/databases/db-a/query"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "object": "error",
                "status": 401,
                "code": "unauthorized",
                "message": "API token is invalid."
            })))
            .mount(&server)
            .await;

        let err = store(&server, StoreSchema::source_default())
            .query(&EqualityFilter::SyncFlag(true))
            .await
            .unwrap_err();

        match err {
            RelayError::Query { store, message } => {
                assert_eq!(store, "requests");
                assert_eq!(message, "API token is invalid.");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_query_unreachable_is_raised() {
        let store = NotionRecordStore::new(
            "requests",
            NotionConfig {
                base_url: "http://127.0.0.1:1".to_string(),
                token: "t".to_string(),
                database_id: "db-a".to_string(),
                schema: StoreSchema::source_default(),
            },
        );
        let result = store.query(&EqualityFilter::SyncFlag(true)).await;
        assert!(matches!(result, Err(RelayError::Query { .. })));
    }

    #[tokio::test]
    async fn test_update_propagate_writes_only_present_fields() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/v1/pages/b1"))
            .and(body_json(json!({
                "properties": {
                    "Request Date": { "date": { "start": "2024-01-01", "end": null } }
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "page", "id": "b1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let patch = FieldPatch::propagate(None, Some(DateRange::starting("2024-01-01")));
        let ok = store(&server, StoreSchema::target_default())
            .update(&RecordId::new("b1"), &patch)
            .await;

        assert!(ok);
    }

    #[tokio::test]
    async fn test_update_clear_writes_explicit_nulls() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/v1/pages/a1"))
            .and(body_json(json!({
                "properties": {
                    "Quantity": { "number": null },
                    "Request Date": { "date": null }
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "page", "id": "a1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ok = store(&server, StoreSchema::source_default())
            .update(&RecordId::new("a1"), &FieldPatch::clear_payload())
            .await;

        assert!(ok);
    }

    #[tokio::test]
    async fn test_update_reset_flag() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/v1/pages/a1"))
            .and(body_json(json!({
                "properties": { "Sync Flag": { "checkbox": false } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "page", "id": "a1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        assert!(
            store(&server, StoreSchema::source_default())
                .update(&RecordId::new("a1"), &FieldPatch::reset_flag())
                .await
        );
    }

    #[tokio::test]
    async fn test_update_server_error_is_false() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/v1/pages/b1"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .expect(1)
            .mount(&server)
            .await;

        let ok = store(&server, StoreSchema::target_default())
            .update(&RecordId::new("b1"), &FieldPatch::clear_payload())
            .await;

        assert!(!ok);
    }

    #[tokio::test]
    async fn test_update_error_object_with_200_is_false() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/v1/pages/b1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "error", "message": "conflict"
            })))
            .mount(&server)
            .await;

        let ok = store(&server, StoreSchema::target_default())
            .update(&RecordId::new("b1"), &FieldPatch::clear_payload())
            .await;

        assert!(!ok);
    }

    #[tokio::test]
    async fn test_empty_patch_sends_nothing() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let ok = store(&server, StoreSchema::target_default())
            .update(&RecordId::new("b1"), &FieldPatch::default())
            .await;

        assert!(ok);
    }

    #[test]
    fn test_wrong_property_type_decodes_empty() {
        let store = NotionRecordStore::new(
            "requests",
            NotionConfig {
                base_url: "http://localhost".to_string(),
                token: String::new(),
                database_id: "db".to_string(),
                schema: StoreSchema::source_default(),
            },
        );
        let page = json!({
            "id": "a1",
            "properties": {
                "Tool Number": { "type": "rich_text", "rich_text": [{ "plain_text": "X1" }] },
                "Quantity": { "type": "rich_text", "rich_text": [] },
                "Request Date": { "type": "date", "date": null },
                "Sync Flag": { "type": "formula", "formula": { "boolean": true } }
            }
        });

        let record = store.decode(&page);

        assert_eq!(record.business_key, None);
        assert_eq!(record.quantity, None);
        assert_eq!(record.request_date, None);
        assert!(!record.sync_flag);
    }

    #[test]
    fn test_key_whitespace_reaches_filter_unchanged() {
        let store = NotionRecordStore::new(
            "requests",
            NotionConfig {
                base_url: "http://localhost".to_string(),
                token: String::new(),
                database_id: "db".to_string(),
                schema: StoreSchema::source_default(),
            },
        );
        let page = request_page("a1", "X1 ", true);

        let record = store.decode(&page);
        let key = record.business_key.unwrap();
        let filter = store.filter_json(&EqualityFilter::BusinessKey(key));

        assert_eq!(
            filter,
            json!({ "property": "Tool Number", "title": { "equals": "X1 " } })
        );
    }
}
