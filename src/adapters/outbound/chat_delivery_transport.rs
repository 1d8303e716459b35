//! Chat Delivery Transport
//!
//! Implements DeliveryTransport against the chat integration endpoint:
//! `POST {base_url}/send/{channel_id}` with a multipart body holding a
//! `text` field and one `files` part.
//!
//! The multipart body is assembled by hand so the file part carries both
//! `filename` and an RFC 5987 `filename*`, which keeps non-ASCII report
//! names intact on the receiving side.

use crate::domain::entities::DeliveryArtifact;
use crate::domain::ports::{DeliveryTransport, TransportResponse};
use crate::domain::value_objects::IdempotencyKey;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

const FALLBACK_FILE_NAME: &str = "file.html";

/// Endpoint settings.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Integration API root, e.g. `https://chat.example.com/api/integrations`.
    pub base_url: String,
    pub api_key: String,
    pub channel_id: String,
    /// Text posted alongside the file.
    pub message: String,
    pub timeout: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            channel_id: String::new(),
            message: "Inspection report".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

pub struct ChatDeliveryTransport {
    config: ChatConfig,
    client: reqwest::Client,
}

impl ChatDeliveryTransport {
    pub fn new(config: ChatConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, client })
    }

    fn url(&self) -> String {
        format!(
            "{}/send/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.channel_id
        )
    }
}

/// A `multipart/form-data` body and its boundary.
#[derive(Debug)]
pub struct MultipartBody {
    pub boundary: String,
    pub bytes: Vec<u8>,
}

impl MultipartBody {
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }
}

/// Build the `text` + `files` body for one artifact.
pub fn build_multipart(message: &str, artifact: &DeliveryArtifact) -> MultipartBody {
    let boundary = format!("----relay{}", Uuid::new_v4().simple());
    let name = if artifact.name.is_empty() {
        FALLBACK_FILE_NAME
    } else {
        artifact.name.as_str()
    };

    let mut bytes = Vec::with_capacity(artifact.content.len() + 512);
    bytes.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    bytes.extend_from_slice(b"Content-Disposition: form-data; name=\"text\"\r\n\r\n");
    bytes.extend_from_slice(message.as_bytes());
    bytes.extend_from_slice(b"\r\n");

    bytes.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    bytes.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"files\"; filename=\"{}\"; filename*=utf-8''{}\r\n",
            quoted(name),
            percent_encode(name)
        )
        .as_bytes(),
    );
    bytes.extend_from_slice(b"Content-Type: text/html\r\n\r\n");
    bytes.extend_from_slice(&artifact.content);
    bytes.extend_from_slice(b"\r\n");
    bytes.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

    MultipartBody { boundary, bytes }
}

/// Make a name safe inside a quoted header parameter.
///
/// This alters the name: `"` becomes `'` and CR/LF are dropped. The exact
/// name still travels in the `filename*` parameter.
fn quoted(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '\r' && *c != '\n')
        .map(|c| if c == '"' { '\'' } else { c })
        .collect()
}

/// RFC 5987 `value-chars`: attr-chars pass through, every other UTF-8 byte
/// is `%XX` encoded.
fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len() * 3);
    for byte in value.bytes() {
        let c = byte as char;
        if c.is_ascii_alphanumeric() || "!#$&+-.^_`|~".contains(c) {
            out.push(c);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

#[async_trait]
impl DeliveryTransport for ChatDeliveryTransport {
    async fn send(
        &self,
        artifact: &DeliveryArtifact,
        idempotency_key: &IdempotencyKey,
    ) -> Result<TransportResponse> {
        let body = build_multipart(&self.config.message, artifact);

        let response = self
            .client
            .post(self.url())
            .bearer_auth(&self.config.api_key)
            .header("Idempotency-Key", idempotency_key.as_str())
            .header(reqwest::header::CONTENT_TYPE, body.content_type())
            .body(body.bytes)
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        Ok(TransportResponse::new(status, text))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::error::RelayError;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(base_url: String) -> ChatDeliveryTransport {
        ChatDeliveryTransport::new(ChatConfig {
            base_url,
            api_key: "key-123".to_string(),
            channel_id: "42".to_string(),
            timeout: Duration::from_secs(5),
            ..ChatConfig::default()
        })
        .unwrap()
    }

    fn key() -> IdempotencyKey {
        DeliveryArtifact::new("r.html", b"abc".to_vec())
            .digest()
            .idempotency_key("relay")
    }

    #[test]
    fn test_percent_encode() {
        assert_eq!(percent_encode("r.html"), "r.html");
        assert_eq!(percent_encode("a b.html"), "a%20b.html");
        assert_eq!(percent_encode("é.html"), "%C3%A9.html");
    }

    #[test]
    fn test_multipart_layout() {
        let artifact = DeliveryArtifact::new("点検.html", b"<p>ok</p>".to_vec());
        let body = build_multipart("Inspection report", &artifact);
        let text = String::from_utf8(body.bytes.clone()).unwrap();

        assert!(body.content_type().ends_with(&body.boundary));
        assert!(text.starts_with(&format!("--{}\r\n", body.boundary)));
        assert!(text.contains("name=\"text\"\r\n\r\nInspection report\r\n"));
        assert!(text.contains("filename=\"点検.html\""));
        assert!(text.contains("filename*=utf-8''%E7%82%B9%E6%A4%9C.html"));
        assert!(text.contains("Content-Type: text/html\r\n\r\n<p>ok</p>\r\n"));
        assert!(text.ends_with(&format!("--{}--\r\n", body.boundary)));
    }

    #[test]
    fn test_empty_name_falls_back() {
        let body = build_multipart("m", &DeliveryArtifact::new("", b"x".to_vec()));
        let text = String::from_utf8(body.bytes).unwrap();
        assert!(text.contains("filename=\"file.html\""));
    }

    #[test]
    fn test_quote_in_name_is_replaced_in_plain_filename_only() {
        let body = build_multipart("m", &DeliveryArtifact::new("a\"b.html", b"x".to_vec()));
        let text = String::from_utf8(body.bytes).unwrap();
        assert!(text.contains("filename=\"a'b.html\""));
        assert!(text.contains("filename*=utf-8''a%22b.html"));
    }

    #[test]
    fn test_boundary_is_unique() {
        let artifact = DeliveryArtifact::new("r.html", b"x".to_vec());
        assert_ne!(
            build_multipart("m", &artifact).boundary,
            build_multipart("m", &artifact).boundary
        );
    }

    #[tokio::test]
    async fn test_send_headers_and_path() {
        let server = MockServer::start().await;
        let expected_key = key();

        Mock::given(method("POST"))
            .and(path("/api/integrations/send/42"))
            .and(header("Authorization", "Bearer key-123"))
            .and(header("Idempotency-Key", expected_key.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"ok\":true}"))
            .expect(1)
            .mount(&server)
            .await;

        let response = transport(format!("{}/api/integrations", server.uri()))
            .send(&DeliveryArtifact::new("r.html", b"abc".to_vec()), &expected_key)
            .await
            .unwrap();

        assert!(response.is_success());
        assert_eq!(response.body, "{\"ok\":true}");

        let requests = server.received_requests().await.unwrap();
        let content_type = requests[0]
            .headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("name=\"files\"; filename=\"r.html\""));
        assert!(body.contains("abc"));
    }

    #[tokio::test]
    async fn test_error_status_is_returned_not_raised() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/send/42"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let response = transport(server.uri())
            .send(&DeliveryArtifact::new("r.html", b"abc".to_vec()), &key())
            .await
            .unwrap();

        assert_eq!(response.status, 503);
        assert!(response.is_server_error());
        assert_eq!(response.body, "busy");
    }

    #[tokio::test]
    async fn test_unreachable_is_transport_error() {
        let result = transport("http://127.0.0.1:1".to_string())
            .send(&DeliveryArtifact::new("r.html", b"abc".to_vec()), &key())
            .await;

        match result {
            Err(err) => {
                assert!(err.is_retryable());
                assert!(matches!(err, RelayError::Transport(_)));
            }
            Ok(response) => panic!("unexpected response {:?}", response),
        }
    }
}
