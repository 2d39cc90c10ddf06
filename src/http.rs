// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use reqwest::Method;
use serde_json::Value;
use std::pin::Pin;

/// A streaming response body
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// HTTP response with status, content length, and body stream
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Content-Length header value, if present
    pub content_length: Option<u64>,
    /// Response body as a stream of bytes
    pub body: ByteStream,
}

/// A file attached to a multipart form
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    /// Form field name
    pub field: String,
    /// Filename reported to the server
    pub filename: String,
    pub mime_type: String,
    pub data: Bytes,
}

/// A multipart form with text fields and an optional file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartForm {
    pub fields: Vec<(String, String)>,
    pub file: Option<FilePart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn file(mut self, file: FilePart) -> Self {
        self.file = Some(file);
        self
    }

    /// Look up a text field by name
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Body of an outgoing API request
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(MultipartForm),
}

/// An API request relative to the configured base URL.
///
/// The bearer credential travels with the request itself; there are no
/// client-wide default headers. Whatever token is set here when the request
/// is dispatched is the one that gets sent.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path starting with `/`, e.g. `/api/podcasts`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub bearer: Option<String>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            bearer: None,
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token;
        self
    }

    /// Resolve the request against a base URL, encoding any query parameters
    pub fn url(&self, base_url: &str) -> String {
        let mut url = format!("{}{}", base_url.trim_end_matches('/'), self.path);
        if !self.query.is_empty() {
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(self.query.iter())
                .finish();
            url.push('?');
            url.push_str(&encoded);
        }
        url
    }
}

/// A fully buffered API response
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction for testability
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send an API request and buffer the whole response
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, reqwest::Error>;

    /// Get a streaming response for large downloads
    async fn get_stream(&self, url: &str) -> Result<HttpResponse, reqwest::Error>;
}

/// Default HTTP client implementation using reqwest
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestClient {
    /// Create a new ReqwestClient talking to the given API base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a new ReqwestClient with a custom reqwest::Client
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, reqwest::Error> {
        let url = request.url(&self.base_url);
        tracing::debug!(method = %request.method, %url, authenticated = request.bearer.is_some(), "sending request");

        let mut builder = self.client.request(request.method, url);
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(form) => builder.multipart(into_reqwest_form(form)?),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        Ok(ApiResponse { status, body })
    }

    async fn get_stream(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
        use futures::StreamExt;

        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let content_length = response.content_length();

        let body: ByteStream = Box::pin(response.bytes_stream().map(|result| result));

        Ok(HttpResponse {
            status,
            content_length,
            body,
        })
    }
}

fn into_reqwest_form(form: MultipartForm) -> Result<reqwest::multipart::Form, reqwest::Error> {
    let mut multipart = reqwest::multipart::Form::new();
    for (name, value) in form.fields {
        multipart = multipart.text(name, value);
    }
    if let Some(file) = form.file {
        let part = reqwest::multipart::Part::bytes(file.data.to_vec())
            .file_name(file.filename)
            .mime_str(&file.mime_type)?;
        multipart = multipart.part(file.field, part);
    }
    Ok(multipart)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reqwest_client_can_be_cloned() {
        let client = ReqwestClient::new("http://localhost:8001");
        let cloned = client.clone();
        assert_eq!(cloned.base_url(), "http://localhost:8001");
    }

    #[test]
    fn url_joins_base_and_path() {
        let request = ApiRequest::get("/api/podcasts");
        assert_eq!(
            request.url("http://localhost:8001/"),
            "http://localhost:8001/api/podcasts"
        );
    }

    #[test]
    fn url_encodes_query_parameters() {
        let request = ApiRequest::get("/api/search").query("q", "rust & tea");
        assert_eq!(
            request.url("http://localhost:8001"),
            "http://localhost:8001/api/search?q=rust+%26+tea"
        );
    }

    #[test]
    fn builder_sets_bearer_and_body() {
        let request = ApiRequest::post("/api/podcasts")
            .bearer(Some("T1".to_string()))
            .json(serde_json::json!({ "title": "Show" }));

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.bearer.as_deref(), Some("T1"));
        assert!(matches!(request.body, RequestBody::Json(_)));
    }

    #[test]
    fn multipart_form_field_lookup() {
        let form = MultipartForm::new()
            .text("title", "Pilot")
            .text("description", "First");

        assert_eq!(form.field("title"), Some("Pilot"));
        assert_eq!(form.field("missing"), None);
        assert!(form.file.is_none());
    }

    #[test]
    fn response_success_range() {
        let ok = ApiResponse {
            status: 204,
            body: Bytes::new(),
        };
        let denied = ApiResponse {
            status: 401,
            body: Bytes::new(),
        };
        assert!(ok.is_success());
        assert!(!denied.is_success());
    }
}
