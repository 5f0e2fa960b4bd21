//! Thin HTTP client used by the knowledge API.
//!
//! Requests are described with a [`RequestBuilder`] and sent through a shared
//! `reqwest::Client`. Responses are fully buffered into a plain [`Response`]
//! so callers can inspect status and body without holding on to the
//! connection.
//!
//! Binary uploads to presigned URLs use [`RequestBuilder::stream_body`], which
//! accepts a `reqwest::Body` wrapping a byte stream so progress can be
//! observed while the payload is sent.

use std::collections::HashMap;

/// HTTP method for requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Parse a method name as returned by the backend (`"PUT"`, `"post"`, ...).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }

    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Patch => reqwest::Method::PATCH,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A simplified HTTP response that owns its body.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response body as bytes
    pub body: Vec<u8>,
}

impl Response {
    /// Returns true if the status code is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Attempt to deserialize the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// HTTP client error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("HTTP error: {message}")]
pub struct HttpError {
    pub message: String,
}

impl HttpError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result type for HTTP operations.
pub type HttpResult<T> = Result<T, HttpError>;

#[derive(Debug)]
enum Body {
    Bytes(Vec<u8>),
    Stream(reqwest::Body),
}

/// A builder for constructing HTTP requests.
#[derive(Debug)]
pub struct RequestBuilder {
    client: reqwest::Client,
    method: Method,
    url: String,
    headers: HashMap<String, String>,
    body: Option<Body>,
}

impl RequestBuilder {
    fn new(client: reqwest::Client, method: Method, url: impl Into<String>) -> Self {
        Self {
            client,
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
        }
    }

    /// Add a header to the request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Add a bearer token, if any.
    pub fn bearer(self, token: Option<&str>) -> Self {
        match token {
            Some(token) => self.header("Authorization", format!("Bearer {token}")),
            None => self,
        }
    }

    /// Set a streamed request body.
    ///
    /// The caller is responsible for setting `Content-Length` when the
    /// receiving end needs it (presigned storage URLs do).
    pub fn stream_body(mut self, body: reqwest::Body) -> Self {
        self.body = Some(Body::Stream(body));
        self
    }

    /// Set the request body as JSON.
    pub fn json<T: serde::Serialize>(mut self, value: &T) -> Result<Self, serde_json::Error> {
        let json_bytes = serde_json::to_vec(value)?;
        self.body = Some(Body::Bytes(json_bytes));
        self.headers
            .insert("content-type".to_owned(), "application/json".to_owned());
        Ok(self)
    }

    /// Send the request and buffer the response.
    pub async fn send(self) -> HttpResult<Response> {
        let mut request = self.client.request(self.method.as_reqwest(), &self.url);

        for (name, value) in &self.headers {
            request = request.header(name, value);
        }

        request = match self.body {
            Some(Body::Bytes(bytes)) => request.body(bytes),
            Some(Body::Stream(body)) => request.body(body),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| HttpError::new(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| HttpError::new(e.to_string()))?
            .to_vec();

        Ok(Response { status, body })
    }
}

/// HTTP client sharing one connection pool across requests.
///
/// # Example
///
/// ```ignore
/// use kbase_business::http::Client;
///
/// async fn create(client: &Client, request: &CreateFileRecord) {
///     let response = client
///         .post("https://kb.example.com/api/v1/knowledge/kb-1/files")
///         .bearer(Some("token"))
///         .json(request)?
///         .send()
///         .await?;
///
///     if response.is_success() {
///         let record: RemoteRecord = response.json()?;
///     }
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Client {
    inner: reqwest::Client,
}

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request with an arbitrary method.
    pub fn request(&self, method: Method, url: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(self.inner.clone(), method, url)
    }

    /// Create a POST request.
    pub fn post(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::Post, url)
    }

    /// Create a DELETE request.
    pub fn delete(&self, url: impl Into<String>) -> RequestBuilder {
        self.request(Method::Delete, url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_is_success() {
        let response = Response {
            status: 204,
            body: Vec::new(),
        };
        assert!(response.is_success());

        let response = Response {
            status: 404,
            body: Vec::new(),
        };
        assert!(!response.is_success());
    }

    #[test]
    fn test_response_json() {
        #[derive(Debug, serde::Deserialize, PartialEq)]
        struct Created {
            id: String,
        }

        let response = Response {
            status: 201,
            body: br#"{"id": "file-1"}"#.to_vec(),
        };

        let data: Created = response.json().unwrap();
        assert_eq!(
            data,
            Created {
                id: "file-1".to_owned()
            }
        );
    }

    #[test]
    fn test_method_parse() {
        assert_eq!(Method::parse("PUT"), Some(Method::Put));
        assert_eq!(Method::parse(" post "), Some(Method::Post));
        assert_eq!(Method::parse("patch"), Some(Method::Patch));
        assert_eq!(Method::parse("TRACE"), None);
    }

    #[test]
    fn test_request_builder_bearer() {
        let client = Client::new();
        let builder = client.delete("https://example.com").bearer(Some("token"));
        assert_eq!(
            builder.headers.get("Authorization"),
            Some(&"Bearer token".to_owned())
        );

        let builder = client.delete("https://example.com").bearer(None);
        assert!(builder.headers.is_empty());
    }

    #[test]
    fn test_request_builder_json() {
        #[derive(serde::Serialize)]
        struct Ack {
            file_size: u64,
        }

        let builder = Client::new()
            .post("https://example.com")
            .json(&Ack { file_size: 12 })
            .unwrap();

        assert_eq!(
            builder.headers.get("content-type"),
            Some(&"application/json".to_owned())
        );
        assert!(matches!(builder.body, Some(Body::Bytes(ref b)) if b == br#"{"file_size":12}"#));
    }
}
