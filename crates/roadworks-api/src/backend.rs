//! HTTP backend seam
//!
//! The transport client never touches the network directly; it hands a
//! resolved [`HttpRequest`] to an [`HttpBackend`]. [`ReqwestBackend`] is the
//! production implementation, `fakes::ScriptedBackend` the test one.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::request::{HttpRequest, HttpResponse, Method, PartValue, RequestBody};

/// The exchange never produced a response (DNS, refused connection, reset,
/// malformed request).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct BackendError(pub String);

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError(err.to_string())
    }
}

/// Platform network primitive.
///
/// Implementations perform exactly one exchange per call: no retries, no
/// timeouts. Both are applied by the transport client around `send`.
#[async_trait]
pub trait HttpBackend: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, BackendError>;
}

/// [`HttpBackend`] on top of `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestBackend {
    client: reqwest::Client,
}

impl ReqwestBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a client with a custom user agent.
    pub fn with_user_agent(user_agent: &str) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn multipart_form(
    parts: &[crate::request::FormPart],
) -> Result<reqwest::multipart::Form, BackendError> {
    let mut form = reqwest::multipart::Form::new();
    for part in parts {
        form = match &part.value {
            PartValue::Text(value) => form.text(part.name.clone(), value.clone()),
            PartValue::File {
                file_name,
                mime_type,
                bytes,
            } => {
                let mut file =
                    reqwest::multipart::Part::bytes(bytes.clone()).file_name(file_name.clone());
                if let Some(mime) = mime_type {
                    file = file.mime_str(mime)?;
                }
                form.part(part.name.clone(), file)
            }
        };
    }
    Ok(form)
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, BackendError> {
        debug!(method = %request.method, url = %request.url, "sending request");

        let mut builder = self
            .client
            .request(reqwest_method(request.method), &request.url);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match request.body {
            Some(RequestBody::Json(bytes)) => builder.body(bytes),
            Some(RequestBody::Multipart(form)) => builder.multipart(multipart_form(&form.parts)?),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or_default().to_string();
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text,
            body,
        })
    }
}
