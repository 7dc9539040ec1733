//! `reqwest` wrapper that opens an `outgoing_http` span per call and makes
//! sure every request carries an `x-request-id`.

use reqwest::header::{HeaderName, HeaderValue};
use tracing::{Instrument, Level};

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

#[derive(Clone, Default)]
pub struct TracedClient {
    inner: reqwest::Client,
}

impl TracedClient {
    pub fn new(inner: reqwest::Client) -> Self {
        Self { inner }
    }

    /// Execute a built request. An explicit `x-request-id` is kept; otherwise a fresh one is set.
    pub async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        let request_id = match req.headers().get(&REQUEST_ID_HEADER) {
            Some(v) => v.to_str().unwrap_or_default().to_owned(),
            None => {
                let id = nanoid::nanoid!();
                if let Ok(v) = HeaderValue::from_str(&id) {
                    req.headers_mut().insert(REQUEST_ID_HEADER, v);
                }
                id
            }
        };

        let span = tracing::span!(
            Level::INFO,
            "outgoing_http",
            http.method = %req.method(),
            http.url = %req.url(),
            request_id = %request_id,
            http.status_code = tracing::field::Empty,
        );

        let response = self.inner.execute(req).instrument(span.clone()).await?;
        span.record("http.status_code", response.status().as_u16());
        if !response.status().is_success() {
            tracing::debug!(parent: &span, status = %response.status(), "non-success response");
        }
        Ok(response)
    }

    pub async fn get(&self, url: &str) -> reqwest::Result<reqwest::Response> {
        let req = self.inner.get(url).build()?;
        self.execute(req).await
    }

    /// Builder on the inner client; finish with [`TracedClient::execute`].
    pub fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.inner.request(method, url)
    }
}

impl From<reqwest::Client> for TracedClient {
    fn from(c: reqwest::Client) -> Self {
        Self::new(c)
    }
}
