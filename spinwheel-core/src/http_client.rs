use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::stream::{StreamExt, TryStreamExt};
use http::StatusCode;
use http::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Serialize, de::DeserializeOwned};

use crate::config::HttpCfg;
use crate::error::{CoreResult, SpinError};
use crate::model::BinaryPayload;
use crate::transport::{SseResponse, SseTransport};

const MAX_ERROR_BODY: usize = 300;

/// Thin wrapper around reqwest::Client with defaults and helpers.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    user_agent: String,
    request_timeout: Duration,
}

impl HttpClient {
    /// No total timeout is set on the client itself: it would cut long streams.
    /// Non-streaming requests get `request_timeout_ms` per request instead.
    pub fn new(cfg: &HttpCfg) -> CoreResult<Self> {
        let mut builder =
            Client::builder().connect_timeout(Duration::from_millis(cfg.connect_timeout_ms));
        if let Some(n) = cfg.pool_max_idle_per_host {
            builder = builder.pool_max_idle_per_host(n);
        }
        let inner = builder
            .build()
            .map_err(|e| SpinError::Other(anyhow::anyhow!("http client build failed: {e}")))?;
        Ok(Self {
            inner,
            user_agent: "spinwheel/0.1".to_string(),
            request_timeout: Duration::from_millis(cfg.request_timeout_ms),
        })
    }

    pub fn new_default() -> CoreResult<Self> {
        Self::new(&HttpCfg::default())
    }

    pub async fn post_json<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        url: &str,
        body: &T,
    ) -> CoreResult<R> {
        let req = self
            .inner
            .post(url)
            .json(body)
            .header(ACCEPT, "application/json");
        let resp = self.send(url, req).await?;
        decode_json(resp).await
    }

    pub async fn get_json<R: DeserializeOwned>(&self, url: &str) -> CoreResult<R> {
        let req = self.inner.get(url).header(ACCEPT, "application/json");
        let resp = self.send(url, req).await?;
        decode_json(resp).await
    }

    /// POST JSON and return the raw response body (e.g. a generated image).
    pub async fn post_for_bytes<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> CoreResult<BinaryPayload> {
        let req = self.inner.post(url).json(body).header(ACCEPT, "*/*");
        let resp = self.send(url, req).await?;
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let data = resp
            .bytes()
            .await
            .map_err(|e| SpinError::Unavailable(format!("body read failed: {e}")))?;
        Ok(BinaryPayload { content_type, data })
    }

    /// POST JSON and hand back the response body as an unparsed byte stream.
    pub async fn post_sse<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> CoreResult<SseResponse> {
        let resp = self
            .inner
            .post(url)
            .json(body) // sets Content-Type: application/json
            .header(ACCEPT, "text/event-stream")
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| SpinError::StreamTransport(e.to_string()))?;

        let status = resp.status();
        // 204 means the server promised no body to read.
        if !status.is_success() || status == StatusCode::NO_CONTENT {
            return Err(SpinError::StreamRequestFailed {
                status: status.as_u16(),
            });
        }

        let body = resp
            .bytes_stream()
            .map_err(|e| SpinError::StreamTransport(e.to_string()))
            .boxed();
        Ok(SseResponse {
            status: status.as_u16(),
            body,
        })
    }

    async fn send(&self, url: &str, req: RequestBuilder) -> CoreResult<Response> {
        let start = Instant::now();
        let resp = req
            .header(USER_AGENT, &self.user_agent)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| SpinError::Unavailable(e.to_string()))?;

        let status = resp.status();
        tracing::debug!(
            url,
            status = status.as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            "request finished"
        );
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(map_http_error(status, &text));
        }
        Ok(resp)
    }
}

#[async_trait]
impl SseTransport for HttpClient {
    async fn open_stream(&self, url: &str, body: &serde_json::Value) -> CoreResult<SseResponse> {
        self.post_sse(url, body).await
    }
}

async fn decode_json<R: DeserializeOwned>(resp: Response) -> CoreResult<R> {
    let status = resp.status();
    resp.json::<R>()
        .await
        .map_err(|e| SpinError::Decode(format!("{} json decode error: {e}", status.as_u16())))
}

fn map_http_error(status: StatusCode, body: &str) -> SpinError {
    SpinError::RequestFailed {
        status: status.as_u16(),
        message: truncate(body, MAX_ERROR_BODY),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &s[..cut])
}
