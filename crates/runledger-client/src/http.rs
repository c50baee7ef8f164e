use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::{Body, Client, RequestBuilder, Response};
use reqwest::{StatusCode, Url};
use runledger_core::envelope::{Envelope, ServerErrorBody};
use runledger_core::Diagnostics;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::ClientConfig;
use crate::error::ClientError;

const RETRY_PAUSE: Duration = Duration::from_millis(200);

/// Blocking JSON transport for the versioned API.
///
/// Every call against the API carries the bearer token. Server `message` and
/// `warnings` on success bodies are forwarded to the diagnostics sink.
pub struct HttpClient {
    base_url: String,
    client: Client,
    api_key: Option<String>,
    get_retries: u32,
    diagnostics: Arc<dyn Diagnostics>,
}

impl HttpClient {
    pub fn new(
        config: &ClientConfig,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("http client: {e}")))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            api_key: config.api_key.clone(),
            get_retries: config.get_retries,
            diagnostics,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn with_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("Bearer {key}")),
            None => builder,
        }
    }

    fn send(&self, builder: RequestBuilder) -> Result<Response, ClientError> {
        self.with_auth(builder).send().map_err(ClientError::network)
    }

    /// GET with a bounded number of retries on network errors and 5xx.
    pub fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Envelope<T>, ClientError> {
        let mut attempt = 0;
        loop {
            let result = self
                .send(self.client.get(self.url(path)).query(query))
                .and_then(|resp| self.handle_response(resp));
            match result {
                Err(e) if attempt < self.get_retries && is_retryable(&e) => {
                    attempt += 1;
                    self.diagnostics.debug(&format!(
                        "GET {path} failed ({e}), retry {attempt}/{}",
                        self.get_retries
                    ));
                    std::thread::sleep(RETRY_PAUSE * attempt);
                }
                other => return other,
            }
        }
    }

    pub fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Envelope<T>, ClientError> {
        let resp = self.send(self.client.post(self.url(path)).json(body))?;
        self.handle_response(resp)
    }

    pub fn patch_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Envelope<T>, ClientError> {
        let resp = self.send(self.client.patch(self.url(path)).json(body))?;
        self.handle_response(resp)
    }

    pub fn delete_json<Q: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<Envelope<T>, ClientError> {
        let resp = self.send(self.client.delete(self.url(path)).query(query))?;
        self.handle_response(resp)
    }

    /// POST that only counts as success on exactly 200. The body is not
    /// decoded.
    pub fn post_expect_ok<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), ClientError> {
        let resp = self.send(self.client.post(self.url(path)).json(body))?;
        if resp.status() == StatusCode::OK {
            Ok(())
        } else {
            Err(parse_error(resp))
        }
    }

    /// PUT raw bytes to a pre-signed upload URL. No auth header: the URL
    /// itself authorizes the write. Returns the response untouched so the
    /// caller decides what counts as success.
    pub fn put_raw(
        &self,
        url: &str,
        body: Body,
        content_type: &str,
    ) -> Result<Response, ClientError> {
        self.client
            .put(url)
            .header("Content-Type", content_type)
            .body(body)
            .send()
            .map_err(ClientError::network)
    }

    fn handle_response<T: DeserializeOwned>(
        &self,
        resp: Response,
    ) -> Result<Envelope<T>, ClientError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(parse_error(resp));
        }
        let decode_error = |message: String| ClientError::Decode {
            status: status.as_u16(),
            message,
        };
        let body = resp.text().map_err(|e| decode_error(e.to_string()))?;
        // 204 and bare 200 replies carry no envelope
        let body = if body.trim().is_empty() { "{}" } else { body.as_str() };
        let envelope = serde_json::from_str::<Envelope<T>>(body)
            .map_err(|e| decode_error(e.to_string()))?;
        if let Some(message) = &envelope.message {
            self.diagnostics.info(message);
        }
        for warning in envelope.warnings.iter().flatten() {
            self.diagnostics.warn(warning);
        }
        Ok(envelope)
    }
}

/// Join `prefix` and one caller-supplied segment, percent-encoding the
/// segment so `/`, `?` and `#` inside it stay part of it.
pub(crate) fn segment_path(prefix: &str, segment: &str) -> Result<String, ClientError> {
    let mut url = Url::parse("http://localhost/")
        .map_err(|e| ClientError::Config(format!("path for {segment}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| ClientError::Config(format!("path for {segment}")))?
        .extend(prefix.split('/').filter(|s| !s.is_empty()))
        .push(segment);
    Ok(url.path().to_string())
}

fn is_retryable(err: &ClientError) -> bool {
    match err {
        ClientError::Network(_) => true,
        ClientError::Http { status, .. } => *status >= 500,
        _ => false,
    }
}

fn parse_error(resp: Response) -> ClientError {
    let status = resp.status();
    let body = resp.text().unwrap_or_default();
    let (message, warnings) = ServerErrorBody::message_from(&body);
    let message = if message.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        message
    };
    ClientError::Http {
        status: status.as_u16(),
        message,
        warnings,
    }
}
