//! HTTP(S) transport (§4.D.1): GET with `Range:` for resumption, HEAD for
//! peek, PUT for upload, user-configured headers, timeouts, and auth.

use std::collections::BTreeMap;
use std::time::Duration;

use aether_core::config::ConnectorConfig;
use aether_util::errors::AetherError;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};

use crate::auth::{self, Credentials};
use crate::transport::{Context, Location, Sink};

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    headers: BTreeMap<String, String>,
    credentials: Credentials,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, config: &ConnectorConfig, credentials: Credentials) -> miette::Result<Self> {
        let base_url = base_url.into();
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(concat!("aether/", env!("CARGO_PKG_VERSION")));
        if let Some(proxy_url) = &config.http_proxy {
            let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| AetherError::Generic {
                message: format!("invalid proxy URL '{proxy_url}': {e}"),
            })?;
            builder = builder.proxy(proxy);
        }
        let client = builder.build().map_err(|e| AetherError::Generic {
            message: format!("failed to build HTTP client: {e}"),
        })?;
        let headers = config
            .http_headers
            .get(&base_url)
            .cloned()
            .unwrap_or_default();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            headers,
            credentials,
        })
    }

    fn url(&self, loc: &Location) -> String {
        format!("{}/{}", self.base_url, loc.0.trim_start_matches('/'))
    }

    fn with_headers(&self, mut req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        for (k, v) in &self.headers {
            req = req.header(k, v);
        }
        req
    }

    fn not_found(&self, loc: &Location, url: &str) -> AetherError {
        AetherError::NotFound {
            coordinate: loc.0.clone(),
            repo_id: self.base_url.clone(),
            url: url.to_string(),
        }
    }

    fn transfer_error(&self, loc: &Location, url: &str, cause: impl std::fmt::Display) -> AetherError {
        AetherError::TransferError {
            coordinate: loc.0.clone(),
            repo_id: self.base_url.clone(),
            url: url.to_string(),
            cause: cause.to_string(),
        }
    }

    pub(crate) async fn peek(&self, loc: &Location) -> miette::Result<bool> {
        let url = self.url(loc);
        let req = auth::apply_auth(self.with_headers(self.client.head(&url)), &self.credentials);
        let resp = req
            .send()
            .await
            .map_err(|e| self.transfer_error(loc, &url, e))?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(false),
            StatusCode::NOT_MODIFIED => Ok(true),
            status if status.is_success() => Ok(true),
            status => Err(self.transfer_error(loc, &url, format!("HTTP {status}")).into()),
        }
    }

    /// GETs `loc`, resuming from `resume_offset` if nonzero via `Range:`.
    /// Returns the total byte count now present at the destination.
    pub(crate) async fn get(
        &self,
        loc: &Location,
        sink: Sink<'_>,
        resume_offset: u64,
        cx: &Context,
    ) -> miette::Result<u64> {
        let url = self.url(loc);
        let mut req = auth::apply_auth(self.with_headers(self.client.get(&url)), &self.credentials);
        if resume_offset > 0 {
            req = req.header("Range", format!("bytes={resume_offset}-"));
        }
        if let Some(since) = cx.if_modified_since() {
            req = req.header("If-Modified-Since", since);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| self.transfer_error(loc, &url, e))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(self.not_found(loc, &url).into());
        }
        if status == StatusCode::NOT_MODIFIED {
            // Unchanged since `cx.if_modified_since()`: nothing to
            // transfer, the caller's existing copy is still current.
            return Ok(resume_offset);
        }
        if !status.is_success() {
            return Err(self.transfer_error(loc, &url, format!("HTTP {status}")).into());
        }
        // A server that ignores Range returns 200 with the full body;
        // resumed writers must then restart from zero.
        let resumed = status == StatusCode::PARTIAL_CONTENT;
        let content_length = resp.content_length();
        let total_hint = content_length.map(|n| if resumed { n + resume_offset } else { n });

        let mut stream = resp.bytes_stream();
        let mut received: u64 = if resumed { resume_offset } else { 0 };

        match sink {
            Sink::Memory(buf) => {
                if !resumed {
                    buf.clear();
                }
                while let Some(chunk) = stream.next().await {
                    cx.check_cancelled()?;
                    let chunk = chunk.map_err(|e| self.transfer_error(loc, &url, e))?;
                    received += chunk.len() as u64;
                    buf.extend_from_slice(&chunk);
                    cx.report(received, total_hint);
                }
            }
            Sink::Path(dest) => {
                use std::io::Write;
                if let Some(parent) = dest.parent() {
                    std::fs::create_dir_all(parent).map_err(AetherError::Io)?;
                }
                let mut file = std::fs::OpenOptions::new()
                    .create(true)
                    .write(true)
                    .append(resumed)
                    .truncate(!resumed)
                    .open(dest)
                    .map_err(AetherError::Io)?;
                while let Some(chunk) = stream.next().await {
                    cx.check_cancelled()?;
                    let chunk = chunk.map_err(|e| self.transfer_error(loc, &url, e))?;
                    received += chunk.len() as u64;
                    file.write_all(&chunk).map_err(AetherError::Io)?;
                    cx.report(received, total_hint);
                }
            }
        }
        Ok(received)
    }

    pub(crate) async fn put(&self, loc: &Location, data: &[u8], cx: &Context) -> miette::Result<()> {
        let url = self.url(loc);
        let req = auth::apply_auth(self.with_headers(self.client.put(&url)), &self.credentials);
        let resp = req
            .body(data.to_vec())
            .send()
            .await
            .map_err(|e| self.transfer_error(loc, &url, e))?;
        if !resp.status().is_success() {
            return Err(self.transfer_error(loc, &url, format!("HTTP {}", resp.status())).into());
        }
        cx.report(data.len() as u64, Some(data.len() as u64));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_base_and_location() {
        let config = ConnectorConfig::default();
        let transport = HttpTransport::new("https://repo.example.com/maven", &config, Credentials::default()).unwrap();
        let url = transport.url(&Location("org/example/lib/1.0/lib-1.0.jar".into()));
        assert_eq!(url, "https://repo.example.com/maven/org/example/lib/1.0/lib-1.0.jar");
    }

    #[test]
    fn trailing_slash_on_base_is_trimmed() {
        let config = ConnectorConfig::default();
        let transport = HttpTransport::new("https://repo.example.com/maven/", &config, Credentials::default()).unwrap();
        assert_eq!(transport.base_url, "https://repo.example.com/maven");
    }
}
