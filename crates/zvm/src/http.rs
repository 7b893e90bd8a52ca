//! Bounded HTTP client (§4.4).
//!
//! `reqwest`'s own gzip auto-decompression is deliberately left off: the
//! spec wants control over the decode buffer, so we sniff the gzip magic
//! bytes ourselves and decode through a second pooled buffer.

use std::io::Read;
use std::path::Path;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;

use crate::error::{Result, ZvmError};
use crate::pool::{Context, HTTP_RESPONSE_BUFFER_MIN};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_REDIRECTS: usize = 10;
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Progress callback invoked as bytes arrive: `(bytes_this_chunk, total_if_known)`.
pub type ProgressFn<'a> = dyn Fn(u64, Option<u64>) + 'a;

pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(Self { client })
    }

    /// Single GET into the operation's response buffer, decompressing gzip
    /// in place if `Content-Encoding: gzip` is declared and the body starts
    /// with the gzip magic bytes. Bodies exceeding the buffer's capacity
    /// fail with `ResponseTooLarge`.
    pub async fn fetch(&self, ctx: &Context, uri: &str) -> Result<Vec<u8>> {
        let response = self.client.get(uri).send().await?;
        if !response.status().is_success() {
            return Err(ZvmError::HttpRequestFailed {
                url: uri.to_string(),
                status: response.status(),
            });
        }
        let looks_gzipped = response
            .headers()
            .get(reqwest::header::CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("gzip"))
            .unwrap_or(false);

        let mut op = ctx.acquire_http_operation()?;
        let limit = op.capacity().max(HTTP_RESPONSE_BUFFER_MIN);
        let body = response.bytes().await?;
        if body.len() > limit {
            return Err(ZvmError::ResponseTooLarge { limit });
        }
        let buf = op.buffer_mut();
        buf.clear();
        buf.extend_from_slice(&body);

        if looks_gzipped && buf.starts_with(&GZIP_MAGIC) {
            let mut decoded = Vec::new();
            flate2::read::GzDecoder::new(&buf[..]).read_to_end(&mut decoded)?;
            if decoded.len() > limit {
                return Err(ZvmError::ResponseTooLarge { limit });
            }
            Ok(decoded)
        } else {
            Ok(buf.clone())
        }
    }

    /// Parse a `fetch`ed response as JSON, through the pool's arena
    /// allocator (reset on drop).
    pub async fn fetch_json<T: DeserializeOwned>(&self, ctx: &Context, uri: &str) -> Result<T> {
        let _arena = ctx.json_allocator()?;
        let bytes = self.fetch(ctx, uri).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Streaming GET, writing through a buffered file writer as chunks
    /// arrive. Returns the total bytes written. Non-200 status fails
    /// `HttpRequestFailed`.
    pub async fn download_file(
        &self,
        uri: &str,
        dest: &Path,
        progress: &ProgressFn<'_>,
    ) -> Result<u64> {
        use futures_util::StreamExt;

        let response = self.client.get(uri).send().await?;
        if response.status() != StatusCode::OK {
            return Err(ZvmError::HttpRequestFailed {
                url: uri.to_string(),
                status: response.status(),
            });
        }
        let total = response.content_length();
        let looks_gzipped = response
            .headers()
            .get(reqwest::header::CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("gzip"))
            .unwrap_or(false);

        let mut file = tokio::fs::File::create(dest).await?;
        let mut writer = tokio::io::BufWriter::new(&mut file);
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        let mut sniffed = Vec::new();
        let mut decided_gzip: Option<bool> = None;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(ZvmError::Http)?;
            progress(chunk.len() as u64, total);

            if decided_gzip.is_none() {
                sniffed.extend_from_slice(&chunk);
                if sniffed.len() >= 2 {
                    decided_gzip = Some(looks_gzipped && sniffed.starts_with(&GZIP_MAGIC));
                    if decided_gzip == Some(false) {
                        writer.write_all(&sniffed).await?;
                        written += sniffed.len() as u64;
                        sniffed.clear();
                    }
                }
                continue;
            }

            if decided_gzip == Some(true) {
                sniffed.extend_from_slice(&chunk);
            } else {
                writer.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
        }

        if decided_gzip == Some(true) {
            let mut decoded = Vec::new();
            flate2::read::GzDecoder::new(&sniffed[..]).read_to_end(&mut decoded)?;
            writer.write_all(&decoded).await?;
            written = decoded.len() as u64;
        } else if decided_gzip.is_none() && !sniffed.is_empty() {
            writer.write_all(&sniffed).await?;
            written += sniffed.len() as u64;
        }

        writer.flush().await?;
        Ok(written)
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new().expect("failed to build HTTP client")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Context, PoolConfig};
    use std::path::PathBuf;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ctx() -> Context {
        Context::with_home(PathBuf::from("/tmp/zvm-http-test"), PoolConfig::default())
    }

    #[tokio::test]
    async fn fetch_plain_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/index.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"a\":1}"))
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let ctx = ctx();
        let body = client
            .fetch(&ctx, &format!("{}/index.json", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, b"{\"a\":1}");
    }

    #[tokio::test]
    async fn non_success_status_is_http_request_failed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let ctx = ctx();
        let err = client
            .fetch(&ctx, &format!("{}/missing", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ZvmError::HttpRequestFailed { .. }));
    }

    #[tokio::test]
    async fn download_file_writes_body_to_disk() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifact.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3, 4]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("artifact.bin");
        let client = HttpClient::new().unwrap();
        let total = client
            .download_file(&format!("{}/artifact.bin", server.uri()), &dest, &|_, _| {})
            .await
            .unwrap();
        assert_eq!(total, 4);
        assert_eq!(std::fs::read(&dest).unwrap(), vec![1, 2, 3, 4]);
    }
}
