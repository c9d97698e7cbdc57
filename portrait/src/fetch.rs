use futures_util::StreamExt;
use tracing::{debug, info, warn};

use crate::config::FetchOptions;
use crate::error::{Error, Result};
use crate::types::MediaKind;

/// Validate that a string looks like a URL.
/// Rejects anything that isn't http:// or https://.
pub fn validate_url(url: &str) -> Result<()> {
    let trimmed = url.trim();
    if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "invalid URL (must start with http:// or https://): {trimmed}"
        )))
    }
}

/// Download `url` and return its body, checking that the server labels it as
/// the expected kind of media.
///
/// Transport errors and 5xx responses are retried `options.retries` times;
/// everything else fails on the first attempt.
pub async fn download(url: &str, kind: MediaKind, options: &FetchOptions) -> Result<Vec<u8>> {
    validate_url(url)?;
    let url = url.trim();

    info!(%url, %kind, "downloading");

    let client = reqwest::Client::builder()
        .timeout(options.timeout)
        .danger_accept_invalid_certs(!options.verify_ssl)
        .build()?;

    let mut attempt = 0;
    loop {
        match fetch_once(&client, url, kind, options).await {
            Ok(bytes) => {
                debug!(%url, bytes = bytes.len(), "download complete");
                return Ok(bytes);
            }
            Err(failure) if failure.transient && attempt < options.retries => {
                attempt += 1;
                warn!(%url, attempt, error = %failure.message, "download failed, retrying");
                tokio::time::sleep(options.retry_backoff * attempt).await;
            }
            Err(failure) => {
                return Err(Error::Download {
                    url: url.to_string(),
                    message: failure.message,
                })
            }
        }
    }
}

struct FetchFailure {
    message: String,
    transient: bool,
}

impl FetchFailure {
    fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: false,
        }
    }

    fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: true,
        }
    }
}

async fn fetch_once(
    client: &reqwest::Client,
    url: &str,
    kind: MediaKind,
    options: &FetchOptions,
) -> std::result::Result<Vec<u8>, FetchFailure> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchFailure::transient(e.to_string()))?;

    let status = response.status();
    if status.is_server_error() {
        return Err(FetchFailure::transient(format!("HTTP {status}")));
    }
    if !status.is_success() {
        return Err(FetchFailure::permanent(format!("HTTP {status}")));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    check_content_type(content_type, kind).map_err(FetchFailure::permanent)?;

    if let Some(len) = response.content_length() {
        if len > options.max_bytes {
            return Err(FetchFailure::permanent(format!(
                "response too large ({len} bytes, limit {})",
                options.max_bytes
            )));
        }
    }

    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FetchFailure::transient(e.to_string()))?;
        if body.len() as u64 + chunk.len() as u64 > options.max_bytes {
            return Err(FetchFailure::permanent(format!(
                "response exceeds limit of {} bytes",
                options.max_bytes
            )));
        }
        body.extend_from_slice(&chunk);
    }

    if body.is_empty() {
        return Err(FetchFailure::permanent("response body is empty"));
    }

    Ok(body)
}

/// The `Content-Type` must mention the expected kind ("image/png" for an
/// image, "audio/mpeg" for audio and so on).
fn check_content_type(content_type: Option<&str>, kind: MediaKind) -> std::result::Result<(), String> {
    match content_type {
        Some(ct) if ct.to_ascii_lowercase().contains(kind.as_str()) => Ok(()),
        Some(ct) => Err(format!("unexpected content type \"{ct}\" (expected {kind})")),
        None => Err(format!("response has no content type (expected {kind})")),
    }
}
