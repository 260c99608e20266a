//! Local page fetching: SSRF-checked download, Readability extraction, HTML→Markdown.
//! This is the last provider of the extraction chain and needs no API key.

pub mod converter;
mod extractor;
mod ssrf;

pub use converter::LocalPage;
pub(crate) use ssrf::{DnsResolver, TokioDnsResolver};

use converter::to_local_page;
use encoding_rs::Encoding;
use extractor::{extract_article, extract_raw};
use reqwest::Client;
use ssrf::{redact_url_credentials, ssrf_check};
use tracing::debug;

const MAX_RESPONSE_BYTES: usize = 10_000_000;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid URL: must be HTTP(S)")]
    InvalidScheme,

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("blocked: internal/private host not allowed")]
    InternalHost,

    #[error("fetch failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("DNS resolution failed: {0}")]
    DnsResolution(String),

    #[error("fetch failed: status {0}")]
    Status(u16),

    #[error("response too large (>{} bytes)", MAX_RESPONSE_BYTES)]
    TooLarge,

    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FetchOptions {
    /// Skip Readability and convert the whole page.
    pub raw: bool,
    /// Prepend title/author/date as YAML frontmatter.
    pub meta: bool,
}

pub async fn fetch_page(
    client: &Client,
    url: &str,
    options: FetchOptions,
    resolver: &impl DnsResolver,
) -> Result<LocalPage, FetchError> {
    ssrf_check(url, resolver).await?;

    let (final_url, html) = download(client, url).await?;

    // Re-validate after redirects to block content from internal hosts.
    if final_url != url {
        ssrf_check(&final_url, resolver).await?;
    }

    let article = if options.raw {
        extract_raw(&html)
    } else {
        extract_article(&html, Some(&final_url))
    };

    debug!(url = %redact_url_credentials(&final_url), bytes = html.len(), "page fetched");
    Ok(to_local_page(article, final_url, options.meta))
}

async fn download(client: &Client, url: &str) -> Result<(String, String), FetchError> {
    let response = client
        .get(url)
        .header("User-Agent", crate::USER_AGENT)
        .header("Accept", "text/html,application/xhtml+xml;q=0.9,*/*;q=0.5")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_ascii_lowercase);

    if let Some(ct) = &content_type
        && !is_textual(ct)
    {
        return Err(FetchError::UnsupportedContentType(ct.clone()));
    }

    if let Some(len) = response.content_length()
        && len as usize > MAX_RESPONSE_BYTES
    {
        return Err(FetchError::TooLarge);
    }

    let mut body = Vec::new();
    let mut stream = response;
    while let Some(chunk) = stream.chunk().await? {
        body.extend_from_slice(&chunk);
        if body.len() > MAX_RESPONSE_BYTES {
            return Err(FetchError::TooLarge);
        }
    }

    let html = decode_body(&body, content_type.as_deref());
    Ok((final_url, html))
}

fn is_textual(content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or("").trim();
    mime.is_empty()
        || mime.starts_with("text/")
        || mime == "application/xhtml+xml"
        || mime == "application/xml"
}

/// Decode with the charset named in `Content-Type`, defaulting to lossy UTF-8.
fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(|ct| {
            ct.split(';')
                .filter_map(|part| part.trim().strip_prefix("charset="))
                .next()
        })
        .and_then(|label| Encoding::for_label(label.trim_matches('"').as_bytes()));

    match encoding {
        Some(enc) => enc.decode(body).0.into_owned(),
        None => String::from_utf8_lossy(body).into_owned(),
    }
}
