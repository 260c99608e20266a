use dom_smoothie::{Config, Readability};
use tracing::warn;

pub(super) struct Article {
    pub title: Option<String>,
    pub byline: Option<String>,
    pub published_time: Option<String>,
    pub content_html: String,
    /// Readability could not isolate the main content; `content_html` is the whole page.
    pub used_raw_fallback: bool,
}

impl Article {
    fn whole_page(html: &str, used_raw_fallback: bool) -> Self {
        Self {
            title: title_tag(html),
            byline: None,
            published_time: None,
            content_html: html.to_string(),
            used_raw_fallback,
        }
    }
}

/// Main-content extraction, degrading to the whole page when the document
/// does not look like an article.
pub(super) fn extract_article(html: &str, url: Option<&str>) -> Article {
    let mut readability = match Readability::new(html, url, Some(Config::default())) {
        Ok(r) => r,
        Err(e) => {
            warn!(%e, "readability init failed, using whole page");
            return Article::whole_page(html, true);
        }
    };

    let readable = readability.is_probably_readable();

    match readability.parse() {
        Ok(parsed) if readable => Article {
            title: Some(parsed.title.to_string()).filter(|t| !t.is_empty()),
            byline: parsed.byline.map(|b| b.to_string()),
            published_time: parsed.published_time.map(|t| t.to_string()),
            content_html: parsed.content.to_string(),
            used_raw_fallback: false,
        },
        Ok(parsed) => Article {
            title: Some(parsed.title.to_string())
                .filter(|t| !t.is_empty())
                .or_else(|| title_tag(html)),
            ..Article::whole_page(html, true)
        },
        Err(e) => {
            warn!(%e, "readability parse failed, using whole page");
            Article::whole_page(html, true)
        }
    }
}

pub(super) fn extract_raw(html: &str) -> Article {
    Article::whole_page(html, false)
}

/// `<title>` lookup by string search, for pages Readability rejects.
fn title_tag(html: &str) -> Option<String> {
    // ASCII lowercasing keeps byte offsets aligned with `html`.
    let lower = html.to_ascii_lowercase();
    let open = lower.find("<title")?;
    let start = open + lower[open..].find('>')? + 1;
    let end = start + lower[start..].find("</title>")?;
    Some(html[start..end].trim().to_string()).filter(|t| !t.is_empty())
}
