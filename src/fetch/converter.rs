use super::extractor::Article;

#[derive(Debug, Clone)]
pub struct LocalPage {
    pub url: String,
    pub markdown: String,
    pub used_raw_fallback: bool,
}

pub(super) fn to_local_page(article: Article, url: String, include_meta: bool) -> LocalPage {
    let body = html2md::rewrite_html(&article.content_html, false);

    let markdown = if include_meta {
        with_frontmatter(&article, &body)
    } else {
        match &article.title {
            Some(title) if !body.trim_start().starts_with('#') => {
                format!("# {}\n\n{body}", crate::markdown::sanitize_heading(title))
            }
            _ => body,
        }
    };

    LocalPage {
        url,
        markdown,
        used_raw_fallback: article.used_raw_fallback,
    }
}

fn with_frontmatter(article: &Article, body: &str) -> String {
    let fields = [
        ("title", &article.title),
        ("author", &article.byline),
        ("date", &article.published_time),
    ];

    let mut out = String::from("---\n");
    for (key, value) in fields {
        if let Some(value) = value {
            out.push_str(&format!("{key}: \"{}\"\n", escape_yaml(value)));
        }
    }
    out.push_str("---\n\n");
    out.push_str(body);
    out
}

fn escape_yaml(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: Option<&str>, byline: Option<&str>, html: &str) -> Article {
        Article {
            title: title.map(String::from),
            byline: byline.map(String::from),
            published_time: None,
            content_html: html.into(),
            used_raw_fallback: false,
        }
    }

    #[test]
    fn title_becomes_heading_without_meta() {
        let page = to_local_page(
            article(Some("Cafe Trends"), None, "<p>Oat milk is everywhere.</p>"),
            "https://example.com".into(),
            false,
        );

        assert!(page.markdown.starts_with("# Cafe Trends\n\n"));
        assert!(page.markdown.contains("Oat milk is everywhere."));
        assert!(!page.markdown.contains("---"));
    }

    #[test]
    fn meta_renders_frontmatter_and_skips_missing_fields() {
        let page = to_local_page(
            article(Some("Report"), Some("Jane Doe"), "<p>Body text</p>"),
            "https://example.com".into(),
            true,
        );

        assert!(page.markdown.starts_with("---\n"));
        assert!(page.markdown.contains("title: \"Report\""));
        assert!(page.markdown.contains("author: \"Jane Doe\""));
        assert!(!page.markdown.contains("date:"));
        assert!(page.markdown.contains("Body text"));
    }

    #[test]
    fn escapes_yaml_special_chars() {
        assert_eq!(escape_yaml(r#"He said "hi""#), r#"He said \"hi\""#);
        assert_eq!(escape_yaml(r"back\slash"), r"back\\slash");
        assert_eq!(escape_yaml("line\nbreak"), "line\\nbreak");
    }
}
