//! HTML main-content extraction for web pages and filings.
//!
//! Tries content-bearing selectors in priority order (`article`, `main`,
//! role/content classes) and falls back to `body` text. Output is
//! whitespace-normalized plain text with paragraph breaks preserved where
//! the markup has block elements.

use scraper::{Html, Selector};

/// Selectors tried in order; the first one yielding substantial text wins.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role='main']",
    ".post-content",
    ".article-content",
    ".entry-content",
    ".press-release",
    ".content-body",
    "#content",
];

/// Minimum extracted length for a selector match to count as "substantial".
const MIN_CONTENT_CHARS: usize = 200;

/// Extract readable text from an HTML document.
pub fn extract_main_content(html: &str) -> String {
    let document = Html::parse_document(html);

    for selector_str in CONTENT_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                let text = element_text(&element);
                if text.len() >= MIN_CONTENT_CHARS {
                    return text;
                }
            }
        }
    }

    // Fallback: whole body
    if let Ok(body_selector) = Selector::parse("body") {
        if let Some(body) = document.select(&body_selector).next() {
            return element_text(&body);
        }
    }

    String::new()
}

/// The page `<title>`, when present and non-empty.
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("title").ok()?;
    let title = document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>())?;
    let trimmed = title.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Collect an element's text with normalized whitespace, joining text nodes
/// with double newlines so the chunker sees paragraph boundaries.
fn element_text(element: &scraper::ElementRef) -> String {
    element
        .text()
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_article_content() {
        let filler = "Quarterly revenue was 94.9 billion dollars. ".repeat(8);
        let html = format!(
            "<html><head><title>Q4 Results</title></head>\
             <body><nav>Home About Careers</nav>\
             <article><p>{}</p></article>\
             <footer>Copyright</footer></body></html>",
            filler
        );
        let text = extract_main_content(&html);
        assert!(text.contains("Quarterly revenue"));
        assert!(!text.contains("Careers"));
    }

    #[test]
    fn falls_back_to_body_for_plain_pages() {
        let html = "<html><body><p>Short press release text.</p></body></html>";
        let text = extract_main_content(html);
        assert!(text.contains("Short press release text."));
    }

    #[test]
    fn title_extracted() {
        let html = "<html><head><title> Apple Reports Q4 </title></head><body></body></html>";
        assert_eq!(extract_title(html).as_deref(), Some("Apple Reports Q4"));
    }

    #[test]
    fn missing_title_is_none() {
        assert_eq!(extract_title("<html><body>x</body></html>"), None);
    }

    #[test]
    fn whitespace_normalized() {
        let filler = "word ".repeat(60);
        let html = format!(
            "<html><body><main><p>spaced   out\n\n\ttext {}</p></main></body></html>",
            filler
        );
        let text = extract_main_content(&html);
        assert!(text.contains("spaced out text"));
    }
}
