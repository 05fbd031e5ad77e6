//! Web tools: search, page fetch and raw HTTP passthrough
//!
//! All three return plain text; network failures are reported as text too.

use super::input::{HttpRequestInput, WebSearchInput};
use super::ToolOutput;
use regex::Regex;
use reqwest::{Client, Method, Url};
use std::sync::LazyLock;
use std::time::Duration;

/// Character budget for fetched page text and HTTP response bodies
pub const MAX_BODY_CHARS: usize = 4000;
const DEFAULT_MAX_RESULTS: usize = 5;
const SEARCH_URL: &str = "https://html.duckduckgo.com/html/";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

static RESULT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a[^>]*class="result__a"[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#)
        .expect("valid result link regex")
});
static RESULT_SNIPPET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a[^>]*class="result__snippet"[^>]*>(.*?)</a>"#)
        .expect("valid snippet regex")
});
static INVISIBLE_BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<script[^>]*>.*?</script>|<style[^>]*>.*?</style>|<noscript[^>]*>.*?</noscript>|<head\b[^>]*>.*?</head>|<!--.*?-->",
    )
    .expect("valid block regex")
});
static BLOCK_TAGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(p|div|br|li|ul|ol|h[1-6]|tr|table|section|article|header|footer|blockquote|pre)\b[^>]*>")
        .expect("valid block tag regex")
});
static ANY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").expect("valid tag regex"));

pub async fn web_search(client: &Client, input: WebSearchInput) -> ToolOutput {
    let max_results = input.max_results.unwrap_or(DEFAULT_MAX_RESULTS);
    let response = client
        .post(SEARCH_URL)
        .form(&[("q", input.query.as_str())])
        .timeout(HTTP_TIMEOUT)
        .send()
        .await;
    let html = match response {
        Ok(r) => match r.text().await {
            Ok(html) => html,
            Err(e) => return ToolOutput::error(format!("Error: search failed: {e}")),
        },
        Err(e) => return ToolOutput::error(format!("Error: search failed: {e}")),
    };

    let results = parse_search_results(&html, max_results);
    if results.is_empty() {
        return ToolOutput::success("No search results");
    }
    let lines: Vec<String> = results
        .into_iter()
        .map(|r| format!("- {}\n  {}\n  {}", r.title, r.url, r.snippet))
        .collect();
    ToolOutput::success(lines.join("\n"))
}

pub async fn web_fetch(client: &Client, url: &str) -> ToolOutput {
    let response = match client.get(url).timeout(HTTP_TIMEOUT).send().await {
        Ok(r) => r,
        Err(e) => return ToolOutput::error(format!("Error: fetch failed: {e}")),
    };
    if !response.status().is_success() {
        return ToolOutput::error(format!(
            "Error: could not fetch the page (HTTP {})",
            response.status().as_u16()
        ));
    }
    let html = match response.text().await {
        Ok(html) => html,
        Err(e) => return ToolOutput::error(format!("Error: fetch failed: {e}")),
    };

    let text = extract_text(&html);
    if text.is_empty() {
        return ToolOutput::error("Error: could not extract text from the page");
    }
    ToolOutput::success(truncate_chars(&text, MAX_BODY_CHARS))
}

pub async fn http_request(client: &Client, input: HttpRequestInput) -> ToolOutput {
    let method = match Method::from_bytes(input.method.to_uppercase().as_bytes()) {
        Ok(m) => m,
        Err(_) => return ToolOutput::error(format!("Error: invalid HTTP method: {}", input.method)),
    };

    let mut request = client.request(method.clone(), &input.url).timeout(HTTP_TIMEOUT);
    for (name, value) in input.headers.iter().flatten() {
        request = request.header(name, value);
    }
    if let Some(body) = input.body.filter(|b| !b.is_null()) {
        if matches!(method, Method::POST | Method::PUT | Method::PATCH) {
            let encoded = match body {
                serde_json::Value::String(raw) => raw,
                other => other.to_string(),
            };
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(encoded);
        }
    }

    let response = match request.send().await {
        Ok(r) => r,
        Err(e) => return ToolOutput::error(format!("Error: request failed: {e}")),
    };
    let status = response.status().as_u16();
    let text = match response.text().await {
        Ok(t) => t,
        Err(e) => return ToolOutput::error(format!("Error: request failed: {e}")),
    };
    ToolOutput::success(format!("HTTP {status}\n{}", truncate_chars(&text, MAX_BODY_CHARS)))
}

#[derive(Debug, PartialEq)]
struct SearchResult {
    title: String,
    url: String,
    snippet: String,
}

fn parse_search_results(html: &str, max_results: usize) -> Vec<SearchResult> {
    let snippets: Vec<String> = RESULT_SNIPPET
        .captures_iter(html)
        .map(|c| clean_fragment(&c[1]))
        .collect();

    RESULT_LINK
        .captures_iter(html)
        .enumerate()
        .take(max_results)
        .map(|(i, c)| SearchResult {
            title: clean_fragment(&c[2]),
            url: decode_result_url(&decode_entities(&c[1])),
            snippet: snippets.get(i).cloned().unwrap_or_default(),
        })
        .collect()
}

/// Unwrap the search engine's redirect link to the target URL
fn decode_result_url(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    Url::parse(&absolute)
        .ok()
        .and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == "uddg")
                .map(|(_, target)| target.into_owned())
        })
        .unwrap_or(absolute)
}

fn clean_fragment(fragment: &str) -> String {
    let text = ANY_TAG.replace_all(fragment, "");
    decode_entities(text.trim())
}

/// Readable text of an HTML document, one block per line
fn extract_text(html: &str) -> String {
    let without_blocks = INVISIBLE_BLOCKS.replace_all(html, "");
    let with_breaks = BLOCK_TAGS.replace_all(&without_blocks, "\n");
    let plain = ANY_TAG.replace_all(&with_breaks, "");
    decode_entities(&plain)
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Cut to `max` characters, marking the cut
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max).collect();
    cut.push_str("\n...(truncated)");
    cut
}
