//! HTTP-backed search tools: web (Tavily), encyclopedia (Wikipedia),
//! academic papers (arXiv).

use crate::tools::{describe_http_error, describe_status, truncate_chars, Tool};
use crate::Result;
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, warn};

const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";
const WIKIPEDIA_ENDPOINT: &str = "https://en.wikipedia.org/w/api.php";
const ARXIV_ENDPOINT: &str = "https://export.arxiv.org/api/query";

const DOC_CONTENT_CHARS_MAX: usize = 4000;

async fn read_text(tool: &str, response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| describe_http_error(tool, &e))?;

    if !status.is_success() {
        return Err(describe_status(tool, status, &body));
    }
    Ok(body)
}

//
// ================= Tavily =================
//

pub struct TavilySearch {
    client: Client,
    api_key: String,
    endpoint: String,
    max_results: u32,
}

impl TavilySearch {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            endpoint: TAVILY_ENDPOINT.to_string(),
            max_results: 3,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

fn format_tavily(response: &TavilyResponse) -> String {
    if response.results.is_empty() {
        return "No web results found".to_string();
    }

    response
        .results
        .iter()
        .map(|r| format!("Title: {}\nURL: {}\nContent: {}", r.title, r.url, r.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl Tool for TavilySearch {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current technical information and recent developments"
    }

    async fn call(&self, query: &str) -> Result<String> {
        debug!(query, "Tavily search");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({
                "api_key": self.api_key,
                "query": query,
                "max_results": self.max_results,
                "search_depth": "basic",
            }))
            .send()
            .await
            .map_err(|e| describe_http_error("Tavily", &e))?;

        let body = read_text("Tavily", response).await?;
        let parsed: TavilyResponse = serde_json::from_str(&body)?;
        Ok(format_tavily(&parsed))
    }
}

//
// ================= Wikipedia =================
//

pub struct WikipediaSearch {
    client: Client,
    endpoint: String,
    top_k_results: u32,
}

impl WikipediaSearch {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            endpoint: WIKIPEDIA_ENDPOINT.to_string(),
            top_k_results: 2,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct WikipediaResponse {
    query: Option<WikipediaQuery>,
}

#[derive(Debug, Deserialize)]
struct WikipediaQuery {
    #[serde(default)]
    pages: HashMap<String, WikipediaPage>,
}

#[derive(Debug, Deserialize)]
struct WikipediaPage {
    title: String,
    #[serde(default)]
    extract: String,
    #[serde(default)]
    index: u32,
}

fn format_wikipedia(response: WikipediaResponse) -> String {
    let mut pages: Vec<WikipediaPage> = response
        .query
        .map(|q| q.pages.into_values().collect())
        .unwrap_or_default();

    if pages.is_empty() {
        return "No good Wikipedia Search Result was found".to_string();
    }

    pages.sort_by_key(|p| p.index);

    let text = pages
        .iter()
        .map(|p| format!("Page: {}\nSummary: {}", p.title, p.extract.trim()))
        .collect::<Vec<_>>()
        .join("\n\n");

    truncate_chars(&text, DOC_CONTENT_CHARS_MAX)
}

#[async_trait]
impl Tool for WikipediaSearch {
    fn name(&self) -> &str {
        "wikipedia"
    }

    fn description(&self) -> &str {
        "Access encyclopedic knowledge about technical concepts and technologies"
    }

    async fn call(&self, query: &str) -> Result<String> {
        debug!(query, "Wikipedia search");

        let limit = self.top_k_results.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("generator", "search"),
                ("gsrsearch", query),
                ("gsrlimit", limit.as_str()),
                ("prop", "extracts"),
                ("exintro", "1"),
                ("explaintext", "1"),
            ])
            .send()
            .await
            .map_err(|e| describe_http_error("Wikipedia", &e))?;

        let body = read_text("Wikipedia", response).await?;
        let parsed: WikipediaResponse = serde_json::from_str(&body)?;
        Ok(format_wikipedia(parsed))
    }
}

//
// ================= arXiv =================
//

pub struct ArxivSearch {
    client: Client,
    endpoint: String,
    top_k_results: u32,
}

impl ArxivSearch {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            endpoint: ARXIV_ENDPOINT.to_string(),
            top_k_results: 2,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Debug, Default)]
struct ArxivEntry {
    published: String,
    title: String,
    summary: String,
}

#[derive(Debug, Clone, Copy)]
enum EntryField {
    Published,
    Title,
    Summary,
}

impl ArxivEntry {
    fn push(&mut self, field: EntryField, text: &str) {
        match field {
            EntryField::Published => self.published.push_str(text),
            EntryField::Title => self.title.push_str(text),
            EntryField::Summary => self.summary.push_str(text),
        }
    }

    fn render(&self) -> String {
        let published = self.published.trim();
        let date = published.split('T').next().unwrap_or(published);
        format!(
            "Published: {}\nTitle: {}\nSummary: {}",
            date,
            collapse_whitespace(&self.title),
            collapse_whitespace(&self.summary)
        )
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Pull entries out of an Atom feed. A malformed tail keeps the entries read so far.
fn parse_arxiv_feed(feed: &str) -> Vec<ArxivEntry> {
    let mut reader = Reader::from_str(feed);
    let mut entries = Vec::new();
    let mut current: Option<ArxivEntry> = None;
    let mut field: Option<EntryField> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = e.local_name();
                match name.into_inner() {
                    b"entry" => current = Some(ArxivEntry::default()),
                    b"published" if current.is_some() => field = Some(EntryField::Published),
                    b"title" if current.is_some() => field = Some(EntryField::Title),
                    b"summary" if current.is_some() => field = Some(EntryField::Summary),
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                let name = e.local_name();
                match name.into_inner() {
                    b"entry" => {
                        entries.extend(current.take());
                        field = None;
                    }
                    b"published" | b"title" | b"summary" => field = None,
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                if let (Some(entry), Some(field)) = (current.as_mut(), field) {
                    match e.unescape() {
                        Ok(text) => entry.push(field, &text),
                        Err(err) => debug!(error = %err, "Skipping undecodable arXiv text"),
                    }
                }
            }
            Ok(Event::CData(ref e)) => {
                if let (Some(entry), Some(field)) = (current.as_mut(), field) {
                    entry.push(field, &String::from_utf8_lossy(&**e));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!(error = %e, parsed = entries.len(), "Malformed arXiv feed");
                break;
            }
            _ => {}
        }
    }

    entries
}

/// Render an arXiv Atom feed as plain text entries
fn format_arxiv_feed(feed: &str) -> String {
    let entries: Vec<String> = parse_arxiv_feed(feed)
        .iter()
        .map(ArxivEntry::render)
        .collect();

    if entries.is_empty() {
        return "No good Arxiv Result was found".to_string();
    }

    truncate_chars(&entries.join("\n\n"), DOC_CONTENT_CHARS_MAX)
}

#[async_trait]
impl Tool for ArxivSearch {
    fn name(&self) -> &str {
        "arxiv"
    }

    fn description(&self) -> &str {
        "Access academic papers and research about technical topics"
    }

    async fn call(&self, query: &str) -> Result<String> {
        debug!(query, "arXiv search");

        let search_query = format!("all:{}", query);
        let limit = self.top_k_results.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("search_query", search_query.as_str()),
                ("max_results", limit.as_str()),
            ])
            .send()
            .await
            .map_err(|e| describe_http_error("ArXiv", &e))?;

        let body = read_text("ArXiv", response).await?;
        Ok(format_arxiv_feed(&body))
    }
}
