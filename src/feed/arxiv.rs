//! arXiv API client — Atom feed search with cross-topic deduplication.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{NaiveDate, TimeDelta, Utc};

use crate::error::FeedError;
use crate::model::Paper;

const BASE_URL: &str = "http://export.arxiv.org/api/query";

/// Timeout for a single feed request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the arXiv export API.
pub struct ArxivClient {
    client: reqwest::Client,
    base_url: String,
}

impl ArxivClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("paper-digest/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Search for papers on a single topic, newest first.
    pub async fn search(
        &self,
        query: &str,
        max_results: usize,
        days_back: u32,
        categories: &[String],
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<Paper>, FeedError> {
        let search_query = build_search_query(query, days_back, categories, end_date);
        tracing::info!(%search_query, "Searching arXiv");

        let resp = self
            .client
            .get(&self.base_url)
            .query(&[
                ("search_query", search_query.as_str()),
                ("start", "0"),
                ("max_results", &max_results.to_string()),
                ("sortBy", "submittedDate"),
                ("sortOrder", "descending"),
            ])
            .send()
            .await
            .map_err(|e| FeedError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(FeedError::Status(resp.status()));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| FeedError::Request(e.to_string()))?;

        let papers = parse_feed(&body)?;
        tracing::info!(count = papers.len(), "Found papers");
        Ok(papers)
    }

    /// Search across multiple topics, deduplicate by paper id, and sort
    /// the merged list by publish date descending.
    ///
    /// Per-topic failures are logged and skipped; the sweep itself never
    /// fails.
    pub async fn search_topics(
        &self,
        topics: &[String],
        max_results_per_topic: usize,
        days_back: u32,
        categories: &[String],
        end_date: Option<NaiveDate>,
    ) -> Vec<Paper> {
        let mut by_id: HashMap<String, Paper> = HashMap::new();

        for topic in topics {
            match self
                .search(topic, max_results_per_topic, days_back, categories, end_date)
                .await
            {
                Ok(papers) => {
                    for paper in papers {
                        by_id.insert(paper.id.clone(), paper);
                    }
                }
                Err(e) => {
                    tracing::error!(topic, error = %e, "Topic search failed, skipping");
                }
            }
        }

        let papers = dedup_sorted(by_id);
        tracing::info!(
            count = papers.len(),
            topics = topics.len(),
            "Unique papers across topics"
        );
        papers
    }
}

impl Default for ArxivClient {
    fn default() -> Self {
        Self::new()
    }
}

// ── Query building ──────────────────────────────────────────────────

/// Build the arXiv search expression: topic terms AND a submitted-date
/// window AND an OR'd category filter.
fn build_search_query(
    query: &str,
    days_back: u32,
    categories: &[String],
    end_date: Option<NaiveDate>,
) -> String {
    let end = end_date
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or_else(Utc::now);
    let start = end - TimeDelta::days(i64::from(days_back));

    let date_range = format!(
        "[{}* TO {}*]",
        start.format("%Y%m%d"),
        end.format("%Y%m%d")
    );

    let mut parts = vec![format!("({query})"), format!("submittedDate:{date_range}")];

    if !categories.is_empty() {
        let category_query = categories
            .iter()
            .map(|c| format!("cat:{c}"))
            .collect::<Vec<_>>()
            .join(" OR ");
        parts.push(format!("({category_query})"));
    }

    parts.join(" AND ")
}

// ── Feed parsing ────────────────────────────────────────────────────

/// Parse an Atom response body into papers. Malformed entries are logged
/// and skipped.
fn parse_feed(body: &str) -> Result<Vec<Paper>, FeedError> {
    let feed = feed_rs::parser::parse(body.as_bytes())
        .map_err(|e| FeedError::Parse(e.to_string()))?;

    let mut papers = Vec::with_capacity(feed.entries.len());
    for entry in feed.entries {
        match parse_entry(entry) {
            Some(paper) => papers.push(paper),
            None => tracing::warn!("Skipping malformed feed entry"),
        }
    }
    Ok(papers)
}

fn parse_entry(entry: feed_rs::model::Entry) -> Option<Paper> {
    let id = entry
        .id
        .rsplit('/')
        .next()
        .unwrap_or(entry.id.as_str())
        .to_string();

    let title = entry.title.as_ref()?.content.trim().to_string();
    let summary = entry
        .summary
        .as_ref()?
        .content
        .trim()
        .replace('\n', " ");

    let published = entry.published?;
    let updated = entry.updated.unwrap_or(published);

    let link = entry
        .links
        .first()
        .map(|l| l.href.clone())
        .unwrap_or_else(|| entry.id.clone());

    let authors = entry
        .authors
        .iter()
        .map(|a| a.name.clone())
        .collect();

    let categories = entry
        .categories
        .iter()
        .map(|c| c.term.clone())
        .collect();

    Some(Paper {
        id,
        title,
        summary,
        authors,
        published,
        updated,
        link,
        categories,
    })
}

/// Collapse the id-keyed map into a list sorted by publish date, newest
/// first.
fn dedup_sorted(by_id: HashMap<String, Paper>) -> Vec<Paper> {
    let mut papers: Vec<Paper> = by_id.into_values().collect();
    papers.sort_by(|a, b| b.published.cmp(&a.published));
    papers
}

// ── Tests ───────────────────────────────────────────────────────────
