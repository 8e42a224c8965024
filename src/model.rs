//! Shared types for the digest pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Paper ───────────────────────────────────────────────────────────

/// A paper from the academic feed.
///
/// The feed client converts raw Atom entries into this struct. Immutable
/// once constructed — the pipeline never edits a paper in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paper {
    /// Stable feed identifier (e.g. "2501.01234v1").
    pub id: String,
    /// Paper title.
    pub title: String,
    /// Abstract text, newlines collapsed.
    pub summary: String,
    /// Author names, in feed order. May be empty.
    pub authors: Vec<String>,
    /// Submission timestamp.
    pub published: DateTime<Utc>,
    /// Last update timestamp.
    pub updated: DateTime<Utc>,
    /// Canonical URL for the paper.
    pub link: String,
    /// Category tags (e.g. "cs.LG"). Order not significant.
    pub categories: Vec<String>,
}

// ── Relevance ───────────────────────────────────────────────────────

/// LLM relevance evaluation for a single paper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperRelevance {
    /// Score in [0.0, 1.0].
    pub relevance_score: f32,
    /// Free-text explanation of the score.
    pub relevance_reason: String,
    /// Key topics the model identified. May be empty.
    pub key_topics: Vec<String>,
    /// Whether the paper clears the relevance bar. Comes from the model's
    /// explicit flag when present, otherwise from thresholding the score;
    /// the two can disagree and the model's flag wins.
    pub is_relevant: bool,
}

impl PaperRelevance {
    /// Low-confidence default used when evaluation fails outright.
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            relevance_score: 0.1,
            relevance_reason: reason.into(),
            key_topics: Vec::new(),
            is_relevant: false,
        }
    }
}

// ── Notification item ───────────────────────────────────────────────

/// The unit the notification renderers consume.
///
/// The translated abstract is computed once per paper per run and shared
/// by every channel, so a digest never triggers duplicate translation
/// calls. Lists of items are pre-sorted by descending relevance; renderers
/// and the fitting search preserve that order.
#[derive(Debug, Clone)]
pub struct NotificationItem {
    pub paper: Paper,
    pub relevance: PaperRelevance,
    /// Translated abstract. Falls back to the original `paper.summary`
    /// when translation fails or is a no-op for the source language.
    pub translated_summary: String,
}

impl NotificationItem {
    pub fn new(paper: Paper, relevance: PaperRelevance, translated_summary: String) -> Self {
        Self {
            paper,
            relevance,
            translated_summary,
        }
    }
}
