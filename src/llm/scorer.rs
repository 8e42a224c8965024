//! Relevance scoring — LLM evaluation of papers against research topics.

use std::sync::Arc;

use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::model::{Paper, PaperRelevance};

/// Max tokens for an evaluation call (kept tight — runs on every paper).
const EVALUATION_MAX_TOKENS: u32 = 500;

/// Temperature for evaluation (deterministic-ish).
const EVALUATION_TEMPERATURE: f32 = 0.1;

const SYSTEM_PROMPT: &str =
    "You are a research assistant evaluating academic papers for relevance \
     to specific research topics.";

/// Scores papers against the configured research topics.
///
/// Evaluation never fails: provider errors degrade to a low-confidence,
/// non-relevant default so one bad call can't sink a digest run.
pub struct RelevanceScorer {
    llm: Arc<dyn LlmProvider>,
}

impl RelevanceScorer {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Evaluate how relevant a paper is to the research topics.
    pub async fn evaluate(
        &self,
        paper: &Paper,
        topics: &[String],
        threshold: f32,
    ) -> PaperRelevance {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_evaluation_prompt(paper, topics)),
        ])
        .with_temperature(EVALUATION_TEMPERATURE)
        .with_max_tokens(EVALUATION_MAX_TOKENS);

        match self.llm.complete(request).await {
            Ok(response) => {
                let relevance = parse_evaluation(&response.content, threshold);
                tracing::info!(
                    paper_id = %paper.id,
                    score = relevance.relevance_score,
                    relevant = relevance.is_relevant,
                    "Evaluated paper"
                );
                relevance
            }
            Err(e) => {
                tracing::error!(paper_id = %paper.id, error = %e, "Relevance evaluation failed");
                PaperRelevance::degraded("Error during evaluation")
            }
        }
    }

    /// Evaluate a batch of papers, sorted by descending score.
    pub async fn evaluate_all(
        &self,
        papers: Vec<Paper>,
        topics: &[String],
        threshold: f32,
    ) -> Vec<(Paper, PaperRelevance)> {
        let mut results = Vec::with_capacity(papers.len());
        for paper in papers {
            let relevance = self.evaluate(&paper, topics, threshold).await;
            results.push((paper, relevance));
        }

        results.sort_by(|a, b| {
            b.1.relevance_score
                .partial_cmp(&a.1.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let relevant = results.iter().filter(|(_, r)| r.is_relevant).count();
        tracing::info!(
            evaluated = results.len(),
            relevant,
            "Relevance evaluation complete"
        );
        results
    }
}

/// Prompt asking for a strict-JSON relevance assessment.
fn build_evaluation_prompt(paper: &Paper, topics: &[String]) -> String {
    let topics_str = topics.join(", ");
    format!(
        "Research Topics of Interest: {topics_str}\n\
         \n\
         Paper Details:\n\
         Title: {title}\n\
         Abstract: {summary}\n\
         Categories: {categories}\n\
         \n\
         Evaluate this paper's relevance to the research topics and respond \
         in the following JSON format:\n\
         \n\
         {{\n\
         \x20   \"relevance_score\": <float between 0.0 and 1.0>,\n\
         \x20   \"relevance_reason\": \"<explanation of why this score was assigned>\",\n\
         \x20   \"key_topics\": [\"<topic1>\", \"<topic2>\", ...],\n\
         \x20   \"is_highly_relevant\": <true/false>\n\
         }}\n\
         \n\
         Scoring Guidelines:\n\
         - 0.9-1.0: Directly addresses the research topics as primary focus\n\
         - 0.7-0.8: Strong relevance, covers important aspects of the topics\n\
         - 0.5-0.6: Moderate relevance, some connection to the topics\n\
         - 0.3-0.4: Weak relevance, tangential connection\n\
         - 0.0-0.2: Little to no relevance\n\
         \n\
         Respond only with the JSON object, no additional text.",
        title = paper.title,
        summary = paper.summary,
        categories = paper.categories.join(", "),
    )
}

/// Parse the model's JSON evaluation.
///
/// Code fences are stripped before parsing. When the response is not
/// valid JSON, a keyword heuristic produces a coarse score instead of
/// failing. The model's explicit `is_highly_relevant` flag wins over the
/// threshold-derived one when present.
fn parse_evaluation(raw: &str, threshold: f32) -> PaperRelevance {
    let cleaned = strip_code_fences(raw);

    match serde_json::from_str::<serde_json::Value>(cleaned) {
        Ok(data) => {
            let relevance_score = data
                .get("relevance_score")
                .and_then(serde_json::Value::as_f64)
                .unwrap_or(0.0)
                .clamp(0.0, 1.0) as f32;

            let is_relevant = data
                .get("is_highly_relevant")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(relevance_score >= threshold);

            let relevance_reason = data
                .get("relevance_reason")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string();

            let key_topics = data
                .get("key_topics")
                .and_then(serde_json::Value::as_array)
                .map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default();

            PaperRelevance {
                relevance_score,
                relevance_reason,
                key_topics,
                is_relevant,
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to parse evaluation JSON, using keyword fallback");
            let lower = cleaned.to_lowercase();
            let score = if lower.contains("high") || lower.contains("relevant") {
                0.7
            } else if lower.contains("moderate") {
                0.5
            } else {
                0.1
            };
            PaperRelevance {
                relevance_score: score,
                relevance_reason: "Fallback evaluation after parse failure".into(),
                key_topics: Vec::new(),
                is_relevant: score >= threshold,
            }
        }
    }
}

/// Strip a Markdown code fence, with or without a language tag.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_prefix = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_prefix
        .strip_suffix("```")
        .unwrap_or(without_prefix)
        .trim()
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn paper() -> Paper {
        Paper {
            id: "2506.00001v1".into(),
            title: "Storage Bidding in Day-Ahead Markets".into(),
            summary: "We analyze bidding strategies.".into(),
            authors: vec!["A. Author".into()],
            published: Utc::now(),
            updated: Utc::now(),
            link: "http://arxiv.org/abs/2506.00001v1".into(),
            categories: vec!["econ.EM".into()],
        }
    }

    #[test]
    fn prompt_includes_topics_and_paper_details() {
        let topics = vec!["electricity market".to_string()];
        let prompt = build_evaluation_prompt(&paper(), &topics);
        assert!(prompt.contains("electricity market"));
        assert!(prompt.contains("Storage Bidding in Day-Ahead Markets"));
        assert!(prompt.contains("relevance_score"));
        assert!(prompt.contains("econ.EM"));
    }

    #[test]
    fn parses_clean_json() {
        let raw = r#"{
            "relevance_score": 0.85,
            "relevance_reason": "directly about market bidding",
            "key_topics": ["bidding", "storage"],
            "is_highly_relevant": true
        }"#;
        let relevance = parse_evaluation(raw, 0.7);
        assert!((relevance.relevance_score - 0.85).abs() < 1e-6);
        assert!(relevance.is_relevant);
        assert_eq!(relevance.key_topics, vec!["bidding", "storage"]);
        assert_eq!(relevance.relevance_reason, "directly about market bidding");
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "```json\n{\"relevance_score\": 0.4, \"relevance_reason\": \"weak\", \"key_topics\": []}\n```";
        let relevance = parse_evaluation(raw, 0.7);
        assert!((relevance.relevance_score - 0.4).abs() < 1e-6);
        assert!(!relevance.is_relevant);
    }

    #[test]
    fn explicit_flag_wins_over_threshold() {
        // The model can mark a paper relevant even below the naive
        // threshold; both sources are authoritative.
        let raw = r#"{"relevance_score": 0.6, "is_highly_relevant": true}"#;
        let relevance = parse_evaluation(raw, 0.7);
        assert!(relevance.is_relevant);

        let raw = r#"{"relevance_score": 0.9, "is_highly_relevant": false}"#;
        let relevance = parse_evaluation(raw, 0.7);
        assert!(!relevance.is_relevant);
    }

    #[test]
    fn missing_flag_falls_back_to_threshold() {
        let raw = r#"{"relevance_score": 0.75}"#;
        let relevance = parse_evaluation(raw, 0.7);
        assert!(relevance.is_relevant);

        let relevance = parse_evaluation(raw, 0.8);
        assert!(!relevance.is_relevant);
    }

    #[test]
    fn score_is_clamped_to_unit_interval() {
        let raw = r#"{"relevance_score": 3.2}"#;
        let relevance = parse_evaluation(raw, 0.7);
        assert_eq!(relevance.relevance_score, 1.0);
    }

    #[test]
    fn garbage_uses_keyword_fallback() {
        let relevance = parse_evaluation("This paper is highly relevant to your topics.", 0.7);
        assert!((relevance.relevance_score - 0.7).abs() < 1e-6);
        assert!(relevance.is_relevant);

        let relevance = parse_evaluation("moderate overlap at best", 0.7);
        assert!((relevance.relevance_score - 0.5).abs() < 1e-6);
        assert!(!relevance.is_relevant);

        let relevance = parse_evaluation("no connection whatsoever", 0.7);
        assert!((relevance.relevance_score - 0.1).abs() < 1e-6);
        assert!(!relevance.is_relevant);
    }

    #[test]
    fn strip_code_fences_variants() {
        assert_eq!(strip_code_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {} "), "{}");
    }
}
