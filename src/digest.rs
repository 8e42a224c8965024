//! Digest pipeline — one scheduled run from search to notification.
//!
//! Flow:
//! 1. Search every research topic (deduped, newest first)
//! 2. Drop papers already seen in a previous run
//! 3. LLM relevance evaluation, ranked by descending score
//! 4. Mark all new ids as seen
//! 5. Translate each kept abstract once
//! 6. Fan the same items out to every configured notifier

use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::config::DigestConfig;
use crate::error::{Error, NotifyError, Result};
use crate::feed::ArxivClient;
use crate::llm::RelevanceScorer;
use crate::model::{NotificationItem, Paper, PaperRelevance};
use crate::notify::Notifier;
use crate::store::SeenStore;
use crate::translate::Translator;

/// Outcome of a single digest run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub total_papers: usize,
    pub new_papers: usize,
    pub relevant_papers: usize,
    pub notified: bool,
    pub elapsed_secs: f64,
}

/// Orchestrates a digest run over its collaborators.
pub struct DigestPipeline {
    config: DigestConfig,
    feed: ArxivClient,
    store: Arc<dyn SeenStore>,
    scorer: RelevanceScorer,
    translator: Arc<dyn Translator>,
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl DigestPipeline {
    pub fn new(
        config: DigestConfig,
        feed: ArxivClient,
        store: Arc<dyn SeenStore>,
        scorer: RelevanceScorer,
        translator: Arc<dyn Translator>,
        notifiers: Vec<Arc<dyn Notifier>>,
    ) -> Self {
        Self {
            config,
            feed,
            store,
            scorer,
            translator,
            notifiers,
        }
    }

    /// Run the full pipeline once.
    pub async fn run(&self) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let started = Instant::now();

        tracing::info!(%run_id, topics = ?self.config.research_topics, "Starting digest run");

        let papers = self
            .feed
            .search_topics(
                &self.config.research_topics,
                self.config.max_results_per_topic,
                self.config.days_back,
                &self.config.arxiv_categories,
                self.config.end_date,
            )
            .await;

        if papers.is_empty() {
            tracing::info!(%run_id, "No papers found");
            return Ok(summary(run_id, started, 0, 0, 0, false));
        }
        let total_papers = papers.len();

        let new_papers = self.store.filter_new(papers).await?;
        if new_papers.is_empty() {
            tracing::info!(%run_id, "No new papers to process");
            return Ok(summary(run_id, started, total_papers, 0, 0, false));
        }
        let new_count = new_papers.len();
        let new_ids: Vec<String> = new_papers.iter().map(|p| p.id.clone()).collect();

        let evaluated = self
            .scorer
            .evaluate_all(
                new_papers,
                &self.config.research_topics,
                self.config.relevance_threshold,
            )
            .await;

        let relevant: Vec<(Paper, PaperRelevance)> = evaluated
            .into_iter()
            .filter(|(_, relevance)| relevance.is_relevant)
            .take(self.config.max_papers_per_digest)
            .collect();
        let relevant_count = relevant.len();
        tracing::info!(%run_id, relevant = relevant_count, "Relevant papers selected");

        // Record every new id — including non-relevant ones — so the next
        // run doesn't re-evaluate them.
        self.store.mark_seen(&new_ids).await?;
        self.store.prune(self.config.seen_retention_days).await?;

        let items = self.build_items(relevant).await;

        let delivered = self.notify_all(&items).await;
        if !delivered {
            return Err(Error::Notify(NotifyError::DeliveryFailed {
                channel: "digest".into(),
            }));
        }

        let run = summary(
            run_id,
            started,
            total_papers,
            new_count,
            relevant_count,
            relevant_count > 0,
        );
        tracing::info!(
            %run_id,
            total_papers = run.total_papers,
            new_papers = run.new_papers,
            relevant_papers = run.relevant_papers,
            elapsed_secs = run.elapsed_secs,
            notified = run.notified,
            "PROCESSING_SUMMARY"
        );
        Ok(run)
    }

    /// Translate each kept abstract once and assemble notification items.
    ///
    /// Rank order is preserved; every channel reuses these items, so a
    /// digest triggers at most one translation call per paper.
    async fn build_items(&self, ranked: Vec<(Paper, PaperRelevance)>) -> Vec<NotificationItem> {
        let mut items = Vec::with_capacity(ranked.len());
        for (paper, relevance) in ranked {
            let translated_summary = self.translator.translate(&paper.summary).await;
            items.push(NotificationItem::new(paper, relevance, translated_summary));
        }
        items
    }

    /// Deliver the digest on every channel. Empty digests are a successful
    /// no-op on each notifier. Returns false if any channel fails.
    async fn notify_all(&self, items: &[NotificationItem]) -> bool {
        let mut all_ok = true;
        for notifier in &self.notifiers {
            let ok = notifier
                .send_digest(items, &self.config.research_topics)
                .await;
            if !ok {
                tracing::error!(channel = notifier.name(), "Digest delivery failed");
                all_ok = false;
            }
        }
        all_ok
    }

    /// Send an error notification on every channel (best effort).
    pub async fn notify_error(&self, message: &str) {
        for notifier in &self.notifiers {
            if !notifier.send_error(message).await {
                tracing::warn!(
                    channel = notifier.name(),
                    "Failed to deliver error notification"
                );
            }
        }
    }

}

fn summary(
    run_id: Uuid,
    started: Instant,
    total_papers: usize,
    new_papers: usize,
    relevant_papers: usize,
    notified: bool,
) -> RunSummary {
    RunSummary {
        run_id,
        total_papers,
        new_papers,
        relevant_papers,
        notified,
        elapsed_secs: started.elapsed().as_secs_f64(),
    }
}

// ── Tests ───────────────────────────────────────────────────────────
