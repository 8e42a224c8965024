//! Adaptive Card rendering and payload fitting for the Teams channel.
//!
//! Teams webhooks reject payloads over a hard ceiling, so the digest card
//! is built for the largest prefix of the ranked papers that still fits.
//! Rendering is a pure function of its inputs (the footer timestamp is
//! injected), sizing measures the exact bytes that go on the wire, and the
//! prefix length is found by bisection — `O(log n)` render+measure calls
//! instead of a linear scan.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};

use crate::model::NotificationItem;

/// Provider hard ceiling for a single webhook payload.
pub const TEAMS_HARD_LIMIT_BYTES: usize = 28 * 1024;

/// Limit the digest asserts against — reserves a 1 KiB safety margin
/// below the provider ceiling.
pub const PAYLOAD_LIMIT_BYTES: usize = TEAMS_HARD_LIMIT_BYTES - 1024;

/// Scores at or above this render the "high relevance" indicator.
pub const HIGH_RELEVANCE_CUTOFF: f32 = 0.8;

/// How many key topics a paper block shows.
const KEY_TOPICS_SHOWN: usize = 3;

const ADAPTIVE_CARD_SCHEMA: &str = "http://adaptivecards.io/schemas/adaptive-card.json";
const ADAPTIVE_CARD_VERSION: &str = "1.2";

// ── Envelope ────────────────────────────────────────────────────────

/// The wire-level message wrapping a rendered card.
///
/// This is the artifact whose serialized byte size is measured against the
/// payload limit; `measure` and the webhook POST serialize it identically.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardEnvelope {
    #[serde(rename = "type")]
    kind: &'static str,
    attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Attachment {
    #[serde(rename = "contentType")]
    content_type: &'static str,
    content: Value,
}

impl CardEnvelope {
    fn wrap(card: Value) -> Self {
        Self {
            kind: "message",
            attachments: vec![Attachment {
                content_type: "application/vnd.microsoft.card.adaptive",
                content: card,
            }],
        }
    }
}

// ── Renderer ────────────────────────────────────────────────────────

/// Render a digest card for `items`.
///
/// `true_total` is the full count of relevant papers; when it exceeds
/// `items.len()` the header states both numbers so a reader knows the
/// digest was truncated. `generated_at` stamps the footer — callers pass
/// one timestamp for a whole dispatch so probes and the final render are
/// byte-identical for equal inputs.
pub fn render(
    items: &[NotificationItem],
    topics: &[String],
    true_total: usize,
    generated_at: DateTime<Utc>,
) -> CardEnvelope {
    let headline = if true_total > items.len() {
        format!(
            "Showing {} of {} New Relevant Papers",
            items.len(),
            true_total
        )
    } else {
        format!("{} New Relevant Papers", items.len())
    };

    let mut body = vec![json!({
        "type": "Container",
        "style": "emphasis",
        "items": [
            {
                "type": "TextBlock",
                "text": headline,
                "weight": "bolder",
                "size": "large",
                "wrap": true,
            },
            {
                "type": "TextBlock",
                "text": format!("Research Topics: {}", topics.join(", ")),
                "wrap": true,
                "spacing": "small",
            },
            {
                "type": "TextBlock",
                "text": format!("Date: {}", generated_at.format("%Y-%m-%d")),
                "size": "small",
                "color": "accent",
                "spacing": "none",
            },
        ],
    })];

    for item in items {
        body.push(paper_block(item));
    }

    body.push(json!({
        "type": "TextBlock",
        "text": format!(
            "Generated by Paper Digest • {}",
            generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        "size": "small",
        "color": "accent",
        "horizontalAlignment": "center",
        "spacing": "medium",
        "separator": true,
    }));

    CardEnvelope::wrap(json!({
        "type": "AdaptiveCard",
        "$schema": ADAPTIVE_CARD_SCHEMA,
        "version": ADAPTIVE_CARD_VERSION,
        "body": body,
    }))
}

/// One paper as a card container: title+link, all authors, the full
/// translated abstract, and a fact set with score, date, and key topics.
fn paper_block(item: &NotificationItem) -> Value {
    let paper = &item.paper;
    let relevance = &item.relevance;

    let indicator = if relevance.relevance_score >= HIGH_RELEVANCE_CUTOFF {
        "🟢"
    } else {
        "🟡"
    };

    let key_topics = relevance
        .key_topics
        .iter()
        .take(KEY_TOPICS_SHOWN)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");

    json!({
        "type": "Container",
        "separator": true,
        "spacing": "medium",
        "items": [
            {
                "type": "TextBlock",
                "text": format!("{indicator} [{}]({})", paper.title, paper.link),
                "weight": "bolder",
                "wrap": true,
            },
            {
                "type": "TextBlock",
                "text": format!("**Authors:** {}", paper.authors.join(", ")),
                "wrap": true,
                "size": "small",
                "spacing": "small",
            },
            {
                "type": "TextBlock",
                "text": item.translated_summary,
                "wrap": true,
                "spacing": "small",
            },
            {
                "type": "FactSet",
                "facts": [
                    {
                        "title": "Relevance",
                        "value": format!("{:.1}/1.0", relevance.relevance_score),
                    },
                    {
                        "title": "Published",
                        "value": paper.published.format("%Y-%m-%d").to_string(),
                    },
                    {
                        "title": "Topics",
                        "value": key_topics,
                    },
                ],
                "spacing": "small",
            },
        ],
    })
}

/// Render an attention-styled card describing a failed run.
pub fn render_error(message: &str, generated_at: DateTime<Utc>) -> CardEnvelope {
    CardEnvelope::wrap(json!({
        "type": "AdaptiveCard",
        "$schema": ADAPTIVE_CARD_SCHEMA,
        "version": ADAPTIVE_CARD_VERSION,
        "body": [
            {
                "type": "Container",
                "style": "attention",
                "items": [
                    {
                        "type": "TextBlock",
                        "text": "⚠️ Paper Digest - Error",
                        "weight": "bolder",
                        "size": "large",
                        "wrap": true,
                    },
                ],
            },
            {
                "type": "TextBlock",
                "text": "The paper digest agent encountered an error during its last run:",
                "wrap": true,
                "spacing": "medium",
            },
            {
                "type": "TextBlock",
                "text": message,
                "wrap": true,
                "fontType": "monospace",
                "spacing": "small",
            },
            {
                "type": "TextBlock",
                "text": format!("Time: {}", generated_at.format("%Y-%m-%d %H:%M:%S UTC")),
                "size": "small",
                "color": "accent",
                "spacing": "medium",
            },
        ],
    }))
}

// ── Sizer ───────────────────────────────────────────────────────────

/// Byte length of the envelope exactly as transmitted (UTF-8 JSON).
///
/// Byte length, not char count: non-ASCII topic names, emoji indicators,
/// and translated abstracts inflate bytes disproportionately to chars.
/// A serialization failure counts as oversize.
pub fn measure(envelope: &CardEnvelope) -> usize {
    serde_json::to_vec(envelope)
        .map(|bytes| bytes.len())
        .unwrap_or(usize::MAX)
}

// ── Optimal-count search ────────────────────────────────────────────

/// Largest `k` in `[0, items.len()]` such that the rendered envelope for
/// the prefix `items[..k]` fits within `limit_bytes`.
///
/// Bisection over prefix lengths: `lo` is always a known-fitting count
/// (`k = 0` always fits — an empty card is far under any sane limit) and
/// `hi` a known-not-fitting sentinel. Requires rendered size to be
/// monotonically non-decreasing in `k`.
///
/// Never fails: an empty list returns 0 without a probe, and a single
/// paper exceeding the limit degrades to 0 rather than erroring.
pub fn find_max_fitting_count(
    items: &[NotificationItem],
    topics: &[String],
    limit_bytes: usize,
    generated_at: DateTime<Utc>,
) -> usize {
    if items.is_empty() {
        return 0;
    }

    debug_assert!(
        items
            .windows(2)
            .all(|w| w[0].relevance.relevance_score >= w[1].relevance.relevance_score),
        "items must be sorted by descending relevance"
    );

    let mut lo = 0;
    let mut hi = items.len() + 1;

    while hi - lo > 1 {
        let mid = (lo + hi) / 2;
        let size = measure(&render(&items[..mid], topics, items.len(), generated_at));
        if size <= limit_bytes {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    lo
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Paper, PaperRelevance};
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 9, 30, 0).unwrap()
    }

    fn topics() -> Vec<String> {
        vec!["electricity market".into(), "grid economics".into()]
    }

    fn item(id: usize, score: f32, summary: &str) -> NotificationItem {
        NotificationItem {
            paper: Paper {
                id: format!("2501.{id:05}v1"),
                title: format!("Paper {id} on market clearing"),
                summary: summary.to_string(),
                authors: vec!["Ada Lovelace".into(), "Grace Hopper".into()],
                published: Utc.with_ymd_and_hms(2025, 5, 28, 12, 0, 0).unwrap(),
                updated: Utc.with_ymd_and_hms(2025, 5, 29, 12, 0, 0).unwrap(),
                link: format!("http://arxiv.org/abs/2501.{id:05}v1"),
                categories: vec!["econ.EM".into()],
            },
            relevance: PaperRelevance {
                relevance_score: score,
                relevance_reason: "close topical match".into(),
                key_topics: vec![
                    "markets".into(),
                    "pricing".into(),
                    "grids".into(),
                    "auctions".into(),
                ],
                is_relevant: true,
            },
            translated_summary: summary.to_string(),
        }
    }

    fn ranked_items(n: usize, summary: &str) -> Vec<NotificationItem> {
        (0..n)
            .map(|i| item(i, 0.95 - i as f32 * 0.01, summary))
            .collect()
    }

    // ── Renderer ────────────────────────────────────────────────────

    #[test]
    fn render_is_deterministic() {
        let items = ranked_items(3, "Short abstract.");
        let a = render(&items, &topics(), 3, fixed_time());
        let b = render(&items, &topics(), 3, fixed_time());
        assert_eq!(
            serde_json::to_vec(&a).unwrap(),
            serde_json::to_vec(&b).unwrap()
        );
    }

    #[test]
    fn render_accepts_empty_items() {
        let envelope = render(&[], &topics(), 0, fixed_time());
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("0 New Relevant Papers"));
        assert!(json.contains("Generated by Paper Digest"));
    }

    #[test]
    fn header_states_subset_when_truncated() {
        let items = ranked_items(2, "Short abstract.");
        let envelope = render(&items, &topics(), 7, fixed_time());
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("Showing 2 of 7 New Relevant Papers"));
    }

    #[test]
    fn header_omits_total_when_complete() {
        let items = ranked_items(4, "Short abstract.");
        let envelope = render(&items, &topics(), 4, fixed_time());
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("4 New Relevant Papers"));
        assert!(!json.contains("Showing"));
    }

    #[test]
    fn paper_block_joins_all_authors() {
        let mut one = item(1, 0.9, "Short abstract.");
        one.paper.authors = (0..8).map(|i| format!("Author {i}")).collect();
        let json = serde_json::to_string(&render(&[one], &topics(), 1, fixed_time())).unwrap();
        for i in 0..8 {
            assert!(json.contains(&format!("Author {i}")), "missing author {i}");
        }
        assert!(!json.contains("more)"));
    }

    #[test]
    fn paper_block_caps_key_topics_at_three() {
        let one = item(1, 0.9, "Short abstract.");
        let json = serde_json::to_string(&render(&[one], &topics(), 1, fixed_time())).unwrap();
        assert!(json.contains("markets, pricing, grids"));
        assert!(!json.contains("auctions"));
    }

    #[test]
    fn relevance_indicator_uses_cutoff() {
        let high = item(1, 0.8, "Short abstract.");
        let medium = item(2, 0.79, "Short abstract.");
        let json_high =
            serde_json::to_string(&render(&[high], &topics(), 1, fixed_time())).unwrap();
        let json_medium =
            serde_json::to_string(&render(&[medium], &topics(), 1, fixed_time())).unwrap();
        assert!(json_high.contains("🟢"));
        assert!(json_medium.contains("🟡"));
        assert!(!json_medium.contains("🟢"));
    }

    #[test]
    fn error_card_carries_message_and_timestamp() {
        let envelope = render_error("search failed: timeout", fixed_time());
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("search failed: timeout"));
        assert!(json.contains("2025-06-02 09:30:00 UTC"));
        assert!(json.contains("attention"));
    }

    // ── Sizer ───────────────────────────────────────────────────────

    #[test]
    fn measure_counts_bytes_not_chars() {
        let ascii = item(1, 0.9, &"a".repeat(200));
        let japanese = item(1, 0.9, &"電".repeat(200));
        let ascii_size = measure(&render(&[ascii], &topics(), 1, fixed_time()));
        let japanese_size = measure(&render(&[japanese], &topics(), 1, fixed_time()));
        // Same char count, but each CJK char is 3 UTF-8 bytes.
        assert!(japanese_size >= ascii_size + 2 * 200);
    }

    #[test]
    fn measure_matches_wire_serialization() {
        let items = ranked_items(2, "Short abstract.");
        let envelope = render(&items, &topics(), 2, fixed_time());
        assert_eq!(
            measure(&envelope),
            serde_json::to_vec(&envelope).unwrap().len()
        );
    }

    // ── Optimal-count search ────────────────────────────────────────

    #[test]
    fn empty_items_returns_zero() {
        assert_eq!(find_max_fitting_count(&[], &topics(), 0, fixed_time()), 0);
        assert_eq!(
            find_max_fitting_count(&[], &topics(), PAYLOAD_LIMIT_BYTES, fixed_time()),
            0
        );
    }

    #[test]
    fn all_items_fit_under_generous_limit() {
        let items = ranked_items(5, "Short abstract.");
        let k = find_max_fitting_count(&items, &topics(), 1 << 20, fixed_time());
        assert_eq!(k, 5);
    }

    #[test]
    fn single_oversized_paper_degrades_to_zero() {
        let items = vec![item(1, 0.9, &"a".repeat(2 * PAYLOAD_LIMIT_BYTES))];
        let k = find_max_fitting_count(&items, &topics(), PAYLOAD_LIMIT_BYTES, fixed_time());
        assert_eq!(k, 0);
        // The zero-prefix envelope is still valid and deliverable.
        let envelope = render(&items[..0], &topics(), items.len(), fixed_time());
        assert!(measure(&envelope) <= PAYLOAD_LIMIT_BYTES);
    }

    #[test]
    fn prefix_sizes_are_monotonic() {
        // The bisection's precondition — if a schema change ever breaks
        // this, the search can silently return a non-maximal count.
        let items = ranked_items(10, &"a".repeat(400));
        let sizes: Vec<usize> = (0..=items.len())
            .map(|k| measure(&render(&items[..k], &topics(), items.len(), fixed_time())))
            .collect();
        assert!(
            sizes.windows(2).all(|w| w[0] <= w[1]),
            "rendered size must be non-decreasing in item count: {sizes:?}"
        );
    }

    #[test]
    fn bisection_matches_linear_scan() {
        let items = ranked_items(12, &"a".repeat(700));
        for limit in [0, 500, 2_000, 5_000, 9_000, 27_648, 1 << 20] {
            let expected = (0..=items.len())
                .filter(|&k| {
                    measure(&render(&items[..k], &topics(), items.len(), fixed_time())) <= limit
                })
                .max()
                .unwrap_or(0);
            let got = find_max_fitting_count(&items, &topics(), limit, fixed_time());
            assert_eq!(got, expected, "limit {limit}");
        }
    }

    #[test]
    fn ten_papers_around_three_kib_each() {
        // Each paper renders to roughly 3 KiB alone; with the 27 KiB limit
        // the fitting prefix lands around 8-9 papers.
        let items = ranked_items(10, &"a".repeat(2600));
        let limit = PAYLOAD_LIMIT_BYTES;
        let k = find_max_fitting_count(&items, &topics(), limit, fixed_time());

        assert!((7..=9).contains(&k), "expected k around 8-9, got {k}");
        let fit = measure(&render(&items[..k], &topics(), items.len(), fixed_time()));
        assert!(fit <= limit);
        let over = measure(&render(&items[..k + 1], &topics(), items.len(), fixed_time()));
        assert!(over > limit);
    }

    #[test]
    fn maximality_property_holds_for_varied_sizes() {
        // Uneven abstracts — the returned k must fit and k+1 must not.
        let items: Vec<_> = (0..8)
            .map(|i| item(i, 0.9 - i as f32 * 0.01, &"x".repeat(300 + i * 450)))
            .collect();
        let limit = 8_000;
        let k = find_max_fitting_count(&items, &topics(), limit, fixed_time());
        let fit = measure(&render(&items[..k], &topics(), items.len(), fixed_time()));
        assert!(fit <= limit);
        if k < items.len() {
            let over = measure(&render(&items[..k + 1], &topics(), items.len(), fixed_time()));
            assert!(over > limit);
        }
    }
}
