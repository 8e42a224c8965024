//! Integration test for the card-fitting pipeline over realistic,
//! multi-byte digest content.

use chrono::{DateTime, TimeZone, Utc};
use paper_digest::model::{NotificationItem, Paper, PaperRelevance};
use paper_digest::notify::card;

fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 7, 0, 0).unwrap()
}

fn topics() -> Vec<String> {
    vec!["電力市場".to_string(), "energy market design".to_string()]
}

/// A digest item with a translated Japanese abstract — three UTF-8 bytes
/// per character, which is what the payload sizer has to get right.
fn item(id: usize, score: f32, abstract_chars: usize) -> NotificationItem {
    let paper = Paper {
        id: format!("2506.{id:05}v1"),
        title: format!("Equilibrium Analysis of Balancing Markets, Part {id}"),
        summary: "We develop an equilibrium model of balancing markets.".into(),
        authors: vec![
            "Hana Sato".into(),
            "Kenji Tanaka".into(),
            "María García".into(),
        ],
        published: Utc.with_ymd_and_hms(2025, 5, 29, 18, 0, 0).unwrap(),
        updated: Utc.with_ymd_and_hms(2025, 5, 30, 6, 0, 0).unwrap(),
        link: format!("http://arxiv.org/abs/2506.{id:05}v1"),
        categories: vec!["econ.EM".into(), "eess.SY".into()],
    };
    NotificationItem {
        translated_summary: "需".repeat(abstract_chars),
        relevance: PaperRelevance {
            relevance_score: score,
            relevance_reason: "addresses balancing market design".into(),
            key_topics: vec!["balancing".into(), "equilibrium".into()],
            is_relevant: true,
        },
        paper,
    }
}

fn ranked(n: usize, abstract_chars: usize) -> Vec<NotificationItem> {
    (0..n)
        .map(|i| item(i, 0.95 - i as f32 * 0.01, abstract_chars))
        .collect()
}

#[test]
fn fitted_digest_stays_under_the_wire_limit() {
    let items = ranked(20, 700);
    let limit = card::PAYLOAD_LIMIT_BYTES;

    let k = card::find_max_fitting_count(&items, &topics(), limit, fixed_time());
    assert!(k > 0, "at least one paper should fit");

    let envelope = card::render(&items[..k], &topics(), items.len(), fixed_time());
    let bytes = serde_json::to_vec(&envelope).unwrap();
    assert!(bytes.len() <= limit);
    assert!(bytes.len() <= card::TEAMS_HARD_LIMIT_BYTES - 1024);

    if k < items.len() {
        let next = card::render(&items[..k + 1], &topics(), items.len(), fixed_time());
        assert!(card::measure(&next) > limit, "k must be maximal");
    }
}

#[test]
fn truncated_digest_header_reports_both_counts() {
    let items = ranked(20, 700);
    let limit = card::PAYLOAD_LIMIT_BYTES;

    let k = card::find_max_fitting_count(&items, &topics(), limit, fixed_time());
    assert!(k < items.len(), "fixture must not fit entirely");

    let envelope = card::render(&items[..k], &topics(), items.len(), fixed_time());
    let json = serde_json::to_string(&envelope).unwrap();
    assert!(json.contains(&format!("Showing {k} of 20 New Relevant Papers")));
}

#[test]
fn envelope_is_a_single_adaptive_card_message() {
    let items = ranked(2, 100);
    let envelope = card::render(&items, &topics(), 2, fixed_time());
    let value: serde_json::Value =
        serde_json::from_slice(&serde_json::to_vec(&envelope).unwrap()).unwrap();

    assert_eq!(value["type"], "message");
    let attachments = value["attachments"].as_array().unwrap();
    assert_eq!(attachments.len(), 1);
    assert_eq!(
        attachments[0]["contentType"],
        "application/vnd.microsoft.card.adaptive"
    );

    let body = attachments[0]["content"]["body"].as_array().unwrap();
    // Header container + one block per paper + footer.
    assert_eq!(body.len(), 2 + items.len());
}

#[test]
fn multibyte_topics_and_abstracts_count_as_bytes() {
    let wide = ranked(1, 600);
    let narrow: Vec<NotificationItem> = {
        let mut items = ranked(1, 600);
        items[0].translated_summary = "a".repeat(600);
        items
    };

    let wide_size = card::measure(&card::render(&wide, &topics(), 1, fixed_time()));
    let narrow_size = card::measure(&card::render(&narrow, &topics(), 1, fixed_time()));
    assert!(
        wide_size >= narrow_size + 2 * 600,
        "CJK abstract must cost three bytes per char ({wide_size} vs {narrow_size})"
    );
}

#[test]
fn search_is_stable_across_repeated_runs() {
    let items = ranked(9, 500);
    let limit = 12_000;
    let first = card::find_max_fitting_count(&items, &topics(), limit, fixed_time());
    for _ in 0..5 {
        assert_eq!(
            card::find_max_fitting_count(&items, &topics(), limit, fixed_time()),
            first
        );
    }
}
