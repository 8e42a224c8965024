//! Email channel — digest delivery over SMTP via lettre.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::message::MultiPart;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::config::EmailConfig;
use crate::error::NotifyError;
use crate::model::NotificationItem;
use crate::notify::Notifier;

/// Authors shown before collapsing to "(+n more)" in email bodies.
const AUTHORS_SHOWN: usize = 3;

/// Email notifier — renders the digest as a plain+HTML multipart message.
pub struct EmailNotifier {
    config: EmailConfig,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Send a multipart email via SMTP.
    fn send_mail(&self, subject: &str, text: &str, html: &str) -> Result<(), NotifyError> {
        let creds = Credentials::new(
            self.config.username.clone(),
            self.config.password.clone(),
        );

        let transport = SmtpTransport::relay(&self.config.smtp_host)
            .map_err(|e| NotifyError::SendFailed {
                channel: "email".into(),
                reason: format!("SMTP relay error: {e}"),
            })?
            .port(self.config.smtp_port)
            .credentials(creds)
            .build();

        let email = Message::builder()
            .from(self.config.from_address.parse().map_err(|e| {
                NotifyError::BuildFailed {
                    channel: "email".into(),
                    reason: format!("Invalid from address: {e}"),
                }
            })?)
            .to(self.config.recipient.parse().map_err(|e| {
                NotifyError::BuildFailed {
                    channel: "email".into(),
                    reason: format!("Invalid recipient address: {e}"),
                }
            })?)
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(
                text.to_string(),
                html.to_string(),
            ))
            .map_err(|e| NotifyError::BuildFailed {
                channel: "email".into(),
                reason: format!("Failed to build email: {e}"),
            })?;

        transport.send(&email).map_err(|e| NotifyError::SendFailed {
            channel: "email".into(),
            reason: format!("SMTP send failed: {e}"),
        })?;

        tracing::info!(to = %self.config.recipient, "Email sent");
        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        "email"
    }

    async fn send_digest(&self, items: &[NotificationItem], topics: &[String]) -> bool {
        if items.is_empty() {
            tracing::info!("No relevant papers to email");
            return true;
        }

        let generated_at = Utc::now();
        let subject = digest_subject(items.len(), topics);
        let text = digest_text_body(items, topics, generated_at);
        let html = digest_html_body(items, topics, generated_at);

        match self.send_mail(&subject, &text, &html) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to send email notification: {e}");
                false
            }
        }
    }

    async fn send_error(&self, message: &str) -> bool {
        let generated_at = Utc::now();
        let subject = "Paper Digest - Error Notification";
        let text = format!(
            "Paper Digest - Error\n\n\
             The digest agent encountered an error during its last run:\n\n\
             {message}\n\n\
             Time: {}\n",
            generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        let html = format!(
            "<html><body>\
             <h2>Paper Digest - Error</h2>\
             <p>The digest agent encountered an error during its last run:</p>\
             <div style=\"background-color: #f8f8f8; padding: 10px; border-left: 4px solid #d32f2f;\">\
             <pre>{message}</pre></div>\
             <p><em>Time: {}</em></p>\
             </body></html>",
            generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        match self.send_mail(subject, &text, &html) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to send error email: {e}");
                false
            }
        }
    }
}

// ── Body rendering ──────────────────────────────────────────────────

/// Subject line: paper count plus the first two topics.
fn digest_subject(num_papers: usize, topics: &[String]) -> String {
    let mut topics_str = topics
        .iter()
        .take(2)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    if topics.len() > 2 {
        topics_str.push_str(&format!(" (+{} more)", topics.len() - 2));
    }
    format!("📚 {num_papers} New Relevant Papers - {topics_str}")
}

/// Abbreviated author list for email bodies.
fn authors_line(authors: &[String]) -> String {
    let mut line = authors
        .iter()
        .take(AUTHORS_SHOWN)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    if authors.len() > AUTHORS_SHOWN {
        line.push_str(&format!(" (+{} more)", authors.len() - AUTHORS_SHOWN));
    }
    line
}

fn digest_text_body(
    items: &[NotificationItem],
    topics: &[String],
    generated_at: DateTime<Utc>,
) -> String {
    let mut text = format!(
        "NEW RELEVANT PAPERS - {}\n\n\
         Research Topics: {}\n\
         Found {} relevant papers from arXiv:\n\n\
         ========================================\n",
        generated_at.format("%Y-%m-%d"),
        topics.join(", "),
        items.len()
    );

    for (i, item) in items.iter().enumerate() {
        let paper = &item.paper;
        let relevance = &item.relevance;
        text.push_str(&format!(
            "\n{}. {}\n\n\
             Authors: {}\n\
             Relevance Score: {:.1}/1.0\n\
             Key Topics: {}\n\n\
             Summary: {}\n\n\
             Link: {}\n\
             Published: {}\n\
             Categories: {}\n\n\
             ----------------------------------------\n",
            i + 1,
            paper.title,
            authors_line(&paper.authors),
            relevance.relevance_score,
            relevance
                .key_topics
                .iter()
                .take(3)
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
            item.translated_summary,
            paper.link,
            paper.published.format("%Y-%m-%d"),
            paper.categories.join(", "),
        ));
    }

    text.push_str(&format!(
        "\nGenerated by Paper Digest\n{}\n",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    text
}

fn digest_html_body(
    items: &[NotificationItem],
    topics: &[String],
    generated_at: DateTime<Utc>,
) -> String {
    let mut html = format!(
        "<html><head><style>\
         body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}\
         .header {{ background-color: #1976d2; color: white; padding: 20px; text-align: center; }}\
         .content {{ padding: 20px; }}\
         .paper {{ margin-bottom: 30px; border-left: 4px solid #1976d2; padding-left: 15px; }}\
         .paper-title {{ font-size: 18px; font-weight: bold; }}\
         .paper-authors {{ color: #666; margin-bottom: 8px; }}\
         .paper-summary {{ margin-bottom: 10px; }}\
         .paper-meta {{ font-size: 12px; color: #888; }}\
         .relevance-score {{ display: inline-block; padding: 4px 8px; border-radius: 4px; font-weight: bold; font-size: 12px; }}\
         .score-high {{ background-color: #4caf50; color: white; }}\
         .score-medium {{ background-color: #ff9800; color: white; }}\
         .footer {{ text-align: center; color: #666; font-size: 12px; padding: 20px; }}\
         </style></head><body>\
         <div class=\"header\">\
         <h1>📚 New Relevant Papers</h1>\
         <p>Research Topics: {}</p>\
         <p>Date: {}</p>\
         </div>\
         <div class=\"content\">\
         <p>Found {} relevant papers from arXiv:</p>",
        topics.join(", "),
        generated_at.format("%Y-%m-%d"),
        items.len()
    );

    for item in items {
        let paper = &item.paper;
        let relevance = &item.relevance;
        let score_class = if relevance.relevance_score >= 0.8 {
            "score-high"
        } else {
            "score-medium"
        };

        html.push_str(&format!(
            "<div class=\"paper\">\
             <div class=\"paper-title\"><a href=\"{}\" style=\"color: #1976d2; text-decoration: none;\">{}</a></div>\
             <div class=\"paper-authors\">{}</div>\
             <div class=\"paper-summary\">{}</div>\
             <div class=\"paper-meta\">\
             <span class=\"relevance-score {}\">Relevance: {:.1}/1.0</span>\
             | Categories: {}\
             | Published: {}\
             | Topics: {}\
             </div></div>",
            paper.link,
            paper.title,
            authors_line(&paper.authors),
            item.translated_summary,
            score_class,
            relevance.relevance_score,
            paper.categories.join(", "),
            paper.published.format("%Y-%m-%d"),
            relevance
                .key_topics
                .iter()
                .take(3)
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
        ));
    }

    html.push_str(&format!(
        "</div><div class=\"footer\">\
         <p>Generated by Paper Digest</p>\
         <p><em>{}</em></p>\
         </div></body></html>",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html
}

// ── Tests ───────────────────────────────────────────────────────────
