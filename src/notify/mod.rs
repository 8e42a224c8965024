//! Notification channels for the paper digest.

pub mod card;
pub mod email;
pub mod teams;

use async_trait::async_trait;

use crate::model::NotificationItem;

pub use email::EmailNotifier;
pub use teams::TeamsNotifier;

/// A digest delivery channel.
///
/// Implementations own their transport entirely. Delivery results are
/// booleans: a failed send is logged and reported, never raised — retry
/// policy belongs to the invoking scheduler.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name (e.g. "teams", "email").
    fn name(&self) -> &str;

    /// Deliver a digest of relevant papers.
    ///
    /// An empty `items` list is a valid "nothing to send" outcome: the
    /// notifier returns `true` without touching its transport.
    async fn send_digest(&self, items: &[NotificationItem], topics: &[String]) -> bool;

    /// Deliver an error notification describing a failed run.
    async fn send_error(&self, message: &str) -> bool;
}
