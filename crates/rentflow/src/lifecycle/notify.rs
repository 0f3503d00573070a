use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::UserId;

/// Trait describing outbound user-facing alert hooks (in-app feed, email
/// adapters). Dispatch is fire-and-forget from the orchestration's point of
/// view: services log failures and never roll back the action that triggered
/// the notification.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// One user-facing alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: UserId,
    pub category: NotificationCategory,
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deep_link: Option<String>,
    pub details: BTreeMap<String, String>,
}

impl Notification {
    pub fn new(
        recipient: UserId,
        category: NotificationCategory,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            recipient,
            category,
            title: title.into(),
            body: body.into(),
            deep_link: None,
            details: BTreeMap::new(),
        }
    }

    pub fn with_link(mut self, deep_link: impl Into<String>) -> Self {
        self.deep_link = Some(deep_link.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    Application,
    Lease,
    Payment,
    Expiry,
}

impl NotificationCategory {
    pub const fn label(self) -> &'static str {
        match self {
            NotificationCategory::Application => "application",
            NotificationCategory::Lease => "lease",
            NotificationCategory::Payment => "payment",
            NotificationCategory::Expiry => "expiry",
        }
    }
}

/// Alert dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Send an alert, logging instead of propagating on failure. A lost
/// notification must never roll back the orchestration step that raised it.
pub(crate) fn dispatch<N: NotificationSink + ?Sized>(sink: &N, notification: Notification) {
    let recipient = notification.recipient.0.clone();
    let category = notification.category.label();
    if let Err(err) = sink.notify(notification) {
        tracing::warn!(%recipient, category, error = %err, "notification dispatch failed");
    }
}
